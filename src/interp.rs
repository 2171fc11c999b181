//! Tree-walking interpreter over [`PNode`] programs.
//!
//! Identifiers resolve in the current routine frame first and then among
//! declared globals. Assigning to a name that is neither creates a local.
//! Loop forms bind their variables in the current frame for the duration of
//! the loop and restore whatever was bound before once it ends.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::builtin::{expected, Evaluation};
use crate::database::Database;
use crate::errlog::{DiagnosticKind, ErrorLog};
use crate::index::OtherHasher;
use crate::lineage;
use crate::node::NodeId;
use crate::parse::Program;
use crate::pnode::{Location, PNode, Routine};
use crate::record::RecordKind;
use crate::value::PValue;

pub type RunResult<T> = Result<T, RuntimeError>;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct RuntimeError {
    pub message: String,
    pub location: Option<Location>,
}

impl RuntimeError {
    pub fn at(location: &Location, message: impl Into<String>) -> Self {
        Self { message: message.into(), location: Some(location.clone()) }
    }
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), location: None }
    }
}

/// How a statement list finished.
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Break,
    Continue,
    Return(PValue),
}

/// Text produced by a run, one chunk per emitted piece.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Output {
    chunks: Vec<String>,
}

impl Output {
    pub fn push(&mut self, chunk: String) {
        self.chunks.push(chunk);
    }
    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }
    pub fn text(&self) -> String {
        self.chunks.concat()
    }
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

type Scope = HashMap<String, PValue, OtherHasher>;

pub struct Interpreter<'a> {
    program: &'a Program,
    db: &'a mut Database,
    globals: Scope,
    frames: Vec<Scope>,
    output: Output,
}

impl<'a> Interpreter<'a> {
    pub fn new(program: &'a Program, db: &'a mut Database) -> Self {
        let globals = program.globals().iter().map(|name| (name.clone(), PValue::Null)).collect();
        Self { program, db, globals, frames: vec![Scope::default()], output: Output::default() }
    }

    pub fn database(&self) -> &Database {
        &*self.db
    }
    pub fn database_mut(&mut self) -> &mut Database {
        &mut *self.db
    }
    pub fn output(&self) -> &Output {
        &self.output
    }
    pub fn into_output(self) -> Output {
        self.output
    }
    pub fn emit(&mut self, chunk: String) {
        self.output.push(chunk);
    }

    /// Text form of a value for output. Nodes print as their value.
    pub fn render(&self, value: &PValue) -> String {
        match value {
            PValue::Node(id) => self.db.nodes().value(*id).unwrap_or_default().to_string(),
            other => other.to_string(),
        }
    }

    /// Runs the named procedure, which must take no parameters.
    pub fn run(&mut self, entry: &str) -> RunResult<()> {
        let program = self.program;
        let routine = program
            .procedure(entry)
            .ok_or_else(|| RuntimeError::new(format!("no procedure named {}", entry)))?;
        if !routine.params.is_empty() {
            return Err(RuntimeError::at(&routine.location, format!("{} must not take parameters", entry)));
        }
        info!(entry, "script started");
        self.invoke(routine, Vec::new(), &routine.location)?;
        info!(entry, chunks = self.output.chunks().len(), "script finished");
        Ok(())
    }

    fn frame(&mut self) -> &mut Scope {
        if self.frames.is_empty() {
            self.frames.push(Scope::default());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub fn lookup(&self, name: &str, location: &Location) -> RunResult<PValue> {
        self.frames
            .last()
            .and_then(|frame| frame.get(name))
            .or_else(|| self.globals.get(name))
            .cloned()
            .ok_or_else(|| RuntimeError::at(location, format!("undefined identifier {}", name)))
    }

    pub fn assign(&mut self, name: &str, value: PValue) {
        let local = self.frames.last().is_some_and(|frame| frame.contains_key(name));
        if !local {
            if let Some(global) = self.globals.get_mut(name) {
                *global = value;
                return;
            }
        }
        self.frame().insert(name.to_string(), value);
    }

    // ------------- Statements -------------

    pub fn interpret(&mut self, statements: &[PNode]) -> RunResult<Flow> {
        for statement in statements {
            match self.statement(statement)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn statement(&mut self, node: &PNode) -> RunResult<Flow> {
        match node {
            PNode::StrCons { value, .. } => {
                self.emit(value.clone());
                Ok(Flow::Normal)
            }
            PNode::IntCons { .. } | PNode::FloatCons { .. } => Ok(Flow::Normal),
            PNode::Ident { .. } | PNode::FuncCall { .. } | PNode::BuiltinCall { .. } => {
                if let PValue::Str(text) = self.evaluate(node)? {
                    self.emit(text);
                }
                Ok(Flow::Normal)
            }
            PNode::Assign { name, value, .. } => {
                let value = self.evaluate(value)?;
                self.assign(name, value);
                Ok(Flow::Normal)
            }
            PNode::If { condition, then_branch, else_branch, .. } => {
                if self.evaluate(condition)?.truthy() {
                    self.interpret(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.interpret(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            PNode::While { condition, body, .. } => {
                while self.evaluate(condition)?.truthy() {
                    match self.interpret(body)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            PNode::Break { .. } => Ok(Flow::Break),
            PNode::Continue { .. } => Ok(Flow::Continue),
            PNode::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => PValue::Null,
                };
                Ok(Flow::Return(value))
            }
            PNode::ProcCall { name, args, location } => {
                let program = self.program;
                let routine = program
                    .procedure(name)
                    .ok_or_else(|| RuntimeError::at(location, format!("undefined procedure {}", name)))?;
                self.call(routine, args, location)?;
                Ok(Flow::Normal)
            }
            PNode::ProcDef(routine) | PNode::FuncDef(routine) => {
                Err(RuntimeError::at(&routine.location, "definitions cannot appear inside a routine"))
            }
            _ => self.iterate(node),
        }
    }

    // ------------- Expressions -------------

    pub fn evaluate(&mut self, node: &PNode) -> RunResult<PValue> {
        match node {
            PNode::IntCons { value, .. } => Ok(PValue::Int(*value)),
            PNode::FloatCons { value, .. } => Ok(PValue::Float(*value)),
            PNode::StrCons { value, .. } => Ok(PValue::Str(value.clone())),
            PNode::Ident { name, location } => self.lookup(name, location),
            PNode::FuncCall { name, args, location } => {
                let program = self.program;
                let routine = program
                    .function(name)
                    .ok_or_else(|| RuntimeError::at(location, format!("undefined function {}", name)))?;
                self.call(routine, args, location)
            }
            PNode::BuiltinCall { builtin, args, location } => {
                if args.len() < builtin.min_args || args.len() > builtin.max_args {
                    return Err(RuntimeError::at(location, format!("wrong number of arguments to {}", builtin.name)));
                }
                match builtin.evaluation {
                    Evaluation::Values(func) => {
                        let values = args.iter().map(|arg| self.evaluate(arg)).collect::<RunResult<Vec<_>>>()?;
                        func(self, &values, location)
                    }
                    Evaluation::Nodes(func) => func(self, args, location),
                }
            }
            other => Err(RuntimeError::at(
                other.location(),
                format!("{} cannot be used as a value", other.kind_name()),
            )),
        }
    }

    fn call(&mut self, routine: &Routine, args: &[PNode], location: &Location) -> RunResult<PValue> {
        if args.len() != routine.params.len() {
            return Err(RuntimeError::at(
                location,
                format!("{} takes {} arguments, not {}", routine.name, routine.params.len(), args.len()),
            ));
        }
        let values = args.iter().map(|arg| self.evaluate(arg)).collect::<RunResult<Vec<_>>>()?;
        self.invoke(routine, values, location)
    }

    fn invoke(&mut self, routine: &Routine, values: Vec<PValue>, location: &Location) -> RunResult<PValue> {
        debug!(routine = %routine.name, depth = self.frames.len(), "call");
        let frame: Scope = routine.params.iter().cloned().zip(values).collect();
        self.frames.push(frame);
        let flow = self.interpret(&routine.body);
        self.frames.pop();
        match flow? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(PValue::Null),
            Flow::Break | Flow::Continue => Err(RuntimeError::at(
                location,
                format!("break or continue outside of a loop in {}", routine.name),
            )),
        }
    }

    // ------------- Loops -------------

    fn record_of(&mut self, expr: &PNode, kind: RecordKind) -> RunResult<Option<NodeId>> {
        match self.evaluate(expr)? {
            PValue::Null => Ok(None),
            PValue::Node(id) if self.db.record_kind(id) == Some(kind) => Ok(Some(id)),
            other => Err(expected(&format!("a {} record", kind.name()), &other, expr.location())),
        }
    }

    fn node_of(&mut self, expr: &PNode) -> RunResult<Option<NodeId>> {
        match self.evaluate(expr)? {
            PValue::Null => Ok(None),
            PValue::Node(id) if self.db.nodes().contains(id) => Ok(Some(id)),
            other => Err(expected("a node", &other, expr.location())),
        }
    }

    fn iterate(&mut self, node: &PNode) -> RunResult<Flow> {
        match node {
            PNode::Children { family, child, counter, body, .. } => {
                let rows = match self.record_of(family, RecordKind::Family)? {
                    Some(f) => lineage::children(self.database(), f).into_iter().map(|c| vec![PValue::Node(c)]).collect(),
                    None => Vec::new(),
                };
                self.run_loop(&[child], Some(counter), rows, body)
            }
            PNode::Spouses { person, spouse, family, counter, body, .. } => {
                let rows = match self.record_of(person, RecordKind::Person)? {
                    Some(p) => lineage::spouses(self.database(), p)
                        .into_iter()
                        .map(|(s, f)| vec![PValue::Node(s), PValue::Node(f)])
                        .collect(),
                    None => Vec::new(),
                };
                self.run_loop(&[spouse, family], Some(counter), rows, body)
            }
            PNode::Families { person, family, spouse, counter, body, .. } => {
                let rows = match self.record_of(person, RecordKind::Person)? {
                    Some(p) => lineage::families(self.database(), p)
                        .into_iter()
                        .map(|(f, s)| vec![PValue::Node(f), s.into()])
                        .collect(),
                    None => Vec::new(),
                };
                self.run_loop(&[family, spouse], Some(counter), rows, body)
            }
            PNode::Fathers { person, father: parent, family, counter, body, .. }
            | PNode::Mothers { person, mother: parent, family, counter, body, .. } => {
                let rows = match self.record_of(person, RecordKind::Person)? {
                    Some(p) => {
                        let parents = if matches!(node, PNode::Fathers { .. }) {
                            lineage::fathers(self.database(), p)
                        } else {
                            lineage::mothers(self.database(), p)
                        };
                        parents.into_iter().map(|(a, f)| vec![PValue::Node(a), PValue::Node(f)]).collect()
                    }
                    None => Vec::new(),
                };
                self.run_loop(&[parent, family], Some(counter), rows, body)
            }
            PNode::Parents { person, family, counter, body, .. } => {
                let rows = match self.record_of(person, RecordKind::Person)? {
                    Some(p) => lineage::families_as_child(self.database(), p)
                        .into_iter()
                        .map(|f| vec![PValue::Node(f)])
                        .collect(),
                    None => Vec::new(),
                };
                self.run_loop(&[family], Some(counter), rows, body)
            }
            PNode::ForRecords { kind, record, counter, body, .. } => {
                let rows = self
                    .db
                    .keys(*kind)
                    .iter()
                    .filter_map(|key| self.db.record(key))
                    .map(|root| vec![PValue::Node(root)])
                    .collect();
                self.run_loop(&[record], Some(counter), rows, body)
            }
            PNode::ForList { list, element, counter, body, .. } => {
                let rows = match self.evaluate(list)? {
                    PValue::List(items) => items.borrow().iter().map(|item| vec![item.clone()]).collect(),
                    PValue::Null => Vec::new(),
                    other => return Err(expected("a list", &other, list.location())),
                };
                self.run_loop(&[element], Some(counter), rows, body)
            }
            PNode::ForSequence { sequence, element, value, counter, body, .. } => {
                let rows = match self.evaluate(sequence)? {
                    PValue::Sequence(set) => set
                        .borrow()
                        .elements()
                        .iter()
                        .map(|e| vec![PValue::Node(e.person), e.value.clone()])
                        .collect(),
                    PValue::Null => Vec::new(),
                    other => return Err(expected("a set", &other, sequence.location())),
                };
                self.run_loop(&[element, value], Some(counter), rows, body)
            }
            PNode::ForNodes { parent, child, counter, body, .. } => {
                let rows = match self.node_of(parent)? {
                    Some(p) => self.db.nodes().children(p).map(|c| vec![PValue::Node(c)]).collect(),
                    None => Vec::new(),
                };
                self.run_loop(&[child], counter.as_ref(), rows, body)
            }
            PNode::ForNotes { node: target, note, body, .. } => {
                let rows = match self.node_of(target)? {
                    Some(n) => {
                        let nodes = self.db.nodes();
                        nodes
                            .children_with_tag(n, "NOTE")
                            .into_iter()
                            .map(|note| vec![PValue::from(nodes.value(note).unwrap_or_default())])
                            .collect()
                    }
                    None => Vec::new(),
                };
                self.run_loop(&[note], None, rows, body)
            }
            PNode::Traverse { root, node: current, level, body, .. } => {
                let rows = match self.node_of(root)? {
                    Some(r) => self
                        .db
                        .nodes()
                        .traverse(r)
                        .into_iter()
                        .map(|(n, depth)| vec![PValue::Node(n), PValue::Int(depth as i64)])
                        .collect(),
                    None => Vec::new(),
                };
                self.run_loop(&[current, level], None, rows, body)
            }
            other => Err(RuntimeError::at(other.location(), format!("unexpected {}", other.kind_name()))),
        }
    }

    /// Runs `body` once per row, binding `names` to the row's values and
    /// `counter` to the zero-based iteration number.
    fn run_loop(&mut self, names: &[&String], counter: Option<&String>, rows: Vec<Vec<PValue>>, body: &[PNode]) -> RunResult<Flow> {
        let bound: Vec<&String> = names.iter().copied().chain(counter).collect();
        let saved: Vec<Option<PValue>> = bound.iter().map(|name| self.frame().get(name.as_str()).cloned()).collect();

        let mut outcome = Ok(Flow::Normal);
        for (index, row) in rows.into_iter().enumerate() {
            let frame = self.frame();
            for (name, value) in names.iter().zip(row) {
                frame.insert((*name).clone(), value);
            }
            if let Some(counter) = counter {
                frame.insert(counter.clone(), PValue::Int(index as i64));
            }
            match self.interpret(body) {
                Ok(Flow::Normal | Flow::Continue) => {}
                Ok(Flow::Break) => break,
                Ok(flow @ Flow::Return(_)) => {
                    outcome = Ok(flow);
                    break;
                }
                Err(error) => {
                    outcome = Err(error);
                    break;
                }
            }
        }

        let frame = self.frame();
        for (name, value) in bound.into_iter().zip(saved) {
            match value {
                Some(value) => frame.insert(name.clone(), value),
                None => frame.remove(name.as_str()),
            };
        }
        outcome
    }
}

/// Runs procedure `entry` of `program` against `db`. A runtime error is
/// logged with its location and ends the run; no output is returned then.
pub fn run_program(program: &Program, db: &mut Database, entry: &str, log: &mut ErrorLog) -> Option<Output> {
    let mut interpreter = Interpreter::new(program, db);
    match interpreter.run(entry) {
        Ok(()) => Some(interpreter.into_output()),
        Err(error) => {
            warn!(entry, error = %error.message, "script failed");
            let (file, line) = match &error.location {
                Some(location) => (Some(location.file.to_string()), Some(location.line)),
                None => (None, None),
            };
            log.report(DiagnosticKind::Runtime, file.as_deref(), line, error.message);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_script;

    fn run(text: &str) -> (Option<Output>, ErrorLog) {
        let mut log = ErrorLog::new();
        let mut db = Database::new("test");
        let program = parse_script("test.ll", text, &mut log).expect("script parses");
        let output = run_program(&program, &mut db, "main", &mut log);
        (output, log)
    }

    #[test]
    fn globals_are_shared_between_routines() {
        let (output, log) = run("global(g)\nproc main() { g := 1 call bump() print(g) }\nproc bump() { g := g + 1 }");
        assert!(log.is_empty(), "{}", log);
        assert_eq!(output.expect("output").text(), "2");
    }

    #[test]
    fn locals_do_not_leak_between_routines() {
        let (output, log) = run("proc main() { x := 1 call other() }\nproc other() { print(x) }");
        assert!(output.is_none());
        assert_eq!(log.count(DiagnosticKind::Runtime), 1);
    }

    #[test]
    fn loop_variables_are_restored() {
        let (output, log) = run(
            "proc main() { list(l) enqueue(l, 5) enqueue(l, 6) e := \"x\" forlist(l, e, i) { print(d(e + i)) } print(e) }",
        );
        assert!(log.is_empty(), "{}", log);
        assert_eq!(output.expect("output").chunks(), ["5", "7", "x"]);
    }

    #[test]
    fn break_outside_loop_is_a_runtime_error() {
        let (output, log) = run("proc main() { break }");
        assert!(output.is_none());
        assert_eq!(log.count(DiagnosticKind::Runtime), 1);
    }
}
