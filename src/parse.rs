//! Script parsing: pest grammar in `script.pest`, turned into [`PNode`]
//! trees here.
//!
//! Files are parsed one definition at a time. After a syntax error the
//! parser skips to the next line that starts a definition and carries on,
//! so one run reports every broken definition. Included files are read
//! once each, and all of them are scanned for function names before any
//! is parsed. Calls are resolved in this order: user functions (from any
//! file, defined before or after the call), then builtins, then an
//! unresolved call that must be defined by the time every file is read.
//! Any diagnostic makes the whole program unrunnable.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use lazy_static::lazy_static;
use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use regex::Regex;
use tracing::{debug, info};

use crate::builtin::lookup_builtin;
use crate::errlog::{DiagnosticKind, ErrorLog};
use crate::pnode::{Location, PNode, Routine};
use crate::record::RecordKind;

#[derive(Parser)]
#[grammar = "script.pest"]
struct ScriptGrammar;

lazy_static! {
    static ref DEFINITION_START: Regex = Regex::new(r"(?m)^[ \t]*(proc|func|global|include)\b").unwrap();
    static ref FUNCTION_NAME: Regex = Regex::new(r"(?m)^[ \t]*func[ \t]+([A-Za-z_][A-Za-z0-9_]*)").unwrap();
    static ref INCLUDE: Regex = Regex::new(r#"(?m)^[ \t]*include[ \t]*\([ \t]*"((?:[^"\\]|\\.)*)"[ \t]*\)"#).unwrap();
}

/// Where script text comes from, by file name.
pub trait ScriptLoader {
    fn load(&self, name: &str) -> Option<String>;
}

/// Scripts held in memory, mostly for tests and one-off runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    files: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with(mut self, name: &str, text: &str) -> Self {
        self.files.insert(name.to_string(), text.to_string());
        self
    }
}

impl ScriptLoader for MemoryLoader {
    fn load(&self, name: &str) -> Option<String> {
        self.files.get(name).cloned()
    }
}

/// Scripts read from disk. Absolute names are read as given; relative names
/// are looked up in each search directory in turn.
#[derive(Debug, Clone)]
pub struct FileLoader {
    search: Vec<PathBuf>,
}

impl FileLoader {
    pub fn new<P: AsRef<Path>>(search: &[P]) -> Self {
        Self { search: search.iter().map(|p| p.as_ref().to_path_buf()).collect() }
    }
}

impl ScriptLoader for FileLoader {
    fn load(&self, name: &str) -> Option<String> {
        let path = Path::new(name);
        if path.is_absolute() {
            return fs::read_to_string(path).ok();
        }
        self.search.iter().find_map(|dir| fs::read_to_string(dir.join(path)).ok())
    }
}

/// A parsed, fully resolved set of script files.
#[derive(Debug, Default)]
pub struct Program {
    definitions: Vec<PNode>,
    procedures: HashMap<String, Rc<Routine>>,
    functions: HashMap<String, Rc<Routine>>,
    globals: Vec<String>,
    files: Vec<String>,
}

impl Program {
    /// Definitions in the order they were parsed.
    pub fn definitions(&self) -> &[PNode] {
        &self.definitions
    }
    pub fn procedure(&self, name: &str) -> Option<&Rc<Routine>> {
        self.procedures.get(name)
    }
    pub fn function(&self, name: &str) -> Option<&Rc<Routine>> {
        self.functions.get(name)
    }
    pub fn globals(&self) -> &[String] {
        &self.globals
    }
    pub fn files(&self) -> &[String] {
        &self.files
    }
}

/// Parses `entry` and everything it includes. Returns `None` if any
/// diagnostic was logged.
pub fn parse_program(entry: &str, loader: &dyn ScriptLoader, log: &mut ErrorLog) -> Option<Program> {
    let mut session = Session::new(loader, log);
    session.queue(entry);
    let mut scanned = Vec::new();
    while let Some(file) = session.pending.pop_front() {
        if let Some(text) = session.load(&file) {
            scanned.push((file, text));
        }
    }
    for (file, text) in scanned {
        session.parse_file(&file, &text);
    }
    // includes the scan could not see, such as ones sharing a line
    while let Some(file) = session.pending.pop_front() {
        if let Some(text) = session.load(&file) {
            session.parse_file(&file, &text);
        }
    }
    session.finish()
}

/// Parses a single script held in memory.
pub fn parse_script(name: &str, text: &str, log: &mut ErrorLog) -> Option<Program> {
    parse_program(name, &MemoryLoader::new().with(name, text), log)
}

struct Session<'a> {
    loader: &'a dyn ScriptLoader,
    log: &'a mut ErrorLog,
    program: Program,
    pending: VecDeque<String>,
    seen: HashSet<String>,
    declared_functions: HashSet<String>,
    called_functions: Vec<(String, Location)>,
    called_procedures: Vec<(String, Location)>,
    errors: usize,
    file: Rc<str>,
    first_line: usize,
}

impl<'a> Session<'a> {
    fn new(loader: &'a dyn ScriptLoader, log: &'a mut ErrorLog) -> Self {
        Self {
            loader,
            log,
            program: Program::default(),
            pending: VecDeque::new(),
            seen: HashSet::new(),
            declared_functions: HashSet::new(),
            called_functions: Vec::new(),
            called_procedures: Vec::new(),
            errors: 0,
            file: Rc::from(""),
            first_line: 0,
        }
    }

    fn queue(&mut self, file: &str) {
        if self.seen.insert(file.to_string()) {
            self.pending.push_back(file.to_string());
        }
    }

    fn error(&mut self, line: Option<usize>, message: String) {
        let file = (!self.file.is_empty()).then(|| self.file.to_string());
        self.log.report(DiagnosticKind::Syntax, file.as_deref(), line, message);
        self.errors += 1;
    }

    fn error_at(&mut self, location: &Location, message: String) {
        self.log.report(DiagnosticKind::Syntax, Some(&location.file), Some(location.line), message);
        self.errors += 1;
    }

    fn location(&self, pair: &Pair<Rule>) -> Location {
        Location { file: self.file.clone(), line: self.first_line + pair.as_span().start_pos().line_col().0 }
    }

    /// Reads a file and scans it for function names and includes.
    fn load(&mut self, file: &str) -> Option<String> {
        let Some(text) = self.loader.load(file) else {
            self.file = Rc::from(file);
            self.error(None, format!("cannot read script file {}", file));
            return None;
        };
        for found in FUNCTION_NAME.captures_iter(&text) {
            self.declared_functions.insert(found[1].to_string());
        }
        for found in INCLUDE.captures_iter(&text) {
            self.queue(&unescape(&found[1]));
        }
        Some(text)
    }

    fn parse_file(&mut self, file: &str, text: &str) {
        debug!(file, "parsing script file");
        self.file = Rc::from(file);
        self.program.files.push(file.to_string());

        let mut offset = 0;
        while offset < text.len() {
            let rest = &text[offset..];
            if ScriptGrammar::parse(Rule::blank, rest).is_ok() {
                break;
            }
            self.first_line = text[..offset].matches('\n').count();
            match ScriptGrammar::parse(Rule::unit, rest) {
                Ok(mut pairs) => {
                    let Some(unit) = pairs.next() else { break };
                    let end = unit.as_span().end();
                    for pair in unit.into_inner() {
                        self.definition(pair);
                    }
                    if end == 0 {
                        break;
                    }
                    offset += end;
                }
                Err(error) => {
                    let line = match error.line_col {
                        LineColLocation::Pos((line, _)) | LineColLocation::Span((line, _), _) => line,
                    };
                    self.error(Some(self.first_line + line), format!("syntax error: {}", error.variant.message()));
                    let skip = rest.chars().next().map_or(1, char::len_utf8);
                    match DEFINITION_START.find_at(text, offset + skip) {
                        Some(next) => offset = next.start(),
                        None => break,
                    }
                }
            }
        }
    }

    fn finish(mut self) -> Option<Program> {
        let mut reported = HashSet::new();
        for (name, location) in std::mem::take(&mut self.called_functions) {
            if !self.program.functions.contains_key(&name) && reported.insert(("function", name.clone())) {
                self.error_at(&location, format!("undefined function {}", name));
            }
        }
        for (name, location) in std::mem::take(&mut self.called_procedures) {
            if !self.program.procedures.contains_key(&name) && reported.insert(("procedure", name.clone())) {
                self.error_at(&location, format!("undefined procedure {}", name));
            }
        }
        if self.errors > 0 {
            info!(errors = self.errors, "script rejected");
            return None;
        }
        info!(
            files = self.program.files.len(),
            procedures = self.program.procedures.len(),
            functions = self.program.functions.len(),
            "script parsed"
        );
        Some(self.program)
    }

    // ------------- Definitions -------------

    fn definition(&mut self, pair: Pair<Rule>) {
        match pair.as_rule() {
            Rule::include => {
                if let Some(name) = pair.into_inner().next() {
                    self.queue(&string_text(name));
                }
            }
            Rule::global_decl => {
                if let Some(name) = pair.into_inner().next() {
                    let name = name.as_str().to_string();
                    if !self.program.globals.contains(&name) {
                        self.program.globals.push(name);
                    }
                }
            }
            Rule::proc_def | Rule::func_def => self.routine(pair),
            _ => {}
        }
    }

    fn routine(&mut self, pair: Pair<Rule>) {
        let is_function = pair.as_rule() == Rule::func_def;
        let location = self.location(&pair);
        let mut inner = pair.into_inner().filter(|p| !matches!(p.as_rule(), Rule::kw_proc | Rule::kw_func));
        let (Some(name), Some(params), Some(block)) = (inner.next(), inner.next(), inner.next()) else {
            return;
        };
        let name = name.as_str().to_string();
        let params: Vec<String> = params.into_inner().map(|p| p.as_str().to_string()).collect();
        let body = self.block(block);
        let routine = Rc::new(Routine { name: name.clone(), params, body, location: location.clone() });
        let (table, what) = if is_function {
            (&mut self.program.functions, "function")
        } else {
            (&mut self.program.procedures, "procedure")
        };
        if table.contains_key(&name) {
            self.error_at(&location, format!("{} {} is defined more than once", what, name));
            return;
        }
        table.insert(name, routine.clone());
        self.program
            .definitions
            .push(if is_function { PNode::FuncDef(routine) } else { PNode::ProcDef(routine) });
    }

    fn block(&mut self, pair: Pair<Rule>) -> Vec<PNode> {
        pair.into_inner().map(|statement| self.statement(statement)).collect()
    }

    // ------------- Statements -------------

    fn statement(&mut self, pair: Pair<Rule>) -> PNode {
        let location = self.location(&pair);
        let rule = pair.as_rule();
        let mut inner = pair.into_inner();
        match rule {
            Rule::assignment => {
                let name = next_str(&mut inner);
                let value = self.next_expr(&mut inner, &location);
                PNode::Assign { name, value: Box::new(value), location }
            }
            Rule::expr_stmt => self.next_expr(&mut inner, &location),
            Rule::if_stmt => {
                let condition = self.next_expr(&mut inner, &location);
                let then_branch = inner.next().map(|b| self.block(b)).unwrap_or_default();
                let else_branch = inner.next().and_then(|clause| clause.into_inner().next()).map(|branch| {
                    if branch.as_rule() == Rule::if_stmt {
                        vec![self.statement(branch)]
                    } else {
                        self.block(branch)
                    }
                });
                PNode::If { condition: Box::new(condition), then_branch, else_branch, location }
            }
            Rule::while_stmt => {
                let condition = self.next_expr(&mut inner, &location);
                let body = inner.next().map(|b| self.block(b)).unwrap_or_default();
                PNode::While { condition: Box::new(condition), body, location }
            }
            Rule::break_stmt => PNode::Break { location },
            Rule::continue_stmt => PNode::Continue { location },
            Rule::return_stmt => {
                let value = inner.next().map(|e| Box::new(self.expression(e)));
                PNode::Return { value, location }
            }
            Rule::call_stmt => {
                let name = next_str(&mut inner);
                let args = inner.next().map(|a| self.arguments(a)).unwrap_or_default();
                self.called_procedures.push((name.clone(), location.clone()));
                PNode::ProcCall { name, args, location }
            }
            Rule::children_loop => {
                let family = Box::new(self.next_expr(&mut inner, &location));
                let (child, counter) = (next_str(&mut inner), next_str(&mut inner));
                let body = self.next_block(&mut inner);
                PNode::Children { family, child, counter, body, location }
            }
            Rule::spouses_loop => {
                let person = Box::new(self.next_expr(&mut inner, &location));
                let (spouse, family, counter) = (next_str(&mut inner), next_str(&mut inner), next_str(&mut inner));
                let body = self.next_block(&mut inner);
                PNode::Spouses { person, spouse, family, counter, body, location }
            }
            Rule::families_loop => {
                let person = Box::new(self.next_expr(&mut inner, &location));
                let (family, spouse, counter) = (next_str(&mut inner), next_str(&mut inner), next_str(&mut inner));
                let body = self.next_block(&mut inner);
                PNode::Families { person, family, spouse, counter, body, location }
            }
            Rule::fathers_loop => {
                let person = Box::new(self.next_expr(&mut inner, &location));
                let (father, family, counter) = (next_str(&mut inner), next_str(&mut inner), next_str(&mut inner));
                let body = self.next_block(&mut inner);
                PNode::Fathers { person, father, family, counter, body, location }
            }
            Rule::mothers_loop => {
                let person = Box::new(self.next_expr(&mut inner, &location));
                let (mother, family, counter) = (next_str(&mut inner), next_str(&mut inner), next_str(&mut inner));
                let body = self.next_block(&mut inner);
                PNode::Mothers { person, mother, family, counter, body, location }
            }
            Rule::parents_loop => {
                let person = Box::new(self.next_expr(&mut inner, &location));
                let (family, counter) = (next_str(&mut inner), next_str(&mut inner));
                let body = self.next_block(&mut inner);
                PNode::Parents { person, family, counter, body, location }
            }
            Rule::forindiset_loop => {
                let sequence = Box::new(self.next_expr(&mut inner, &location));
                let (element, value, counter) = (next_str(&mut inner), next_str(&mut inner), next_str(&mut inner));
                let body = self.next_block(&mut inner);
                PNode::ForSequence { sequence, element, value, counter, body, location }
            }
            Rule::forindi_loop | Rule::forfam_loop | Rule::forsour_loop | Rule::foreven_loop | Rule::forothr_loop => {
                let kind = match rule {
                    Rule::forindi_loop => RecordKind::Person,
                    Rule::forfam_loop => RecordKind::Family,
                    Rule::forsour_loop => RecordKind::Source,
                    Rule::foreven_loop => RecordKind::Event,
                    _ => RecordKind::Other,
                };
                let (record, counter) = (next_str(&mut inner), next_str(&mut inner));
                let body = self.next_block(&mut inner);
                PNode::ForRecords { kind, record, counter, body, location }
            }
            Rule::forlist_loop => {
                let list = Box::new(self.next_expr(&mut inner, &location));
                let (element, counter) = (next_str(&mut inner), next_str(&mut inner));
                let body = self.next_block(&mut inner);
                PNode::ForList { list, element, counter, body, location }
            }
            Rule::fornodes_loop => {
                let parent = Box::new(self.next_expr(&mut inner, &location));
                let child = next_str(&mut inner);
                let mut counter = None;
                let mut body = Vec::new();
                for rest in inner {
                    match rest.as_rule() {
                        Rule::ident => counter = Some(rest.as_str().to_string()),
                        _ => body = self.block(rest),
                    }
                }
                PNode::ForNodes { parent, child, counter, body, location }
            }
            Rule::fornotes_loop => {
                let node = Box::new(self.next_expr(&mut inner, &location));
                let note = next_str(&mut inner);
                let body = self.next_block(&mut inner);
                PNode::ForNotes { node, note, body, location }
            }
            Rule::traverse_loop => {
                let root = Box::new(self.next_expr(&mut inner, &location));
                let (node, level) = (next_str(&mut inner), next_str(&mut inner));
                let body = self.next_block(&mut inner);
                PNode::Traverse { root, node, level, body, location }
            }
            other => {
                self.error_at(&location, format!("unexpected {:?}", other));
                PNode::Break { location }
            }
        }
    }

    fn next_expr<'i>(&mut self, inner: &mut impl Iterator<Item = Pair<'i, Rule>>, location: &Location) -> PNode {
        match inner.next() {
            Some(pair) => self.expression(pair),
            None => PNode::IntCons { value: 0, location: location.clone() },
        }
    }

    fn next_block<'i>(&mut self, inner: &mut impl Iterator<Item = Pair<'i, Rule>>) -> Vec<PNode> {
        inner.next().map(|b| self.block(b)).unwrap_or_default()
    }

    // ------------- Expressions -------------

    fn expression(&mut self, pair: Pair<Rule>) -> PNode {
        let location = self.location(&pair);
        match pair.as_rule() {
            Rule::expr | Rule::conjunction | Rule::comparison | Rule::sum | Rule::product => {
                let mut inner = pair.into_inner();
                let mut left = self.next_expr(&mut inner, &location);
                while let (Some(op), Some(operand)) = (inner.next(), inner.next()) {
                    let right = self.expression(operand);
                    left = self.operator(op.as_str(), vec![left, right], location.clone());
                }
                left
            }
            Rule::unary => {
                let mut operators = Vec::new();
                let mut operand = None;
                for part in pair.into_inner() {
                    match part.as_rule() {
                        Rule::unary_op => operators.push(part.as_str() == "-"),
                        _ => operand = Some(self.expression(part)),
                    }
                }
                let mut node = operand.unwrap_or(PNode::IntCons { value: 0, location: location.clone() });
                for negate in operators.into_iter().rev() {
                    node = match (negate, node) {
                        (true, PNode::IntCons { value, location }) => PNode::IntCons { value: -value, location },
                        (true, PNode::FloatCons { value, location }) => PNode::FloatCons { value: -value, location },
                        (true, other) => self.operator("neg", vec![other], location.clone()),
                        (false, other) => self.operator("!", vec![other], location.clone()),
                    };
                }
                node
            }
            Rule::integer => match pair.as_str().parse::<i64>() {
                Ok(value) => PNode::IntCons { value, location },
                Err(_) => {
                    self.error_at(&location, format!("integer constant {} is out of range", pair.as_str()));
                    PNode::IntCons { value: 0, location }
                }
            },
            Rule::float => PNode::FloatCons { value: pair.as_str().parse().unwrap_or_default(), location },
            Rule::string => PNode::StrCons { value: string_text(pair), location },
            Rule::ident => PNode::Ident { name: pair.as_str().to_string(), location },
            Rule::call => {
                let mut inner = pair.into_inner();
                let name = next_str(&mut inner);
                let args = inner.next().map(|a| self.arguments(a)).unwrap_or_default();
                self.call(name, args, location)
            }
            other => {
                self.error_at(&location, format!("unexpected {:?} in expression", other));
                PNode::IntCons { value: 0, location }
            }
        }
    }

    fn arguments(&mut self, pair: Pair<Rule>) -> Vec<PNode> {
        pair.into_inner().map(|arg| self.expression(arg)).collect()
    }

    /// Operators are calls of the builtin with the matching name.
    fn operator(&mut self, symbol: &str, args: Vec<PNode>, location: Location) -> PNode {
        let name = match symbol {
            "||" => "or",
            "&&" => "and",
            "==" => "eq",
            "!=" => "ne",
            "<" => "lt",
            "<=" => "le",
            ">" => "gt",
            ">=" => "ge",
            "+" => "add",
            "-" => "sub",
            "*" => "mul",
            "/" => "div",
            "%" => "mod",
            "!" => "not",
            other => other,
        };
        match lookup_builtin(name) {
            Some(builtin) => PNode::BuiltinCall { builtin, args, location },
            None => {
                self.error_at(&location, format!("no builtin for operator {}", symbol));
                PNode::FuncCall { name: name.to_string(), args, location }
            }
        }
    }

    fn call(&mut self, name: String, args: Vec<PNode>, location: Location) -> PNode {
        if self.program.functions.contains_key(&name) || self.declared_functions.contains(&name) {
            self.called_functions.push((name.clone(), location.clone()));
            return PNode::FuncCall { name, args, location };
        }
        if let Some(builtin) = lookup_builtin(&name) {
            if args.len() < builtin.min_args || args.len() > builtin.max_args {
                let expected = if builtin.min_args == builtin.max_args {
                    builtin.min_args.to_string()
                } else {
                    format!("{} to {}", builtin.min_args, builtin.max_args)
                };
                self.error_at(&location, format!("{} takes {} arguments, not {}", name, expected, args.len()));
            }
            return PNode::BuiltinCall { builtin, args, location };
        }
        self.called_functions.push((name.clone(), location.clone()));
        PNode::FuncCall { name, args, location }
    }
}

fn next_str<'i>(inner: &mut impl Iterator<Item = Pair<'i, Rule>>) -> String {
    inner.next().map(|p| p.as_str().to_string()).unwrap_or_default()
}

/// Contents of a string literal with escapes resolved.
fn string_text(pair: Pair<Rule>) -> String {
    pair.into_inner().next().map(|text| unescape(text.as_str())).unwrap_or_default()
}

fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some(other) => result.push(other),
            None => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> (Option<Program>, ErrorLog) {
        let mut log = ErrorLog::new();
        let program = parse_script("test.ll", text, &mut log);
        (program, log)
    }

    #[test]
    fn operators_become_builtin_calls() {
        let (program, log) = parse("proc main() { x := 1 + 2 * 3 }");
        assert!(log.is_empty(), "{}", log);
        let program = program.expect("program");
        let main = program.procedure("main").expect("main");
        let PNode::Assign { value, .. } = &main.body[0] else { panic!("expected assignment") };
        let PNode::BuiltinCall { builtin, args, .. } = value.as_ref() else { panic!("expected call") };
        assert_eq!(builtin.name, "add");
        assert!(matches!(&args[1], PNode::BuiltinCall { builtin, .. } if builtin.name == "mul"));
    }

    #[test]
    fn forward_function_reference_resolves() {
        let (program, log) = parse("proc main() { x := twice(2) }\nfunc twice(n) { return(n + n) }");
        assert!(log.is_empty(), "{}", log);
        assert!(program.expect("program").function("twice").is_some());
    }

    #[test]
    fn keyword_prefixed_identifiers() {
        let (_, log) = parse("proc main() { breaker := 1 returned := breaker elsewhere := 2 }");
        assert!(log.is_empty(), "{}", log);
    }

    #[test]
    fn errors_in_two_definitions_are_both_reported() {
        let (program, log) = parse("proc a() { x := }\nproc b() { y := 1 }\nproc c() { if }\n");
        assert!(program.is_none());
        assert_eq!(log.count(DiagnosticKind::Syntax), 2);
        let lines: Vec<_> = log.iter().map(|d| d.line).collect();
        assert_eq!(lines, [Some(1), Some(3)]);
    }

    #[test]
    fn arity_of_builtins_is_checked() {
        let (program, log) = parse("proc main() { x := strlen(\"a\", \"b\") }");
        assert!(program.is_none());
        assert_eq!(log.count(DiagnosticKind::Syntax), 1);
    }

    #[test]
    fn unescapes_strings() {
        assert_eq!(unescape(r#"a\"b\n\\"#), "a\"b\n\\");
    }
}
