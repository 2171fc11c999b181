//! Program nodes: the parsed form of report scripts.
//!
//! Every statement and expression form is one [`PNode`] variant. Nodes own
//! their operands and bodies, and carry the file and line they came from.
//! Builtin calls hold a direct reference into the builtin table, resolved
//! once at parse time.

use std::fmt;
use std::rc::Rc;

use crate::builtin::Builtin;
use crate::record::RecordKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: Rc<str>,
    pub line: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A procedure or function definition.
#[derive(Debug)]
pub struct Routine {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<PNode>,
    pub location: Location,
}

#[derive(Debug)]
pub enum PNode {
    IntCons { value: i64, location: Location },
    FloatCons { value: f64, location: Location },
    StrCons { value: String, location: Location },
    Ident { name: String, location: Location },
    Assign { name: String, value: Box<PNode>, location: Location },
    If { condition: Box<PNode>, then_branch: Vec<PNode>, else_branch: Option<Vec<PNode>>, location: Location },
    While { condition: Box<PNode>, body: Vec<PNode>, location: Location },
    Break { location: Location },
    Continue { location: Location },
    Return { value: Option<Box<PNode>>, location: Location },
    ProcDef(Rc<Routine>),
    FuncDef(Rc<Routine>),
    ProcCall { name: String, args: Vec<PNode>, location: Location },
    FuncCall { name: String, args: Vec<PNode>, location: Location },
    BuiltinCall { builtin: &'static Builtin, args: Vec<PNode>, location: Location },
    /// Pre-order walk of a node and its descendants, binding the node and its level.
    Traverse { root: Box<PNode>, node: String, level: String, body: Vec<PNode>, location: Location },
    /// Direct children of a node.
    ForNodes { parent: Box<PNode>, child: String, counter: Option<String>, body: Vec<PNode>, location: Location },
    /// NOTE values directly under a node.
    ForNotes { node: Box<PNode>, note: String, body: Vec<PNode>, location: Location },
    Children { family: Box<PNode>, child: String, counter: String, body: Vec<PNode>, location: Location },
    Spouses { person: Box<PNode>, spouse: String, family: String, counter: String, body: Vec<PNode>, location: Location },
    Families { person: Box<PNode>, family: String, spouse: String, counter: String, body: Vec<PNode>, location: Location },
    Fathers { person: Box<PNode>, father: String, family: String, counter: String, body: Vec<PNode>, location: Location },
    Mothers { person: Box<PNode>, mother: String, family: String, counter: String, body: Vec<PNode>, location: Location },
    /// Families the person is a child in.
    Parents { person: Box<PNode>, family: String, counter: String, body: Vec<PNode>, location: Location },
    /// Every record of one kind, in key order.
    ForRecords { kind: RecordKind, record: String, counter: String, body: Vec<PNode>, location: Location },
    ForList { list: Box<PNode>, element: String, counter: String, body: Vec<PNode>, location: Location },
    ForSequence { sequence: Box<PNode>, element: String, value: String, counter: String, body: Vec<PNode>, location: Location },
}

impl PNode {
    pub fn location(&self) -> &Location {
        match self {
            PNode::ProcDef(routine) | PNode::FuncDef(routine) => &routine.location,
            PNode::IntCons { location, .. }
            | PNode::FloatCons { location, .. }
            | PNode::StrCons { location, .. }
            | PNode::Ident { location, .. }
            | PNode::Assign { location, .. }
            | PNode::If { location, .. }
            | PNode::While { location, .. }
            | PNode::Break { location }
            | PNode::Continue { location }
            | PNode::Return { location, .. }
            | PNode::ProcCall { location, .. }
            | PNode::FuncCall { location, .. }
            | PNode::BuiltinCall { location, .. }
            | PNode::Traverse { location, .. }
            | PNode::ForNodes { location, .. }
            | PNode::ForNotes { location, .. }
            | PNode::Children { location, .. }
            | PNode::Spouses { location, .. }
            | PNode::Families { location, .. }
            | PNode::Fathers { location, .. }
            | PNode::Mothers { location, .. }
            | PNode::Parents { location, .. }
            | PNode::ForRecords { location, .. }
            | PNode::ForList { location, .. }
            | PNode::ForSequence { location, .. } => location,
        }
    }

    /// Short name of the node form, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            PNode::IntCons { .. } => "integer constant",
            PNode::FloatCons { .. } => "float constant",
            PNode::StrCons { .. } => "string constant",
            PNode::Ident { .. } => "identifier",
            PNode::Assign { .. } => "assignment",
            PNode::If { .. } => "if",
            PNode::While { .. } => "while",
            PNode::Break { .. } => "break",
            PNode::Continue { .. } => "continue",
            PNode::Return { .. } => "return",
            PNode::ProcDef(_) => "procedure definition",
            PNode::FuncDef(_) => "function definition",
            PNode::ProcCall { .. } => "procedure call",
            PNode::FuncCall { .. } => "function call",
            PNode::BuiltinCall { .. } => "builtin call",
            PNode::Traverse { .. } => "traverse",
            PNode::ForNodes { .. } => "fornodes",
            PNode::ForNotes { .. } => "fornotes",
            PNode::Children { .. } => "children",
            PNode::Spouses { .. } => "spouses",
            PNode::Families { .. } => "families",
            PNode::Fathers { .. } => "fathers",
            PNode::Mothers { .. } => "mothers",
            PNode::Parents { .. } => "parents",
            PNode::ForRecords { .. } => "record loop",
            PNode::ForList { .. } => "forlist",
            PNode::ForSequence { .. } => "forindiset",
        }
    }
}
