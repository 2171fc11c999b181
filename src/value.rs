use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use crate::node::NodeId;
use crate::sequence::Sequence;

/// A runtime value of the script interpreter. Lists, tables and sequences
/// are shared by reference: assigning one to a second identifier aliases it.
#[derive(Debug, Clone, Default)]
pub enum PValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Node(NodeId),
    List(Rc<RefCell<VecDeque<PValue>>>),
    Table(Rc<RefCell<HashMap<String, PValue>>>),
    Sequence(Rc<RefCell<Sequence>>),
}

impl PValue {
    pub fn new_list() -> Self {
        PValue::List(Rc::new(RefCell::new(VecDeque::new())))
    }
    pub fn new_table() -> Self {
        PValue::Table(Rc::new(RefCell::new(HashMap::new())))
    }
    pub fn new_sequence() -> Self {
        PValue::Sequence(Rc::new(RefCell::new(Sequence::new())))
    }
    pub fn from_sequence(sequence: Sequence) -> Self {
        PValue::Sequence(Rc::new(RefCell::new(sequence)))
    }

    /// Null, false, zero and the empty string are false; everything else is true.
    pub fn truthy(&self) -> bool {
        match self {
            PValue::Null => false,
            PValue::Bool(b) => *b,
            PValue::Int(i) => *i != 0,
            PValue::Float(f) => *f != 0.0,
            PValue::Str(s) => !s.is_empty(),
            PValue::Node(_) | PValue::List(_) | PValue::Table(_) | PValue::Sequence(_) => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PValue::Null => "null",
            PValue::Bool(_) => "boolean",
            PValue::Int(_) => "integer",
            PValue::Float(_) => "float",
            PValue::Str(_) => "string",
            PValue::Node(_) => "node",
            PValue::List(_) => "list",
            PValue::Table(_) => "table",
            PValue::Sequence(_) => "set",
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PValue::Int(i) => Some(*i),
            PValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PValue::Int(i) => Some(*i as f64),
            PValue::Float(f) => Some(*f),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PValue::Str(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            PValue::Node(id) => Some(*id),
            _ => None,
        }
    }
    pub fn is_null(&self) -> bool {
        matches!(self, PValue::Null)
    }
}

impl fmt::Display for PValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PValue::Null => Ok(()),
            PValue::Bool(b) => write!(f, "{}", i64::from(*b)),
            PValue::Int(i) => write!(f, "{}", i),
            PValue::Float(x) => write!(f, "{}", x),
            PValue::Str(s) => f.write_str(s),
            PValue::Node(id) => write!(f, "<node {}>", id),
            PValue::List(list) => write!(f, "<list of {}>", list.borrow().len()),
            PValue::Table(table) => write!(f, "<table of {}>", table.borrow().len()),
            PValue::Sequence(sequence) => write!(f, "<set of {}>", sequence.borrow().len()),
        }
    }
}

impl From<bool> for PValue {
    fn from(value: bool) -> Self {
        PValue::Bool(value)
    }
}
impl From<i64> for PValue {
    fn from(value: i64) -> Self {
        PValue::Int(value)
    }
}
impl From<String> for PValue {
    fn from(value: String) -> Self {
        PValue::Str(value)
    }
}
impl From<&str> for PValue {
    fn from(value: &str) -> Self {
        PValue::Str(value.to_string())
    }
}
impl From<Option<NodeId>> for PValue {
    fn from(value: Option<NodeId>) -> Self {
        value.map_or(PValue::Null, PValue::Node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!PValue::Null.truthy());
        assert!(!PValue::Int(0).truthy());
        assert!(!PValue::from("").truthy());
        assert!(PValue::from("x").truthy());
        assert!(PValue::new_list().truthy());
    }

    #[test]
    fn lists_alias_on_clone() {
        let a = PValue::new_list();
        let b = a.clone();
        if let PValue::List(list) = &b {
            list.borrow_mut().push_back(PValue::Int(1));
        }
        assert_eq!(a.to_string(), "<list of 1>");
    }
}
