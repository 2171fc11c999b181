//! Person sequences ("indisets") for scripts: an ordered list of
//! `(person, value)` elements plus a bitmap of the persons it holds, so that
//! set algebra does not have to scan.

use std::cmp::Ordering;
use std::collections::VecDeque;

use roaring::RoaringTreemap;

use crate::database::Database;
use crate::lineage;
use crate::node::NodeId;
use crate::record::compare_keys;
use crate::value::PValue;

#[derive(Debug, Clone)]
pub struct Element {
    pub person: NodeId,
    pub key: String,
    pub value: PValue,
}

#[derive(Debug, Clone, Default)]
pub struct Sequence {
    elements: Vec<Element>,
    members: RoaringTreemap,
}

fn member(person: NodeId) -> u64 {
    u64::from(person.index())
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.elements.len()
    }
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }
    pub fn contains(&self, person: NodeId) -> bool {
        self.members.contains(member(person))
    }

    /// Appends an element; a person may appear more than once until
    /// [`Sequence::unique`] is applied.
    pub fn push(&mut self, person: NodeId, key: &str, value: PValue) {
        self.members.insert(member(person));
        self.elements.push(Element { person, key: key.to_string(), value });
    }

    fn push_element(&mut self, element: &Element) {
        self.push(element.person, &element.key, element.value.clone());
    }

    /// Keeps the first occurrence of every person.
    pub fn unique(&mut self) {
        let mut seen = RoaringTreemap::new();
        self.elements.retain(|e| seen.insert(member(e.person)));
    }

    /// Elements of `self`, then the elements of `other` whose person is not
    /// in `self`; each person once.
    pub fn union(&self, other: &Sequence) -> Sequence {
        let mut result = self.clone();
        result.unique();
        let extra = &other.members - &self.members;
        let mut taken = RoaringTreemap::new();
        for element in &other.elements {
            let m = member(element.person);
            if extra.contains(m) && taken.insert(m) {
                result.push_element(element);
            }
        }
        result
    }

    pub fn intersect(&self, other: &Sequence) -> Sequence {
        let common = &self.members & &other.members;
        self.filtered(|m| common.contains(m))
    }

    pub fn difference(&self, other: &Sequence) -> Sequence {
        let remaining = &self.members - &other.members;
        self.filtered(|m| remaining.contains(m))
    }

    fn filtered(&self, keep: impl Fn(u64) -> bool) -> Sequence {
        let mut result = Sequence::new();
        let mut taken = RoaringTreemap::new();
        for element in &self.elements {
            let m = member(element.person);
            if keep(m) && taken.insert(m) {
                result.push_element(element);
            }
        }
        result
    }

    pub fn sort_by_key(&mut self) {
        self.elements.sort_by(|a, b| compare_keys(&a.key, &b.key));
    }

    /// Surname, then given names, then key.
    pub fn sort_by_name(&mut self, db: &Database) {
        let name_of = |e: &Element| {
            let name = lineage::name(db, e.person).unwrap_or_default();
            (lineage::surname(name).to_lowercase(), lineage::givens(name).to_lowercase())
        };
        self.elements.sort_by(|a, b| name_of(a).cmp(&name_of(b)).then_with(|| compare_keys(&a.key, &b.key)));
    }

    /// Numbers before strings, numbers numerically, strings lexically.
    pub fn sort_by_value(&mut self) {
        self.elements.sort_by(|a, b| compare_values(&a.value, &b.value));
    }
}

fn compare_values(a: &PValue, b: &PValue) -> Ordering {
    match (a.as_float(), b.as_float()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.to_string().cmp(&b.to_string()),
    }
}

fn related(db: &Database, sequence: &Sequence, relatives: impl Fn(NodeId) -> Vec<NodeId>) -> Sequence {
    let mut result = Sequence::new();
    for element in sequence.elements() {
        for person in relatives(element.person) {
            if result.contains(person) {
                continue;
            }
            if let Some(key) = db.nodes().key(person) {
                result.push(person, key, PValue::Null);
            }
        }
    }
    result
}

pub fn parents(db: &Database, sequence: &Sequence) -> Sequence {
    related(db, sequence, |person| {
        let mut found: Vec<NodeId> = lineage::fathers(db, person).into_iter().map(|(p, _)| p).collect();
        found.extend(lineage::mothers(db, person).into_iter().map(|(p, _)| p));
        found
    })
}

pub fn children(db: &Database, sequence: &Sequence) -> Sequence {
    related(db, sequence, |person| {
        lineage::families_as_spouse(db, person)
            .into_iter()
            .flat_map(|family| lineage::children(db, family))
            .collect()
    })
}

pub fn spouses(db: &Database, sequence: &Sequence) -> Sequence {
    related(db, sequence, |person| lineage::spouses(db, person).into_iter().map(|(s, _)| s).collect())
}

pub fn siblings(db: &Database, sequence: &Sequence) -> Sequence {
    related(db, sequence, |person| lineage::siblings(db, person))
}

/// Every ancestor of the persons in `sequence`, nearest generations first.
pub fn ancestors(db: &Database, sequence: &Sequence) -> Sequence {
    closure(db, sequence, |person| {
        let mut found: Vec<NodeId> = lineage::fathers(db, person).into_iter().map(|(p, _)| p).collect();
        found.extend(lineage::mothers(db, person).into_iter().map(|(p, _)| p));
        found
    })
}

/// Every descendant of the persons in `sequence`, nearest generations first.
pub fn descendants(db: &Database, sequence: &Sequence) -> Sequence {
    closure(db, sequence, |person| {
        lineage::families_as_spouse(db, person)
            .into_iter()
            .flat_map(|family| lineage::children(db, family))
            .collect()
    })
}

fn closure(db: &Database, sequence: &Sequence, step: impl Fn(NodeId) -> Vec<NodeId>) -> Sequence {
    let mut result = Sequence::new();
    let mut queue: VecDeque<NodeId> = sequence.elements().iter().map(|e| e.person).collect();
    while let Some(person) = queue.pop_front() {
        for relative in step(person) {
            if result.contains(relative) {
                continue;
            }
            if let Some(key) = db.nodes().key(relative) {
                result.push(relative, key, PValue::Null);
                queue.push_back(relative);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeArena;

    fn persons(count: usize) -> (NodeArena, Vec<NodeId>) {
        let mut nodes = NodeArena::new();
        let ids = (1..=count).map(|n| nodes.create(Some(&format!("I{}", n)), "INDI", None)).collect();
        (nodes, ids)
    }

    #[test]
    fn set_algebra() {
        let (_nodes, ids) = persons(4);
        let mut a = Sequence::new();
        let mut b = Sequence::new();
        for (i, &id) in ids[..3].iter().enumerate() {
            a.push(id, &format!("I{}", i + 1), PValue::Int(i as i64));
        }
        for (i, &id) in ids[1..].iter().enumerate() {
            b.push(id, &format!("I{}", i + 2), PValue::Null);
        }
        let keys = |s: &Sequence| s.elements().iter().map(|e| e.key.clone()).collect::<Vec<_>>();
        assert_eq!(keys(&a.union(&b)), ["I1", "I2", "I3", "I4"]);
        assert_eq!(keys(&a.intersect(&b)), ["I2", "I3"]);
        assert_eq!(keys(&a.difference(&b)), ["I1"]);
    }

    #[test]
    fn unique_keeps_first() {
        let (_nodes, ids) = persons(2);
        let mut s = Sequence::new();
        s.push(ids[1], "I2", PValue::Int(1));
        s.push(ids[0], "I1", PValue::Int(2));
        s.push(ids[1], "I2", PValue::Int(3));
        s.unique();
        assert_eq!(s.len(), 2);
        assert_eq!(s.elements()[0].value.as_int(), Some(1));
        s.sort_by_key();
        assert_eq!(s.elements()[0].key, "I1");
    }
}
