//! Family navigation over stored records. Relationship lists come back in
//! canonical order: families in the order the person lists them, and within
//! a family husbands before wives before children.

use crate::database::Database;
use crate::node::NodeId;
use crate::record::Sex;

/// Records named by the `tag` lines of `root`, skipping dangling links.
pub fn linked(db: &Database, root: NodeId, tag: &str) -> Vec<NodeId> {
    db.nodes()
        .children(root)
        .filter(|&n| db.nodes().tag(n) == Some(tag))
        .filter_map(|n| db.resolve(n))
        .collect()
}

pub fn families_as_spouse(db: &Database, person: NodeId) -> Vec<NodeId> {
    linked(db, person, "FAMS")
}

pub fn families_as_child(db: &Database, person: NodeId) -> Vec<NodeId> {
    linked(db, person, "FAMC")
}

pub fn husbands(db: &Database, family: NodeId) -> Vec<NodeId> {
    linked(db, family, "HUSB")
}

pub fn wives(db: &Database, family: NodeId) -> Vec<NodeId> {
    linked(db, family, "WIFE")
}

pub fn children(db: &Database, family: NodeId) -> Vec<NodeId> {
    linked(db, family, "CHIL")
}

/// Husbands then wives.
pub fn spouses_in(db: &Database, family: NodeId) -> Vec<NodeId> {
    let mut spouses = husbands(db, family);
    spouses.extend(wives(db, family));
    spouses
}

pub fn sex(db: &Database, person: NodeId) -> Sex {
    let nodes = db.nodes();
    Sex::from_value(nodes.child_with_tag(person, "SEX").and_then(|s| nodes.value(s)))
}

/// First NAME value of a person.
pub fn name(db: &Database, person: NodeId) -> Option<&str> {
    let nodes = db.nodes();
    nodes.child_with_tag(person, "NAME").and_then(|n| nodes.value(n))
}

/// `(father, family)` for every husband of every family the person is a child in.
pub fn fathers(db: &Database, person: NodeId) -> Vec<(NodeId, NodeId)> {
    families_as_child(db, person)
        .into_iter()
        .flat_map(|family| husbands(db, family).into_iter().map(move |father| (father, family)))
        .collect()
}

/// `(mother, family)` for every wife of every family the person is a child in.
pub fn mothers(db: &Database, person: NodeId) -> Vec<(NodeId, NodeId)> {
    families_as_child(db, person)
        .into_iter()
        .flat_map(|family| wives(db, family).into_iter().map(move |mother| (mother, family)))
        .collect()
}

pub fn father(db: &Database, person: NodeId) -> Option<NodeId> {
    families_as_child(db, person)
        .into_iter()
        .find_map(|family| husbands(db, family).into_iter().next())
}

pub fn mother(db: &Database, person: NodeId) -> Option<NodeId> {
    families_as_child(db, person)
        .into_iter()
        .find_map(|family| wives(db, family).into_iter().next())
}

/// `(spouse, family)` for every other spouse of every family the person is a spouse in.
pub fn spouses(db: &Database, person: NodeId) -> Vec<(NodeId, NodeId)> {
    families_as_spouse(db, person)
        .into_iter()
        .flat_map(|family| {
            spouses_in(db, family)
                .into_iter()
                .filter(move |&spouse| spouse != person)
                .map(move |spouse| (spouse, family))
        })
        .collect()
}

/// `(family, spouse)` for each family the person is a spouse in; the spouse
/// is the first other spouse of that family, if there is one.
pub fn families(db: &Database, person: NodeId) -> Vec<(NodeId, Option<NodeId>)> {
    families_as_spouse(db, person)
        .into_iter()
        .map(|family| {
            let spouse = spouses_in(db, family).into_iter().find(|&s| s != person);
            (family, spouse)
        })
        .collect()
}

/// Other children of the families the person is a child in, in family order.
pub fn siblings(db: &Database, person: NodeId) -> Vec<NodeId> {
    let mut siblings = Vec::new();
    for family in families_as_child(db, person) {
        for child in children(db, family) {
            if child != person && !siblings.contains(&child) {
                siblings.push(child);
            }
        }
    }
    siblings
}

/// The part of a name between slashes, trimmed.
pub fn surname(name: &str) -> &str {
    let mut parts = name.splitn(3, '/');
    parts.next();
    parts.next().map(str::trim).unwrap_or_default()
}

/// A name with the surname section removed and spaces collapsed.
pub fn givens(name: &str) -> String {
    let mut outside = String::new();
    for (i, part) in name.splitn(3, '/').enumerate() {
        if i != 1 {
            outside.push(' ');
            outside.push_str(part);
        }
    }
    outside.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_parts() {
        assert_eq!(surname("John /Smith/ Jr"), "Smith");
        assert_eq!(givens("John /Smith/ Jr"), "John Jr");
        assert_eq!(surname("Mary"), "");
        assert_eq!(givens("  Mary  Ann "), "Mary Ann");
    }
}
