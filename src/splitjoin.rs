//! Splitting a record's direct children into groups by role and joining them
//! back in canonical order.
//!
//! A split leaves the root childless and every grouped node detached; the
//! matching join reattaches the groups. Mutations split a record, edit the
//! groups as plain vectors and join again, so the tree is only ever observed
//! in joined form. Canonical orders:
//!
//! * person: NAME, REFN, SEX, other lines, FAMC, FAMS
//! * family: REFN, HUSB, WIFE, CHIL, other lines
//! * source, event and other records: REFN, other lines

use crate::node::{NodeArena, NodeId};
use crate::record::RecordKind;

#[must_use = "split parts must be joined back into their record"]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PersonParts {
    pub names: Vec<NodeId>,
    pub refns: Vec<NodeId>,
    pub sex: Option<NodeId>,
    pub body: Vec<NodeId>,
    pub famcs: Vec<NodeId>,
    pub famss: Vec<NodeId>,
}

#[must_use = "split parts must be joined back into their record"]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FamilyParts {
    pub refns: Vec<NodeId>,
    pub husbands: Vec<NodeId>,
    pub wives: Vec<NodeId>,
    pub children: Vec<NodeId>,
    pub body: Vec<NodeId>,
}

#[must_use = "split parts must be joined back into their record"]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordParts {
    pub refns: Vec<NodeId>,
    pub body: Vec<NodeId>,
}

pub fn split_person(nodes: &mut NodeArena, root: NodeId) -> PersonParts {
    debug_assert_eq!(nodes.tag(root), Some("INDI"));
    let mut parts = PersonParts::default();
    for child in nodes.take_children(root) {
        match nodes.tag(child).unwrap_or_default() {
            "NAME" => parts.names.push(child),
            "REFN" => parts.refns.push(child),
            "SEX" if parts.sex.is_none() => parts.sex = Some(child),
            "FAMC" => parts.famcs.push(child),
            "FAMS" => parts.famss.push(child),
            _ => parts.body.push(child),
        }
    }
    parts
}

pub fn join_person(nodes: &mut NodeArena, root: NodeId, parts: PersonParts) {
    let PersonParts { names, refns, sex, body, famcs, famss } = parts;
    let joined: Vec<NodeId> = names
        .into_iter()
        .chain(refns)
        .chain(sex)
        .chain(body)
        .chain(famcs)
        .chain(famss)
        .collect();
    nodes.set_children(root, &joined);
}

pub fn split_family(nodes: &mut NodeArena, root: NodeId) -> FamilyParts {
    debug_assert_eq!(nodes.tag(root), Some("FAM"));
    let mut parts = FamilyParts::default();
    for child in nodes.take_children(root) {
        match nodes.tag(child).unwrap_or_default() {
            "REFN" => parts.refns.push(child),
            "HUSB" => parts.husbands.push(child),
            "WIFE" => parts.wives.push(child),
            "CHIL" => parts.children.push(child),
            _ => parts.body.push(child),
        }
    }
    parts
}

pub fn join_family(nodes: &mut NodeArena, root: NodeId, parts: FamilyParts) {
    let FamilyParts { refns, husbands, wives, children, body } = parts;
    let joined: Vec<NodeId> = refns
        .into_iter()
        .chain(husbands)
        .chain(wives)
        .chain(children)
        .chain(body)
        .collect();
    nodes.set_children(root, &joined);
}

/// Split for sources, events and other records.
pub fn split_record(nodes: &mut NodeArena, root: NodeId) -> RecordParts {
    let mut parts = RecordParts::default();
    for child in nodes.take_children(root) {
        if nodes.tag(child) == Some("REFN") {
            parts.refns.push(child);
        } else {
            parts.body.push(child);
        }
    }
    parts
}

pub fn join_record(nodes: &mut NodeArena, root: NodeId, parts: RecordParts) {
    let RecordParts { refns, body } = parts;
    let joined: Vec<NodeId> = refns.into_iter().chain(body).collect();
    nodes.set_children(root, &joined);
}

/// Puts a record's children in canonical order for its kind.
pub fn normalize(nodes: &mut NodeArena, root: NodeId, kind: RecordKind) {
    match kind {
        RecordKind::Person => {
            let parts = split_person(nodes, root);
            join_person(nodes, root, parts);
        }
        RecordKind::Family => {
            let parts = split_family(nodes, root);
            join_family(nodes, root, parts);
        }
        RecordKind::Source | RecordKind::Event | RecordKind::Other => {
            let parts = split_record(nodes, root);
            join_record(nodes, root, parts);
        }
    }
}
