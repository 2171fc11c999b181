//! Record validation.
//!
//! [`validate`] vets an edited record before it is committed: the root must
//! carry its kind's tag and stand alone, names must be well formed, and the
//! lineage links (FAMC/FAMS on persons, HUSB/WIFE/CHIL on families) must be
//! set-equal to the original's. Links only change through the dedicated
//! add/remove operations of [`crate::database::Database`].
//!
//! [`check_links`] is the whole-database counterpart used while loading:
//! every lineage link must be mirrored by a link back.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::database::Database;
use crate::node::{NodeArena, NodeId};
use crate::record::{is_xref, key_to_xref, RecordKind, Sex};
use crate::refn::RefnIndex;
use crate::splitjoin::{
    join_family, join_person, join_record, split_family, split_person, split_record, FamilyParts, PersonParts,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record root has tag {found}, expected {expected}")]
    WrongTag { expected: String, found: String },
    #[error("record root may not have siblings")]
    RootHasSibling,
    #[error("record key {found} does not match the original key {expected}")]
    KeyMismatch { expected: String, found: String },
    #[error("candidate and original are the same tree")]
    SameTree,
    #[error("person has no NAME line")]
    MissingName,
    #[error("bad NAME value {0:?}")]
    BadName(String),
    #[error("{tag} links may not be changed by an edit")]
    LinksChanged { tag: &'static str },
    #[error("cannot change the sex of a person who is a spouse")]
    SexConflict,
    #[error("cannot add a spouse of unknown sex")]
    UnknownSex,
    #[error("REFN line has no value")]
    EmptyRefn,
    #[error("REFN value {refn} is already used by {key}")]
    RefnTaken { refn: String, key: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Reject persons without any NAME line.
    pub require_names: bool,
}

/// Validates `candidate` as a record of `kind`, comparing against `original`
/// when the edit replaces an existing record. Both trees are split for the
/// checks and always joined again, pass or fail.
pub fn validate(
    nodes: &mut NodeArena,
    refns: &RefnIndex,
    options: &ValidationOptions,
    kind: RecordKind,
    candidate: NodeId,
    original: Option<NodeId>,
) -> Result<(), ValidationError> {
    check_root(nodes, kind, candidate, original)?;
    let key = original
        .and_then(|o| nodes.key(o))
        .or_else(|| nodes.key(candidate))
        .map(str::to_string);
    match kind {
        RecordKind::Person => {
            let new = split_person(nodes, candidate);
            let old = original.map(|o| split_person(nodes, o));
            let outcome = check_person(nodes, refns, options, key.as_deref(), &new, old.as_ref());
            join_person(nodes, candidate, new);
            if let (Some(o), Some(parts)) = (original, old) {
                join_person(nodes, o, parts);
            }
            outcome
        }
        RecordKind::Family => {
            let new = split_family(nodes, candidate);
            let old = original.map(|o| split_family(nodes, o));
            let outcome = check_family(nodes, refns, key.as_deref(), &new, old.as_ref());
            join_family(nodes, candidate, new);
            if let (Some(o), Some(parts)) = (original, old) {
                join_family(nodes, o, parts);
            }
            outcome
        }
        RecordKind::Source | RecordKind::Event | RecordKind::Other => {
            let new = split_record(nodes, candidate);
            let outcome = check_refns(nodes, refns, key.as_deref(), &new.refns);
            join_record(nodes, candidate, new);
            outcome
        }
    }
}

fn check_root(nodes: &NodeArena, kind: RecordKind, candidate: NodeId, original: Option<NodeId>) -> Result<(), ValidationError> {
    let found = nodes.tag(candidate).unwrap_or_default();
    match kind.tag() {
        Some(expected) if expected != found => {
            return Err(ValidationError::WrongTag { expected: expected.to_string(), found: found.to_string() });
        }
        None if RecordKind::from_tag(found) != RecordKind::Other => {
            return Err(ValidationError::WrongTag { expected: "a non-lineage tag".to_string(), found: found.to_string() });
        }
        _ => {}
    }
    if nodes.next_sibling(candidate).is_some() {
        return Err(ValidationError::RootHasSibling);
    }
    if let Some(original) = original {
        if original == candidate {
            return Err(ValidationError::SameTree);
        }
        let expected = nodes.tag(original).unwrap_or_default();
        if expected != found {
            return Err(ValidationError::WrongTag { expected: expected.to_string(), found: found.to_string() });
        }
        if let (Some(expected), Some(found)) = (nodes.key(original), nodes.key(candidate)) {
            if expected != found {
                return Err(ValidationError::KeyMismatch { expected: expected.to_string(), found: found.to_string() });
            }
        }
    }
    Ok(())
}

/// A name is well formed when present, not a cross-reference, and holds at most one `/surname/` pair.
pub fn valid_name(name: Option<&str>) -> bool {
    match name.map(str::trim) {
        None | Some("") => false,
        Some(name) => !is_xref(name) && name.matches('/').count() <= 2,
    }
}

fn values(nodes: &NodeArena, group: &[NodeId]) -> BTreeSet<String> {
    group
        .iter()
        .filter_map(|&n| nodes.value(n))
        .map(|v| v.trim().to_string())
        .collect()
}

fn same_links(nodes: &NodeArena, new: &[NodeId], old: Option<&[NodeId]>, tag: &'static str) -> Result<(), ValidationError> {
    let old = old.map(|group| values(nodes, group)).unwrap_or_default();
    if values(nodes, new) == old {
        Ok(())
    } else {
        Err(ValidationError::LinksChanged { tag })
    }
}

fn check_person(
    nodes: &NodeArena,
    refns: &RefnIndex,
    options: &ValidationOptions,
    key: Option<&str>,
    new: &PersonParts,
    old: Option<&PersonParts>,
) -> Result<(), ValidationError> {
    if options.require_names && new.names.is_empty() {
        return Err(ValidationError::MissingName);
    }
    for &name in &new.names {
        let value = nodes.value(name);
        if !valid_name(value) {
            return Err(ValidationError::BadName(value.unwrap_or_default().to_string()));
        }
    }
    same_links(nodes, &new.famcs, old.map(|o| o.famcs.as_slice()), "FAMC")?;
    same_links(nodes, &new.famss, old.map(|o| o.famss.as_slice()), "FAMS")?;
    if let Some(old) = old {
        if !old.famss.is_empty() {
            let was = Sex::from_value(old.sex.and_then(|s| nodes.value(s)));
            let now = Sex::from_value(new.sex.and_then(|s| nodes.value(s)));
            if was != Sex::Unknown && was != now {
                return Err(ValidationError::SexConflict);
            }
        }
    }
    check_refns(nodes, refns, key, &new.refns)
}

fn check_family(
    nodes: &NodeArena,
    refns: &RefnIndex,
    key: Option<&str>,
    new: &FamilyParts,
    old: Option<&FamilyParts>,
) -> Result<(), ValidationError> {
    same_links(nodes, &new.husbands, old.map(|o| o.husbands.as_slice()), "HUSB")?;
    same_links(nodes, &new.wives, old.map(|o| o.wives.as_slice()), "WIFE")?;
    same_links(nodes, &new.children, old.map(|o| o.children.as_slice()), "CHIL")?;
    check_refns(nodes, refns, key, &new.refns)
}

fn check_refns(nodes: &NodeArena, refns: &RefnIndex, key: Option<&str>, group: &[NodeId]) -> Result<(), ValidationError> {
    for &refn in group {
        let value = nodes.value(refn).map(str::trim).unwrap_or_default();
        if value.is_empty() {
            return Err(ValidationError::EmptyRefn);
        }
        if let Some(owner) = refns.lookup(value) {
            if Some(owner) != key {
                return Err(ValidationError::RefnTaken { refn: value.to_string(), key: owner.to_string() });
            }
        }
    }
    Ok(())
}

/// Lineage consistency of one stored record against the rest of the
/// database. Returns one message per broken link; dangling references are
/// left to the caller.
pub fn check_links(db: &Database, root: NodeId, kind: RecordKind) -> Vec<String> {
    let nodes = db.nodes();
    let Some(key) = nodes.key(root) else {
        return vec!["record has no key".to_string()];
    };
    let xref = key_to_xref(key);
    let mut problems = Vec::new();
    let listed = |target: NodeId, tag: &str| -> usize {
        nodes
            .children_with_tag(target, tag)
            .into_iter()
            .filter(|&n| nodes.value(n).map(str::trim) == Some(xref.as_str()))
            .count()
    };
    match kind {
        RecordKind::Person => {
            let sex = Sex::from_value(nodes.child_with_tag(root, "SEX").and_then(|s| nodes.value(s)));
            for link in nodes.children_with_tag(root, "FAMC") {
                let Some(family) = db.resolve(link) else { continue };
                let family_key = nodes.key(family).unwrap_or_default();
                if nodes.tag(family) != Some("FAM") {
                    problems.push(format!("FAMC of {} refers to {}, which is not a family", key, family_key));
                    continue;
                }
                match listed(family, "CHIL") {
                    1 => {}
                    0 => problems.push(format!("family {} does not list {} as a child", family_key, key)),
                    n => problems.push(format!("family {} lists {} as a child {} times", family_key, key, n)),
                }
            }
            for link in nodes.children_with_tag(root, "FAMS") {
                let Some(family) = db.resolve(link) else { continue };
                let family_key = nodes.key(family).unwrap_or_default();
                if nodes.tag(family) != Some("FAM") {
                    problems.push(format!("FAMS of {} refers to {}, which is not a family", key, family_key));
                    continue;
                }
                let as_husband = listed(family, "HUSB");
                let as_wife = listed(family, "WIFE");
                if as_husband + as_wife == 0 {
                    problems.push(format!("family {} does not list {} as a spouse", family_key, key));
                } else if (as_husband > 0 && sex == Sex::Female) || (as_wife > 0 && sex == Sex::Male) {
                    problems.push(format!("{} has the wrong sex for their role in family {}", key, family_key));
                }
            }
        }
        RecordKind::Family => {
            for (tag, back) in [("HUSB", "FAMS"), ("WIFE", "FAMS"), ("CHIL", "FAMC")] {
                for link in nodes.children_with_tag(root, tag) {
                    let Some(person) = db.resolve(link) else { continue };
                    let person_key = nodes.key(person).unwrap_or_default();
                    if nodes.tag(person) != Some("INDI") {
                        problems.push(format!("{} of {} refers to {}, which is not a person", tag, key, person_key));
                        continue;
                    }
                    if listed(person, back) == 0 {
                        problems.push(format!("{} {} of family {} has no {} link back", tag, person_key, key, back));
                    }
                }
            }
        }
        RecordKind::Source | RecordKind::Event | RecordKind::Other => {}
    }
    problems
}
