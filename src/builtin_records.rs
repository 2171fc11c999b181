//! Builtins over records, nodes and person sequences, including the ones
//! that edit the database.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::builtin::{expected, sequence_arg, str_arg};
use crate::database::{Database, NodeEdit};
use crate::error::KindredError;
use crate::interp::{Interpreter, RunResult, RuntimeError};
use crate::lineage;
use crate::node::NodeId;
use crate::pnode::Location;
use crate::record::{compare_keys, key_to_xref, xref_to_key, RecordKind, Sex};
use crate::sequence::{self, Sequence};
use crate::value::PValue;

lazy_static! {
    static ref YEAR: Regex = Regex::new(r"\b(\d{3,4})\b").unwrap();
}

// ------------- Argument helpers -------------

/// A live node, or `None` for null.
fn node_arg(interp: &Interpreter<'_>, args: &[PValue], index: usize, location: &Location) -> RunResult<Option<NodeId>> {
    match args.get(index).unwrap_or(&PValue::Null) {
        PValue::Null => Ok(None),
        PValue::Node(id) if interp.database().nodes().contains(*id) => Ok(Some(*id)),
        PValue::Node(id) => Err(RuntimeError::at(location, format!("node {} no longer exists", id))),
        other => Err(expected("a node", other, location)),
    }
}

/// A stored record of `kind`, or `None` for null.
fn record_arg(
    interp: &Interpreter<'_>,
    args: &[PValue],
    index: usize,
    kind: RecordKind,
    location: &Location,
) -> RunResult<Option<NodeId>> {
    let Some(node) = node_arg(interp, args, index, location)? else {
        return Ok(None);
    };
    if interp.database().record_kind(node) != Some(kind) {
        return Err(RuntimeError::at(location, format!("expected a {} record", kind.name())));
    }
    Ok(Some(node))
}

fn person(interp: &Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<Option<NodeId>> {
    record_arg(interp, args, 0, RecordKind::Person, location)
}

fn family(interp: &Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<Option<NodeId>> {
    record_arg(interp, args, 0, RecordKind::Family, location)
}

fn key_of(interp: &Interpreter<'_>, record: NodeId) -> String {
    interp.database().nodes().key(record).unwrap_or_default().to_string()
}

fn edit(location: &Location, result: Result<(), KindredError>) -> RunResult<PValue> {
    result.map(|()| PValue::Null).map_err(|e| RuntimeError::at(location, e.to_string()))
}

fn text(value: Option<&str>) -> PValue {
    value.map_or(PValue::Null, PValue::from)
}

// ------------- Record lookup -------------

fn lookup_kind(interp: &Interpreter<'_>, args: &[PValue], kind: RecordKind, location: &Location) -> RunResult<PValue> {
    let key = str_arg(args, 0, location)?;
    let key = xref_to_key(key.trim()).unwrap_or(key.trim());
    Ok(interp.database().record_of_kind(key, kind).into())
}
pub fn indi(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    lookup_kind(interp, args, RecordKind::Person, location)
}
pub fn fam(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    lookup_kind(interp, args, RecordKind::Family, location)
}

/// Any record by key, cross reference or REFN value.
pub fn getrecord(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let name = str_arg(args, 0, location)?;
    let name = name.trim();
    let db = interp.database();
    let key = xref_to_key(name).unwrap_or(name);
    Ok(db.record(key).or_else(|| db.record_by_refn(name)).into())
}

pub fn firstindi(interp: &mut Interpreter<'_>, _: &[PValue], _: &Location) -> RunResult<PValue> {
    let db = interp.database();
    Ok(db.keys(RecordKind::Person).first().and_then(|key| db.record(key)).into())
}

/// The person after this one in key order.
pub fn nextindi(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let Some(current) = person(interp, args, location)? else {
        return Ok(PValue::Null);
    };
    let key = key_of(interp, current);
    let db = interp.database();
    let next = db
        .keys(RecordKind::Person)
        .into_iter()
        .find(|k| compare_keys(k, &key).is_gt())
        .and_then(|k| db.record(&k));
    Ok(next.into())
}

pub fn database(interp: &mut Interpreter<'_>, _: &[PValue], _: &Location) -> RunResult<PValue> {
    Ok(PValue::from(interp.database().name()))
}

// ------------- Nodes -------------

pub fn key(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let node = node_arg(interp, args, 0, location)?;
    Ok(text(node.and_then(|n| interp.database().nodes().key(n))))
}
pub fn xref(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let node = node_arg(interp, args, 0, location)?;
    Ok(node
        .and_then(|n| interp.database().nodes().key(n))
        .map_or(PValue::Null, |key| PValue::Str(key_to_xref(key))))
}
pub fn tag(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let node = node_arg(interp, args, 0, location)?;
    Ok(text(node.and_then(|n| interp.database().nodes().tag(n))))
}
pub fn value(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let node = node_arg(interp, args, 0, location)?;
    Ok(text(node.and_then(|n| interp.database().nodes().value(n))))
}
pub fn parent(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let node = node_arg(interp, args, 0, location)?;
    Ok(node.and_then(|n| interp.database().nodes().parent(n)).into())
}
pub fn child(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let node = node_arg(interp, args, 0, location)?;
    Ok(node.and_then(|n| interp.database().nodes().first_child(n)).into())
}
pub fn sibling(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let node = node_arg(interp, args, 0, location)?;
    Ok(node.and_then(|n| interp.database().nodes().next_sibling(n)).into())
}

/// A new node outside of any record.
pub fn createnode(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let tag = str_arg(args, 0, location)?;
    if tag.is_empty() || tag.contains(char::is_whitespace) {
        return Err(RuntimeError::at(location, format!("invalid tag \"{}\"", tag)));
    }
    let value = str_arg(args, 1, location)?;
    let value = (!value.is_empty()).then_some(value.as_str());
    Ok(PValue::Node(interp.database_mut().nodes_mut().create(None, &tag, value)))
}

/// Attaches a detached node under `parent`, after `previous` or first.
/// Inside a stored record the edit must pass validation.
pub fn addnode(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let (Some(node), Some(parent)) = (node_arg(interp, args, 0, location)?, node_arg(interp, args, 1, location)?) else {
        return Err(RuntimeError::at(location, "addnode needs a node and a parent"));
    };
    let after = node_arg(interp, args, 2, location)?;
    edit(location, interp.database_mut().edit_node(NodeEdit::Insert { parent, node, after }))
}

/// Removes a node and its subtree. Whole records go through `deleteperson`.
pub fn deletenode(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let Some(node) = node_arg(interp, args, 0, location)? else {
        return Ok(PValue::Null);
    };
    edit(location, interp.database_mut().edit_node(NodeEdit::Remove(node)))
}

// ------------- Persons and families -------------

/// The first name with slashes removed; surname in capitals if asked.
pub fn name(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let Some(person) = person(interp, args, location)? else {
        return Ok(PValue::Null);
    };
    let capitals = args.get(1).is_some_and(PValue::truthy);
    let Some(name) = lineage::name(interp.database(), person) else {
        return Ok(PValue::Null);
    };
    let joined = name
        .splitn(3, '/')
        .enumerate()
        .map(|(i, part)| if i == 1 && capitals { part.to_uppercase() } else { part.to_string() })
        .collect::<Vec<_>>()
        .join(" ");
    Ok(PValue::Str(joined.split_whitespace().collect::<Vec<_>>().join(" ")))
}
pub fn surname(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let person = person(interp, args, location)?;
    Ok(text(person.and_then(|p| lineage::name(interp.database(), p)).map(lineage::surname)))
}
pub fn givens(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let person = person(interp, args, location)?;
    Ok(person
        .and_then(|p| lineage::name(interp.database(), p))
        .map_or(PValue::Null, |name| PValue::Str(lineage::givens(name))))
}

pub fn sex(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let person = person(interp, args, location)?;
    Ok(person.map_or(PValue::Null, |p| {
        PValue::from(match lineage::sex(interp.database(), p) {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Unknown => "U",
        })
    }))
}
pub fn male(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let person = person(interp, args, location)?;
    Ok(PValue::Bool(person.is_some_and(|p| lineage::sex(interp.database(), p) == Sex::Male)))
}
pub fn female(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let person = person(interp, args, location)?;
    Ok(PValue::Bool(person.is_some_and(|p| lineage::sex(interp.database(), p) == Sex::Female)))
}

pub fn father(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let person = person(interp, args, location)?;
    Ok(person.and_then(|p| lineage::father(interp.database(), p)).into())
}
pub fn mother(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let person = person(interp, args, location)?;
    Ok(person.and_then(|p| lineage::mother(interp.database(), p)).into())
}
/// First family the person is a child in.
pub fn parents(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let person = person(interp, args, location)?;
    Ok(person
        .and_then(|p| lineage::families_as_child(interp.database(), p).into_iter().next())
        .into())
}
pub fn nspouses(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let person = person(interp, args, location)?;
    Ok(PValue::Int(person.map_or(0, |p| lineage::spouses(interp.database(), p).len()) as i64))
}
pub fn nfamilies(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let person = person(interp, args, location)?;
    Ok(PValue::Int(person.map_or(0, |p| lineage::families_as_spouse(interp.database(), p).len()) as i64))
}

pub fn husband(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let family = family(interp, args, location)?;
    Ok(family.and_then(|f| lineage::husbands(interp.database(), f).into_iter().next()).into())
}
pub fn wife(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let family = family(interp, args, location)?;
    Ok(family.and_then(|f| lineage::wives(interp.database(), f).into_iter().next()).into())
}
pub fn firstchild(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let family = family(interp, args, location)?;
    Ok(family.and_then(|f| lineage::children(interp.database(), f).first().copied()).into())
}
pub fn lastchild(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let family = family(interp, args, location)?;
    Ok(family.and_then(|f| lineage::children(interp.database(), f).last().copied()).into())
}
pub fn nchildren(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let family = family(interp, args, location)?;
    Ok(PValue::Int(family.map_or(0, |f| lineage::children(interp.database(), f).len()) as i64))
}

// ------------- Events and dates -------------

fn event(interp: &Interpreter<'_>, record: Option<NodeId>, tags: &[&str]) -> PValue {
    let nodes = interp.database().nodes();
    record
        .and_then(|r| tags.iter().find_map(|tag| nodes.child_with_tag(r, tag)))
        .into()
}
pub fn birth(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let person = person(interp, args, location)?;
    Ok(event(interp, person, &["BIRT"]))
}
pub fn death(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let person = person(interp, args, location)?;
    Ok(event(interp, person, &["DEAT"]))
}
pub fn baptism(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let person = person(interp, args, location)?;
    Ok(event(interp, person, &["BAPM", "CHR"]))
}
pub fn burial(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let person = person(interp, args, location)?;
    Ok(event(interp, person, &["BURI"]))
}
pub fn marriage(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let family = family(interp, args, location)?;
    Ok(event(interp, family, &["MARR"]))
}

fn detail<'a>(interp: &'a Interpreter<'_>, args: &[PValue], tag: &str, location: &Location) -> RunResult<Option<&'a str>> {
    let event = node_arg(interp, args, 0, location)?;
    let nodes = interp.database().nodes();
    Ok(event.and_then(|e| nodes.child_with_tag(e, tag)).and_then(|n| nodes.value(n)))
}
pub fn date(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    Ok(text(detail(interp, args, "DATE", location)?))
}
pub fn place(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    Ok(text(detail(interp, args, "PLAC", location)?))
}

/// Date text of an event node, or the argument itself if it is a string.
fn date_text(interp: &Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<Option<String>> {
    match args.first() {
        Some(PValue::Str(s)) => Ok(Some(s.clone())),
        _ => Ok(detail(interp, args, "DATE", location)?.map(str::to_string)),
    }
}
pub fn year(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let date = date_text(interp, args, location)?;
    Ok(text(date.as_deref().and_then(|d| YEAR.captures(d)).and_then(|c| c.get(1)).map(|m| m.as_str())))
}

/// `D MON YYYY` dates as `YYYY-MM-DD`; other dates fall back to their year.
pub fn stddate(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let Some(date) = date_text(interp, args, location)? else {
        return Ok(PValue::Null);
    };
    if let Ok(parsed) = NaiveDate::parse_from_str(date.trim(), "%d %b %Y") {
        return Ok(PValue::Str(parsed.format("%Y-%m-%d").to_string()));
    }
    Ok(text(YEAR.captures(&date).and_then(|c| c.get(1)).map(|m| m.as_str())))
}

// ------------- Sequences -------------

pub fn addtoset(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let sequence = sequence_arg(args, 0, location)?;
    let Some(person) = record_arg(interp, args, 1, RecordKind::Person, location)? else {
        return Ok(PValue::Null);
    };
    let key = key_of(interp, person);
    sequence.borrow_mut().push(person, &key, args.get(2).cloned().unwrap_or_default());
    Ok(PValue::Null)
}
pub fn lengthset(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    Ok(PValue::Int(sequence_arg(args, 0, location)?.borrow().len() as i64))
}
pub fn union(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let (a, b) = (sequence_arg(args, 0, location)?, sequence_arg(args, 1, location)?);
    let result = a.borrow().union(&b.borrow());
    Ok(PValue::from_sequence(result))
}
pub fn intersect(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let (a, b) = (sequence_arg(args, 0, location)?, sequence_arg(args, 1, location)?);
    let result = a.borrow().intersect(&b.borrow());
    Ok(PValue::from_sequence(result))
}
pub fn difference(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let (a, b) = (sequence_arg(args, 0, location)?, sequence_arg(args, 1, location)?);
    let result = a.borrow().difference(&b.borrow());
    Ok(PValue::from_sequence(result))
}
pub fn uniqueset(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    sequence_arg(args, 0, location)?.borrow_mut().unique();
    Ok(PValue::Null)
}
pub fn keysort(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    sequence_arg(args, 0, location)?.borrow_mut().sort_by_key();
    Ok(PValue::Null)
}
pub fn namesort(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    sequence_arg(args, 0, location)?.borrow_mut().sort_by_name(interp.database());
    Ok(PValue::Null)
}
pub fn valuesort(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    sequence_arg(args, 0, location)?.borrow_mut().sort_by_value();
    Ok(PValue::Null)
}

fn relatives(
    interp: &Interpreter<'_>,
    args: &[PValue],
    location: &Location,
    relation: fn(&Database, &Sequence) -> Sequence,
) -> RunResult<PValue> {
    let source = sequence_arg(args, 0, location)?;
    let result = relation(interp.database(), &source.borrow());
    Ok(PValue::from_sequence(result))
}
pub fn parentset(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    relatives(interp, args, location, sequence::parents)
}
pub fn childset(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    relatives(interp, args, location, sequence::children)
}
pub fn spouseset(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    relatives(interp, args, location, sequence::spouses)
}
pub fn siblingset(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    relatives(interp, args, location, sequence::siblings)
}
pub fn ancestorset(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    relatives(interp, args, location, sequence::ancestors)
}
pub fn descendantset(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    relatives(interp, args, location, sequence::descendants)
}

// ------------- Database edits -------------

fn family_and_person(interp: &Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<(String, String)> {
    let family = record_arg(interp, args, 0, RecordKind::Family, location)?;
    let person = record_arg(interp, args, 1, RecordKind::Person, location)?;
    match (family, person) {
        (Some(f), Some(p)) => Ok((key_of(interp, f), key_of(interp, p))),
        _ => Err(RuntimeError::at(location, "expected a family and a person")),
    }
}
pub fn addchild(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let (family, person) = family_and_person(interp, args, location)?;
    edit(location, interp.database_mut().add_child(&family, &person))
}
pub fn addspouse(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let (family, person) = family_and_person(interp, args, location)?;
    edit(location, interp.database_mut().add_spouse(&family, &person))
}
pub fn removechild(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let (family, person) = family_and_person(interp, args, location)?;
    edit(location, interp.database_mut().remove_child(&family, &person))
}
pub fn removespouse(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let (family, person) = family_and_person(interp, args, location)?;
    edit(location, interp.database_mut().remove_spouse(&family, &person))
}
pub fn deleteperson(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let Some(person) = person(interp, args, location)? else {
        return Ok(PValue::Null);
    };
    let key = key_of(interp, person);
    edit(location, interp.database_mut().remove_record(&key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_pattern() {
        let found = YEAR.captures("ABT 12 MAR 1901").and_then(|c| c.get(1)).map(|m| m.as_str());
        assert_eq!(found, Some("1901"));
        assert!(YEAR.captures("12 MAR").is_none());
    }
}
