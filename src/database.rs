//! The record store: node arena, record index, key allocator and refn index
//! owned together, plus every operation that changes them.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::errlog::{DiagnosticKind, ErrorLog};
use crate::error::{KindredError, Result};
use crate::gedcom::{read_records, write_record, RootRecord};
use crate::index::RecordIndex;
use crate::keys::KeyAllocator;
use crate::node::{NodeArena, NodeId};
use crate::persist::{PersistenceMode, Persistor};
use crate::record::{key_to_xref, xref_to_key, RecordKind, Sex};
use crate::refn::{RefnError, RefnIndex};
use crate::splitjoin::{join_family, join_person, normalize, split_family, split_person};
use crate::validate::{check_links, validate, ValidationError, ValidationOptions};

pub struct Database {
    name: String,
    nodes: NodeArena,
    index: RecordIndex,
    keys: KeyAllocator,
    refns: RefnIndex,
    options: ValidationOptions,
    persistor: Option<Persistor>,
}

impl Database {
    /// An empty in-memory store.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nodes: NodeArena::new(),
            index: RecordIndex::new(),
            keys: KeyAllocator::new(),
            refns: RefnIndex::new(),
            options: ValidationOptions::default(),
            persistor: None,
        }
    }
    pub fn with_options(mut self, options: ValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Builds a store from already-read record trees. Every structural
    /// problem is reported to `log`; if there was any, no store is returned.
    pub fn from_records(
        name: &str,
        nodes: NodeArena,
        roots: Vec<RootRecord>,
        options: ValidationOptions,
        log: &mut ErrorLog,
    ) -> Option<Self> {
        let before = log.count(DiagnosticKind::Structural);
        let mut db = Database { nodes, options, ..Database::new(name) };
        let mut lines: HashMap<String, usize> = HashMap::new();
        let report = |log: &mut ErrorLog, line: Option<usize>, message: String| {
            log.report(DiagnosticKind::Structural, Some(name), line, message);
        };

        for record in &roots {
            let root = record.root;
            let tag = db.nodes.tag(root).unwrap_or_default().to_string();
            if tag == "HEAD" || tag == "TRLR" {
                db.nodes.remove(root);
                continue;
            }
            let Some(key) = db.nodes.key(root).map(str::to_string) else {
                report(log, Some(record.line), format!("{} record is missing a key", tag));
                db.nodes.remove(root);
                continue;
            };
            if !db.index.insert(&key, RecordKind::from_tag(&tag), root) {
                report(log, Some(record.line), format!("duplicate key {}", key));
                db.nodes.remove(root);
                continue;
            }
            lines.insert(key, record.line);
        }

        let keys = db.index.all_keys();
        for key in &keys {
            let Some(root) = db.index.get(key) else { continue };
            for (node, _) in db.nodes.traverse(root) {
                let Some(target) = db.nodes.value(node).and_then(|v| xref_to_key(v.trim())) else {
                    continue;
                };
                if !db.index.contains(target) {
                    let line = db.nodes.line(node).or_else(|| lines.get(key).copied());
                    report(log, line, format!("{} refers to missing record {}", key, target));
                }
            }
        }

        for key in &keys {
            if let (Some(root), Some(kind)) = (db.index.get(key), db.index.kind_of(key)) {
                normalize(&mut db.nodes, root, kind);
            }
        }
        for key in &keys {
            if let (Some(root), Some(kind)) = (db.index.get(key), db.index.kind_of(key)) {
                for problem in check_links(&db, root, kind) {
                    report(log, lines.get(key).copied(), problem);
                }
            }
        }

        for key in &keys {
            let Some(root) = db.index.get(key) else { continue };
            for refn in db.nodes.children_with_tag(root, "REFN") {
                let value = db.nodes.value(refn).unwrap_or_default().to_string();
                match db.refns.insert(&value, key) {
                    Ok(()) => {}
                    Err(RefnError::Empty) => report(log, lines.get(key).copied(), format!("{} has a REFN line without a value", key)),
                    Err(RefnError::Taken { refn, key: owner }) => report(
                        log,
                        lines.get(key).copied(),
                        format!("REFN value {} of {} is already defined by {}", refn, key, owner),
                    ),
                }
            }
            if let Err(error) = db.keys.retain(key) {
                report(log, lines.get(key).copied(), error.to_string());
            }
        }

        let errors = log.count(DiagnosticKind::Structural) - before;
        if errors > 0 {
            warn!(name, errors, "database construction failed");
            return None;
        }
        info!(
            name,
            persons = db.count(RecordKind::Person),
            families = db.count(RecordKind::Family),
            sources = db.count(RecordKind::Source),
            events = db.count(RecordKind::Event),
            others = db.count(RecordKind::Other),
            "database constructed"
        );
        Some(db)
    }

    /// Reads record text and builds a store from it.
    pub fn from_text(name: &str, text: &str, options: ValidationOptions, log: &mut ErrorLog) -> Option<Self> {
        let before = log.count(DiagnosticKind::Structural);
        let (nodes, roots) = read_records(text, name, log);
        let db = Self::from_records(name, nodes, roots, options, log)?;
        if log.count(DiagnosticKind::Structural) > before { None } else { Some(db) }
    }

    /// Opens a persisted store, rebuilding it from the stored record text.
    /// Later edits are written through to the same storage.
    pub fn open(mode: &PersistenceMode, options: ValidationOptions, log: &mut ErrorLog) -> Result<Self> {
        let persistor = Persistor::new(mode)?;
        let name = match mode {
            PersistenceMode::InMemory => "memory",
            PersistenceMode::File(path) => path.as_str(),
        };
        let mut text = String::new();
        for (_, body) in persistor.records()? {
            text.push_str(&body);
        }
        let mut db = Self::from_text(name, &text, options, log).ok_or_else(|| KindredError::DataCorruption {
            message: format!("stored records of {} do not form a valid database", name),
        })?;
        db.persistor = Some(persistor);
        Ok(db)
    }

    /// Writes every record to `persistor` and keeps it for write-through.
    pub fn attach(&mut self, persistor: Persistor) -> Result<()> {
        for key in self.index.all_keys() {
            if let (Some(root), Some(kind)) = (self.index.get(&key), self.index.kind_of(&key)) {
                persistor.store(&key, kind, &write_record(&self.nodes, root))?;
            }
        }
        self.persistor = Some(persistor);
        Ok(())
    }
    pub fn is_persistent(&self) -> bool {
        self.persistor.is_some()
    }
    fn sync(&self, key: &str) -> Result<()> {
        let Some(persistor) = &self.persistor else {
            return Ok(());
        };
        match (self.index.get(key), self.index.kind_of(key)) {
            (Some(root), Some(kind)) => persistor.store(key, kind, &write_record(&self.nodes, root)),
            _ => persistor.forget(key),
        }
    }

    // ------------- Access -------------
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn nodes(&self) -> &NodeArena {
        &self.nodes
    }
    pub fn nodes_mut(&mut self) -> &mut NodeArena {
        &mut self.nodes
    }
    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }
    pub fn key_allocator(&self) -> &KeyAllocator {
        &self.keys
    }
    pub fn refn_index(&self) -> &RefnIndex {
        &self.refns
    }
    pub fn record(&self, key: &str) -> Option<NodeId> {
        self.index.get(key)
    }
    pub fn record_of_kind(&self, key: &str, kind: RecordKind) -> Option<NodeId> {
        self.index.get_of_kind(key, kind)
    }
    pub fn kind_of(&self, key: &str) -> Option<RecordKind> {
        self.index.kind_of(key)
    }
    /// Keys of one kind in database key order.
    pub fn keys(&self, kind: RecordKind) -> Vec<String> {
        self.index.keys(kind)
    }
    pub fn count(&self, kind: RecordKind) -> usize {
        self.index.count(kind)
    }
    pub fn len(&self) -> usize {
        self.index.len()
    }
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
    pub fn record_by_refn(&self, refn: &str) -> Option<NodeId> {
        self.refns.lookup(refn).and_then(|key| self.index.get(key))
    }
    /// The record a `@KEY@` value names.
    pub fn resolve_xref(&self, value: &str) -> Option<NodeId> {
        xref_to_key(value.trim()).and_then(|key| self.index.get(key))
    }
    /// The record named by the value of `node`.
    pub fn resolve(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.value(node).and_then(|v| self.resolve_xref(v))
    }
    /// Kind of the stored record rooted at `root`.
    pub fn record_kind(&self, root: NodeId) -> Option<RecordKind> {
        let key = self.nodes.key(root)?;
        (self.index.get(key) == Some(root)).then(|| self.index.kind_of(key)).flatten()
    }

    // ------------- Edits -------------

    /// Validates a candidate record against its original, if any.
    pub fn validate(&mut self, kind: RecordKind, candidate: NodeId, original: Option<NodeId>) -> std::result::Result<(), ValidationError> {
        validate(&mut self.nodes, &self.refns, &self.options, kind, candidate, original)
    }

    fn detached(&self, root: NodeId) -> Result<&str> {
        let tag = self
            .nodes
            .tag(root)
            .ok_or_else(|| KindredError::Record(format!("node {} does not exist", root)))?;
        if self.nodes.parent(root).is_some() {
            return Err(KindredError::Record(format!("node {} is attached to another record", root)));
        }
        Ok(tag)
    }

    /// Stores a new record under a freshly allocated key.
    pub fn add_record(&mut self, root: NodeId) -> Result<String> {
        let kind = RecordKind::from_tag(self.detached(root)?);
        self.nodes.set_key(root, None);
        self.validate(kind, root, None)?;
        let key = self.keys.allocate(kind);
        self.nodes.set_key(root, Some(&key));
        if !self.index.insert(&key, kind, root) {
            return Err(KindredError::Invariant(format!("allocated key {} is already in use", key)));
        }
        self.index_refns(&key, root)?;
        self.sync(&key)?;
        info!(%key, %kind, "added record");
        Ok(key)
    }

    /// Replaces the record stored under `key` with `candidate`, keeping the key.
    pub fn update_record(&mut self, key: &str, candidate: NodeId) -> Result<()> {
        let (original, kind) = self.existing(key)?;
        self.detached(candidate)?;
        if self.nodes.key(candidate).is_none() {
            self.nodes.set_key(candidate, Some(key));
        }
        self.validate(kind, candidate, Some(original))?;
        self.drop_refns(key, original);
        self.index_refns(key, candidate)?;
        self.index.replace(key, candidate);
        self.nodes.remove(original);
        self.sync(key)?;
        info!(%key, %kind, "updated record");
        Ok(())
    }

    /// Applies a node-level edit. Edits inside a stored record are first
    /// tried on a copy and validated against the record; only an accepted
    /// edit touches the record, whose refns and stored text are then
    /// refreshed. Handles into the record stay valid.
    pub fn edit_node(&mut self, edit: NodeEdit) -> Result<()> {
        let anchor = match edit {
            NodeEdit::Insert { parent, node, .. } => {
                let attachable = self.nodes.get(node).is_some_and(|n| n.parent().is_none() && n.next_sibling().is_none());
                if !attachable || self.record_kind(node).is_some() {
                    return Err(KindredError::Record(format!("node {} cannot be attached", node)));
                }
                parent
            }
            NodeEdit::Remove(node) => node,
        };
        if !self.nodes.contains(anchor) {
            return Err(KindredError::Record(format!("node {} does not exist", anchor)));
        }
        let root = self.nodes.root_of(anchor);
        let Some(kind) = self.record_kind(root) else {
            return if apply_edit(&mut self.nodes, &edit) {
                Ok(())
            } else {
                Err(KindredError::Record("node edit does not fit the tree".to_string()))
            };
        };
        if matches!(edit, NodeEdit::Remove(node) if node == root) {
            return Err(KindredError::Record("a stored record is removed by key, not as a node".to_string()));
        }
        let key = self.nodes.key(root).unwrap_or_default().to_string();

        let original: Vec<NodeId> = self.nodes.traverse(root).into_iter().map(|(n, _)| n).collect();
        let copy = self
            .nodes
            .copy_tree(root)
            .ok_or_else(|| KindredError::Invariant(format!("record {} cannot be copied", key)))?;
        let copied: Vec<NodeId> = self.nodes.traverse(copy).into_iter().map(|(n, _)| n).collect();
        let counterpart = |id: NodeId| original.iter().position(|&n| n == id).map(|i| copied[i]);
        let piece = match edit {
            NodeEdit::Insert { node, .. } => self.nodes.copy_tree(node),
            NodeEdit::Remove(_) => None,
        };
        let trial = match (edit, piece) {
            (NodeEdit::Insert { parent, after, .. }, Some(piece)) => match (counterpart(parent), after.map(counterpart)) {
                (Some(parent), None) => Some(NodeEdit::Insert { parent, node: piece, after: None }),
                (Some(parent), Some(Some(after))) => Some(NodeEdit::Insert { parent, node: piece, after: Some(after) }),
                _ => None,
            },
            (NodeEdit::Remove(node), _) => counterpart(node).map(NodeEdit::Remove),
            _ => None,
        };
        let outcome = match trial {
            Some(trial) if apply_edit(&mut self.nodes, &trial) => self.validate(kind, copy, Some(root)).map_err(KindredError::from),
            _ => Err(KindredError::Record("node edit does not fit the record".to_string())),
        };
        // an attached piece went with the copy; a stray one is freed here
        self.nodes.remove(copy);
        if let Some(piece) = piece {
            self.nodes.remove(piece);
        }
        outcome?;

        self.drop_refns(&key, root);
        apply_edit(&mut self.nodes, &edit);
        self.index_refns(&key, root)?;
        self.sync(&key)?;
        info!(%key, %kind, "edited record");
        Ok(())
    }

    /// Removes a record. Persons and families are first unlinked from the
    /// records they are linked to; a family left without spouses or
    /// children is removed as well.
    pub fn remove_record(&mut self, key: &str) -> Result<()> {
        let (root, kind) = self.existing(key)?;
        let xref = key_to_xref(key);
        match kind {
            RecordKind::Person => {
                let mut touched = Vec::new();
                for family in self.linked(root, "FAMS") {
                    self.unlink_from_family(family, &xref, true, false);
                    touched.push(family);
                }
                for family in self.linked(root, "FAMC") {
                    self.unlink_from_family(family, &xref, false, true);
                    touched.push(family);
                }
                self.forget(key, kind, root)?;
                for family in touched {
                    let Some(family_key) = self.nodes.key(family).map(str::to_string) else { continue };
                    if !self.index.contains(&family_key) {
                        continue;
                    }
                    if self.family_is_empty(family) {
                        self.remove_record(&family_key)?;
                    } else {
                        self.sync(&family_key)?;
                    }
                }
            }
            RecordKind::Family => {
                let mut touched = Vec::new();
                for tag in ["HUSB", "WIFE"] {
                    for person in self.linked(root, tag) {
                        self.unlink_from_person(person, &xref, false, true);
                        touched.push(person);
                    }
                }
                for person in self.linked(root, "CHIL") {
                    self.unlink_from_person(person, &xref, true, false);
                    touched.push(person);
                }
                self.forget(key, kind, root)?;
                for person in touched {
                    if let Some(person_key) = self.nodes.key(person).map(str::to_string) {
                        self.sync(&person_key)?;
                    }
                }
            }
            RecordKind::Source | RecordKind::Event | RecordKind::Other => self.forget(key, kind, root)?,
        }
        Ok(())
    }

    fn forget(&mut self, key: &str, kind: RecordKind, root: NodeId) -> Result<()> {
        self.drop_refns(key, root);
        self.index.remove(key);
        self.nodes.remove(root);
        self.keys.release(key)?;
        self.sync(key)?;
        info!(%key, %kind, "removed record");
        Ok(())
    }

    /// Makes `person_key` a child of `family_key`.
    pub fn add_child(&mut self, family_key: &str, person_key: &str) -> Result<()> {
        let (family, person) = self.pair(family_key, person_key)?;
        let (family_xref, person_xref) = (key_to_xref(family_key), key_to_xref(person_key));
        if self.lists(family, "CHIL", &person_xref) {
            return Err(KindredError::Record(format!("{} is already a child of {}", person_key, family_key)));
        }
        let chil = self.nodes.create(None, "CHIL", Some(&person_xref));
        let mut parts = split_family(&mut self.nodes, family);
        parts.children.push(chil);
        join_family(&mut self.nodes, family, parts);
        let famc = self.nodes.create(None, "FAMC", Some(&family_xref));
        let mut parts = split_person(&mut self.nodes, person);
        parts.famcs.push(famc);
        join_person(&mut self.nodes, person, parts);
        self.sync(family_key)?;
        self.sync(person_key)?;
        info!(family = %family_key, child = %person_key, "added child");
        Ok(())
    }

    /// Makes `person_key` a spouse in `family_key`, as husband or wife by sex.
    pub fn add_spouse(&mut self, family_key: &str, person_key: &str) -> Result<()> {
        let (family, person) = self.pair(family_key, person_key)?;
        let (family_xref, person_xref) = (key_to_xref(family_key), key_to_xref(person_key));
        if self.lists(family, "HUSB", &person_xref) || self.lists(family, "WIFE", &person_xref) {
            return Err(KindredError::Record(format!("{} is already a spouse in {}", person_key, family_key)));
        }
        let sex = Sex::from_value(self.nodes.child_with_tag(person, "SEX").and_then(|s| self.nodes.value(s)));
        let mut parts = split_family(&mut self.nodes, family);
        match sex {
            Sex::Male => {
                let husb = self.nodes.create(None, "HUSB", Some(&person_xref));
                parts.husbands.push(husb);
            }
            Sex::Female => {
                let wife = self.nodes.create(None, "WIFE", Some(&person_xref));
                parts.wives.push(wife);
            }
            Sex::Unknown => {
                join_family(&mut self.nodes, family, parts);
                return Err(ValidationError::UnknownSex.into());
            }
        }
        join_family(&mut self.nodes, family, parts);
        let fams = self.nodes.create(None, "FAMS", Some(&family_xref));
        let mut parts = split_person(&mut self.nodes, person);
        parts.famss.push(fams);
        join_person(&mut self.nodes, person, parts);
        self.sync(family_key)?;
        self.sync(person_key)?;
        info!(family = %family_key, spouse = %person_key, "added spouse");
        Ok(())
    }

    /// Removes the child link between a family and a person.
    pub fn remove_child(&mut self, family_key: &str, person_key: &str) -> Result<()> {
        let (family, person) = self.pair(family_key, person_key)?;
        let (family_xref, person_xref) = (key_to_xref(family_key), key_to_xref(person_key));
        if !self.lists(family, "CHIL", &person_xref) {
            return Err(KindredError::Record(format!("{} is not a child of {}", person_key, family_key)));
        }
        self.unlink_from_family(family, &person_xref, false, true);
        self.unlink_from_person(person, &family_xref, true, false);
        self.sync(person_key)?;
        self.settle(family, family_key)?;
        info!(family = %family_key, child = %person_key, "removed child");
        Ok(())
    }

    /// Removes the spouse link between a family and a person.
    pub fn remove_spouse(&mut self, family_key: &str, person_key: &str) -> Result<()> {
        let (family, person) = self.pair(family_key, person_key)?;
        let (family_xref, person_xref) = (key_to_xref(family_key), key_to_xref(person_key));
        if !self.lists(family, "HUSB", &person_xref) && !self.lists(family, "WIFE", &person_xref) {
            return Err(KindredError::Record(format!("{} is not a spouse in {}", person_key, family_key)));
        }
        self.unlink_from_family(family, &person_xref, true, false);
        self.unlink_from_person(person, &family_xref, false, true);
        self.sync(person_key)?;
        self.settle(family, family_key)?;
        info!(family = %family_key, spouse = %person_key, "removed spouse");
        Ok(())
    }

    // ------------- Helpers -------------

    fn existing(&self, key: &str) -> Result<(NodeId, RecordKind)> {
        match (self.index.get(key), self.index.kind_of(key)) {
            (Some(root), Some(kind)) => Ok((root, kind)),
            _ => Err(KindredError::Record(format!("no record with key {}", key))),
        }
    }
    fn pair(&self, family_key: &str, person_key: &str) -> Result<(NodeId, NodeId)> {
        let family = self
            .record_of_kind(family_key, RecordKind::Family)
            .ok_or_else(|| KindredError::Record(format!("no family with key {}", family_key)))?;
        let person = self
            .record_of_kind(person_key, RecordKind::Person)
            .ok_or_else(|| KindredError::Record(format!("no person with key {}", person_key)))?;
        Ok((family, person))
    }
    fn lists(&self, record: NodeId, tag: &str, xref: &str) -> bool {
        self.nodes
            .children(record)
            .any(|n| self.nodes.tag(n) == Some(tag) && self.nodes.value(n).map(str::trim) == Some(xref))
    }
    /// Records named by the `tag` lines of `root`.
    fn linked(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        self.nodes
            .children_with_tag(root, tag)
            .into_iter()
            .filter_map(|n| self.resolve(n))
            .collect()
    }
    fn family_is_empty(&self, family: NodeId) -> bool {
        !self
            .nodes
            .children(family)
            .any(|n| matches!(self.nodes.tag(n), Some("HUSB" | "WIFE" | "CHIL")))
    }
    /// Removes an emptied family, otherwise writes it through.
    fn settle(&mut self, family: NodeId, family_key: &str) -> Result<()> {
        if self.family_is_empty(family) {
            self.remove_record(family_key)
        } else {
            self.sync(family_key)
        }
    }
    fn unlink_from_family(&mut self, family: NodeId, xref: &str, spouse: bool, child: bool) {
        let mut parts = split_family(&mut self.nodes, family);
        let mut dropped = Vec::new();
        if spouse {
            dropped.extend(take_matching(&self.nodes, &mut parts.husbands, xref));
            dropped.extend(take_matching(&self.nodes, &mut parts.wives, xref));
        }
        if child {
            dropped.extend(take_matching(&self.nodes, &mut parts.children, xref));
        }
        join_family(&mut self.nodes, family, parts);
        for node in dropped {
            self.nodes.remove(node);
        }
    }
    fn unlink_from_person(&mut self, person: NodeId, xref: &str, child: bool, spouse: bool) {
        let mut parts = split_person(&mut self.nodes, person);
        let mut dropped = Vec::new();
        if child {
            dropped.extend(take_matching(&self.nodes, &mut parts.famcs, xref));
        }
        if spouse {
            dropped.extend(take_matching(&self.nodes, &mut parts.famss, xref));
        }
        join_person(&mut self.nodes, person, parts);
        for node in dropped {
            self.nodes.remove(node);
        }
    }
    fn index_refns(&mut self, key: &str, root: NodeId) -> std::result::Result<(), RefnError> {
        for refn in self.nodes.children_with_tag(root, "REFN") {
            if let Some(value) = self.nodes.value(refn) {
                self.refns.insert(value, key)?;
            }
        }
        Ok(())
    }
    fn drop_refns(&mut self, key: &str, root: NodeId) {
        for refn in self.nodes.children_with_tag(root, "REFN") {
            if let Some(value) = self.nodes.value(refn) {
                self.refns.remove(value, key);
            }
        }
    }
}

/// A node-level change requested through [`Database::edit_node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEdit {
    /// Attach a detached `node` under `parent`, after `after` or first.
    Insert { parent: NodeId, node: NodeId, after: Option<NodeId> },
    /// Free a node and its subtree.
    Remove(NodeId),
}

fn apply_edit(nodes: &mut NodeArena, edit: &NodeEdit) -> bool {
    match *edit {
        NodeEdit::Insert { parent, node, after } => nodes.insert_child(parent, node, after),
        NodeEdit::Remove(node) => {
            let exists = nodes.contains(node);
            nodes.remove(node);
            exists
        }
    }
}

/// Pulls the nodes whose value is `xref` out of a split group.
fn take_matching(nodes: &NodeArena, group: &mut Vec<NodeId>, xref: &str) -> Vec<NodeId> {
    let (matching, kept): (Vec<NodeId>, Vec<NodeId>) = group
        .iter()
        .copied()
        .partition(|&n| nodes.value(n).map(str::trim) == Some(xref));
    *group = kept;
    matching
}
