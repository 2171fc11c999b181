//! Kindred – a genealogical record store with a small report language.
//!
//! Records are kept in the classic line-oriented lineage format: persons
//! (`INDI`), families (`FAM`), sources, events and everything else, each a
//! tree of tagged lines. A record is addressed by its key (`I12`, `F3`),
//! written in cross references as `@I12@`, and optionally by a unique REFN
//! value. Persons and families point at each other through FAMC/FAMS and
//! HUSB/WIFE/CHIL lines, and those links are kept symmetric at all times.
//!
//! ## Modules
//! * [`node`] – Generational arena holding every record tree.
//! * [`record`] – Record kinds, keys and cross reference helpers.
//! * [`index`] – Key to record root lookup.
//! * [`keys`] – Per-kind key allocation with reuse of released keys.
//! * [`refn`] – Unique REFN values.
//! * [`splitjoin`] – Splitting records into canonical parts and back.
//! * [`validate`] – Checks applied before an edited record is committed.
//! * [`lineage`] – Navigation between persons and families.
//! * [`gedcom`] – Reading and writing record text.
//! * [`database`] – The store and every operation that changes it.
//! * [`persist`] – SQLite write-through storage.
//! * [`pnode`], [`parse`] – The report language and its parser (grammar in `script.pest`).
//! * [`value`], [`sequence`], [`builtin`], [`builtin_records`], [`interp`] – Running reports.
//! * [`engine`] – Parse and run in one call.
//! * [`errlog`], [`error`], [`settings`] – Diagnostics, errors and configuration.
//!
//! ## Report Language
//! A report is a set of `proc` and `func` definitions plus `global(...)`
//! declarations and `include("file")` lines. Execution starts in `main`.
//! Loop forms such as `forindi(person, n) { ... }` and
//! `children(family, child, n) { ... }` walk the database, and builtins like
//! `name`, `birth`, `date` and `father` read it.
//!
//! ## Quick Start
//! ```
//! use kindred::{database::Database, engine::Engine, errlog::ErrorLog, validate::ValidationOptions};
//! let text = "0 @I1@ INDI\n1 NAME John /Smith/\n1 SEX M\n";
//! let mut log = ErrorLog::new();
//! let mut db = Database::from_text("demo", text, ValidationOptions::default(), &mut log).expect("valid records");
//! let mut engine = Engine::new(&mut db);
//! let output = engine.execute("proc main() { forindi(p, n) { print(surname(p)) } }").expect("report runs");
//! assert_eq!(output.text(), "Smith");
//! ```
//!
//! ## Persistence
//! [`persist::Persistor`] keeps one row per record holding its text form.
//! [`database::Database::open`] rebuilds a store from those rows through the
//! same path used for record files, and every later edit is written through.

pub mod builtin;
pub mod builtin_records;
pub mod database;
pub mod engine;
pub mod errlog;
pub mod error;
pub mod gedcom;
pub mod index;
pub mod interp;
pub mod keys;
pub mod lineage;
pub mod node;
pub mod parse;
pub mod persist;
pub mod pnode;
pub mod record;
pub mod refn;
pub mod sequence;
pub mod settings;
pub mod splitjoin;
pub mod validate;
pub mod value;
