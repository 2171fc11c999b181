use std::path::PathBuf;

use kindred::database::Database;
use kindred::errlog::ErrorLog;
use kindred::gedcom::write_record;
use kindred::persist::{PersistenceMode, Persistor};
use kindred::record::RecordKind;
use kindred::validate::ValidationOptions;

const COUPLE: &str = "\
0 @I1@ INDI
1 NAME John /Smith/
1 SEX M
1 REFN john
1 FAMS @F1@
0 @I2@ INDI
1 NAME Mary /Jones/
1 SEX F
1 FAMS @F1@
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
";

/// A fresh database file path in the temp directory; any old copy is removed.
fn temp_path(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("kindred_{}_{}.db", name, std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

fn couple() -> Database {
    let mut log = ErrorLog::new();
    let db = Database::from_text("couple", COUPLE, ValidationOptions::default(), &mut log);
    assert!(log.is_empty(), "{}", log);
    db.expect("fixture should load")
}

#[test]
fn in_memory_mode_allows_basic_operations() {
    let mut log = ErrorLog::new();
    let mut db = Database::open(&PersistenceMode::InMemory, ValidationOptions::default(), &mut log).expect("db");
    assert!(db.is_empty());
    assert!(db.is_persistent());
    let person = db.nodes_mut().create(None, "INDI", None);
    assert_eq!(db.add_record(person).expect("person added"), "I1");
}

#[test]
fn file_mode_writes_every_edit_through() {
    let path = temp_path("write_through");
    let mode = PersistenceMode::File(path.to_string_lossy().into_owned());
    let mut db = couple();
    db.attach(Persistor::new(&mode).expect("persistor")).expect("attach");

    let stored = Persistor::new(&mode).expect("second connection");
    assert_eq!(stored.count().expect("count"), 3);

    let child = db.nodes_mut().create(None, "INDI", None);
    let name = db.nodes_mut().create(None, "NAME", Some("Ann /Smith/"));
    db.nodes_mut().append_child(child, name);
    let key = db.add_record(child).expect("child added");
    db.add_child("F1", &key).expect("child linked");
    assert_eq!(stored.count().expect("count"), 4);
    let family = stored.body("F1").expect("query").expect("F1 stored");
    assert!(family.contains("1 CHIL @I3@"), "{}", family);

    db.remove_record("I2").expect("wife removed");
    assert_eq!(stored.body("I2").expect("query"), None);
    let family = stored.body("F1").expect("query").expect("F1 stored");
    assert!(!family.contains("WIFE"), "{}", family);

    let _ = std::fs::remove_file(&path);
}

#[test]
fn reopening_restores_records_refns_and_keys() {
    let path = temp_path("restore");
    let mode = PersistenceMode::File(path.to_string_lossy().into_owned());
    let expected = {
        let mut db = couple();
        db.attach(Persistor::new(&mode).expect("persistor")).expect("attach");
        db.remove_spouse("F1", "I2").expect("wife removed");
        write_record(db.nodes(), db.record("F1").expect("F1"))
    };

    let mut log = ErrorLog::new();
    let mut db = Database::open(&mode, ValidationOptions::default(), &mut log).expect("reopen");
    assert!(log.is_empty(), "{}", log);
    assert_eq!(db.count(RecordKind::Person), 2);
    assert_eq!(write_record(db.nodes(), db.record("F1").expect("F1 restored")), expected);
    assert_eq!(db.record_by_refn("john"), db.record("I1"));
    let person = db.nodes_mut().create(None, "INDI", None);
    assert_eq!(db.add_record(person).expect("added"), "I3");

    drop(db);
    let _ = std::fs::remove_file(&path);
}
