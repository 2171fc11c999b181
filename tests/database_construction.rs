use kindred::database::Database;
use kindred::errlog::{DiagnosticKind, ErrorLog};
use kindred::gedcom::read_records;
use kindred::record::RecordKind;
use kindred::validate::ValidationOptions;

const SMALL: &str = "\
0 HEAD
1 CHAR UTF-8
0 @I1@ INDI
1 NAME John /Smith/
1 SEX M
1 FAMS @F1@
0 @I2@ INDI
1 NAME Mary /Jones/
1 SEX F
1 REFN mary
1 FAMS @F1@
0 @I5@ INDI
1 NAME Ann /Smith/
1 FAMC @F1@
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
1 CHIL @I5@
0 @S1@ SOUR
1 TITL Parish register
0 @NOTE1@ NOTE
1 CONC free text
0 TRLR
";

fn load(text: &str) -> (Option<Database>, ErrorLog) {
    let mut log = ErrorLog::new();
    let db = Database::from_text("construct.ged", text, ValidationOptions::default(), &mut log);
    (db, log)
}

#[test]
fn well_formed_records_are_indexed() {
    let (db, log) = load(SMALL);
    assert!(log.is_empty(), "{}", log);
    let db = db.expect("database");
    assert_eq!(db.count(RecordKind::Person), 3);
    assert_eq!(db.count(RecordKind::Family), 1);
    assert_eq!(db.count(RecordKind::Source), 1);
    assert_eq!(db.count(RecordKind::Other), 1);
    assert_eq!(db.len(), 6, "HEAD and TRLR are not records");
    assert_eq!(db.keys(RecordKind::Person), ["I1", "I2", "I5"]);
    assert_eq!(db.kind_of("NOTE1"), Some(RecordKind::Other));
}

#[test]
fn refn_values_resolve_to_records() {
    let (db, _) = load(SMALL);
    let db = db.expect("database");
    assert_eq!(db.record_by_refn("mary"), db.record("I2"));
    assert_eq!(db.refn_index().lookup("mary"), Some("I2"));
    assert_eq!(db.resolve_xref("@F1@"), db.record("F1"));
    assert_eq!(db.resolve_xref("F1"), None);
}

#[test]
fn loaded_keys_are_never_reissued() {
    let (db, _) = load(SMALL);
    let db = db.expect("database");
    let persons = db.key_allocator().set(RecordKind::Person);
    assert!(db.key_allocator().is_in_use("I5"));
    assert_eq!(persons.recycled(), &[3, 4], "gaps below the largest loaded key are free");
    assert_eq!(persons.high_water(), 6);
}

#[test]
fn every_structural_problem_is_reported() {
    let text = "\
0 @I1@ INDI
1 NAME A /B/
1 FAMS @F9@
0 @I1@ INDI
1 NAME Copy /B/
0 @I2@ INDI
1 FAMC @F1@
0 @F1@ FAM
1 CHIL @I3@
0 @I3@ INDI
1 NAME C /D/
0 @S1@ SOUR
1 REFN dup
0 @S2@ SOUR
1 REFN dup
";
    let (db, log) = load(text);
    assert!(db.is_none(), "construction must fail");
    let messages: Vec<String> = log.iter().map(|d| d.message.clone()).collect();
    assert!(log.iter().all(|d| d.kind == DiagnosticKind::Structural), "{}", log);
    assert!(messages.iter().any(|m| m.contains("duplicate key I1")), "{:?}", messages);
    assert!(messages.iter().any(|m| m.contains("missing record F9")), "{:?}", messages);
    assert!(messages.iter().any(|m| m.contains("does not list I2 as a child")), "{:?}", messages);
    assert!(messages.iter().any(|m| m.contains("has no FAMC link back")), "{:?}", messages);
    assert!(messages.iter().any(|m| m.contains("REFN value dup")), "{:?}", messages);
    let duplicate = log.iter().find(|d| d.message.contains("duplicate")).expect("duplicate reported");
    assert_eq!(duplicate.line, Some(4));
    assert_eq!(duplicate.file.as_deref(), Some("construct.ged"));
}

#[test]
fn malformed_lines_abort_construction() {
    let (db, log) = load("0 @I1@ INDI\n1 NAME A /B/\nNAME without level\n");
    assert!(db.is_none());
    assert_eq!(log.count(DiagnosticKind::Structural), 1);
    assert_eq!(log.iter().next().and_then(|d| d.line), Some(3));
}

#[test]
fn records_read_separately_can_be_assembled() {
    let mut log = ErrorLog::new();
    let (nodes, roots) = read_records(SMALL, "parts.ged", &mut log);
    let db = Database::from_records("parts", nodes, roots, ValidationOptions::default(), &mut log).expect("database");
    assert_eq!(db.name(), "parts");
    assert_eq!(db.count(RecordKind::Person), 3);
}

#[test]
fn dangling_references_point_at_their_own_line() {
    let text = "0 HEAD\n1 CHAR UTF-8\n\n0 @I1@ INDI\n\n1 NAME A /B/\n1 FAMS @F9@\n";
    let (db, log) = load(text);
    assert!(db.is_none());
    let dangling = log.iter().find(|d| d.message.contains("missing record F9")).expect("dangling reported");
    assert_eq!(dangling.line, Some(7));
}

#[test]
fn keys_beyond_the_numbering_range_are_reported() {
    let (db, log) = load("0 @I4000000000@ INDI\n1 NAME A /B/\n");
    assert!(db.is_none());
    let oversized = log
        .iter()
        .find(|d| d.message.contains("beyond the largest key number"))
        .expect("oversized key reported");
    assert_eq!(oversized.line, Some(1));
}
