use kindred::database::Database;
use kindred::errlog::ErrorLog;
use kindred::error::KindredError;
use kindred::gedcom::write_record;
use kindred::lineage;
use kindred::node::NodeId;
use kindred::record::RecordKind;
use kindred::validate::{check_links, ValidationError, ValidationOptions};

const COUPLE: &str = "\
0 @I1@ INDI
1 NAME John /Smith/
1 SEX M
1 FAMS @F1@
0 @I2@ INDI
1 NAME Mary /Jones/
1 SEX F
1 FAMS @F1@
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
";

fn setup() -> Database {
    let mut log = ErrorLog::new();
    let db = Database::from_text("mutations", COUPLE, ValidationOptions::default(), &mut log);
    assert!(log.is_empty(), "{}", log);
    db.expect("fixture should load")
}

fn new_person(db: &mut Database, name: &str, sex: Option<&str>) -> String {
    let nodes = db.nodes_mut();
    let root = nodes.create(None, "INDI", None);
    let name = nodes.create(None, "NAME", Some(name));
    nodes.append_child(root, name);
    if let Some(sex) = sex {
        let line = nodes.create(None, "SEX", Some(sex));
        nodes.append_child(root, line);
    }
    db.add_record(root).expect("new person is valid")
}

fn text(db: &Database, key: &str) -> String {
    write_record(db.nodes(), db.record(key).expect("record exists"))
}

/// Every stored person and family still has matching links back.
fn assert_consistent(db: &Database) {
    for kind in [RecordKind::Person, RecordKind::Family] {
        for key in db.keys(kind) {
            let root: NodeId = db.record(&key).expect("listed key resolves");
            let problems = check_links(db, root, kind);
            assert!(problems.is_empty(), "{}: {:?}", key, problems);
        }
    }
}

#[test]
fn added_records_get_fresh_keys() {
    let mut db = setup();
    assert_eq!(new_person(&mut db, "Ann /Smith/", Some("F")), "I3");
    let family = db.nodes_mut().create(None, "FAM", None);
    assert_eq!(db.add_record(family).expect("empty family is valid"), "F2");
    let source = db.nodes_mut().create(None, "SOUR", None);
    assert_eq!(db.add_record(source).expect("source"), "S1");
}

#[test]
fn adding_a_child_links_both_sides() {
    let mut db = setup();
    let child = new_person(&mut db, "Ann /Smith/", Some("F"));
    db.add_child("F1", &child).expect("child added");
    assert!(text(&db, "F1").contains("1 CHIL @I3@"));
    assert!(text(&db, "I3").ends_with("1 FAMC @F1@\n"));
    assert_consistent(&db);
    let family = db.record("F1").expect("F1");
    let children = lineage::children(&db, family);
    assert_eq!(children, [db.record("I3").expect("I3")]);
    assert!(matches!(db.add_child("F1", &child), Err(KindredError::Record(_))));
}

#[test]
fn spouses_are_placed_by_sex() {
    let mut db = setup();
    let family = db.nodes_mut().create(None, "FAM", None);
    let key = db.add_record(family).expect("family");
    db.add_spouse(&key, "I2").expect("wife added");
    db.add_spouse(&key, "I1").expect("husband added");
    assert_eq!(text(&db, &key), format!("0 @{}@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n", key));
    assert_consistent(&db);

    let unknown = new_person(&mut db, "Pat /Doe/", None);
    let error = db.add_spouse(&key, &unknown);
    assert!(matches!(error, Err(KindredError::Validation(ValidationError::UnknownSex))));
    assert_eq!(text(&db, &key), format!("0 @{}@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n", key), "failed edit changed the family");
}

#[test]
fn removing_the_last_link_removes_the_family() {
    let mut db = setup();
    db.remove_spouse("F1", "I1").expect("husband removed");
    assert!(db.record("F1").is_some(), "family still has a wife");
    assert!(!text(&db, "I1").contains("FAMS"));
    db.remove_spouse("F1", "I2").expect("wife removed");
    assert_eq!(db.record("F1"), None);
    assert!(!db.key_allocator().is_in_use("F1"));
    assert_consistent(&db);
}

#[test]
fn removing_a_person_unlinks_them() {
    let mut db = setup();
    let child = new_person(&mut db, "Ann /Smith/", Some("F"));
    db.add_child("F1", &child).expect("child added");
    db.remove_record("I1").expect("person removed");
    assert_eq!(db.record("I1"), None);
    assert!(!text(&db, "F1").contains("HUSB"));
    assert_consistent(&db);
    assert_eq!(new_person(&mut db, "Tom /Smith/", Some("M")), "I1", "released key is reused");
}

#[test]
fn removing_a_child_keeps_the_couple() {
    let mut db = setup();
    let child = new_person(&mut db, "Ann /Smith/", Some("F"));
    db.add_child("F1", &child).expect("child added");
    db.remove_child("F1", &child).expect("child removed");
    assert!(!text(&db, "F1").contains("CHIL"));
    assert!(!text(&db, &child).contains("FAMC"));
    assert!(matches!(db.remove_child("F1", &child), Err(KindredError::Record(_))));
    assert_consistent(&db);
}

#[test]
fn links_need_a_family_and_a_person() {
    let mut db = setup();
    assert!(db.add_child("I1", "I2").is_err());
    assert!(db.add_spouse("F1", "F1").is_err());
    assert!(db.remove_record("I9").is_err());
}
