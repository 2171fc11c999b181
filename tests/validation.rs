use kindred::database::Database;
use kindred::errlog::ErrorLog;
use kindred::error::KindredError;
use kindred::gedcom::write_record;
use kindred::node::NodeId;
use kindred::validate::{ValidationError, ValidationOptions};

const FAMILY: &str = "\
0 @I1@ INDI
1 NAME John /Smith/
1 SEX M
1 FAMS @F1@
1 FAMS @F2@
0 @I2@ INDI
1 NAME Mary /Jones/
1 SEX F
1 FAMS @F1@
0 @I3@ INDI
1 NAME Ann /Smith/
1 SEX F
1 FAMC @F1@
1 REFN ann
0 @I4@ INDI
1 NAME Kate /Brown/
1 SEX F
1 FAMS @F2@
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
1 CHIL @I3@
0 @F2@ FAM
1 HUSB @I1@
1 WIFE @I4@
";

fn setup(options: ValidationOptions) -> Database {
    let mut log = ErrorLog::new();
    let db = Database::from_text("validation", FAMILY, options, &mut log);
    assert!(log.is_empty(), "{}", log);
    db.expect("fixture should load")
}

/// A detached copy of a stored record, ready to be edited.
fn candidate(db: &mut Database, key: &str) -> NodeId {
    let root = db.record(key).expect("record exists");
    db.nodes_mut().copy_tree(root).expect("copy")
}

fn rejected(result: Result<(), KindredError>) -> ValidationError {
    match result {
        Err(KindredError::Validation(error)) => error,
        other => panic!("expected a validation error, got {:?}", other),
    }
}

#[test]
fn plain_edit_is_accepted() {
    let mut db = setup(ValidationOptions::default());
    let edit = candidate(&mut db, "I1");
    let name = db.nodes().child_with_tag(edit, "NAME").expect("name line");
    db.nodes_mut().set_value(name, Some("Johan /Smith/"));
    db.update_record("I1", edit).expect("name change is allowed");
    let stored = db.record("I1").expect("still stored");
    assert_eq!(stored, edit);
    assert!(write_record(db.nodes(), stored).contains("1 NAME Johan /Smith/"));
}

#[test]
fn reordered_links_are_the_same_set() {
    let mut db = setup(ValidationOptions::default());
    let edit = candidate(&mut db, "I1");
    let links = db.nodes().children_with_tag(edit, "FAMS");
    let first = links[0];
    db.nodes_mut().detach(first);
    db.nodes_mut().append_child(edit, first);
    db.update_record("I1", edit).expect("link order does not matter");
}

#[test]
fn adding_a_spouse_link_by_edit_is_rejected() {
    let mut db = setup(ValidationOptions::default());
    let before = write_record(db.nodes(), db.record("I3").expect("I3"));
    let edit = candidate(&mut db, "I3");
    let fams = db.nodes_mut().create(None, "FAMS", Some("@F2@"));
    db.nodes_mut().append_child(edit, fams);
    let error = rejected(db.update_record("I3", edit));
    assert_eq!(error, ValidationError::LinksChanged { tag: "FAMS" });
    let after = write_record(db.nodes(), db.record("I3").expect("I3"));
    assert_eq!(before, after, "a rejected edit must leave the store unchanged");
}

#[test]
fn dropping_a_child_link_by_edit_is_rejected() {
    let mut db = setup(ValidationOptions::default());
    let edit = candidate(&mut db, "F1");
    let chil = db.nodes().child_with_tag(edit, "CHIL").expect("child line");
    db.nodes_mut().remove(chil);
    assert_eq!(rejected(db.update_record("F1", edit)), ValidationError::LinksChanged { tag: "CHIL" });
}

#[test]
fn spouse_cannot_change_sex() {
    let mut db = setup(ValidationOptions::default());
    let edit = candidate(&mut db, "I2");
    let sex = db.nodes().child_with_tag(edit, "SEX").expect("sex line");
    db.nodes_mut().set_value(sex, Some("M"));
    assert_eq!(rejected(db.update_record("I2", edit)), ValidationError::SexConflict);
}

#[test]
fn malformed_names_are_rejected() {
    let mut db = setup(ValidationOptions::default());
    let edit = candidate(&mut db, "I4");
    let name = db.nodes().child_with_tag(edit, "NAME").expect("name line");
    db.nodes_mut().set_value(name, Some("Kate /Brown/ /Smith/"));
    assert!(matches!(rejected(db.update_record("I4", edit)), ValidationError::BadName(_)));
}

#[test]
fn refn_values_stay_unique() {
    let mut db = setup(ValidationOptions::default());
    let edit = candidate(&mut db, "I4");
    let refn = db.nodes_mut().create(None, "REFN", Some("ann"));
    db.nodes_mut().append_child(edit, refn);
    let error = rejected(db.update_record("I4", edit));
    assert_eq!(error, ValidationError::RefnTaken { refn: "ann".to_string(), key: "I3".to_string() });
}

#[test]
fn names_can_be_required() {
    let mut db = setup(ValidationOptions { require_names: true });
    let person = db.nodes_mut().create(None, "INDI", None);
    let sex = db.nodes_mut().create(None, "SEX", Some("M"));
    db.nodes_mut().append_child(person, sex);
    assert!(matches!(db.add_record(person), Err(KindredError::Validation(ValidationError::MissingName))));
}

#[test]
fn wrong_root_tag_is_rejected() {
    let mut db = setup(ValidationOptions::default());
    let edit = db.nodes_mut().create(Some("I1"), "FAM", None);
    assert!(matches!(rejected(db.update_record("I1", edit)), ValidationError::WrongTag { .. }));
}
