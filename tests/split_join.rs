use kindred::errlog::ErrorLog;
use kindred::gedcom::{read_records, write_record};
use kindred::node::{NodeArena, NodeId};
use kindred::record::RecordKind;
use kindred::splitjoin::{join_family, join_person, normalize, split_family, split_person};

fn read_one(text: &str) -> (NodeArena, NodeId) {
    let mut log = ErrorLog::new();
    let (nodes, roots) = read_records(text, "split.ged", &mut log);
    assert!(log.is_empty(), "{}", log);
    let root = roots.first().expect("one record").root;
    (nodes, root)
}

fn values(nodes: &NodeArena, root: NodeId, tag: &str) -> Vec<String> {
    nodes
        .children_with_tag(root, tag)
        .into_iter()
        .filter_map(|n| nodes.value(n).map(str::to_string))
        .collect()
}

#[test]
fn family_children_keep_their_order() {
    let (mut nodes, family) = read_one("0 @F1@ FAM\n1 CHIL @I3@\n1 REFN fam-1\n1 HUSB @I1@\n1 CHIL @I2@\n");
    let before = values(&nodes, family, "CHIL");
    let parts = split_family(&mut nodes, family);
    assert_eq!(nodes.first_child(family), None, "split should leave the root childless");
    assert_eq!(parts.children.len(), 2);
    assert_eq!(parts.refns.len(), 1);
    join_family(&mut nodes, family, parts);
    assert_eq!(values(&nodes, family, "CHIL"), before);
    assert_eq!(values(&nodes, family, "CHIL"), ["@I3@", "@I2@"]);
    let tags: Vec<&str> = nodes.children(family).filter_map(|c| nodes.tag(c)).collect();
    assert_eq!(tags, ["REFN", "HUSB", "CHIL", "CHIL"]);
}

#[test]
fn person_join_is_canonical_and_idempotent() {
    let text = "0 @I1@ INDI\n1 FAMS @F1@\n1 BIRT\n2 DATE 1900\n1 SEX M\n1 NAME John /Smith/\n1 FAMC @F2@\n1 REFN js\n";
    let (mut nodes, person) = read_one(text);
    let parts = split_person(&mut nodes, person);
    join_person(&mut nodes, person, parts);
    let once = write_record(&nodes, person);
    assert_eq!(
        once,
        "0 @I1@ INDI\n1 NAME John /Smith/\n1 REFN js\n1 SEX M\n1 BIRT\n2 DATE 1900\n1 FAMC @F2@\n1 FAMS @F1@\n"
    );
    let parts = split_person(&mut nodes, person);
    join_person(&mut nodes, person, parts);
    assert_eq!(write_record(&nodes, person), once, "a second split/join should change nothing");
}

#[test]
fn subtrees_travel_with_their_line() {
    let (mut nodes, person) = read_one("0 @I1@ INDI\n1 BIRT\n2 DATE 1900\n2 PLAC Oslo\n1 NAME A /B/\n");
    let parts = split_person(&mut nodes, person);
    let birth = parts.body[0];
    assert_eq!(nodes.parent(birth), None);
    assert_eq!(nodes.count(birth), 3);
    join_person(&mut nodes, person, parts);
    assert_eq!(nodes.parent(birth), Some(person));
    assert_eq!(nodes.level(birth), 1);
}

#[test]
fn normalize_orders_other_records() {
    let (mut nodes, source) = read_one("0 @S1@ SOUR\n1 TITL Census\n1 REFN c1900\n");
    normalize(&mut nodes, source, RecordKind::Source);
    assert_eq!(write_record(&nodes, source), "0 @S1@ SOUR\n1 REFN c1900\n1 TITL Census\n");
}
