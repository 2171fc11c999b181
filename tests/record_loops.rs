use kindred::database::Database;
use kindred::errlog::ErrorLog;
use kindred::interp::run_program;
use kindred::parse::parse_script;
use kindred::validate::ValidationOptions;

// I1 has two marriages; I4 is a child of both.
const LOOPS: &str = "\
0 @I1@ INDI
1 NAME Karl /Holm/
1 SEX M
1 FAMS @F1@
1 FAMS @F2@
0 @I2@ INDI
1 NAME Greta /Lund/
1 SEX F
1 FAMS @F1@
0 @I3@ INDI
1 NAME Siri /Dahl/
1 SEX F
1 FAMS @F2@
0 @I4@ INDI
1 NAME Anna /Holm/
1 SEX F
1 BIRT
2 DATE 1950
1 NOTE first
1 NOTE second
1 FAMC @F1@
1 FAMC @F2@
0 @I5@ INDI
1 NAME Per /Holm/
1 SEX M
1 FAMC @F1@
0 @F1@ FAM
1 HUSB @I1@
1 WIFE @I2@
1 CHIL @I4@
1 CHIL @I5@
0 @F2@ FAM
1 HUSB @I1@
1 WIFE @I3@
1 CHIL @I4@
0 @S1@ SOUR
1 TITL Church book
0 @S2@ SOUR
1 TITL Census
0 @E1@ EVEN
1 NAME Flood
0 @N1@ NOTE
1 CONC loose note
";

fn loops_db() -> Database {
    let mut log = ErrorLog::new();
    let db = Database::from_text("loops", LOOPS, ValidationOptions::default(), &mut log);
    assert!(log.is_empty(), "{}", log);
    db.expect("fixture should load")
}

fn text_of(body: &str) -> String {
    let mut db = loops_db();
    let mut log = ErrorLog::new();
    let script = format!("proc main() {{ {} }}", body);
    let program = parse_script("loops.ll", &script, &mut log).expect("script parses");
    let output = run_program(&program, &mut db, "main", &mut log);
    assert!(log.is_empty(), "{}", log);
    output.expect("script should produce output").text()
}

#[test]
fn spouses_follow_family_order() {
    let text = text_of(r#"spouses(indi("I1"), s, f, n) { print(n, key(s), key(f), " ") }"#);
    assert_eq!(text, "0I2F1 1I3F2 ");
}

#[test]
fn families_pair_each_family_with_its_other_spouse() {
    let text = text_of(r#"families(indi("I1"), f, s, n) { print(n, key(f), key(s), " ") }"#);
    assert_eq!(text, "0F1I2 1F2I3 ");
}

#[test]
fn parents_are_visited_per_family_as_child() {
    let fathers = text_of(r#"fathers(indi("I4"), p, f, n) { print(n, key(p), key(f), " ") }"#);
    assert_eq!(fathers, "0I1F1 1I1F2 ");
    let mothers = text_of(r#"mothers(indi("I4"), p, f, n) { print(n, key(p), key(f), " ") }"#);
    assert_eq!(mothers, "0I2F1 1I3F2 ");
    let parents = text_of(r#"parents(indi("I4"), f, n) { print(n, key(f), " ") }"#);
    assert_eq!(parents, "0F1 1F2 ");
    let children = text_of(r#"children(fam("F1"), c, n) { print(n, key(c), " ") }"#);
    assert_eq!(children, "0I4 1I5 ");
}

#[test]
fn traverse_walks_the_tree_in_preorder() {
    let text = text_of(r#"traverse(indi("I4"), n, l) { print(tag(n), l, " ") }"#);
    assert_eq!(text, "INDI0 NAME1 SEX1 BIRT1 DATE2 NOTE1 NOTE1 FAMC1 FAMC1 ");
}

#[test]
fn fornodes_visits_direct_children() {
    let text = text_of(r#"fornodes(indi("I4"), c, n) { print(n, tag(c), " ") }"#);
    assert_eq!(text, "0NAME 1SEX 2BIRT 3NOTE 4NOTE 5FAMC 6FAMC ");
    let text = text_of(r#"fornodes(birth(indi("I4")), c) { print(tag(c), "=", value(c)) }"#);
    assert_eq!(text, "DATE=1950");
}

#[test]
fn fornotes_yields_note_values() {
    let text = text_of(r#"fornotes(indi("I4"), t) { print(t, ";") }"#);
    assert_eq!(text, "first;second;");
}

#[test]
fn record_loops_cover_each_kind() {
    assert_eq!(text_of(r#"forfam(f, n) { print(n, key(f), " ") }"#), "0F1 1F2 ");
    assert_eq!(text_of(r#"forsour(s, n) { print(n, key(s), " ") }"#), "0S1 1S2 ");
    assert_eq!(text_of(r#"foreven(e, n) { print(n, key(e), " ") }"#), "0E1 ");
    assert_eq!(text_of(r#"forothr(o, n) { print(n, key(o), " ") }"#), "0N1 ");
}

#[test]
fn loop_variables_are_restored_afterwards() {
    let text = text_of(r#"n := "kept" forfam(f, n) { print(key(f)) } print(" ", n)"#);
    assert_eq!(text, "F1F2 kept");
    let text = text_of(r#"f := 0 forfam(f, n) { print(key(f)) break() } print(" ", f)"#);
    assert_eq!(text, "F1 0", "break still restores the outer binding");
}
