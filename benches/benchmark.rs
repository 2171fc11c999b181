use std::fmt::Write;
use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use kindred::database::Database;
use kindred::engine::Engine;
use kindred::errlog::ErrorLog;
use kindred::keys::KeyAllocator;
use kindred::record::RecordKind;
use kindred::validate::ValidationOptions;

/// `couples` families in a single line of descent: each family's only
/// child is the husband of the next one.
fn lineage_text(couples: usize) -> String {
    let mut text = String::new();
    for n in 1..=couples {
        let (husband, wife, family) = (2 * n - 1, 2 * n, n);
        let _ = writeln!(text, "0 @I{}@ INDI\n1 NAME Son{} /Line/\n1 SEX M", husband, n);
        if n > 1 {
            let _ = writeln!(text, "1 FAMC @F{}@", n - 1);
        }
        let _ = writeln!(text, "1 FAMS @F{}@", family);
        let _ = writeln!(text, "0 @I{}@ INDI\n1 NAME Wife{} /Other/\n1 SEX F\n1 FAMS @F{}@", wife, n, family);
        let _ = writeln!(text, "0 @F{}@ FAM\n1 HUSB @I{}@\n1 WIFE @I{}@", family, husband, wife);
        if n < couples {
            let _ = writeln!(text, "1 CHIL @I{}@", husband + 2);
        }
    }
    text
}

fn load(text: &str) -> Database {
    let mut log = ErrorLog::new();
    Database::from_text("bench", text, ValidationOptions::default(), &mut log).expect("generated records are valid")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("key churn 1k", |b| {
        b.iter(|| {
            let mut keys = KeyAllocator::new();
            let issued: Vec<String> = (0..1000).map(|_| keys.allocate(RecordKind::Person)).collect();
            for key in issued.iter().step_by(3) {
                let _ = keys.release(key);
            }
            for _ in 0..500 {
                black_box(keys.allocate(RecordKind::Person));
            }
        })
    });

    let text = lineage_text(500);
    c.bench_function("load 1k persons", |b| b.iter(|| black_box(load(&text))));

    let mut db = load(&text);
    c.bench_function("report over 1k persons", |b| {
        b.iter(|| {
            let mut engine = Engine::new(&mut db);
            let output = engine
                .execute("proc main() { forindi(p, n) { if (male(p)) { print(surname(p)) } } }")
                .expect("report runs");
            black_box(output.chunks().len())
        })
    });
    c.bench_function("ancestors of the last son", |b| {
        b.iter(|| {
            let mut engine = Engine::new(&mut db);
            let output = engine
                .execute("proc main() { indiset(s) addtoset(s, indi(\"I999\"), 0) print(lengthset(ancestorset(s))) }")
                .expect("report runs");
            black_box(output.text())
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
