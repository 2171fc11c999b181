//! The builtin function table and the general-purpose builtins: arithmetic,
//! comparison, logic, strings, lists, tables and output. Record and
//! sequence builtins live in [`crate::builtin_records`].
//!
//! The table is sorted by name and searched by binary search. Most builtins
//! receive evaluated arguments; the few that need identifiers or lazy
//! evaluation (`and`, `or`, `set`, `incr`, ...) receive the argument nodes.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use chrono::Local;

use crate::builtin_records as records;
use crate::interp::{Interpreter, RunResult, RuntimeError};
use crate::pnode::{Location, PNode};
use crate::sequence::Sequence;
use crate::value::PValue;

pub type ValueFn = fn(&mut Interpreter<'_>, &[PValue], &Location) -> RunResult<PValue>;
pub type NodeFn = fn(&mut Interpreter<'_>, &[PNode], &Location) -> RunResult<PValue>;

pub enum Evaluation {
    Values(ValueFn),
    Nodes(NodeFn),
}

pub struct Builtin {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub evaluation: Evaluation,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

const MANY: usize = 32;

const fn values(name: &'static str, min_args: usize, max_args: usize, func: ValueFn) -> Builtin {
    Builtin { name, min_args, max_args, evaluation: Evaluation::Values(func) }
}
const fn nodes(name: &'static str, min_args: usize, max_args: usize, func: NodeFn) -> Builtin {
    Builtin { name, min_args, max_args, evaluation: Evaluation::Nodes(func) }
}

pub static BUILTINS: &[Builtin] = &[
    values("add", 1, MANY, add),
    values("addchild", 2, 2, records::addchild),
    values("addnode", 2, 3, records::addnode),
    values("addspouse", 2, 2, records::addspouse),
    values("addtoset", 3, 3, records::addtoset),
    values("alpha", 1, 1, alpha),
    values("ancestorset", 1, 1, records::ancestorset),
    nodes("and", 1, MANY, and),
    values("baptism", 1, 1, records::baptism),
    values("birth", 1, 1, records::birth),
    values("burial", 1, 1, records::burial),
    values("capitalize", 1, 1, capitalize),
    values("child", 1, 1, records::child),
    values("childset", 1, 1, records::childset),
    values("concat", 1, MANY, concat),
    values("createnode", 1, 2, records::createnode),
    values("d", 1, 1, d),
    values("database", 0, 0, records::database),
    values("date", 1, 1, records::date),
    values("death", 1, 1, records::death),
    nodes("decr", 1, 2, decr),
    values("deletenode", 1, 1, records::deletenode),
    values("deleteperson", 1, 1, records::deleteperson),
    values("dequeue", 1, 1, dequeue),
    values("descendantset", 1, 1, records::descendantset),
    values("difference", 2, 2, records::difference),
    values("div", 2, 2, div),
    values("empty", 1, 1, empty),
    values("enqueue", 2, 2, enqueue),
    values("eq", 2, 2, eq),
    values("eqstr", 2, 2, eqstr),
    values("exp", 2, 2, exp),
    values("fam", 1, 1, records::fam),
    values("father", 1, 1, records::father),
    values("female", 1, 1, records::female),
    values("firstchild", 1, 1, records::firstchild),
    values("firstindi", 0, 0, records::firstindi),
    values("ge", 2, 2, ge),
    values("getel", 2, 2, getel),
    values("getrecord", 1, 1, records::getrecord),
    values("gettoday", 0, 0, gettoday),
    values("givens", 1, 1, records::givens),
    values("gt", 2, 2, gt),
    values("husband", 1, 1, records::husband),
    nodes("incr", 1, 2, incr),
    values("indi", 1, 1, records::indi),
    nodes("indiset", 1, 1, indiset),
    values("insert", 3, 3, insert),
    values("intersect", 2, 2, records::intersect),
    values("key", 1, 1, records::key),
    values("keysort", 1, 1, records::keysort),
    values("lastchild", 1, 1, records::lastchild),
    values("le", 2, 2, le),
    values("length", 1, 1, length),
    values("lengthset", 1, 1, records::lengthset),
    nodes("list", 1, 1, list),
    values("lookup", 2, 2, lookup),
    values("lower", 1, 1, lower),
    values("lt", 2, 2, lt),
    values("male", 1, 1, records::male),
    values("marriage", 1, 1, records::marriage),
    values("mod", 2, 2, modulo),
    values("mother", 1, 1, records::mother),
    values("mul", 1, MANY, mul),
    values("name", 1, 2, records::name),
    values("namesort", 1, 1, records::namesort),
    values("nchildren", 1, 1, records::nchildren),
    values("ne", 2, 2, ne),
    values("neg", 1, 1, neg),
    values("nextindi", 1, 1, records::nextindi),
    values("nfamilies", 1, 1, records::nfamilies),
    values("nl", 0, 0, nl),
    values("not", 1, 1, not),
    values("nspouses", 1, 1, records::nspouses),
    nodes("or", 1, MANY, or),
    values("ord", 1, 1, ord),
    values("parent", 1, 1, records::parent),
    values("parents", 1, 1, records::parents),
    values("parentset", 1, 1, records::parentset),
    values("place", 1, 1, records::place),
    values("pop", 1, 1, dequeue),
    values("print", 1, MANY, print),
    values("push", 2, 2, push),
    values("qt", 0, 0, qt),
    values("removechild", 2, 2, records::removechild),
    values("removespouse", 2, 2, records::removespouse),
    values("roman", 1, 1, roman),
    nodes("set", 2, 2, set),
    values("setel", 3, 3, setel),
    values("sex", 1, 1, records::sex),
    values("sibling", 1, 1, records::sibling),
    values("siblingset", 1, 1, records::siblingset),
    values("sp", 0, 0, sp),
    values("spouseset", 1, 1, records::spouseset),
    values("stddate", 1, 1, records::stddate),
    values("strcmp", 2, 2, strcmp),
    values("strlen", 1, 1, strlen),
    values("strtoint", 1, 1, strtoint),
    values("sub", 2, 2, sub),
    values("substring", 3, 3, substring),
    values("surname", 1, 1, records::surname),
    nodes("table", 1, 1, table),
    values("tag", 1, 1, records::tag),
    values("union", 2, 2, records::union),
    values("uniqueset", 1, 1, records::uniqueset),
    values("upper", 1, 1, upper),
    values("value", 1, 1, records::value),
    values("valuesort", 1, 1, records::valuesort),
    values("version", 0, 0, version),
    values("wife", 1, 1, records::wife),
    values("xref", 1, 1, records::xref),
    values("year", 1, 1, records::year),
];

pub fn lookup_builtin(name: &str) -> Option<&'static Builtin> {
    BUILTINS
        .binary_search_by(|builtin| builtin.name.cmp(name))
        .ok()
        .map(|index| &BUILTINS[index])
}

// ------------- Argument helpers -------------

pub(crate) fn expected(what: &str, value: &PValue, location: &Location) -> RuntimeError {
    RuntimeError::at(location, format!("expected {}, got {}", what, value.type_name()))
}

fn arg<'v>(args: &'v [PValue], index: usize) -> &'v PValue {
    args.get(index).unwrap_or(&PValue::Null)
}

pub(crate) fn int_arg(args: &[PValue], index: usize, location: &Location) -> RunResult<i64> {
    let value = arg(args, index);
    value.as_int().ok_or_else(|| expected("an integer", value, location))
}

/// Strings, with null read as the empty string.
pub(crate) fn str_arg(args: &[PValue], index: usize, location: &Location) -> RunResult<String> {
    match arg(args, index) {
        PValue::Str(s) => Ok(s.clone()),
        PValue::Null => Ok(String::new()),
        other => Err(expected("a string", other, location)),
    }
}

fn ident_arg<'n>(nodes: &'n [PNode], index: usize, location: &Location) -> RunResult<&'n str> {
    match nodes.get(index) {
        Some(PNode::Ident { name, .. }) => Ok(name),
        _ => Err(RuntimeError::at(location, "expected an identifier")),
    }
}

fn list_arg(args: &[PValue], index: usize, location: &Location) -> RunResult<Rc<RefCell<VecDeque<PValue>>>> {
    match arg(args, index) {
        PValue::List(list) => Ok(list.clone()),
        other => Err(expected("a list", other, location)),
    }
}

fn table_arg(args: &[PValue], index: usize, location: &Location) -> RunResult<Rc<RefCell<HashMap<String, PValue>>>> {
    match arg(args, index) {
        PValue::Table(table) => Ok(table.clone()),
        other => Err(expected("a table", other, location)),
    }
}

pub(crate) fn sequence_arg(args: &[PValue], index: usize, location: &Location) -> RunResult<Rc<RefCell<Sequence>>> {
    match arg(args, index) {
        PValue::Sequence(sequence) => Ok(sequence.clone()),
        other => Err(expected("a set", other, location)),
    }
}

// ------------- Arithmetic -------------

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

fn number(value: &PValue, location: &Location) -> RunResult<Number> {
    match value {
        PValue::Int(i) => Ok(Number::Int(*i)),
        PValue::Bool(b) => Ok(Number::Int(i64::from(*b))),
        PValue::Float(f) => Ok(Number::Float(*f)),
        other => Err(expected("a number", other, location)),
    }
}

fn arithmetic(
    args: &[PValue],
    location: &Location,
    ints: fn(i64, i64) -> Option<i64>,
    floats: fn(f64, f64) -> f64,
) -> RunResult<PValue> {
    let mut total = number(arg(args, 0), location)?;
    for value in &args[1.min(args.len())..] {
        total = match (total, number(value, location)?) {
            (Number::Int(a), Number::Int(b)) => {
                Number::Int(ints(a, b).ok_or_else(|| RuntimeError::at(location, "integer overflow or division by zero"))?)
            }
            (Number::Int(a), Number::Float(b)) => Number::Float(floats(a as f64, b)),
            (Number::Float(a), Number::Int(b)) => Number::Float(floats(a, b as f64)),
            (Number::Float(a), Number::Float(b)) => Number::Float(floats(a, b)),
        };
    }
    Ok(match total {
        Number::Int(i) => PValue::Int(i),
        Number::Float(f) => PValue::Float(f),
    })
}

/// Adds numbers, or concatenates when every argument is a string.
fn add(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    if args.iter().all(|a| matches!(a, PValue::Str(_))) {
        return Ok(PValue::Str(args.iter().map(|a| a.to_string()).collect()));
    }
    arithmetic(args, location, i64::checked_add, |a, b| a + b)
}
fn sub(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    arithmetic(args, location, i64::checked_sub, |a, b| a - b)
}
fn mul(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    arithmetic(args, location, i64::checked_mul, |a, b| a * b)
}
fn div(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    arithmetic(args, location, i64::checked_div, |a, b| a / b)
}
fn modulo(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    arithmetic(args, location, i64::checked_rem, |a, b| a % b)
}
fn exp(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let power = int_arg(args, 1, location)?;
    match number(arg(args, 0), location)? {
        Number::Int(base) => u32::try_from(power)
            .ok()
            .and_then(|p| base.checked_pow(p))
            .map(PValue::Int)
            .ok_or_else(|| RuntimeError::at(location, "exponent out of range")),
        Number::Float(base) => Ok(PValue::Float(base.powi(power.clamp(i32::MIN as i64, i32::MAX as i64) as i32))),
    }
}
fn neg(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    match number(arg(args, 0), location)? {
        Number::Int(i) => i.checked_neg().map(PValue::Int).ok_or_else(|| RuntimeError::at(location, "integer overflow")),
        Number::Float(f) => Ok(PValue::Float(-f)),
    }
}

// ------------- Comparison and logic -------------

pub(crate) fn equal(a: &PValue, b: &PValue) -> bool {
    match (a, b) {
        (PValue::Null, PValue::Null) => true,
        (PValue::Str(x), PValue::Str(y)) => x == y,
        (PValue::Node(x), PValue::Node(y)) => x == y,
        (PValue::List(x), PValue::List(y)) => Rc::ptr_eq(x, y),
        (PValue::Table(x), PValue::Table(y)) => Rc::ptr_eq(x, y),
        (PValue::Sequence(x), PValue::Sequence(y)) => Rc::ptr_eq(x, y),
        _ => match (a.as_float(), b.as_float(), a.as_int(), b.as_int()) {
            (_, _, Some(x), Some(y)) => x == y,
            (Some(x), Some(y), _, _) => x == y,
            _ => false,
        },
    }
}

fn compare(a: &PValue, b: &PValue, location: &Location) -> RunResult<Ordering> {
    let ordering = match (a, b) {
        (PValue::Str(x), PValue::Str(y)) => Some(x.cmp(y)),
        _ => match (number(a, location), number(b, location)) {
            (Ok(Number::Int(x)), Ok(Number::Int(y))) => Some(x.cmp(&y)),
            (Ok(x), Ok(y)) => {
                let as_float = |n: Number| match n {
                    Number::Int(i) => i as f64,
                    Number::Float(f) => f,
                };
                as_float(x).partial_cmp(&as_float(y))
            }
            _ => None,
        },
    };
    ordering.ok_or_else(|| RuntimeError::at(location, format!("cannot compare {} with {}", a.type_name(), b.type_name())))
}

fn eq(_: &mut Interpreter<'_>, args: &[PValue], _: &Location) -> RunResult<PValue> {
    Ok(PValue::Bool(equal(arg(args, 0), arg(args, 1))))
}
fn ne(_: &mut Interpreter<'_>, args: &[PValue], _: &Location) -> RunResult<PValue> {
    Ok(PValue::Bool(!equal(arg(args, 0), arg(args, 1))))
}
fn lt(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    Ok(PValue::Bool(compare(arg(args, 0), arg(args, 1), location)?.is_lt()))
}
fn le(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    Ok(PValue::Bool(compare(arg(args, 0), arg(args, 1), location)?.is_le()))
}
fn gt(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    Ok(PValue::Bool(compare(arg(args, 0), arg(args, 1), location)?.is_gt()))
}
fn ge(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    Ok(PValue::Bool(compare(arg(args, 0), arg(args, 1), location)?.is_ge()))
}
fn not(_: &mut Interpreter<'_>, args: &[PValue], _: &Location) -> RunResult<PValue> {
    Ok(PValue::Bool(!arg(args, 0).truthy()))
}

/// Stops at the first false operand.
fn and(interp: &mut Interpreter<'_>, args: &[PNode], _: &Location) -> RunResult<PValue> {
    for operand in args {
        if !interp.evaluate(operand)?.truthy() {
            return Ok(PValue::Bool(false));
        }
    }
    Ok(PValue::Bool(true))
}

/// Stops at the first true operand.
fn or(interp: &mut Interpreter<'_>, args: &[PNode], _: &Location) -> RunResult<PValue> {
    for operand in args {
        if interp.evaluate(operand)?.truthy() {
            return Ok(PValue::Bool(true));
        }
    }
    Ok(PValue::Bool(false))
}

// ------------- Identifiers -------------

fn set(interp: &mut Interpreter<'_>, args: &[PNode], location: &Location) -> RunResult<PValue> {
    let name = ident_arg(args, 0, location)?;
    let value = interp.evaluate(&args[1])?;
    interp.assign(name, value);
    Ok(PValue::Null)
}

fn step(interp: &mut Interpreter<'_>, args: &[PNode], location: &Location, sign: i64) -> RunResult<PValue> {
    let name = ident_arg(args, 0, location)?;
    let amount = match args.get(1) {
        Some(node) => {
            let value = interp.evaluate(node)?;
            value.as_int().ok_or_else(|| expected("an integer", &value, location))?
        }
        None => 1,
    };
    let current = interp.lookup(name, location)?;
    let current = current.as_int().ok_or_else(|| expected("an integer", &current, location))?;
    let next = current
        .checked_add(sign * amount)
        .ok_or_else(|| RuntimeError::at(location, "integer overflow"))?;
    interp.assign(name, PValue::Int(next));
    Ok(PValue::Null)
}
fn incr(interp: &mut Interpreter<'_>, args: &[PNode], location: &Location) -> RunResult<PValue> {
    step(interp, args, location, 1)
}
fn decr(interp: &mut Interpreter<'_>, args: &[PNode], location: &Location) -> RunResult<PValue> {
    step(interp, args, location, -1)
}

fn list(interp: &mut Interpreter<'_>, args: &[PNode], location: &Location) -> RunResult<PValue> {
    interp.assign(ident_arg(args, 0, location)?, PValue::new_list());
    Ok(PValue::Null)
}
fn table(interp: &mut Interpreter<'_>, args: &[PNode], location: &Location) -> RunResult<PValue> {
    interp.assign(ident_arg(args, 0, location)?, PValue::new_table());
    Ok(PValue::Null)
}
fn indiset(interp: &mut Interpreter<'_>, args: &[PNode], location: &Location) -> RunResult<PValue> {
    interp.assign(ident_arg(args, 0, location)?, PValue::new_sequence());
    Ok(PValue::Null)
}

// ------------- Strings -------------

fn concat(interp: &mut Interpreter<'_>, args: &[PValue], _: &Location) -> RunResult<PValue> {
    Ok(PValue::Str(args.iter().map(|a| interp.render(a)).collect()))
}
fn strlen(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    Ok(PValue::Int(str_arg(args, 0, location)?.chars().count() as i64))
}
fn upper(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    Ok(PValue::Str(str_arg(args, 0, location)?.to_uppercase()))
}
fn lower(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    Ok(PValue::Str(str_arg(args, 0, location)?.to_lowercase()))
}
fn capitalize(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let text = str_arg(args, 0, location)?;
    let mut chars = text.chars();
    Ok(PValue::Str(match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }))
}

/// Characters `from` through `to`, counting from 1.
fn substring(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let text = str_arg(args, 0, location)?;
    let from = int_arg(args, 1, location)?.max(1) as usize;
    let to = int_arg(args, 2, location)?.max(0) as usize;
    if to < from {
        return Ok(PValue::Str(String::new()));
    }
    Ok(PValue::Str(text.chars().skip(from - 1).take(to - from + 1).collect()))
}
fn eqstr(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    Ok(PValue::Bool(str_arg(args, 0, location)? == str_arg(args, 1, location)?))
}
fn strcmp(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let ordering = str_arg(args, 0, location)?.cmp(&str_arg(args, 1, location)?);
    Ok(PValue::Int(ordering as i64))
}

/// Leading optional sign and digits; anything else reads as 0.
fn strtoint(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let text = str_arg(args, 0, location)?;
    let text = text.trim();
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(text.len(), |(i, _)| i);
    Ok(PValue::Int(text[..end].parse().unwrap_or(0)))
}
fn d(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    Ok(PValue::Str(int_arg(args, 0, location)?.to_string()))
}
fn alpha(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let n = int_arg(args, 0, location)?;
    let letter = u8::try_from(n)
        .ok()
        .filter(|n| (1..=26).contains(n))
        .map(|n| char::from(b'a' + n - 1).to_string());
    Ok(PValue::Str(letter.unwrap_or_default()))
}
fn ord(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    const WORDS: [&str; 12] = [
        "first", "second", "third", "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth", "eleventh", "twelfth",
    ];
    let n = int_arg(args, 0, location)?;
    if (1..=12).contains(&n) {
        return Ok(PValue::from(WORDS[n as usize - 1]));
    }
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    Ok(PValue::Str(format!("{}{}", n, suffix)))
}
fn roman(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    const NUMERALS: [(i64, &str); 13] = [
        (1000, "m"), (900, "cm"), (500, "d"), (400, "cd"), (100, "c"), (90, "xc"), (50, "l"),
        (40, "xl"), (10, "x"), (9, "ix"), (5, "v"), (4, "iv"), (1, "i"),
    ];
    let mut n = int_arg(args, 0, location)?;
    if !(1..4000).contains(&n) {
        return Ok(PValue::Str(n.to_string()));
    }
    let mut result = String::new();
    for (value, numeral) in NUMERALS {
        while n >= value {
            result.push_str(numeral);
            n -= value;
        }
    }
    Ok(PValue::Str(result))
}

// ------------- Output -------------

fn print(interp: &mut Interpreter<'_>, args: &[PValue], _: &Location) -> RunResult<PValue> {
    let text: String = args.iter().map(|a| interp.render(a)).collect();
    interp.emit(text);
    Ok(PValue::Null)
}
fn nl(_: &mut Interpreter<'_>, _: &[PValue], _: &Location) -> RunResult<PValue> {
    Ok(PValue::from("\n"))
}
fn sp(_: &mut Interpreter<'_>, _: &[PValue], _: &Location) -> RunResult<PValue> {
    Ok(PValue::from(" "))
}
fn qt(_: &mut Interpreter<'_>, _: &[PValue], _: &Location) -> RunResult<PValue> {
    Ok(PValue::from("\""))
}
fn version(_: &mut Interpreter<'_>, _: &[PValue], _: &Location) -> RunResult<PValue> {
    Ok(PValue::from(env!("CARGO_PKG_VERSION")))
}
fn gettoday(_: &mut Interpreter<'_>, _: &[PValue], _: &Location) -> RunResult<PValue> {
    Ok(PValue::Str(Local::now().format("%-d %b %Y").to_string().to_uppercase()))
}

// ------------- Lists and tables -------------

/// Adds to the front.
fn push(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    list_arg(args, 0, location)?.borrow_mut().push_front(arg(args, 1).clone());
    Ok(PValue::Null)
}
/// Adds to the back.
fn enqueue(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    list_arg(args, 0, location)?.borrow_mut().push_back(arg(args, 1).clone());
    Ok(PValue::Null)
}
/// Removes from the front; `pop` and `dequeue` both use it.
fn dequeue(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    Ok(list_arg(args, 0, location)?.borrow_mut().pop_front().unwrap_or_default())
}
fn getel(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let list = list_arg(args, 0, location)?;
    let index = int_arg(args, 1, location)?;
    let element = usize::try_from(index - 1).ok().and_then(|i| list.borrow().get(i).cloned());
    Ok(element.unwrap_or_default())
}
/// Sets element `n`, counting from 1. Setting element `length + 1` appends.
fn setel(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let list = list_arg(args, 0, location)?;
    let position = int_arg(args, 1, location)?;
    let mut list = list.borrow_mut();
    let index = position
        .checked_sub(1)
        .and_then(|i| usize::try_from(i).ok())
        .filter(|&i| i <= list.len())
        .ok_or_else(|| RuntimeError::at(location, format!("list index {} is out of range 1..={}", position, list.len() + 1)))?;
    let value = arg(args, 2).clone();
    if index == list.len() {
        list.push_back(value);
    } else {
        list[index] = value;
    }
    Ok(PValue::Null)
}
fn length(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let length = match arg(args, 0) {
        PValue::List(list) => list.borrow().len(),
        PValue::Table(table) => table.borrow().len(),
        PValue::Sequence(sequence) => sequence.borrow().len(),
        PValue::Str(s) => s.chars().count(),
        other => return Err(expected("a list, table or set", other, location)),
    };
    Ok(PValue::Int(length as i64))
}
fn empty(interp: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let length = length(interp, args, location)?;
    Ok(PValue::Bool(length.as_int() == Some(0)))
}
fn insert(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let table = table_arg(args, 0, location)?;
    let key = str_arg(args, 1, location)?;
    table.borrow_mut().insert(key, arg(args, 2).clone());
    Ok(PValue::Null)
}
fn lookup(_: &mut Interpreter<'_>, args: &[PValue], location: &Location) -> RunResult<PValue> {
    let table = table_arg(args, 0, location)?;
    let key = str_arg(args, 1, location)?;
    let value = table.borrow().get(&key).cloned();
    Ok(value.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_and_unique() {
        for pair in BUILTINS.windows(2) {
            assert!(pair[0].name < pair[1].name, "{} must sort before {}", pair[0].name, pair[1].name);
        }
    }

    #[test]
    fn lookup_finds_operators() {
        for name in ["add", "sub", "mul", "div", "mod", "eq", "ne", "lt", "le", "gt", "ge", "and", "or", "not", "neg"] {
            assert!(lookup_builtin(name).is_some(), "missing builtin {}", name);
        }
        assert!(lookup_builtin("foo").is_none());
    }

    #[test]
    fn equality_crosses_number_types() {
        assert!(equal(&PValue::Int(2), &PValue::Float(2.0)));
        assert!(!equal(&PValue::Int(2), &PValue::from("2")));
        assert!(equal(&PValue::Null, &PValue::Null));
    }
}
