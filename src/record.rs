//! Record kinds, keys and cross-reference strings.

use std::cmp::Ordering;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref XREF: Regex = Regex::new(r"^@([^@\s]+)@$").unwrap();
    static ref NUMBERED_KEY: Regex = Regex::new(r"^([A-Za-z])([0-9]+)$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Person,
    Family,
    Source,
    Event,
    Other,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Person,
        RecordKind::Family,
        RecordKind::Source,
        RecordKind::Event,
        RecordKind::Other,
    ];

    /// Kind of a record root, decided by its tag.
    pub fn from_tag(tag: &str) -> RecordKind {
        match tag {
            "INDI" => RecordKind::Person,
            "FAM" => RecordKind::Family,
            "SOUR" => RecordKind::Source,
            "EVEN" => RecordKind::Event,
            _ => RecordKind::Other,
        }
    }
    /// The root tag a record of this kind must carry; `Other` accepts any tag.
    pub fn tag(self) -> Option<&'static str> {
        match self {
            RecordKind::Person => Some("INDI"),
            RecordKind::Family => Some("FAM"),
            RecordKind::Source => Some("SOUR"),
            RecordKind::Event => Some("EVEN"),
            RecordKind::Other => None,
        }
    }
    /// Key letter of allocated keys.
    pub fn letter(self) -> char {
        match self {
            RecordKind::Person => 'I',
            RecordKind::Family => 'F',
            RecordKind::Source => 'S',
            RecordKind::Event => 'E',
            RecordKind::Other => 'X',
        }
    }
    pub fn from_letter(letter: char) -> Option<RecordKind> {
        RecordKind::ALL.into_iter().find(|kind| kind.letter() == letter)
    }
    pub fn index(self) -> usize {
        self as usize
    }
    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Person => "person",
            RecordKind::Family => "family",
            RecordKind::Source => "source",
            RecordKind::Event => "event",
            RecordKind::Other => "other",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

impl Sex {
    pub fn from_value(value: Option<&str>) -> Sex {
        match value.map(str::trim) {
            Some("M") | Some("m") => Sex::Male,
            Some("F") | Some("f") => Sex::Female,
            _ => Sex::Unknown,
        }
    }
}

/// True when `value` has the form `@KEY@`.
pub fn is_xref(value: &str) -> bool {
    XREF.is_match(value)
}

/// `@I12@` -> `I12`.
pub fn xref_to_key(value: &str) -> Option<&str> {
    XREF.captures(value).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// `I12` -> `@I12@`.
pub fn key_to_xref(key: &str) -> String {
    format!("@{}@", key)
}

/// Splits a key such as `F7` into its letter and numeric suffix.
/// Keys that do not follow the letter + digits pattern, or use suffix zero, yield `None`.
pub fn key_number(key: &str) -> Option<(char, u32)> {
    let captures = NUMBERED_KEY.captures(key)?;
    let letter = captures.get(1)?.as_str().chars().next()?.to_ascii_uppercase();
    let number: u32 = captures.get(2)?.as_str().parse().ok()?;
    if number == 0 { None } else { Some((letter, number)) }
}

pub fn format_key(kind: RecordKind, number: u32) -> String {
    format!("{}{}", kind.letter(), number)
}

/// Database key order: numbered keys by letter then number, anything else after them by text.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (key_number(a), key_number(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
