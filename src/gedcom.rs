//! Reading and writing the line-oriented record text format:
//! `<level> [@key@] <tag> [value]`, children one level deeper than their parent.

use std::fmt::Write;

use crate::errlog::{DiagnosticKind, ErrorLog};
use crate::node::{NodeArena, NodeId};
use crate::record::xref_to_key;

/// A record root together with the line it started on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootRecord {
    pub root: NodeId,
    pub line: usize,
}

struct Line<'a> {
    level: usize,
    key: Option<&'a str>,
    tag: &'a str,
    value: Option<&'a str>,
}

fn parse_line(text: &str) -> Result<Line<'_>, String> {
    let text = text.trim_start();
    let (level, rest) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
    let level: usize = level
        .parse()
        .map_err(|_| format!("expected a level number, found {:?}", level))?;
    let rest = rest.trim_start();
    let (mut first, mut rest) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let mut key = None;
    if first.starts_with('@') {
        key = Some(xref_to_key(first).ok_or_else(|| format!("malformed key {:?}", first))?);
        let remainder = rest.trim_start();
        (first, rest) = remainder.split_once(char::is_whitespace).unwrap_or((remainder, ""));
    }
    if first.is_empty() {
        return Err("missing tag".to_string());
    }
    let value = if rest.is_empty() { None } else { Some(rest) };
    Ok(Line { level, key, tag: first, value })
}

/// Reads record text into a fresh arena. Malformed lines are reported to
/// `log` as structural diagnostics and skipped.
pub fn read_records(text: &str, source: &str, log: &mut ErrorLog) -> (NodeArena, Vec<RootRecord>) {
    let mut nodes = NodeArena::new();
    let mut roots = Vec::new();
    // open ancestors of the next line, indexed by level
    let mut open: Vec<NodeId> = Vec::new();
    for (number, raw) in text.lines().enumerate() {
        let number = number + 1;
        let raw = raw.trim_end_matches('\r').trim_start_matches('\u{feff}');
        if raw.trim().is_empty() {
            continue;
        }
        let line = match parse_line(raw) {
            Ok(line) => line,
            Err(message) => {
                log.report(DiagnosticKind::Structural, Some(source), Some(number), message);
                continue;
            }
        };
        if line.level == 0 {
            let root = nodes.create(line.key, line.tag, line.value);
            nodes.set_line(root, number);
            roots.push(RootRecord { root, line: number });
            open.clear();
            open.push(root);
            continue;
        }
        if line.key.is_some() {
            log.report(DiagnosticKind::Structural, Some(source), Some(number), "only level 0 lines may carry a key");
            continue;
        }
        if open.is_empty() {
            log.report(DiagnosticKind::Structural, Some(source), Some(number), "line appears before any record");
            continue;
        }
        if line.level > open.len() {
            log.report(
                DiagnosticKind::Structural,
                Some(source),
                Some(number),
                format!("illegal level jump to {}", line.level),
            );
            continue;
        }
        open.truncate(line.level);
        let parent = open[line.level - 1];
        let node = nodes.create(None, line.tag, line.value);
        nodes.set_line(node, number);
        nodes.append_child(parent, node);
        open.push(node);
    }
    (nodes, roots)
}

/// Renders a record (or any subtree) back to text, one node per line.
pub fn write_record(nodes: &NodeArena, root: NodeId) -> String {
    let mut out = String::new();
    for (id, level) in nodes.traverse(root) {
        let Some(node) = nodes.get(id) else { continue };
        let _ = write!(out, "{}", level);
        if let Some(key) = &node.key {
            let _ = write!(out, " @{}@", key);
        }
        let _ = write!(out, " {}", node.tag);
        if let Some(value) = &node.value {
            let _ = write!(out, " {}", value);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_nested_lines() {
        let mut log = ErrorLog::new();
        let text = "0 HEAD\n0 @I1@ INDI\n1 NAME John /Smith/\n1 BIRT\n2 DATE 1 JAN 1900\n1 SEX M\n0 TRLR\n";
        let (nodes, roots) = read_records(text, "test.ged", &mut log);
        assert!(log.is_empty(), "{}", log);
        assert_eq!(roots.len(), 3);
        let person = roots[1].root;
        assert_eq!(roots[1].line, 2);
        assert_eq!(nodes.key(person), Some("I1"));
        let birth = nodes.child_with_tag(person, "BIRT").expect("birth");
        let date = nodes.child_with_tag(birth, "DATE").expect("date");
        assert_eq!(nodes.value(date), Some("1 JAN 1900"));
        assert_eq!(write_record(&nodes, person), "0 @I1@ INDI\n1 NAME John /Smith/\n1 BIRT\n2 DATE 1 JAN 1900\n1 SEX M\n");
    }

    #[test]
    fn reports_level_jumps() {
        let mut log = ErrorLog::new();
        let (_, roots) = read_records("0 @I1@ INDI\n2 DATE 1900\nx NAME\n", "bad.ged", &mut log);
        assert_eq!(roots.len(), 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.iter().next().map(|d| d.line), Some(Some(2)));
    }
}
