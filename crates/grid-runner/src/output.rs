//! Parser for the report the subject prints on stdout.
//!
//! The subject prints one `label : value [unit]` pair per line, some of them
//! behind tree-drawing decorations:
//!
//! ```text
//! Scenario            : MutexVector
//! Total test time     : 1520 ms
//! Execution time      : 1498 ms
//!  ├──Write evnt time : 412 ms
//! Cache memory usage  : 1,234,567 bytes
//! ```
//!
//! Which labels are required, and how each value is shaped, lives in
//! [`FIELDS`]. Supporting a new line is an entry there plus a field on
//! [`RunResult`].

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// One successful invocation of the subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub total_time_ms: f64,
    pub exec_time_ms: f64,
    pub write_time_ms: f64,
    pub read_time_ms: f64,
    pub cache_memory_bytes: u64,
    pub global_memory_bytes: u64,
    pub event_count: u64,
    pub thread_count: u64,
    pub min_size: u64,
    pub max_size: u64,
    pub cache_capacity: u64,
    pub global_capacity: u64,
    pub scenario: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("missing field {field} (expected a '{label}' line)")]
    MissingField {
        field: &'static str,
        label: &'static str,
    },
    #[error("field {field} has malformed value '{value}'")]
    InvalidValue { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Float,
    Text,
    /// `<integer> and <integer>`
    IntegerRange,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: &'static str,
    pub label: &'static str,
    pub kind: ValueKind,
    pub unit: Option<&'static str>,
}

const fn field_spec(
    field: &'static str,
    label: &'static str,
    kind: ValueKind,
    unit: Option<&'static str>,
) -> FieldSpec {
    FieldSpec {
        field,
        label,
        kind,
        unit,
    }
}

pub const FIELDS: &[FieldSpec] = &[
    field_spec("scenario", "Scenario", ValueKind::Text, None),
    field_spec("total_time_ms", "Total test time", ValueKind::Float, Some("ms")),
    field_spec("exec_time_ms", "Execution time", ValueKind::Float, Some("ms")),
    field_spec("write_time_ms", "Write evnt time", ValueKind::Float, Some("ms")),
    field_spec("read_time_ms", "Read evnt time", ValueKind::Float, Some("ms")),
    field_spec(
        "cache_memory_bytes",
        "Cache memory usage",
        ValueKind::Integer,
        Some("bytes"),
    ),
    field_spec(
        "global_memory_bytes",
        "Global memory usage",
        ValueKind::Integer,
        Some("bytes"),
    ),
    field_spec("event_count", "Events", ValueKind::Integer, Some("events")),
    field_spec("thread_count", "Threads", ValueKind::Integer, Some("threads")),
    field_spec(
        "payload_size",
        "Size between",
        ValueKind::IntegerRange,
        Some("bytes"),
    ),
    field_spec(
        "cache_capacity",
        "Cache capacity",
        ValueKind::Integer,
        Some("items"),
    ),
    field_spec("global_capacity", "Capacity", ValueKind::Integer, Some("items")),
];

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Integer(u64),
    Float(f64),
    Text(String),
    Range(u64, u64),
}

/// Parse one captured stdout. Every field in [`FIELDS`] must be present and
/// well formed; there is no partial result.
pub fn parse_output(output: &str) -> Result<RunResult, ParseError> {
    let lines = labelled_lines(output);
    let mut values: BTreeMap<&'static str, Value> = BTreeMap::new();
    for spec in FIELDS {
        let raw = lines
            .get(spec.label)
            .ok_or(ParseError::MissingField {
                field: spec.field,
                label: spec.label,
            })?;
        values.insert(spec.field, extract(spec, raw)?);
    }
    let mut record = Record(values);
    let (min_size, max_size) = record.range("payload_size");
    Ok(RunResult {
        total_time_ms: record.float("total_time_ms"),
        exec_time_ms: record.float("exec_time_ms"),
        write_time_ms: record.float("write_time_ms"),
        read_time_ms: record.float("read_time_ms"),
        cache_memory_bytes: record.integer("cache_memory_bytes"),
        global_memory_bytes: record.integer("global_memory_bytes"),
        event_count: record.integer("event_count"),
        thread_count: record.integer("thread_count"),
        min_size,
        max_size,
        cache_capacity: record.integer("cache_capacity"),
        global_capacity: record.integer("global_capacity"),
        scenario: record.text("scenario"),
    })
}

/// Typed access to values already checked against [`FIELDS`]. A kind mismatch
/// here means the table and [`parse_output`] disagree, which is a bug rather
/// than bad input.
struct Record(BTreeMap<&'static str, Value>);

impl Record {
    fn integer(&mut self, field: &str) -> u64 {
        match self.0.remove(field) {
            Some(Value::Integer(v)) => v,
            other => unreachable!("{field} is not an integer field: {other:?}"),
        }
    }

    fn float(&mut self, field: &str) -> f64 {
        match self.0.remove(field) {
            Some(Value::Float(v)) => v,
            other => unreachable!("{field} is not a float field: {other:?}"),
        }
    }

    fn text(&mut self, field: &str) -> String {
        match self.0.remove(field) {
            Some(Value::Text(v)) => v,
            other => unreachable!("{field} is not a text field: {other:?}"),
        }
    }

    fn range(&mut self, field: &str) -> (u64, u64) {
        match self.0.remove(field) {
            Some(Value::Range(lo, hi)) => (lo, hi),
            other => unreachable!("{field} is not a range field: {other:?}"),
        }
    }
}

/// Label -> raw value for every `label : value` line. First occurrence wins.
fn labelled_lines(output: &str) -> BTreeMap<&str, &str> {
    let mut out = BTreeMap::new();
    for line in output.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let label = label
            .trim_start_matches(|c: char| c.is_whitespace() || is_tree_glyph(c))
            .trim_end();
        if label.is_empty() {
            continue;
        }
        out.entry(label).or_insert_with(|| value.trim());
    }
    out
}

fn is_tree_glyph(c: char) -> bool {
    matches!(c, '├' | '└' | '─' | '│')
}

fn extract(spec: &FieldSpec, raw: &str) -> Result<Value, ParseError> {
    let invalid = || ParseError::InvalidValue {
        field: spec.field,
        value: raw.to_string(),
    };
    let body = match spec.unit {
        Some(unit) => raw
            .strip_suffix(unit)
            .and_then(|rest| rest.strip_suffix(char::is_whitespace))
            .map(str::trim_end)
            .ok_or_else(invalid)?,
        None => raw,
    };
    match spec.kind {
        ValueKind::Integer => parse_grouped_integer(body).map(Value::Integer),
        ValueKind::Float => parse_grouped_float(body).map(Value::Float),
        ValueKind::Text => parse_word(body).map(|s| Value::Text(s.to_string())),
        ValueKind::IntegerRange => {
            let mut parts = body.split_whitespace();
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(lo), Some("and"), Some(hi), None) => {
                    match (parse_grouped_integer(lo), parse_grouped_integer(hi)) {
                        (Some(lo), Some(hi)) => Some(Value::Range(lo, hi)),
                        _ => None,
                    }
                }
                _ => None,
            }
        }
    }
    .ok_or_else(invalid)
}

/// Digits, optionally grouped by commas in threes: `1234`, `1,234`, `12,345,678`.
pub fn parse_grouped_integer(s: &str) -> Option<u64> {
    let mut groups = s.split(',');
    let head = groups.next()?;
    if head.is_empty() || !head.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut digits = head.to_string();
    let mut grouped = false;
    for group in groups {
        if group.len() != 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        grouped = true;
        digits.push_str(group);
    }
    if grouped && head.len() > 3 {
        return None;
    }
    digits.parse().ok()
}

fn parse_grouped_float(s: &str) -> Option<f64> {
    let (whole, fraction) = match s.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (s, None),
    };
    let whole = parse_grouped_integer(whole)?;
    match fraction {
        None => Some(whole as f64),
        Some(f) if !f.is_empty() && f.bytes().all(|b| b.is_ascii_digit()) => {
            format!("{whole}.{f}").parse().ok()
        }
        Some(_) => None,
    }
}

fn parse_word(s: &str) -> Option<&str> {
    let ok = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    ok.then_some(s)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A report shaped exactly like the subject's.
    pub(crate) fn sample_report() -> String {
        "\
Scenario            : MutexVector
=============================================================
Total test time     : 1520 ms
Execution time      : 1498 ms
 ├──Write evnt time : 412 ms
 ├──Read evnt time  : 1086 ms
 └──Read/Write ratio: 6
Cache memory usage  : 1,234,567 bytes
 └──Cache capacity  : 128 items
Global memory usage : 98,765,432 bytes
 └──Capacity        : 1,024 items
Events              : 500,000 events
 └──Size between    : 173 and 3,538 bytes
Threads             : 12 threads
"
        .to_string()
    }

    #[test]
    fn parses_every_field_of_a_well_formed_report() {
        let result = parse_output(&sample_report()).expect("report should parse");
        assert_eq!(
            result,
            RunResult {
                total_time_ms: 1520.0,
                exec_time_ms: 1498.0,
                write_time_ms: 412.0,
                read_time_ms: 1086.0,
                cache_memory_bytes: 1_234_567,
                global_memory_bytes: 98_765_432,
                event_count: 500_000,
                thread_count: 12,
                min_size: 173,
                max_size: 3538,
                cache_capacity: 128,
                global_capacity: 1024,
                scenario: "MutexVector".to_string(),
            }
        );
    }

    #[test]
    fn missing_any_label_is_a_parse_error() {
        let report = sample_report();
        for spec in FIELDS {
            let stripped: String = report
                .lines()
                .filter(|line| {
                    let label = line
                        .split_once(':')
                        .map(|(l, _)| {
                            l.trim_start_matches(|c: char| c.is_whitespace() || is_tree_glyph(c))
                                .trim_end()
                        })
                        .unwrap_or("");
                    label != spec.label
                })
                .map(|line| format!("{line}\n"))
                .collect();
            let err = parse_output(&stripped).expect_err("stripped report must fail");
            assert_eq!(
                err,
                ParseError::MissingField {
                    field: spec.field,
                    label: spec.label
                },
                "without '{}'",
                spec.label
            );
        }
    }

    #[test]
    fn capacity_label_does_not_match_cache_capacity_line() {
        let report = sample_report().replace(" └──Capacity        : 1,024 items\n", "");
        let err = parse_output(&report).expect_err("global capacity is missing");
        assert!(err.to_string().contains("global_capacity"), "{err}");
    }

    #[test]
    fn wrong_unit_is_invalid() {
        let report = sample_report().replace("1498 ms", "1498 s");
        assert_eq!(
            parse_output(&report).expect_err("unit mismatch"),
            ParseError::InvalidValue {
                field: "exec_time_ms",
                value: "1498 s".to_string()
            }
        );
    }

    #[test]
    fn non_numeric_value_is_invalid() {
        let report = sample_report().replace("12 threads", "many threads");
        let err = parse_output(&report).expect_err("threads not numeric");
        assert!(matches!(
            err,
            ParseError::InvalidValue {
                field: "thread_count",
                ..
            }
        ));
    }

    #[test]
    fn malformed_size_range_is_invalid() {
        let report = sample_report().replace("173 and 3,538 bytes", "173 to 3,538 bytes");
        let err = parse_output(&report).expect_err("range malformed");
        assert!(matches!(
            err,
            ParseError::InvalidValue {
                field: "payload_size",
                ..
            }
        ));
    }

    #[test]
    fn first_occurrence_of_a_label_wins() {
        let report = format!("{}Threads             : 99 threads\n", sample_report());
        let result = parse_output(&report).expect("parse");
        assert_eq!(result.thread_count, 12);
    }

    #[test]
    fn fractional_timings_are_accepted() {
        let report = sample_report().replace("412 ms", "412.75 ms");
        let result = parse_output(&report).expect("parse");
        assert_eq!(result.write_time_ms, 412.75);
    }

    #[test]
    fn grouped_integers() {
        assert_eq!(parse_grouped_integer("1,234,567"), Some(1_234_567));
        assert_eq!(parse_grouped_integer("1234567"), Some(1_234_567));
        assert_eq!(parse_grouped_integer("0"), Some(0));
        assert_eq!(parse_grouped_integer("999,000"), Some(999_000));
        assert_eq!(parse_grouped_integer("1,23"), None);
        assert_eq!(parse_grouped_integer("1234,567"), None);
        assert_eq!(parse_grouped_integer(",123"), None);
        assert_eq!(parse_grouped_integer("12a"), None);
        assert_eq!(parse_grouped_integer("-5"), None);
        assert_eq!(parse_grouped_integer(""), None);
    }

    #[test]
    fn empty_output_reports_first_field() {
        assert_eq!(
            parse_output("").expect_err("nothing to parse"),
            ParseError::MissingField {
                field: "scenario",
                label: "Scenario"
            }
        );
    }
}
