// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic and payload mapping to tags and fields.
//!
//! A rule's pattern is searched in the topic string. Capture groups decide
//! where the pieces of the topic end up:
//!
//! - named groups (`(?P<room>\w+)`) become tags keyed by the group name,
//! - unnamed groups are joined with `.` to form the field name,
//! - without unnamed groups the last topic segment is the field name.
//!
//! The payload is then either a measurement value (float or boolean) stored
//! under that field name, or an event marker: the field name is demoted to a
//! tag carrying the payload text and a single `occurred=true` field is
//! emitted instead.

use crate::record::{FieldValue, EVENT_FIELD};
use regex::Regex;
use std::collections::BTreeMap;

/// Tag set and field set extracted from one message.
pub type TagsAndFields = (BTreeMap<String, String>, BTreeMap<String, FieldValue>);

/// Field name used when the topic has no non-empty segment.
const FALLBACK_FIELD: &str = "value";

/// How a payload is stored.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadKind {
    /// A numeric or boolean reading, stored as a field.
    Value(FieldValue),
    /// Anything else, stored as a tag value with `occurred=true`.
    Event(String),
}

/// Classify a raw payload.
///
/// Numbers must parse as a finite `f64`. Booleans are `t`, `true`, `f`,
/// `false` in lower, title or upper case (`1`/`0` are numbers). No trimming
/// is applied.
pub fn classify_payload(payload: &[u8]) -> PayloadKind {
    let text = String::from_utf8_lossy(payload);

    if let Ok(v) = text.parse::<f64>() {
        if v.is_finite() {
            return PayloadKind::Value(FieldValue::Float(v));
        }
    }

    if let Some(b) = parse_bool(&text) {
        return PayloadKind::Value(FieldValue::Boolean(b));
    }

    PayloadKind::Event(text.into_owned())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "t" | "T" | "true" | "True" | "TRUE" => Some(true),
        "f" | "F" | "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Search `pattern` in `topic` and build tags and fields for `payload`.
///
/// Returns `None` when the pattern does not match. A match always yields at
/// least one field.
pub fn gather(pattern: &Regex, topic: &str, payload: &[u8]) -> Option<TagsAndFields> {
    let captures = pattern.captures(topic)?;

    let mut tags = BTreeMap::new();
    let mut unnamed = Vec::new();

    for (i, name) in pattern.capture_names().enumerate().skip(1) {
        let text = captures.get(i).map_or("", |m| m.as_str());
        match name {
            Some(name) => {
                tags.insert(name.to_string(), text.to_string());
            }
            None => unnamed.push(text),
        }
    }

    let mut field_name = unnamed.join(".");
    if field_name.is_empty() {
        field_name = last_segment(topic).to_string();
    }

    let mut fields = BTreeMap::new();
    match classify_payload(payload) {
        PayloadKind::Value(value) => {
            // a name is either a tag or a field
            tags.remove(&field_name);
            fields.insert(field_name, value);
        }
        PayloadKind::Event(text) => {
            tags.insert(field_name, text);
            fields.insert(EVENT_FIELD.to_string(), FieldValue::Boolean(true));
        }
    }

    Some((tags, fields))
}

/// Last non-empty `/`-delimited segment of a topic.
fn last_segment(topic: &str) -> &str {
    topic
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or(FALLBACK_FIELD)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(pattern: &str, topic: &str, payload: &str) -> Option<TagsAndFields> {
        let re = Regex::new(pattern).expect("valid pattern");
        gather(&re, topic, payload.as_bytes())
    }

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn float(name: &str, v: f64) -> BTreeMap<String, FieldValue> {
        BTreeMap::from([(name.to_string(), FieldValue::Float(v))])
    }

    fn occurred() -> BTreeMap<String, FieldValue> {
        BTreeMap::from([(EVENT_FIELD.to_string(), FieldValue::Boolean(true))])
    }

    #[test]
    fn test_no_match_yields_nothing() {
        assert!(run(r"/foo/\w+", "/hi/there", "1.3").is_none());
    }

    #[test]
    fn test_no_groups_uses_last_segment() {
        assert_eq!(run(r"/foo/\w+", "/foo/bar", "1.3"), Some((tags(&[]), float("bar", 1.3))));
        assert_eq!(
            run(r"/foo/bar/\w+", "/foo/bar/muh", "-5"),
            Some((tags(&[]), float("muh", -5.0)))
        );
    }

    #[test]
    fn test_single_unnamed_group_is_field_name() {
        assert_eq!(
            run(r"/foo/bar/(\w+)", "/foo/bar/muh", "1.4"),
            Some((tags(&[]), float("muh", 1.4)))
        );
        assert_eq!(
            run(r"/foo/(bar)/\w+", "/foo/bar/muh", "1.4"),
            Some((tags(&[]), float("bar", 1.4)))
        );
        assert_eq!(
            run(r"/foo/(\w+)/\w+", "/foo/bazz/muh", "1.4"),
            Some((tags(&[]), float("bazz", 1.4)))
        );
    }

    #[test]
    fn test_unnamed_groups_are_joined_with_dot() {
        assert_eq!(
            run(r"/foo/(\w+)/(\w+)", "/foo/bazz/muh", "1.4"),
            Some((tags(&[]), float("bazz.muh", 1.4)))
        );
    }

    #[test]
    fn test_named_groups_become_tags() {
        assert_eq!(
            run(r"/foo/(?P<YOLO>\w+)/\w+", "/foo/bar/muh", "1.4"),
            Some((tags(&[("YOLO", "bar")]), float("muh", 1.4)))
        );
        assert_eq!(
            run(r"/foo/(?P<YOLO>\w+)/(?P<ALF>\w+)/\w+", "/foo/bar/2/muh", "1.4"),
            Some((tags(&[("YOLO", "bar"), ("ALF", "2")]), float("muh", 1.4)))
        );
    }

    #[test]
    fn test_named_and_unnamed_groups_combined() {
        assert_eq!(
            run(r"/foo/(?P<YOLO>\w+)/(?P<ALF>\w+)/(\w+)", "/foo/bar/2/muh", "1.4"),
            Some((tags(&[("YOLO", "bar"), ("ALF", "2")]), float("muh", 1.4)))
        );
        // unanchored search: trailing segments outside the match are ignored
        assert_eq!(
            run(r"/foo/(?P<YOLO>\w+)/(?P<ALF>\w+)/(\w+)", "/foo/bar/2/muh/goo", "1.4"),
            Some((tags(&[("YOLO", "bar"), ("ALF", "2")]), float("muh", 1.4)))
        );
        assert_eq!(
            run(r"/foo/(?P<YOLO>\w+)/(?P<ALF>\w+)/(\w+)/(\w+)", "/foo/bar/2/muh/goo", "1.4"),
            Some((tags(&[("YOLO", "bar"), ("ALF", "2")]), float("muh.goo", 1.4)))
        );
    }

    #[test]
    fn test_interleaved_named_group_does_not_break_field_order() {
        assert_eq!(
            run(r"/(\w+)/(?P<mid>\w+)/(\w+)", "/a/b/c", "7"),
            Some((tags(&[("mid", "b")]), float("a.c", 7.0)))
        );
    }

    #[test]
    fn test_boolean_payloads_are_values() {
        assert_eq!(
            run(r"/foo/\w+", "/foo/bar", "false"),
            Some((
                tags(&[]),
                BTreeMap::from([("bar".to_string(), FieldValue::Boolean(false))])
            ))
        );
        assert_eq!(
            run(r"/foo/(?P<YOLO>\w+)/(?P<ALF>\w+)/(\w+)/(\w+)", "/foo/bar/2/muh/goo", "true"),
            Some((
                tags(&[("YOLO", "bar"), ("ALF", "2")]),
                BTreeMap::from([("muh.goo".to_string(), FieldValue::Boolean(true))])
            ))
        );
    }

    #[test]
    fn test_event_payload_becomes_tag() {
        assert_eq!(
            run(r"/foo/\w+", "/foo/bar", "wat"),
            Some((tags(&[("bar", "wat")]), occurred()))
        );
        assert_eq!(
            run(r"/(foo)/\w+", "/foo/bar", "wat"),
            Some((tags(&[("foo", "wat")]), occurred()))
        );
        assert_eq!(
            run(r"/(foo)/(\w+)", "/foo/bar", "wat"),
            Some((tags(&[("foo.bar", "wat")]), occurred()))
        );
        assert_eq!(
            run(r"/(foo)/(?P<lol>\d)/(\w+)", "/foo/1/bar", "wat"),
            Some((tags(&[("foo.bar", "wat"), ("lol", "1")]), occurred()))
        );
    }

    #[test]
    fn test_boolean_spellings() {
        let boolean = |b| PayloadKind::Value(FieldValue::Boolean(b));
        for s in ["t", "T", "true", "True", "TRUE"] {
            assert_eq!(classify_payload(s.as_bytes()), boolean(true), "{:?}", s);
        }
        for s in ["f", "F", "false", "False", "FALSE"] {
            assert_eq!(classify_payload(s.as_bytes()), boolean(false), "{:?}", s);
        }
        for s in ["tRuE", "fAlSe", "yes", " true", "true\n"] {
            assert_eq!(classify_payload(s.as_bytes()), PayloadKind::Event(s.to_string()));
        }
    }

    #[test]
    fn test_single_letter_boolean_is_value() {
        assert_eq!(
            run(r"/foo/\w+", "/foo/bar", "T"),
            Some((
                tags(&[]),
                BTreeMap::from([("bar".to_string(), FieldValue::Boolean(true))])
            ))
        );
    }

    #[test]
    fn test_numeric_classification() {
        assert_eq!(classify_payload(b"1"), PayloadKind::Value(FieldValue::Float(1.0)));
        assert_eq!(classify_payload(b"-2.5e3"), PayloadKind::Value(FieldValue::Float(-2500.0)));
        for s in ["NaN", "inf", "-infinity", "1e400", "", "1,5"] {
            assert_eq!(classify_payload(s.as_bytes()), PayloadKind::Event(s.to_string()));
        }
    }

    #[test]
    fn test_non_utf8_payload_is_lossy_event() {
        let re = Regex::new(r"/foo/\w+").expect("valid pattern");
        let (tags, fields) = gather(&re, "/foo/bar", &[0xff, b'o', b'k']).expect("match");
        assert_eq!(tags.get("bar").map(String::as_str), Some("\u{fffd}ok"));
        assert_eq!(fields, occurred());
    }

    #[test]
    fn test_field_wins_over_colliding_tag() {
        assert_eq!(
            run(r"/foo/(?P<bar>\w+)", "/foo/bar", "3"),
            Some((tags(&[]), float("bar", 3.0)))
        );
        // the event tag replaces the named tag of the same name
        assert_eq!(
            run(r"/foo/(?P<bar>\w+)", "/foo/bar", "on"),
            Some((tags(&[("bar", "on")]), occurred()))
        );
    }

    #[test]
    fn test_empty_field_name_falls_back() {
        // optional unnamed group that did not participate
        assert_eq!(
            run(r"/foo/(x)?\w+", "/foo/bar", "1"),
            Some((tags(&[]), float("bar", 1.0)))
        );
        assert_eq!(run(r"/foo/", "/foo/bar/", "1"), Some((tags(&[]), float("bar", 1.0))));
        assert_eq!(run(r"^/+$", "///", "1"), Some((tags(&[]), float("value", 1.0))));
    }
}
