use std::collections::BTreeMap;

use envline::{Entry, Error, ParseErrorKind, ParseMode, parse_bytes, parse_str, parse_str_with_mode};

#[test]
fn parses_basic_fixture() {
    let fixture = include_str!("fixtures/basic.env");
    let map = to_map(parse_str(fixture).expect("fixture should parse"));

    assert_eq!(map.len(), 16);
    assert_eq!(map["BASIC"], "basic");
    assert_eq!(map["EMPTY"], "");
    assert_eq!(map["EMPTY_QUOTED"], "");
    assert_eq!(map["INLINE_COMMENT"], "value");
    assert_eq!(map["HASH_GLUED"], "value");
    assert_eq!(map["QUOTED"], "hello world");
    assert_eq!(map["SINGLE_QUOTED"], "hello world");
    assert_eq!(map["HASH_IN_QUOTES"], "color #fff");
    assert_eq!(map["LITERAL_ESCAPE"], r"line1\nline2");
    assert_eq!(map["PADDED_KEY"], "padded");
    assert_eq!(map["TRUNCATED"], "first");
    assert_eq!(map["WITH-HYPHEN"], "ok");
    assert_eq!(map["EQUALS_IN_VALUE"], "a=b=c");
    assert_eq!(map["EXPORTED"], "1");
    assert_eq!(map["EXPORT_SPACED"], "a b c");
    assert_eq!(map["exportNOT_A_PREFIX"], "kept");
}

#[test]
fn malformed_fixture_keeps_only_good_lines() {
    let fixture = include_str!("fixtures/malformed.env");
    let entries = parse_str(fixture).expect("lenient parse should succeed");

    let lines: Vec<_> = entries
        .iter()
        .map(|entry| (entry.key.as_str(), entry.line))
        .collect();
    assert_eq!(lines, [("GOOD_BEFORE", 1), ("GOOD_AFTER", 9)]);
}

#[test]
fn malformed_fixture_fails_strictly_on_first_bad_line() {
    let fixture = include_str!("fixtures/malformed.env");
    let err = parse_str_with_mode(fixture, ParseMode::Strict).expect_err("expected parse error");

    match err {
        Error::Parse(parse_err) => {
            assert_eq!(parse_err.line, 2);
            assert_eq!(parse_err.kind, ParseErrorKind::InvalidKey);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn parses_mixed_line_endings_fixture() {
    let fixture = include_bytes!("fixtures/line-endings.env");
    let map = to_map(parse_bytes(fixture).expect("fixture should parse"));

    assert_eq!(map.len(), 3);
    assert_eq!(map["WINDOWS"], "crlf");
    assert_eq!(map["OLD_MAC"], "cr");
    assert_eq!(map["UNIX"], "lf");
}

fn to_map(entries: Vec<Entry>) -> BTreeMap<String, String> {
    entries
        .into_iter()
        .map(|entry| (entry.key, entry.value))
        .collect()
}
