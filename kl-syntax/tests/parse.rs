use kl_syntax::{parse, NodeKind, ParseError};

fn root_items(src: &str) -> Vec<NodeKind> {
    let root = parse(src).unwrap();
    root.as_list().unwrap().iter().map(|n| n.kind.clone()).collect()
}

#[test]
fn empty_source_is_an_empty_list() {
    let root = parse("").unwrap();
    assert_eq!(root.as_list().unwrap().len(), 0);
}

#[test]
fn flat_list_of_atoms() {
    let items = root_items("(add 1 2)");
    assert_eq!(items.len(), 1);
    let NodeKind::List(inner) = &items[0] else { panic!("expected list") };
    assert_eq!(inner[0].as_word(), Some("add"));
    assert_eq!(inner[1].as_int(), Some(1));
    assert_eq!(inner[2].as_int(), Some(2));
}

#[test]
fn nested_lists() {
    let items = root_items("(fn uint32 main () (return 1))");
    let NodeKind::List(top) = &items[0] else { panic!("expected list") };
    assert_eq!(top[0].as_word(), Some("fn"));
    assert!(top[3].is_list());
    let NodeKind::List(args) = &top[3].kind else { panic!() };
    assert!(args.is_empty());
    let NodeKind::List(body) = &top[4].kind else { panic!() };
    assert_eq!(body[0].as_word(), Some("return"));
}

#[test]
fn decimal_hex_binary_and_octal_literals() {
    let items = root_items("(10 0x1F 0b101 0o17)");
    let NodeKind::List(inner) = &items[0] else { panic!() };
    assert_eq!(inner[0].as_int(), Some(10));
    assert_eq!(inner[1].as_int(), Some(31));
    assert_eq!(inner[2].as_int(), Some(5));
    assert_eq!(inner[3].as_int(), Some(15));
}

#[test]
fn malformed_number_literal_is_an_error() {
    let err = parse("(0xZZ)").unwrap_err();
    assert!(matches!(err, ParseError::MalformedNumber { .. }));
}

#[test]
fn string_literal_lowers_to_null_terminated_byte_list() {
    let items = root_items("\"hi\"");
    let NodeKind::List(bytes) = &items[0] else { panic!("expected list") };
    let values: Vec<i64> = bytes.iter().map(|n| n.as_int().unwrap()).collect();
    assert_eq!(values, vec!['h' as i64, 'i' as i64, 0]);
}

#[test]
fn empty_string_literal_is_just_the_terminator() {
    let items = root_items("\"\"");
    let NodeKind::List(bytes) = &items[0] else { panic!("expected list") };
    assert_eq!(bytes.len(), 1);
    assert_eq!(bytes[0].as_int(), Some(0));
}

#[test]
fn string_literal_supports_escapes() {
    let items = root_items("\"a\\\"b\"");
    let NodeKind::List(bytes) = &items[0] else { panic!() };
    let values: Vec<i64> = bytes.iter().map(|n| n.as_int().unwrap()).collect();
    assert_eq!(values, vec!['a' as i64, '"' as i64, 'b' as i64, 0]);
}

#[test]
fn char_literal_lowers_to_codepoint_int() {
    let items = root_items("'a");
    assert_eq!(items[0].clone(), NodeKind::Int('a' as i64));
}

#[test]
fn char_literal_needs_no_closing_delimiter() {
    let items = root_items("('a 'b)");
    let NodeKind::List(inner) = &items[0] else { panic!() };
    assert_eq!(inner[0].as_int(), Some('a' as i64));
    assert_eq!(inner[1].as_int(), Some('b' as i64));
}

#[test]
fn comment_runs_to_end_of_line() {
    let items = root_items("(add 1 2) ; trailing comment\n(add 3 4)");
    assert_eq!(items.len(), 2);
}

#[test]
fn unmatched_close_paren_is_an_error() {
    let err = parse(")").unwrap_err();
    assert!(matches!(err, ParseError::UnmatchedCloseParen(_)));
}

#[test]
fn unclosed_list_is_an_error() {
    let err = parse("(fn main (").unwrap_err();
    assert!(matches!(err, ParseError::UnclosedList(_)));
}

#[test]
fn unclosed_string_is_an_error() {
    let err = parse("\"abc").unwrap_err();
    assert!(matches!(err, ParseError::UnclosedString(_)));
}

#[test]
fn list_span_is_first_childs_span() {
    let root = parse("(add 1 2)").unwrap();
    let inner = &root.as_list().unwrap()[0];
    let head = &inner.as_list().unwrap()[0];
    assert_eq!(inner.span, head.span);
}

#[test]
fn empty_list_span_is_its_opening_paren() {
    let root = parse("  ()").unwrap();
    let empty = &root.as_list().unwrap()[0];
    assert_eq!(empty.span.column, 3);
}

#[test]
fn word_tokens_starting_with_a_letter_are_not_treated_as_numbers() {
    let items = root_items("x1");
    assert_eq!(items[0].clone(), NodeKind::Word("x1".to_string()));
}
