//! Tests for reading YAML text into trees.

use rstest::rstest;

use yamltree::util::testing::init_test_setup;
use yamltree::{
    emit_to_string, parse, parse_in_place, parse_with, ErrorKind, NodeType, ScalarRef,
    TreeSettings, YamlError, ROOT,
};

#[test]
fn given_two_keyvals_when_parsing_then_map_root_with_two_children() {
    init_test_setup();

    let tree = parse("a: 1\nb: 2\n").unwrap();

    assert_eq!(tree.node_type(ROOT).unwrap(), NodeType::MAP);
    let children: Vec<_> = tree.children(ROOT).unwrap().collect();
    assert_eq!(children.len(), 2);
    for (child, (k, v)) in children.iter().zip([("a", "1"), ("b", "2")]) {
        assert_eq!(tree.node_type(*child).unwrap(), NodeType::KEYVAL);
        assert_eq!(tree.key(*child).unwrap(), k);
        assert_eq!(tree.val(*child).unwrap(), v);
    }
}

#[rstest]
#[case("a: 1\nb: 2\n", r#"{"a": 1,"b": 2}"#)]
#[case("- a\n- b\n", r#"["a","b"]"#)]
#[case("list:\n- 1\n- 2\n", r#"{"list": [1,2]}"#)]
#[case("- a: 1\n  b: 2\n- c: 3\n", r#"[{"a": 1,"b": 2},{"c": 3}]"#)]
#[case("- - a\n  - b\n- c\n", r#"[["a","b"],"c"]"#)]
#[case("nested:\n  deeper:\n    k: v\n", r#"{"nested": {"deeper": {"k": "v"}}}"#)]
#[case("m: {x: 1, y: [a, b]}\n", r#"{"m": {"x": 1,"y": ["a","b"]}}"#)]
#[case("q: 'it''s'\nd: \"tab\\there\"\n", r#"{"q": "it's","d": "tab\there"}"#)]
#[case("\"quoted key\": v\n", r#"{"quoted key": "v"}"#)]
#[case("text: |\n  line1\n  line2\nnext: x\n", r#"{"text": "line1\nline2\n","next": "x"}"#)]
#[case("folded: >-\n  a\n  b\n", r#"{"folded": "a b"}"#)]
#[case("kept: |+\n  a\n\n", r#"{"kept": "a\n\n"}"#)]
#[case("# c\na: 1 # trailing\n", r#"{"a": 1}"#)]
#[case("empty:\nnull: ~\n", r#"{"empty": null,"null": null}"#)]
#[case("url: http://x.org/#frag\n", r##"{"url": "http://x.org/#frag"}"##)]
#[case("win: crlf\r\nnext: 2\r\n", r#"{"win": "crlf","next": 2}"#)]
fn given_yaml_subset_when_parsing_then_structure_matches(
    #[case] input: &str,
    #[case] expected_json: &str,
) {
    init_test_setup();

    let tree = parse(input).unwrap();

    assert_eq!(emit_to_string(&tree, true).unwrap(), expected_json);
}

#[test]
fn given_quoted_scalars_when_parsing_then_style_flags_are_set() {
    init_test_setup();

    let tree = parse("\"k\": 'v'\nplain: v\n").unwrap();

    let quoted = tree.child(ROOT, 0).unwrap().unwrap();
    let plain = tree.child(ROOT, 1).unwrap().unwrap();
    assert!(tree.node_type(quoted).unwrap().is_key_quoted());
    assert!(tree.node_type(quoted).unwrap().is_val_quoted());
    assert!(!tree.node_type(plain).unwrap().is_quoted());
}

// ============================================================
// Documents and streams
// ============================================================

#[rstest]
#[case("")]
#[case("\n\n")]
#[case("# nothing but a comment\n")]
fn given_no_content_when_parsing_then_root_stays_untyped(#[case] input: &str) {
    init_test_setup();

    let tree = parse(input).unwrap();

    assert!(tree.is_empty());
}

#[test]
fn given_separators_when_parsing_then_stream_of_documents() {
    init_test_setup();

    let tree = parse("a: 1\n---\n- x\n--- scalar\n---\n...\n").unwrap();

    assert!(tree.node_type(ROOT).unwrap().is_stream());
    let types: Vec<_> = tree
        .children(ROOT)
        .unwrap()
        .map(|d| tree.node_type(d).unwrap())
        .collect();
    assert_eq!(
        types,
        [
            NodeType::DOCMAP,
            NodeType::DOCSEQ,
            NodeType::DOCVAL,
            NodeType::DOCVAL
        ]
    );
    let scalar = tree.child(ROOT, 2).unwrap().unwrap();
    assert_eq!(tree.val(scalar).unwrap(), "scalar");
}

// ============================================================
// Storage of scalar text
// ============================================================

#[test]
fn given_copying_parse_when_inspecting_scalars_then_they_live_in_the_arena() {
    init_test_setup();
    let text = String::from("name: value\n");

    let tree = parse(&text).unwrap();
    drop(text);

    let node = tree.first_child(ROOT).unwrap().unwrap();
    assert!(matches!(tree.get(node).unwrap().val, ScalarRef::Arena(_)));
    assert_eq!(tree.val(node).unwrap(), "value");
    assert!(tree.arena_size() >= "name: value\n".len());
}

#[test]
fn given_in_place_parse_when_inspecting_scalars_then_they_reference_the_buffer() {
    init_test_setup();
    let mut buffer = String::from("name: value\nesc: \"a\\nb\"\n");

    let tree = parse_in_place(buffer.as_mut_str()).unwrap();

    let name = tree.child(ROOT, 0).unwrap().unwrap();
    let esc = tree.child(ROOT, 1).unwrap().unwrap();
    assert!(matches!(tree.get(name).unwrap().val, ScalarRef::Source(_)));
    assert_eq!(tree.val(name).unwrap(), "value");
    assert!(matches!(tree.get(esc).unwrap().val, ScalarRef::Arena(_)));
    assert_eq!(tree.val(esc).unwrap(), "a\nb");
    assert_eq!(tree.arena_size(), 3);
}

#[test]
fn given_capacity_settings_when_parsing_then_tables_are_preallocated() {
    init_test_setup();
    let settings = TreeSettings {
        node_capacity: 64,
        arena_capacity: 1024,
    };

    let tree = parse_with("a: 1\n", &settings).unwrap();

    assert!(tree.capacity() >= 64);
    assert!(tree.arena_capacity() >= 1024);
}

// ============================================================
// Errors
// ============================================================

#[rstest]
#[case("a: 1\n\tb: 2\n", 2, 1)]
#[case("a: \"open\n", 1, 4)]
#[case("a: [1, 2\n", 1, 4)]
#[case("a: {x: 1\n", 1, 4)]
#[case("a: 1\n  b: 2\n", 2, 3)]
#[case("- a\nb: 1\n", 2, 1)]
#[case("a: |x\n  text\n", 1, 4)]
#[case("a: \"x\" trailing\n", 1, 8)]
#[case("a: \"bad \\q\"\n", 1, 4)]
fn given_malformed_input_when_parsing_then_error_names_line_and_column(
    #[case] input: &str,
    #[case] line: usize,
    #[case] column: usize,
) {
    init_test_setup();

    let err = parse(input).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ParseError);
    match err {
        YamlError::Parse {
            line: l, column: c, ..
        } => assert_eq!((l, c), (line, column), "{input:?}"),
        other => panic!("expected parse error, got {other:?}"),
    }
}
