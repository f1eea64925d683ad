use panemerge_text::{LineDocument, LineSource};
use proptest::prelude::*;

#[test]
fn round_trip_lf_document() {
    let input = "fn main() {\n    println!(\"hi\");\n}\n\n";

    let doc = LineDocument::parse(input);
    assert_eq!(doc.render(), input);
    assert_eq!(doc.line_count(), 4);
    assert!(doc.ends_with_newline());
}

#[test]
fn round_trip_without_trailing_newline() {
    let input = "first line\nsecond line";

    let doc = LineDocument::parse(input);
    assert_eq!(doc.render(), input);
    assert_eq!(doc.line_count(), 2);
    assert!(!doc.ends_with_newline());
}

#[test]
fn round_trip_mixed_line_endings() {
    let input = "one\r\ntwo\nthree\r\nfour";

    let doc = LineDocument::parse(input);
    assert_eq!(doc.render(), input);
    assert_eq!(doc.line_count(), 4);
    assert_eq!(doc.entries()[0].line_ending, "\r\n");
    assert_eq!(doc.entries()[1].line_ending, "\n");
    assert_eq!(doc.line(2).as_deref(), Some("three"));
}

#[test]
fn named_documents_keep_their_source() {
    let doc = LineDocument::parse_named("x\n", "left.txt");
    assert_eq!(doc.source_name.as_deref(), Some("left.txt"));
    assert_eq!(doc.to_string(), "x\n");
}

#[test]
fn empty_input_has_no_lines() {
    let doc = LineDocument::parse("");
    assert_eq!(doc.line_count(), 0);
    assert_eq!(doc.render(), "");
}

fn text_strategy() -> impl Strategy<Value = String> {
    let line = prop::string::string_regex("[ -~]{0,40}").expect("valid regex");
    let ending = prop::sample::select(vec!["\n", "\r\n"]);
    (prop::collection::vec((line, ending), 0..30), any::<bool>()).prop_map(|(lines, bare_tail)| {
        let mut out = String::new();
        for (text, ending) in lines {
            out.push_str(&text);
            out.push_str(ending);
        }
        if bare_tail && out.ends_with('\n') {
            out.pop();
            if out.ends_with('\r') {
                out.pop();
            }
        }
        out
    })
}

proptest! {
    #[test]
    fn roundtrip_survives_random_inputs(input in text_strategy()) {
        let doc = LineDocument::parse(&input);
        prop_assert_eq!(doc.render(), input);
    }

    #[test]
    fn edits_report_the_applied_delta(
        input in text_strategy(),
        start in 0usize..40,
        remove in 0usize..5,
        insert in prop::collection::vec("[a-z]{0,8}", 0..5),
    ) {
        let mut doc = LineDocument::parse(&input);
        let before = doc.line_count();
        match doc.replace_lines(start, remove, &insert) {
            Ok(edit) => {
                prop_assert_eq!(edit.start, start);
                prop_assert_eq!(doc.line_count() as isize, before as isize + edit.size_delta);
                for (offset, text) in insert.iter().enumerate() {
                    let line = doc.line(start + offset);
                    prop_assert_eq!(line.as_deref(), Some(text.as_str()));
                }
            }
            Err(_) => {
                prop_assert!(start + remove > before);
                prop_assert_eq!(doc.render(), input);
            }
        }
    }
}
