use panemerge_text::{FilterRule, LineSource, TextError, TextFilter};

#[test]
fn whole_match_is_removed_without_groups() {
    let filter = TextFilter::compile(&[FilterRule::new("timestamps", r"\d{2}:\d{2}")])
        .expect("valid filter");

    assert_eq!(filter.apply("built at 12:30 ok"), "built at  ok");
    assert_eq!(filter.apply("no digits"), "no digits");
}

#[test]
fn only_captured_text_is_removed_with_groups() {
    let filter = TextFilter::compile(&[FilterRule::new("revision", r"\$Id: ([0-9a-f]+) \$")])
        .expect("valid filter");

    assert_eq!(filter.apply("// $Id: 1a2b $ header"), "// $Id:  $ header");
}

#[test]
fn inactive_rules_are_skipped() {
    let mut rule = FilterRule::new("everything", ".*");
    rule.active = false;
    let kept = FilterRule::new("digits", r"\d");
    let filter = TextFilter::compile(&[rule, kept]).expect("valid filter");

    assert!(!filter.is_empty());
    assert_eq!(filter.labels().collect::<Vec<_>>(), vec!["digits"]);
    assert_eq!(filter.apply("kept"), "kept");

    let mut rule = FilterRule::new("everything", ".*");
    rule.active = false;
    let filter = TextFilter::compile(&[rule]).expect("valid filter");

    assert!(filter.is_empty());
    assert_eq!(filter.apply("kept"), "kept");
}

#[test]
fn invalid_pattern_names_the_rule() {
    let err = TextFilter::compile(&[FilterRule::new("broken", "(unclosed")])
        .expect_err("pattern should not compile");

    match err {
        TextError::InvalidPattern { label, .. } => assert_eq!(label, "broken"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn filtered_view_preserves_line_count() {
    let lines = vec!["keep 1", "drop", "keep 2"];
    let filter =
        TextFilter::compile(&[FilterRule::new("drop", "^drop$")]).expect("valid filter");
    let view = filter.view(&lines);

    assert_eq!(view.line_count(), 3);
    assert_eq!(view.line(1).as_deref(), Some(""));
    assert!(view.is_blank(1));
    assert_eq!(view.lines(0..3), vec!["keep 1", "", "keep 2"]);
}

#[test]
fn rules_deserialize_with_default_active_flag() {
    let rules: Vec<FilterRule> =
        serde_json::from_str(r#"[{"label": "ws", "pattern": "\\s+$"}]"#).expect("valid json");

    assert_eq!(rules.len(), 1);
    assert!(rules[0].active);
    assert_eq!(rules[0].pattern, r"\s+$");
}
