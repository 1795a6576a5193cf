//! End-to-end properties of the library entry point.
mod common;

use common::{
    docx, paragraph, paragraph_with_props, payload, read_part, run, styled_run, table_row,
    OFFICIAL_RUN_PROPS, STYLES_XML,
};
use docops::format::IssueCode;
use docops::skills::BuiltinSkills;
use docops::{BracketMode, EngineError, ExitStatus, Preset, RunRequest};
use serde_json::json;

fn run_preset(
    template: &[u8],
    payload: &serde_json::Map<String, serde_json::Value>,
    preset: Preset,
) -> Result<docops::ArtifactBundle, EngineError> {
    let mut request = RunRequest::new(template, "meeting_notice", payload);
    request.format = preset.options();
    docops::run(&request, &BuiltinSkills)
}

#[test]
fn zero_placeholder_template_is_identical_output() {
    let template = docx(&[
        paragraph_with_props(r#"<w:ind w:firstLine="640"/>"#, &[run("关于召开会议的通知")]),
        paragraph(&[run("各部门：")]),
    ]);
    let bundle = run_preset(&template, &payload(json!({})), Preset::Quick).unwrap();
    assert_eq!(bundle.status, ExitStatus::Ok);
    assert_eq!(bundle.document, template);
    assert!(bundle.missing_fields.is_empty());
    assert!(bundle.replace_log.is_empty());
}

#[test]
fn cross_run_token_is_exit_three_regardless_of_payload() {
    let template = docx(&[paragraph(&[run("会议：【MEETING_TITLE"), run("】")])]);
    for value in [
        json!({}),
        json!({"meeting_title": "周例会"}),
        json!({
            "meeting_title": "周例会",
            "meeting_date": "2026-10-20",
            "meeting_time": "09:00",
            "meeting_location": "三楼会议室",
            "organizer": "办公室"
        }),
    ] {
        let err = run_preset(&template, &payload(value), Preset::Quick).unwrap_err();
        assert_eq!(err.exit_status().code(), 3);
    }
}

#[test]
fn cross_run_token_with_invalid_name_is_exit_three_when_lenient() {
    let template = docx(&[paragraph(&[run("【meeting_"), run("title】")])]);
    let payload = payload(json!({"meeting_title": "周例会"}));
    let mut request = RunRequest::new(&template, "meeting_notice", &payload);
    request.bracket_mode = BracketMode::Lenient;
    let err = docops::run(&request, &BuiltinSkills).unwrap_err();
    assert_eq!(err.exit_status(), ExitStatus::TemplateUnsupported);
    assert_eq!(err.exit_status().code(), 3);
}

#[test]
fn text_after_a_break_keeps_its_line() {
    let template = docx(&[paragraph(&[
        "<w:r><w:t>第一行</w:t><w:br/><w:t>【MEETING_TITLE】</w:t><w:tab/><w:t>尾</w:t></w:r>"
            .to_string(),
    ])]);
    let bundle = run_preset(
        &template,
        &payload(json!({"meeting_title": "周例会"})),
        Preset::Quick,
    )
    .unwrap();
    assert_eq!(bundle.status, ExitStatus::Ok);
    let xml = read_part(&bundle.document, "word/document.xml");
    assert!(
        xml.contains(
            r#"<w:t>第一行</w:t><w:br/><w:t xml:space="preserve">周例会</w:t><w:tab/><w:t>尾</w:t>"#
        ),
        "{xml}"
    );
}

#[test]
fn each_missing_field_is_listed_exactly_once() {
    let template = docx(&[
        paragraph(&[run("【MEETING_TITLE】")]),
        paragraph(&[run("日期：【MEETING_DATE】")]),
        paragraph(&[run("地点：【MEETING_LOCATION】，日期：【MEETING_DATE】")]),
        paragraph(&[run("主办：【ORGANIZER】")]),
    ]);
    let bundle = run_preset(
        &template,
        &payload(json!({"meeting_title": "周例会", "organizer": null})),
        Preset::Quick,
    )
    .unwrap();
    assert_eq!(bundle.status.code(), 2);
    let missing: Vec<&str> = bundle
        .missing_fields
        .iter()
        .map(|record| record.field_name.as_str())
        .collect();
    assert_eq!(missing, vec!["meeting_date", "meeting_location", "organizer"]);
}

#[test]
fn safe_fix_output_has_empty_fixable_diff() {
    let template = docx(&[
        paragraph_with_props(
            r#"<w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr><w:spacing w:before="120" w:line="240" w:lineRule="auto"/><w:ind w:left="420" w:hanging="420"/>"#,
            &[styled_run("【MEETING_TITLE】", OFFICIAL_RUN_PROPS)],
        ),
        paragraph(&[styled_run("【MEETING_DATE】", OFFICIAL_RUN_PROPS)]),
    ]);
    let value = json!({"meeting_title": "周例会", "meeting_date": "2026-10-20"});
    let bundle = run_preset(&template, &payload(value), Preset::Strict).unwrap();
    assert_eq!(bundle.status, ExitStatus::Ok);
    let summary = &bundle.format_report.summary;
    assert!(!summary.fix_changes.is_empty());
    assert!(summary.diff.iter().all(|issue| !issue.fixable), "{:#?}", summary.diff);

    let xml = read_part(&bundle.document, "word/document.xml");
    assert!(xml.contains(r#"w:before="120""#), "{xml}");
    assert!(xml.contains(r#"w:left="420""#), "{xml}");
    assert!(!xml.contains("w:hanging"), "{xml}");
    assert!(!xml.contains("w:numPr"), "{xml}");
    assert_eq!(read_part(&bundle.document, "word/styles.xml"), STYLES_XML);
}

#[test]
fn forbidden_tables_limit_cell_content_to_the_table_code() {
    let cell = vec![paragraph_with_props(
        r#"<w:numPr><w:numId w:val="2"/></w:numPr><w:ind w:firstLine="0"/>"#,
        &[styled_run("【MEETING_TITLE】", r#"<w:rFonts w:ascii="Arial"/><w:sz w:val="21"/>"#)],
    )];
    let template = docx(&[
        table_row(&[cell.clone(), vec![paragraph(&[run("【MEETING_TIME】")])]]),
        table_row(&[cell]),
    ]);
    let payload = payload(json!({"meeting_title": "周例会", "meeting_time": "09:00"}));
    for preset in [Preset::Strict, Preset::Quick] {
        let mut request = RunRequest::new(&template, "meeting_notice", &payload);
        request.format = preset.options();
        request.policy_text = Some("forbid_tables: true\nforbid_numbering: true\nrun_size_pt: 16\n");
        let bundle = docops::run(&request, &BuiltinSkills).unwrap();
        let summary = &bundle.format_report.summary;
        if preset == Preset::Strict {
            assert_eq!(summary.diagnostics.codes, vec![IssueCode::TableForbidden]);
            assert_eq!(summary.diff.len(), 2);
            assert_eq!(bundle.status, ExitStatus::FormatFailure);
            assert!(summary.fix_changes.is_empty());
        } else {
            assert_eq!(summary.effective_policy_overrides["forbid_tables"], json!(false));
        }
    }
}

#[test]
fn unresolved_font_alias_fails_before_any_output() {
    let template = docx(&[paragraph(&[run("【MEETING_TITLE】")])]);
    let payload = payload(json!({"meeting_title": "周例会"}));
    let mut request = RunRequest::new(&template, "meeting_notice", &payload);
    request.policy_text = Some("run_font_east_asia: '@official_body'\n");
    let err = docops::run(&request, &BuiltinSkills).unwrap_err();
    assert!(matches!(err, EngineError::PolicyConfiguration(_)), "{err}");
    assert_eq!(err.exit_status().code(), 1);

    request.policy_text =
        Some("run_font_east_asia: '@official_body'\nfont_aliases:\n  official_body: 仿宋\n");
    assert!(docops::run(&request, &BuiltinSkills).is_ok());
}
