//! `docops run` through the compiled binary.
mod common;

use common::{docops, docx, paragraph, run, table_row, Workspace, ARTIFACTS};
use serde_json::json;

fn meeting_task(payload: serde_json::Value) -> serde_json::Value {
    json!({"task_type": "meeting_notice", "payload": payload})
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn meeting_title_scenario_writes_all_artifacts() {
    let ws = Workspace::new(
        &docx(&[paragraph(&[run("【MEETING_TITLE】")])]),
        &meeting_task(json!({"meeting_title": "周例会"})),
    );
    let output = ws.run(&[]);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));
    assert_eq!(ws.artifact_names(), ARTIFACTS);
    assert_eq!(ws.read_json("out.missing_fields.json"), json!([]));

    let log = ws.read_json("out.replace_log.json");
    let replaced: Vec<&serde_json::Value> = log
        .as_array()
        .unwrap()
        .iter()
        .filter(|entry| entry["status"] == "replaced")
        .collect();
    assert_eq!(replaced.len(), 1);
    assert_eq!(replaced[0]["run_location"], "p0:r0");

    let report = ws.read_json("out.format_report.json");
    for key in [
        "template_observed",
        "rendered_observed",
        "diff",
        "baseline",
        "effective_policy_overrides",
        "diagnostics",
    ] {
        assert!(report["summary"].get(key).is_some(), "missing {key}");
    }
    let text = stdout(&output);
    assert!(text.contains("format_summary:"), "{text}");
    assert!(text.contains("result=PASSED"), "{text}");
}

#[test]
fn meeting_date_scenario_exits_two_with_artifacts() {
    let ws = Workspace::new(
        &docx(&[
            paragraph(&[run("【MEETING_TITLE】")]),
            paragraph(&[run("【MEETING_DATE】")]),
        ]),
        &meeting_task(json!({"meeting_title": "周例会"})),
    );
    let output = ws.run(&[]);
    assert_eq!(output.status.code(), Some(2), "{}", stderr(&output));
    assert_eq!(ws.artifact_names(), ARTIFACTS);
    assert_eq!(ws.read_json("out.missing_fields.json"), json!(["meeting_date"]));
}

#[test]
fn cross_run_scenario_exits_three_without_artifacts() {
    let ws = Workspace::new(
        &docx(&[paragraph(&[run("【MEETING_TITLE"), run("】")])]),
        &meeting_task(json!({"meeting_title": "周例会"})),
    );
    let output = ws.run(&[]);
    assert_eq!(output.status.code(), Some(3));
    assert!(ws.artifact_names().is_empty());
    assert!(stderr(&output).contains("cross_run"), "{}", stderr(&output));
}

#[test]
fn strict_table_failure_exits_four_and_exports_suggested_policy() {
    let ws = Workspace::new(
        &docx(&[table_row(&[vec![paragraph(&[run("table")])]])]),
        &meeting_task(json!({})),
    );
    let suggested = ws.path("suggested.yaml");
    let suggested_arg = suggested.display().to_string();
    let output = ws.run(&[
        "--format-mode",
        "strict",
        "--format-baseline",
        "policy",
        "--export-suggested-policy",
        &suggested_arg,
    ]);
    assert_eq!(output.status.code(), Some(4), "{}", stderr(&output));
    assert_eq!(ws.artifact_names(), ARTIFACTS);
    let policy = docops::format::parse_policy(&std::fs::read_to_string(&suggested).unwrap()).unwrap();
    assert!(!policy.forbid_tables);
    assert!(stdout(&output).contains("result=FAILED"));
}

#[test]
fn no_overwrite_leaves_existing_outputs_alone() {
    let ws = Workspace::new(
        &docx(&[paragraph(&[run("plain")])]),
        &meeting_task(json!({})),
    );
    let suggested = ws.path("suggested.yaml");
    std::fs::write(&suggested, "marker: keep-me\n").unwrap();
    let suggested_arg = suggested.display().to_string();
    let output = ws.run(&["--export-suggested-policy", &suggested_arg, "--no-overwrite"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("--no-overwrite"), "{}", stderr(&output));
    assert_eq!(std::fs::read_to_string(&suggested).unwrap(), "marker: keep-me\n");
    assert!(ws.artifact_names().is_empty());
}

#[test]
fn unwritable_suggested_policy_leaves_no_artifacts() {
    let ws = Workspace::new(
        &docx(&[paragraph(&[run("【MEETING_TITLE】")])]),
        &meeting_task(json!({"meeting_title": "周例会"})),
    );
    let blocker = ws.path("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let suggested_arg = blocker.join("suggested.yaml").display().to_string();
    let output = ws.run(&["--export-suggested-policy", &suggested_arg]);
    assert_eq!(output.status.code(), Some(1), "{}", stderr(&output));
    assert!(ws.artifact_names().is_empty(), "{:?}", ws.artifact_names());
}

#[test]
fn preset_and_knobs_conflict_with_exit_one() {
    let ws = Workspace::new(
        &docx(&[paragraph(&[run("plain")])]),
        &meeting_task(json!({})),
    );
    let output = ws.run(&["--preset", "strict", "--format-fix-mode", "none"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(ws.artifact_names().is_empty());
}

#[test]
fn skill_must_match_task_type() {
    let ws = Workspace::new(
        &docx(&[paragraph(&[run("plain")])]),
        &meeting_task(json!({})),
    );
    let output = ws.run(&["--skill", "training_notice"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("task_type"), "{}", stderr(&output));
    assert!(ws.artifact_names().is_empty());
}

#[test]
fn bad_policy_exits_one_without_artifacts() {
    let ws = Workspace::new(
        &docx(&[paragraph(&[run("【MEETING_TITLE】")])]),
        &meeting_task(json!({"meeting_title": "周例会"})),
    );
    let policy = ws.path("policy.yaml");
    std::fs::write(&policy, "run_size_pt: 0\n").unwrap();
    let policy_arg = policy.display().to_string();
    let output = ws.run(&["--policy", &policy_arg]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("run_size_pt"), "{}", stderr(&output));
    assert!(ws.artifact_names().is_empty());
}

#[test]
fn json_report_view_keeps_stdout_quiet() {
    let ws = Workspace::new(
        &docx(&[paragraph(&[run("【MEETING_TITLE】")])]),
        &meeting_task(json!({"meeting_title": "周例会"})),
    );
    let output = ws.run(&["--format-report", "json"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(!stdout(&output).contains("format_summary:"));
    assert_eq!(ws.artifact_names(), ARTIFACTS);
}

#[test]
fn help_exits_zero() {
    let output = docops(&["run", "--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(stdout(&output).contains("--export-suggested-policy"));
}
