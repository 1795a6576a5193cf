use anyhow::{anyhow, Context, Result};
use clap::Parser;
use docops::report::human::render_summary;
use docops::skills::BuiltinSkills;
use docops::staging::{
    write_bundle, DOCUMENT_FILE, FORMAT_REPORT_FILE, MISSING_FIELDS_FILE, REPLACE_LOG_FILE,
};
use docops::util::display_path;
use docops::{ExitStatus, RunRequest};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cli;
use cli::{Command, ReportView, RootArgs, RunArgs};

const LOG_ENV: &str = "DOCOPS_LOG";

#[derive(Deserialize)]
struct TaskFile {
    task_type: String,
    #[serde(default)]
    payload: Map<String, Value>,
}

fn main() -> ExitCode {
    let root = match RootArgs::try_parse() {
        Ok(root) => root,
        Err(err) => {
            // Usage errors exit 1; clap's own status 2 means missing fields here.
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            return ExitCode::from(code);
        }
    };
    init_tracing();

    let result = match root.command {
        Command::Run(args) => cmd_run(&args),
    };
    match result {
        Ok(status) => ExitCode::from(status.code()),
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            ExitCode::from(ExitStatus::InternalFault.code())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_run(args: &RunArgs) -> Result<ExitStatus> {
    let task = load_task(&args.task)?;
    let skill_id = match &args.skill {
        Some(skill) if *skill != task.task_type => {
            return Err(anyhow!(
                "--skill {skill} does not match task_type {}",
                task.task_type
            ));
        }
        Some(skill) => skill.clone(),
        None => task.task_type.clone(),
    };
    check_existing_outputs(args)?;

    let template = fs::read(&args.template)
        .with_context(|| format!("read template {}", args.template.display()))?;
    let policy_text = args
        .policy
        .as_ref()
        .map(|path| {
            fs::read_to_string(path).with_context(|| format!("read policy {}", path.display()))
        })
        .transpose()?;

    let request = RunRequest {
        template: &template,
        skill_id: &skill_id,
        payload: &task.payload,
        format: args.format.options(),
        bracket_mode: args.bracket_mode,
        policy_text: policy_text.as_deref(),
        suggest_policy: args.export_suggested_policy.is_some(),
    };
    let bundle = match docops::run(&request, &BuiltinSkills) {
        Ok(bundle) => bundle,
        Err(err) => {
            eprintln!("ERROR: {err}");
            return Ok(err.exit_status());
        }
    };

    if matches!(args.format_report, ReportView::Human | ReportView::Both) {
        println!("{}", render_summary(&bundle.format_report, &command_base(args)));
    }
    write_bundle(
        &args.out_dir,
        &bundle,
        args.export_suggested_policy.as_deref(),
    )?;
    if args.format_report == ReportView::Both {
        println!(
            "format_report: {}",
            display_path(&args.out_dir.join(FORMAT_REPORT_FILE), None)
        );
    }
    if let (Some(path), Some(_)) = (&args.export_suggested_policy, &bundle.suggested_policy) {
        println!("INFO: wrote suggested policy to {}", path.display());
    }

    match bundle.status {
        ExitStatus::Ok => println!("INFO: success"),
        ExitStatus::MissingRequired => {
            let names: Vec<&str> = bundle
                .missing_fields
                .iter()
                .map(|record| record.field_name.as_str())
                .collect();
            println!("ERROR: missing required fields: {}", names.join(", "));
        }
        ExitStatus::FormatFailure => println!("ERROR: format validation failed"),
        ExitStatus::TemplateUnsupported | ExitStatus::InternalFault => {}
    }
    Ok(bundle.status)
}

fn load_task(path: &Path) -> Result<TaskFile> {
    let text =
        fs::read_to_string(path).with_context(|| format!("read task {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parse task {}", path.display()))
}

fn output_paths(args: &RunArgs) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = [
        DOCUMENT_FILE,
        REPLACE_LOG_FILE,
        MISSING_FIELDS_FILE,
        FORMAT_REPORT_FILE,
    ]
    .iter()
    .map(|name| args.out_dir.join(name))
    .collect();
    paths.extend(args.export_suggested_policy.iter().cloned());
    paths
}

fn check_existing_outputs(args: &RunArgs) -> Result<()> {
    let existing: Vec<PathBuf> = output_paths(args)
        .into_iter()
        .filter(|path| path.exists())
        .collect();
    if existing.is_empty() {
        return Ok(());
    }
    let names = existing
        .iter()
        .map(|path| display_path(path, Some(&args.out_dir)))
        .collect::<Vec<_>>()
        .join(", ");
    if args.no_overwrite {
        return Err(anyhow!(
            "outputs already exist and --no-overwrite is set: {names}"
        ));
    }
    if !args.force {
        tracing::info!(outputs = %names, "overwriting existing outputs");
    }
    Ok(())
}

fn command_base(args: &RunArgs) -> String {
    let mut parts = vec![
        "docops run".to_string(),
        format!("--template {}", args.template.display()),
        format!("--task {}", args.task.display()),
    ];
    if let Some(skill) = &args.skill {
        parts.push(format!("--skill {skill}"));
    }
    if let Some(policy) = &args.policy {
        parts.push(format!("--policy {}", policy.display()));
    }
    parts.join(" ")
}
