//! CLI argument parsing for the `docops run` front end.
//!
//! The binary only wires files to [`docops::pipeline::run`]; every decision
//! about placeholders and formatting lives in the library.
use clap::{Args, Parser, Subcommand, ValueEnum};
use docops::{BaselineSource, BracketMode, FixMode, FormatMode, FormatOptions, Preset};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "docops",
    version,
    about = "Fill docx templates from skill payloads and check format compliance",
    after_help = "Exit codes:\n  0  ok\n  1  internal or argument error (no artifacts)\n  2  missing required fields\n  3  unsupported template (no artifacts)\n  4  strict format check failed\n\nExamples:\n  docops run --template notice.docx --task task.json --out-dir out\n  docops run --template notice.docx --task task.json --preset strict --policy policy.yaml",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Run(RunArgs),
}

/// Which format report views reach stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportView {
    #[default]
    Human,
    Json,
    Both,
}

/// Inputs for one template run.
#[derive(Parser, Debug)]
#[command(about = "Render a template with a task payload and write the artifact set")]
pub struct RunArgs {
    /// Template .docx file
    #[arg(long, value_name = "DOCX")]
    pub template: PathBuf,

    /// Task JSON: {"task_type": ..., "payload": {...}}
    #[arg(long, value_name = "JSON")]
    pub task: PathBuf,

    /// Skill id; defaults to the task's task_type
    #[arg(long, value_name = "ID")]
    pub skill: Option<String>,

    /// Directory receiving out.docx and the JSON reports
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Format policy YAML; the built-in policy applies otherwise
    #[arg(long, value_name = "YAML")]
    pub policy: Option<PathBuf>,

    #[command(flatten)]
    pub format: FormatArgs,

    /// Treatment of malformed bracket tokens
    #[arg(long, value_enum, default_value_t = BracketMode::Strict)]
    pub bracket_mode: BracketMode,

    /// Format report views printed to stdout
    #[arg(long, value_enum, default_value_t = ReportView::Human)]
    pub format_report: ReportView,

    /// Also write a suggested policy derived from the template
    #[arg(long, value_name = "PATH")]
    pub export_suggested_policy: Option<PathBuf>,

    /// Overwrite existing outputs without notice
    #[arg(long, conflicts_with = "no_overwrite")]
    pub force: bool,

    /// Fail when any output already exists
    #[arg(long, conflicts_with = "force")]
    pub no_overwrite: bool,
}

/// A preset, or individual format knobs. Never both.
#[derive(Args, Debug, Default)]
pub struct FormatArgs {
    /// Named bundle of format options (default: quick)
    #[arg(long, value_enum, conflicts_with_all = ["format_mode", "format_baseline", "format_fix_mode"])]
    pub preset: Option<Preset>,

    #[arg(long, value_enum)]
    pub format_mode: Option<FormatMode>,

    #[arg(long, value_enum)]
    pub format_baseline: Option<BaselineSource>,

    #[arg(long, value_enum)]
    pub format_fix_mode: Option<FixMode>,
}

impl FormatArgs {
    /// Knobs not given fall back to the quick preset.
    pub fn options(&self) -> FormatOptions {
        if let Some(preset) = self.preset {
            return preset.options();
        }
        let defaults = Preset::default().options();
        FormatOptions {
            mode: self.format_mode.unwrap_or(defaults.mode),
            baseline: self.format_baseline.unwrap_or(defaults.baseline),
            fix: self.format_fix_mode.unwrap_or(defaults.fix),
        }
    }
}
