//! Format compliance: observe, resolve a baseline, diff, and safely fix.
//!
//! Every check and every correction is scoped to the runs substitution
//! touched. Table presence is the only document-wide dimension.
pub mod baseline;
pub mod diagnostics;
pub mod diff;
pub mod fixer;
pub mod observe;
pub mod policy;
pub mod suggested;

pub use baseline::{resolve_policy, template_baseline, FontName, PolicyBaseline};
pub use diagnostics::{summarize, Diagnostics};
pub use diff::{diff, DiffIssue, IssueCode, Observability, Severity};
pub use fixer::{plan_fixes, FixChange, FixPlan};
pub use observe::{observe, observed_delta, FormatFingerprint, ObservedDelta};
pub use policy::{default_policy, parse_policy, render_policy, FormatPolicy, PolicyError};
pub use suggested::{render_suggested_policy, suggest_policy};
