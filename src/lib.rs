//! needs-approval: find open CodeCommit pull requests waiting on you.
//!
//! Resolves the caller's IAM identity, walks every repository the caller can
//! see, and reports the open pull requests whose approval rules name the
//! caller as an approver. With `--mine` it reports the caller's own open pull
//! requests instead. Progress is shown on a single self-overwriting status
//! line; results are printed one URL per line on stdout.

pub mod cli;
pub mod codecommit;
pub mod error;
pub mod scan;
pub mod status;
pub mod types;

pub use cli::parse_args;
pub use codecommit::AwsCodeCommit;
pub use error::ScanError;
pub use scan::{
    Results, evaluate_pull_request, is_reportable, list_open_pull_requests, list_repositories,
    pull_request_url, requires_approval_from, resolve_identity, run, scan,
};
pub use status::{LogSink, OnDisable, RenderMode, StatusLine};
pub use types::{
    CodeCommit, DEFAULT_REGION, DEFAULT_TIMEOUT, Identity, PullRequest, PullRequestStatus,
    ScanConfig,
};
