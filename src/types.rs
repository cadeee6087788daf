use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScanError;

/// Region used when `--region` is not given.
pub const DEFAULT_REGION: &str = "us-east-2";

/// Overall bound on a scan when `--timeout` is not given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// The authenticated principal, resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_name: String,
    pub user_id: String,
    pub arn: String,
}

/// Lifecycle state of a pull request as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestStatus {
    Open,
    Closed,
    Unknown(String),
}

impl PullRequestStatus {
    pub fn from_service(value: &str) -> Self {
        match value {
            "OPEN" => PullRequestStatus::Open,
            "CLOSED" => PullRequestStatus::Closed,
            other => PullRequestStatus::Unknown(other.to_string()),
        }
    }
}

/// The parts of a pull request's detail record the scan looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub id: String,
    /// Absent when the service omits the author.
    pub author_arn: Option<String>,
    pub status: PullRequestStatus,
    /// Raw serialized content of each approval rule, in service order.
    pub approval_rules: Vec<String>,
}

impl PullRequest {
    pub fn is_authored_by(&self, identity: &Identity) -> bool {
        self.author_arn.as_deref() == Some(identity.arn.as_str())
    }
}

/// Everything a scan needs to know, resolved from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub region: String,
    /// Report pull requests the caller authored rather than those awaiting
    /// the caller's approval.
    pub return_mine: bool,
    pub debug: bool,
    pub profile: Option<String>,
    pub timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            return_mine: false,
            debug: false,
            profile: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// The hosted source-control service the scan reads from.
///
/// Implementations return complete listings (all pages) in service order.
#[async_trait]
pub trait CodeCommit {
    async fn current_identity(&self) -> Result<Identity, ScanError>;

    async fn list_repositories(&self) -> Result<Vec<String>, ScanError>;

    /// Lists open pull request ids, restricted to `author_arn` when given.
    async fn list_open_pull_requests(
        &self,
        repository: &str,
        author_arn: Option<&str>,
    ) -> Result<Vec<String>, ScanError>;

    async fn get_pull_request(&self, pull_request_id: &str) -> Result<PullRequest, ScanError>;
}
