use std::sync::{Mutex, PoisonError};

use colored::Colorize;
use tracing::debug;

use crate::{
    error::ScanError,
    status::{OnDisable, StatusLine},
    types::{CodeCommit, Identity, PullRequest, PullRequestStatus, ScanConfig},
};

/// Marker CodeCommit writes into approval rule content for each member of
/// an approval pool.
const APPROVER_MARKER: &str = "CodeCommitApprovers:";

/// Builds the console link for a pull request.
pub fn pull_request_url(region: &str, repository: &str, pull_request_id: &str) -> String {
    format!(
        "https://{region}.console.aws.amazon.com/codesuite/codecommit/repositories/{repository}/pull-requests/{pull_request_id}/details?region={region}"
    )
}

/// Whether any approval rule names `user_name` as an approver.
///
/// Rule content is an undocumented JSON document, so this is a substring
/// search for the approver marker rather than a parse.
pub fn requires_approval_from(pr: &PullRequest, user_name: &str) -> bool {
    let marker = format!("{APPROVER_MARKER}{user_name}");
    pr.approval_rules.iter().any(|rule| rule.contains(&marker))
}

/// Decides whether a pull request belongs in the report.
///
/// With `return_mine` only the caller's own pull requests qualify. Without
/// it the caller's own pull requests never qualify, and the rest qualify
/// when an approval rule names the caller.
pub fn is_reportable(pr: &PullRequest, identity: &Identity, return_mine: bool) -> bool {
    let is_mine = pr.is_authored_by(identity);

    if return_mine {
        return is_mine;
    }

    !is_mine && requires_approval_from(pr, &identity.user_name)
}

/// Ordered, append-only collection of result URLs.
#[derive(Debug, Default)]
pub struct Results {
    urls: Mutex<Vec<String>>,
}

impl Results {
    pub fn push(&self, url: String) {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url);
    }

    pub fn into_urls(self) -> Vec<String> {
        self.urls.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fetches the caller's identity.
pub async fn resolve_identity<C>(service: &C) -> Result<Identity, ScanError>
where
    C: CodeCommit + Sync,
{
    let identity = service.current_identity().await?;
    debug!(user = %identity.user_name, arn = %identity.arn, "resolved caller identity");
    Ok(identity)
}

/// Lists every repository visible to the caller, in service order.
pub async fn list_repositories<C>(service: &C) -> Result<Vec<String>, ScanError>
where
    C: CodeCommit + Sync,
{
    let repositories = service.list_repositories().await?;
    debug!(count = repositories.len(), "listed repositories");
    Ok(repositories)
}

/// Lists open pull request ids in `repository`, restricted server-side to
/// the caller's own when `filter_to_mine` is set.
pub async fn list_open_pull_requests<C>(
    service: &C,
    repository: &str,
    filter_to_mine: bool,
    identity: &Identity,
) -> Result<Vec<String>, ScanError>
where
    C: CodeCommit + Sync,
{
    let author_arn = filter_to_mine.then_some(identity.arn.as_str());
    service
        .list_open_pull_requests(repository, author_arn)
        .await
}

/// Fetches one pull request and returns its URL if it belongs in the report.
pub async fn evaluate_pull_request<C>(
    service: &C,
    config: &ScanConfig,
    repository: &str,
    pull_request_id: &str,
    identity: &Identity,
) -> Result<Option<String>, ScanError>
where
    C: CodeCommit + Sync,
{
    let pr = service.get_pull_request(pull_request_id).await?;

    // Closed between listing and lookup.
    if pr.status != PullRequestStatus::Open {
        debug!(id = %pr.id, status = ?pr.status, "skipping pull request that is no longer open");
        return Ok(None);
    }

    Ok(is_reportable(&pr, identity, config.return_mine)
        .then(|| pull_request_url(&config.region, repository, pull_request_id)))
}

/// Scans every repository and returns the matching URLs in discovery order.
///
/// The first failure aborts the scan; nothing collected so far is returned.
pub async fn scan<C>(
    service: &C,
    config: &ScanConfig,
    status: &StatusLine,
) -> Result<Vec<String>, ScanError>
where
    C: CodeCommit + Sync,
{
    let identity = resolve_identity(service).await?;
    status.debug(format_args!(
        "Caller: {} ({}, {})",
        identity.user_name, identity.user_id, identity.arn
    ));

    let results = Results::default();

    for repository in list_repositories(service).await? {
        status.info(format_args!(
            "{} {}",
            "Scanning repo:".cyan(),
            repository.as_str().yellow()
        ));

        let ids =
            list_open_pull_requests(service, &repository, config.return_mine, &identity).await?;
        for id in ids {
            status.debug(format_args!("Found PR: {id}"));

            if let Some(url) =
                evaluate_pull_request(service, config, &repository, &id, &identity).await?
            {
                results.push(url);
            }
        }
    }

    Ok(results.into_urls())
}

/// Runs a scan under `config.timeout` and prints the results.
///
/// When nothing matched the progress line is still cleared so the terminal
/// is left tidy.
pub async fn run<C>(service: &C, config: &ScanConfig, status: &StatusLine) -> anyhow::Result<()>
where
    C: CodeCommit + Sync,
{
    let urls = tokio::time::timeout(config.timeout, scan(service, config, status))
        .await
        .map_err(|_| {
            ScanError::upstream("scan", format!("timed out after {:?}", config.timeout))
        })??;

    for url in &urls {
        status.println(url)?;
    }
    if urls.is_empty() {
        status.disable_single_line_mode(OnDisable::ClearLine);
    }

    Ok(())
}
