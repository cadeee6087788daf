use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_codecommit::{error::DisplayErrorContext, types::PullRequestStatusEnum};
use tracing::debug;

use crate::{
    error::ScanError,
    types::{CodeCommit, Identity, PullRequest, PullRequestStatus, ScanConfig},
};

fn upstream<E>(operation: &str, err: E) -> ScanError
where
    E: std::error::Error,
{
    ScanError::upstream(operation, DisplayErrorContext(err).to_string())
}

/// CodeCommit and IAM clients sharing one credential chain.
#[derive(Debug, Clone)]
pub struct AwsCodeCommit {
    iam: aws_sdk_iam::Client,
    codecommit: aws_sdk_codecommit::Client,
}

impl AwsCodeCommit {
    /// Loads credentials from the default provider chain (environment,
    /// shared config files, instance metadata), optionally pinned to a named
    /// profile, and targets `config.region`.
    pub async fn from_config(config: &ScanConfig) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        let shared = loader.load().await;

        Self {
            iam: aws_sdk_iam::Client::new(&shared),
            codecommit: aws_sdk_codecommit::Client::new(&shared),
        }
    }
}

#[async_trait]
impl CodeCommit for AwsCodeCommit {
    async fn current_identity(&self) -> Result<Identity, ScanError> {
        let output = self
            .iam
            .get_user()
            .send()
            .await
            .map_err(|err| ScanError::auth(DisplayErrorContext(err).to_string()))?;

        let user = output
            .user()
            .ok_or_else(|| ScanError::auth("GetUser returned no user record"))?;

        Ok(Identity {
            user_name: user.user_name().to_string(),
            user_id: user.user_id().to_string(),
            arn: user.arn().to_string(),
        })
    }

    async fn list_repositories(&self) -> Result<Vec<String>, ScanError> {
        let mut pages = self.codecommit.list_repositories().into_paginator().send();
        let mut names = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| upstream("ListRepositories", err))?;
            names.extend(
                page.repositories()
                    .iter()
                    .filter_map(|repo| repo.repository_name())
                    .map(str::to_string),
            );
        }

        Ok(names)
    }

    async fn list_open_pull_requests(
        &self,
        repository: &str,
        author_arn: Option<&str>,
    ) -> Result<Vec<String>, ScanError> {
        debug!(repository, author_arn, "listing open pull requests");

        let mut pages = self
            .codecommit
            .list_pull_requests()
            .repository_name(repository)
            .pull_request_status(PullRequestStatusEnum::Open)
            .set_author_arn(author_arn.map(str::to_string))
            .into_paginator()
            .send();
        let mut ids = Vec::new();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| upstream("ListPullRequests", err))?;
            ids.extend(page.pull_request_ids().iter().cloned());
        }

        Ok(ids)
    }

    async fn get_pull_request(&self, pull_request_id: &str) -> Result<PullRequest, ScanError> {
        let output = self
            .codecommit
            .get_pull_request()
            .pull_request_id(pull_request_id)
            .send()
            .await
            .map_err(|err| upstream("GetPullRequest", err))?;

        let pr = output.pull_request().ok_or_else(|| {
            ScanError::upstream(
                "GetPullRequest",
                format!("no pull request record for id {pull_request_id}"),
            )
        })?;

        Ok(PullRequest {
            id: pull_request_id.to_string(),
            author_arn: pr.author_arn().map(str::to_string),
            status: pr
                .pull_request_status()
                .map(|status| PullRequestStatus::from_service(status.as_str()))
                .unwrap_or_else(|| PullRequestStatus::Unknown(String::new())),
            approval_rules: pr
                .approval_rules()
                .iter()
                .filter_map(|rule| rule.approval_rule_content())
                .map(str::to_string)
                .collect(),
        })
    }
}
