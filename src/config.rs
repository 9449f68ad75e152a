//! Application configuration and environment variable parsing.
//!
//! This module loads the credentials and identities used to reach the tracker
//! and the hosting platform. Values come from the process environment, which
//! `main` seeds from a `.env` file when one is present. Every missing required
//! variable is reported at once.

use crate::error::{Result, SummaryError};
use serde::Deserialize;

/// Environment variables as read, before validation.
#[derive(Debug, Deserialize)]
struct RawConfig {
    jira_url: Option<String>,
    jira_email: Option<String>,
    jira_api_token: Option<String>,
    github_username: Option<String>,
    github_token: Option<String>,

    #[serde(default = "default_done_status")]
    jira_done_status: String,

    github_api_url: Option<String>,

    #[serde(default = "default_max_api_pages")]
    max_api_pages: u32,

    #[serde(default = "default_review_concurrency")]
    review_concurrency: usize,
}

/// Validated application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Base URL of the JIRA instance, without a trailing slash.
    pub jira_url: String,

    /// Account email used for JIRA basic authentication.
    pub jira_email: String,

    pub jira_api_token: String,

    /// GitHub login whose reviews are summarized.
    pub github_username: String,

    pub github_token: String,

    /// Status name that marks a JIRA ticket as completed.
    pub jira_done_status: String,

    /// Alternative API base for GitHub Enterprise installations.
    pub github_api_url: Option<String>,

    /// Hard limit on the number of paginated requests per upstream search.
    pub max_api_pages: u32,

    /// Maximum number of review listings requested from GitHub at once.
    pub review_concurrency: usize,
}

fn default_done_status() -> String {
    "Done".to_string()
}

fn default_max_api_pages() -> u32 {
    10
}

fn default_review_concurrency() -> usize {
    8
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let raw: RawConfig = envy::from_env()?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self> {
        let mut missing = Vec::new();
        let mut require = |value: Option<String>, key: &'static str| {
            match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
                Some(v) => v,
                None => {
                    missing.push(key);
                    String::new()
                }
            }
        };

        let jira_url = require(raw.jira_url, "JIRA_URL");
        let jira_email = require(raw.jira_email, "JIRA_EMAIL");
        let jira_api_token = require(raw.jira_api_token, "JIRA_API_TOKEN");
        let github_username = require(raw.github_username, "GITHUB_USERNAME");
        let github_token = require(raw.github_token, "GITHUB_TOKEN");

        if !missing.is_empty() {
            return Err(SummaryError::MissingConfiguration(missing));
        }

        Ok(Self {
            jira_url: jira_url.trim_end_matches('/').to_string(),
            jira_email,
            jira_api_token,
            github_username,
            github_token,
            jira_done_status: raw.jira_done_status,
            github_api_url: raw
                .github_api_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            max_api_pages: raw.max_api_pages.max(1),
            review_concurrency: raw.review_concurrency.max(1),
        })
    }
}
