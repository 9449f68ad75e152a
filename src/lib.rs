pub mod config;
pub mod dates;
pub mod error;
pub mod github;
pub mod jira;
pub mod prompt;
pub mod report;
pub mod types;

use chrono::TimeZone;
use config::AppConfig;
use dates::DateInterval;
use error::Result;
use github::{GitHubClient, ReviewSource};
use jira::{IssueTracker, JiraClient};
use types::SprintSummary;

/// Handles to both upstream services, built once from the configuration.
pub struct Upstreams<T, S> {
    pub tracker: T,
    pub reviews: S,
}

impl Upstreams<JiraClient, GitHubClient> {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            tracker: JiraClient::new(config)?,
            reviews: GitHubClient::new(config)?,
        })
    }
}

/// Fetches tickets and reviews for `interval` concurrently.
///
/// Reviews are dated by their submission day in `tz`. Fails as soon as either
/// fetch fails, so a summary is never missing a section.
pub async fn collect_summary<T, S, Tz>(
    upstreams: &Upstreams<T, S>,
    config: &AppConfig,
    interval: DateInterval,
    tz: &Tz,
) -> Result<SprintSummary>
where
    T: IssueTracker,
    S: ReviewSource,
    Tz: TimeZone,
{
    tracing::info!(%interval, reviewer = %config.github_username, "Collecting sprint summary");

    let (tickets, reviews) = tokio::try_join!(
        jira::fetch_tickets(&upstreams.tracker, &interval),
        github::fetch_reviews(
            &upstreams.reviews,
            &config.github_username,
            &interval,
            tz,
            config.review_concurrency,
        ),
    )?;

    Ok(SprintSummary {
        interval,
        tickets,
        reviews,
    })
}
