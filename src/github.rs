//! Pull request reviews left by the configured user, via the GitHub API.

use crate::config::AppConfig;
use crate::dates::{DateInterval, DATE_FORMAT};
use crate::error::{Result, Service, SummaryError};
use crate::types::{RepoId, ReviewState, ReviewedPullRequest};
use anyhow::Context;
use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, StreamExt};
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const PAGE_SIZE: u8 = 100;

/// A pull request the search API reported as reviewed by the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PullRequestRef {
    pub repository: RepoId,
    pub number: u64,
    pub title: String,
    pub url: String,
}

/// A single review submitted on a pull request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewEvent {
    pub reviewer: String,
    /// `None` for dismissed reviews and states this tool does not know.
    pub state: Option<ReviewState>,
    /// Pending reviews have not been submitted yet.
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Source of pull requests and their reviews.
#[allow(async_fn_in_trait)]
pub trait ReviewSource {
    /// Pull requests `reviewer` may have reviewed during `interval`.
    async fn reviewed_pull_requests(
        &self,
        reviewer: &str,
        interval: &DateInterval,
    ) -> anyhow::Result<Vec<PullRequestRef>>;

    /// Every review submitted on `pull_request`, by anyone.
    async fn reviews(&self, pull_request: &PullRequestRef) -> anyhow::Result<Vec<ReviewEvent>>;
}

/// Fetches the pull requests `reviewer` reviewed within `interval`, one entry
/// per pull request, oldest review first.
///
/// Review timestamps are placed on calendar days in `tz`.
pub async fn fetch_reviews<S, Tz>(
    source: &S,
    reviewer: &str,
    interval: &DateInterval,
    tz: &Tz,
    concurrency: usize,
) -> Result<Vec<ReviewedPullRequest>>
where
    S: ReviewSource,
    Tz: TimeZone,
{
    if interval.is_empty() {
        tracing::debug!(%interval, "Empty interval, skipping review search");
        return Ok(Vec::new());
    }

    let upstream = |e: anyhow::Error| SummaryError::upstream(Service::HostingPlatform, e);

    let candidates = source
        .reviewed_pull_requests(reviewer, interval)
        .await
        .map_err(upstream)?;
    tracing::debug!(count = candidates.len(), "Found candidate pull requests");

    let mut pulls = Vec::with_capacity(candidates.len());
    let mut review_stream = stream::iter(candidates)
        .map(|pull_request| async move {
            let events = source.reviews(&pull_request).await.with_context(|| {
                format!(
                    "failed to list reviews of {}#{}",
                    pull_request.repository, pull_request.number
                )
            })?;
            Ok::<_, anyhow::Error>((pull_request, events))
        })
        .buffered(concurrency.max(1));

    while let Some(result) = review_stream.next().await {
        pulls.push(result.map_err(upstream)?);
    }

    let reviews = collapse_reviews(reviewer, interval, tz, pulls);
    tracing::debug!(count = reviews.len(), "Collected reviewed pull requests");
    Ok(reviews)
}

/// Reduces review events to one entry per pull request, keeping the latest
/// review `reviewer` submitted within `interval`. A review belongs to the
/// calendar day it was submitted on in `tz`.
///
/// Entries are ordered by review time, then repository and number.
pub fn collapse_reviews<Tz: TimeZone>(
    reviewer: &str,
    interval: &DateInterval,
    tz: &Tz,
    pulls: Vec<(PullRequestRef, Vec<ReviewEvent>)>,
) -> Vec<ReviewedPullRequest> {
    let mut latest: HashMap<(RepoId, u64), (DateTime<Utc>, ReviewedPullRequest)> = HashMap::new();

    for (pull_request, events) in pulls {
        for event in events {
            if !event.reviewer.eq_ignore_ascii_case(reviewer) {
                continue;
            }
            let (Some(state), Some(submitted_at)) = (event.state, event.submitted_at) else {
                continue;
            };
            let reviewed_at = submitted_at.with_timezone(tz).date_naive();
            if !interval.contains(reviewed_at) {
                continue;
            }

            let key = (pull_request.repository.clone(), pull_request.number);
            if latest
                .get(&key)
                .is_some_and(|(seen_at, _)| *seen_at >= submitted_at)
            {
                continue;
            }

            latest.insert(
                key,
                (
                    submitted_at,
                    ReviewedPullRequest {
                        repository: pull_request.repository.clone(),
                        number: pull_request.number,
                        title: pull_request.title.clone(),
                        url: pull_request.url.clone(),
                        state,
                        reviewed_at,
                    },
                ),
            );
        }
    }

    let mut collapsed: Vec<_> = latest.into_values().collect();
    collapsed.sort_by(|(a_at, a), (b_at, b)| {
        a_at.cmp(b_at)
            .then_with(|| a.repository.cmp(&b.repository))
            .then_with(|| a.number.cmp(&b.number))
    });
    collapsed.into_iter().map(|(_, review)| review).collect()
}

/// Search query for pull requests reviewed by `reviewer` and touched since the
/// interval started. Reviews inside the interval may precede later updates, so
/// the upper bound is applied to the reviews themselves.
pub fn reviewed_by_query(reviewer: &str, interval: &DateInterval) -> String {
    format!(
        "is:pr reviewed-by:{} updated:>={}",
        reviewer,
        interval.start.format(DATE_FORMAT)
    )
}

/// Whether to request the page after `page_count`. Stops at `max_pages`,
/// logging that `listing` may be incomplete.
fn continue_paging(has_more: bool, page_count: u32, max_pages: u32, listing: &str) -> bool {
    if !has_more {
        return false;
    }
    if page_count >= max_pages {
        tracing::warn!(
            "Hit max_api_pages ({}) while {}. Reviews may be incomplete.",
            max_pages,
            listing
        );
        return false;
    }
    true
}

#[derive(Debug, Serialize)]
struct ReviewPageParams {
    per_page: u8,
    page: u32,
}

#[derive(Debug, Deserialize)]
struct GitHubReview {
    user: Option<GitHubUser>,
    state: GitHubReviewState,
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum GitHubReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Pending,
    Dismissed,
    #[serde(other)]
    Unknown,
}

impl GitHubReviewState {
    fn outcome(&self) -> Option<ReviewState> {
        match self {
            GitHubReviewState::Approved => Some(ReviewState::Approved),
            GitHubReviewState::ChangesRequested => Some(ReviewState::ChangesRequested),
            GitHubReviewState::Commented => Some(ReviewState::Commented),
            GitHubReviewState::Pending => Some(ReviewState::Pending),
            GitHubReviewState::Dismissed | GitHubReviewState::Unknown => None,
        }
    }
}

impl GitHubReview {
    fn into_event(self) -> Option<ReviewEvent> {
        Some(ReviewEvent {
            reviewer: self.user?.login,
            state: self.state.outcome(),
            submitted_at: self.submitted_at,
        })
    }
}

pub struct GitHubClient {
    octocrab: Octocrab,
    max_pages: u32,
}

impl GitHubClient {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let mut builder = Octocrab::builder().personal_token(config.github_token.clone());
        if let Some(api_url) = &config.github_api_url {
            builder = builder.base_uri(api_url.as_str())?;
        }

        Ok(Self {
            octocrab: builder.build()?,
            max_pages: config.max_api_pages,
        })
    }

    fn pull_request_ref(issue: &octocrab::models::issues::Issue) -> Option<PullRequestRef> {
        let repository = RepoId::from_api_url(issue.repository_url.as_str())?;
        Some(PullRequestRef {
            repository,
            number: issue.number,
            title: issue.title.clone(),
            url: issue.html_url.to_string(),
        })
    }
}

impl ReviewSource for GitHubClient {
    async fn reviewed_pull_requests(
        &self,
        reviewer: &str,
        interval: &DateInterval,
    ) -> anyhow::Result<Vec<PullRequestRef>> {
        let query = reviewed_by_query(reviewer, interval);
        tracing::debug!(%query, "Searching GitHub");

        let mut pull_requests = Vec::new();

        let mut current_page = self
            .octocrab
            .search()
            .issues_and_pull_requests(&query)
            .sort("updated")
            .order("asc")
            .per_page(PAGE_SIZE)
            .send()
            .await
            .context("GitHub search request failed")?;

        let mut page_count = 1;

        loop {
            for issue in &current_page {
                match Self::pull_request_ref(issue) {
                    Some(pull_request) => pull_requests.push(pull_request),
                    None => tracing::debug!(
                        url = %issue.repository_url,
                        "Skipping search result with unrecognized repository URL"
                    ),
                }
            }

            let has_more = current_page.next.is_some();
            if !continue_paging(has_more, page_count, self.max_pages, "searching GitHub") {
                break;
            }

            match self
                .octocrab
                .get_page(&current_page.next)
                .await
                .context("GitHub search pagination failed")?
            {
                Some(next_page) => {
                    current_page = next_page;
                    page_count += 1;
                }
                None => break,
            }
        }

        Ok(pull_requests)
    }

    async fn reviews(&self, pull_request: &PullRequestRef) -> anyhow::Result<Vec<ReviewEvent>> {
        let route = format!(
            "/repos/{}/{}/pulls/{}/reviews",
            pull_request.repository.owner, pull_request.repository.repo, pull_request.number
        );

        let listing = format!(
            "listing reviews of {}#{}",
            pull_request.repository, pull_request.number
        );

        let mut events = Vec::new();
        let mut page = 1;
        loop {
            let params = ReviewPageParams {
                per_page: PAGE_SIZE,
                page,
            };
            let batch: Vec<GitHubReview> = self.octocrab.get(&route, Some(&params)).await?;
            let full_page = batch.len() >= usize::from(PAGE_SIZE);
            events.extend(batch.into_iter().filter_map(GitHubReview::into_event));
            if !continue_paging(full_page, page, self.max_pages, &listing) {
                break;
            }
            page += 1;
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn pull_request(owner: &str, repo: &str, number: u64) -> PullRequestRef {
        PullRequestRef {
            repository: RepoId {
                owner: owner.to_string(),
                repo: repo.to_string(),
            },
            number,
            title: format!("Change #{number}"),
            url: format!("https://github.com/{owner}/{repo}/pull/{number}"),
        }
    }

    fn event(reviewer: &str, state: ReviewState, at: DateTime<Utc>) -> ReviewEvent {
        ReviewEvent {
            reviewer: reviewer.to_string(),
            state: Some(state),
            submitted_at: Some(at),
        }
    }

    fn october() -> DateInterval {
        DateInterval::new(date(2024, 10, 17), date(2024, 10, 31))
    }

    #[test]
    fn test_collapse_keeps_latest_state() {
        let pulls = vec![(
            pull_request("acme", "api", 42),
            vec![
                event("octocat", ReviewState::Approved, noon(2024, 10, 25)),
                event("octocat", ReviewState::ChangesRequested, noon(2024, 10, 20)),
                event("someone", ReviewState::Commented, noon(2024, 10, 26)),
            ],
        )];

        let reviews = collapse_reviews("octocat", &october(), &Utc, pulls);

        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].number, 42);
        assert_eq!(reviews[0].state, ReviewState::Approved);
        assert_eq!(reviews[0].reviewed_at, date(2024, 10, 25));
    }

    #[test]
    fn test_collapse_merges_duplicate_search_hits() {
        let pulls = vec![
            (
                pull_request("acme", "api", 42),
                vec![event("octocat", ReviewState::Commented, noon(2024, 10, 18))],
            ),
            (
                pull_request("acme", "api", 42),
                vec![event("octocat", ReviewState::Approved, noon(2024, 10, 19))],
            ),
        ];

        let reviews = collapse_reviews("octocat", &october(), &Utc, pulls);

        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].state, ReviewState::Approved);
    }

    #[test]
    fn test_collapse_filters_interval_inclusively() {
        let pulls = vec![
            (
                pull_request("acme", "api", 1),
                vec![event("octocat", ReviewState::Approved, noon(2024, 10, 16))],
            ),
            (
                pull_request("acme", "api", 2),
                vec![event("octocat", ReviewState::Approved, noon(2024, 10, 17))],
            ),
            (
                pull_request("acme", "api", 3),
                vec![event("octocat", ReviewState::Approved, noon(2024, 10, 31))],
            ),
            (
                pull_request("acme", "api", 4),
                vec![event("octocat", ReviewState::Approved, noon(2024, 11, 1))],
            ),
        ];

        let numbers: Vec<_> = collapse_reviews("octocat", &october(), &Utc, pulls)
            .iter()
            .map(|r| r.number)
            .collect();
        assert_eq!(numbers, vec![2, 3]);
    }

    #[test]
    fn test_collapse_orders_by_time_then_repository_and_number() {
        let same_time = noon(2024, 10, 20);
        let pulls = vec![
            (
                pull_request("acme", "web", 3),
                vec![event("octocat", ReviewState::Commented, same_time)],
            ),
            (
                pull_request("acme", "api", 9),
                vec![event("octocat", ReviewState::Commented, same_time)],
            ),
            (
                pull_request("acme", "api", 7),
                vec![event("octocat", ReviewState::Commented, same_time)],
            ),
            (
                pull_request("acme", "zzz", 1),
                vec![event("octocat", ReviewState::Commented, noon(2024, 10, 18))],
            ),
        ];

        let order: Vec<_> = collapse_reviews("octocat", &october(), &Utc, pulls)
            .iter()
            .map(|r| format!("{}#{}", r.repository, r.number))
            .collect();
        assert_eq!(order, vec!["acme/zzz#1", "acme/api#7", "acme/api#9", "acme/web#3"]);
    }

    #[test]
    fn test_collapse_ignores_dismissed_and_unsubmitted_reviews() {
        let pulls = vec![(
            pull_request("acme", "api", 5),
            vec![
                ReviewEvent {
                    reviewer: "octocat".to_string(),
                    state: None,
                    submitted_at: Some(noon(2024, 10, 20)),
                },
                ReviewEvent {
                    reviewer: "octocat".to_string(),
                    state: Some(ReviewState::Pending),
                    submitted_at: None,
                },
            ],
        )];

        assert!(collapse_reviews("octocat", &october(), &Utc, pulls).is_empty());
    }

    #[test]
    fn test_collapse_matches_login_case_insensitively() {
        let pulls = vec![(
            pull_request("acme", "api", 5),
            vec![event("OctoCat", ReviewState::Approved, noon(2024, 10, 20))],
        )];

        assert_eq!(collapse_reviews("octocat", &october(), &Utc, pulls).len(), 1);
    }

    #[test]
    fn test_collapse_uses_calendar_day_of_timezone() {
        let pulls = || {
            vec![(
                pull_request("acme", "api", 8),
                vec![event("octocat", ReviewState::Approved, noon(2024, 10, 31))],
            )]
        };
        let far_east = FixedOffset::east_opt(13 * 3600).unwrap();

        let in_utc = collapse_reviews("octocat", &october(), &Utc, pulls());
        assert_eq!(in_utc.len(), 1);
        assert_eq!(in_utc[0].reviewed_at, date(2024, 10, 31));

        assert!(collapse_reviews("octocat", &october(), &far_east, pulls()).is_empty());

        let november_first = DateInterval::new(date(2024, 11, 1), date(2024, 11, 1));
        let shifted = collapse_reviews("octocat", &november_first, &far_east, pulls());
        assert_eq!(shifted.len(), 1);
        assert_eq!(shifted[0].reviewed_at, date(2024, 11, 1));
    }

    #[test]
    fn test_continue_paging_stops_without_more_pages() {
        assert!(!continue_paging(false, 1, 5, "searching GitHub"));
    }

    #[test]
    fn test_continue_paging_follows_until_cap() {
        assert!(continue_paging(true, 1, 5, "searching GitHub"));
        assert!(continue_paging(true, 4, 5, "listing reviews of acme/api#1"));
        assert!(!continue_paging(true, 5, 5, "listing reviews of acme/api#1"));
        assert!(!continue_paging(true, 1, 1, "searching GitHub"));
    }

    struct FakeSource {
        pulls: Vec<(PullRequestRef, Vec<ReviewEvent>)>,
        review_calls: AtomicUsize,
        fail_reviews: bool,
    }

    impl FakeSource {
        fn new(pulls: Vec<(PullRequestRef, Vec<ReviewEvent>)>) -> Self {
            Self {
                pulls,
                review_calls: AtomicUsize::new(0),
                fail_reviews: false,
            }
        }
    }

    impl ReviewSource for FakeSource {
        async fn reviewed_pull_requests(
            &self,
            _reviewer: &str,
            _interval: &DateInterval,
        ) -> anyhow::Result<Vec<PullRequestRef>> {
            Ok(self.pulls.iter().map(|(pr, _)| pr.clone()).collect())
        }

        async fn reviews(&self, pull_request: &PullRequestRef) -> anyhow::Result<Vec<ReviewEvent>> {
            self.review_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_reviews {
                anyhow::bail!("502 Bad Gateway");
            }
            Ok(self
                .pulls
                .iter()
                .find(|(pr, _)| pr == pull_request)
                .map(|(_, events)| events.clone())
                .unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn test_fetch_reviews_collects_every_pull_request() {
        let source = FakeSource::new(vec![
            (
                pull_request("acme", "api", 1),
                vec![event("octocat", ReviewState::Approved, noon(2024, 10, 21))],
            ),
            (
                pull_request("acme", "web", 2),
                vec![event("octocat", ReviewState::Commented, noon(2024, 10, 19))],
            ),
            (pull_request("acme", "web", 3), vec![]),
        ]);

        let reviews = fetch_reviews(&source, "octocat", &october(), &Utc, 2).await.unwrap();

        assert_eq!(source.review_calls.load(Ordering::SeqCst), 3);
        let numbers: Vec<_> = reviews.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_fetch_reviews_failure_is_upstream_unavailable() {
        let mut source = FakeSource::new(vec![(pull_request("acme", "api", 1), vec![])]);
        source.fail_reviews = true;

        let err = fetch_reviews(&source, "octocat", &october(), &Utc, 4)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SummaryError::UpstreamUnavailable {
                service: Service::HostingPlatform,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_fetch_reviews_empty_interval_skips_source() {
        let source = FakeSource::new(vec![(pull_request("acme", "api", 1), vec![])]);
        let interval = DateInterval::new(date(2024, 10, 31), date(2024, 10, 1));

        let reviews = fetch_reviews(&source, "octocat", &interval, &Utc, 4).await.unwrap();

        assert!(reviews.is_empty());
        assert_eq!(source.review_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reviewed_by_query() {
        assert_eq!(
            reviewed_by_query("octocat", &october()),
            "is:pr reviewed-by:octocat updated:>=2024-10-17"
        );
    }

    #[test]
    fn test_review_payload_contract() {
        let payload = r#"[
            {
                "id": 80,
                "user": { "login": "octocat", "id": 1 },
                "body": "Looks good",
                "state": "APPROVED",
                "submitted_at": "2024-10-20T12:00:00Z"
            },
            {
                "id": 81,
                "user": { "login": "octocat", "id": 1 },
                "state": "DISMISSED",
                "submitted_at": "2024-10-21T12:00:00Z"
            },
            {
                "id": 82,
                "user": { "login": "octocat", "id": 1 },
                "state": "PENDING"
            },
            {
                "id": 83,
                "user": null,
                "state": "COMMENTED",
                "submitted_at": "2024-10-22T12:00:00Z"
            },
            {
                "id": 84,
                "user": { "login": "hubot", "id": 2 },
                "state": "SOMETHING_NEW",
                "submitted_at": "2024-10-23T12:00:00Z"
            }
        ]"#;

        let reviews: Vec<GitHubReview> = serde_json::from_str(payload).unwrap();
        let events: Vec<_> = reviews
            .into_iter()
            .filter_map(GitHubReview::into_event)
            .collect();

        assert_eq!(events.len(), 4);
        assert_eq!(events[0].state, Some(ReviewState::Approved));
        assert_eq!(events[0].submitted_at, Some(noon(2024, 10, 20)));
        assert_eq!(events[1].state, None);
        assert_eq!(events[2].state, Some(ReviewState::Pending));
        assert_eq!(events[2].submitted_at, None);
        assert_eq!(events[3].reviewer, "hubot");
        assert_eq!(events[3].state, None);
    }
}
