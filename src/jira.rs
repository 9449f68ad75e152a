//! Completed ticket lookup against the JIRA REST API.

use crate::config::AppConfig;
use crate::dates::{DateInterval, DATE_FORMAT};
use crate::error::{Result, Service, SummaryError};
use crate::types::Ticket;
use anyhow::Context;
use chrono::{DateTime, Days, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};

const JIRA_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";
const PAGE_SIZE: u32 = 100;
const SEARCH_FIELDS: &str = "summary,status,resolutiondate,updated";

/// Source of tickets the configured user completed.
#[allow(async_fn_in_trait)]
pub trait IssueTracker {
    /// Returns the completed tickets the tracker considers part of `interval`.
    async fn completed_tickets(&self, interval: &DateInterval) -> anyhow::Result<Vec<Ticket>>;
}

/// Fetches the tickets completed within `interval`, oldest first.
///
/// Tickets are ordered by completion date, then by key.
pub async fn fetch_tickets<T: IssueTracker>(
    tracker: &T,
    interval: &DateInterval,
) -> Result<Vec<Ticket>> {
    if interval.is_empty() {
        tracing::debug!(%interval, "Empty interval, skipping ticket search");
        return Ok(Vec::new());
    }

    let mut tickets = tracker
        .completed_tickets(interval)
        .await
        .map_err(|e| SummaryError::upstream(Service::Tracker, e))?;

    tickets.retain(|ticket| interval.contains(ticket.completed_at));
    tickets.sort_by(|a, b| {
        a.completed_at
            .cmp(&b.completed_at)
            .then_with(|| a.key.cmp(&b.key))
    });

    tracing::debug!(count = tickets.len(), "Collected completed tickets");
    Ok(tickets)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchParams<'a> {
    jql: &'a str,
    fields: &'static str,
    max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_page_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<JiraIssue>,
    next_page_token: Option<String>,
    #[serde(default)]
    is_last: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct JiraIssue {
    key: String,
    fields: JiraFields,
}

#[derive(Debug, Deserialize)]
struct JiraFields {
    summary: String,
    #[serde(default, deserialize_with = "deserialize_jira_timestamp")]
    resolutiondate: Option<DateTime<FixedOffset>>,
    #[serde(default, deserialize_with = "deserialize_jira_timestamp")]
    updated: Option<DateTime<FixedOffset>>,
}

fn deserialize_jira_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Deserialize::deserialize(deserializer)?;
    s.map(|s| parse_jira_timestamp(&s).map_err(serde::de::Error::custom))
        .transpose()
}

fn parse_jira_timestamp(s: &str) -> std::result::Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_str(s, JIRA_TIMESTAMP_FORMAT).or_else(|_| DateTime::parse_from_rfc3339(s))
}

/// Token of the search page to request next, if any.
///
/// A token is only followed while `isLast` is not set and fewer than
/// `max_pages` pages have been read; hitting the cap is logged.
fn following_page(
    next_page_token: Option<String>,
    is_last: Option<bool>,
    page_count: u32,
    max_pages: u32,
) -> Option<String> {
    let token = next_page_token.filter(|_| is_last != Some(true))?;
    if page_count >= max_pages {
        tracing::warn!(
            "Hit max_api_pages ({}) while searching JIRA. Tickets may be incomplete.",
            max_pages
        );
        return None;
    }
    Some(token)
}

/// Builds the JQL selecting tickets resolved by the current user inside `interval`.
///
/// JQL date comparisons are against midnight, so the upper bound is the day after
/// the interval end, exclusive.
pub fn completed_tickets_jql(interval: &DateInterval, done_status: &str) -> String {
    let day_after_end = interval
        .end
        .checked_add_days(Days::new(1))
        .unwrap_or(interval.end);
    format!(
        "assignee = currentUser() AND status = \"{}\" AND resolved >= \"{}\" AND resolved < \"{}\" ORDER BY resolved ASC",
        done_status.replace('"', "\\\""),
        interval.start.format(DATE_FORMAT),
        day_after_end.format(DATE_FORMAT),
    )
}

/// HTTP client for JIRA Cloud's search API.
pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
    done_status: String,
    max_pages: u32,
}

impl JiraClient {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.jira_url.clone(),
            email: config.jira_email.clone(),
            api_token: config.jira_api_token.clone(),
            done_status: config.jira_done_status.clone(),
            max_pages: config.max_api_pages,
        })
    }

    fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base_url, key)
    }

    async fn search_page(
        &self,
        jql: &str,
        page_token: Option<&str>,
    ) -> anyhow::Result<SearchResponse> {
        let params = SearchParams {
            jql,
            fields: SEARCH_FIELDS,
            max_results: PAGE_SIZE,
            next_page_token: page_token,
        };

        let response = self
            .http
            .get(format!("{}/rest/api/3/search/jql", self.base_url))
            .basic_auth(&self.email, Some(&self.api_token))
            .query(&params)
            .send()
            .await
            .context("failed to reach JIRA search endpoint")?
            .error_for_status()
            .context("JIRA search request was rejected")?;

        let body = response
            .bytes()
            .await
            .context("failed to read JIRA search response")?;
        serde_json::from_slice(&body).context("malformed JIRA search response")
    }

    fn ticket_from(&self, issue: JiraIssue) -> Option<Ticket> {
        let completed = issue.fields.resolutiondate.or(issue.fields.updated)?;
        Some(Ticket {
            url: self.browse_url(&issue.key),
            key: issue.key,
            title: issue.fields.summary,
            completed_at: completed.date_naive(),
        })
    }
}

impl IssueTracker for JiraClient {
    async fn completed_tickets(&self, interval: &DateInterval) -> anyhow::Result<Vec<Ticket>> {
        let jql = completed_tickets_jql(interval, &self.done_status);
        tracing::debug!(%jql, "Searching JIRA");

        let mut tickets = Vec::new();
        let mut page_token: Option<String> = None;
        let mut page_count = 0;

        loop {
            let SearchResponse {
                issues,
                next_page_token,
                is_last,
            } = self.search_page(&jql, page_token.as_deref()).await?;
            page_count += 1;

            for issue in issues {
                let key = issue.key.clone();
                match self.ticket_from(issue) {
                    Some(ticket) => tickets.push(ticket),
                    None => tracing::debug!(%key, "Skipping ticket without completion timestamp"),
                }
            }

            page_token = following_page(next_page_token, is_last, page_count, self.max_pages);
            if page_token.is_none() {
                break;
            }
        }

        Ok(tickets)
    }
}
