use crate::dates::DateInterval;
use chrono::NaiveDate;
use std::fmt;

/// A unique identifier for a GitHub repository.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepoId {
    /// The owner of the repository (e.g., "facebook").
    pub owner: String,
    /// The name of the repository (e.g., "react").
    pub repo: String,
}

impl RepoId {
    /// Extracts the repository from a GitHub API repository URL,
    /// e.g. `https://api.github.com/repos/rust-lang/rust`.
    pub fn from_api_url(url: &str) -> Option<Self> {
        let mut segments = url.trim_end_matches('/').rsplit('/');
        let repo = segments.next()?.trim();
        let owner = segments.next()?.trim();
        if owner.is_empty() || repo.is_empty() || segments.next()? != "repos" {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A tracker ticket that reached its terminal status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub key: String,
    pub title: String,
    pub url: String,
    pub completed_at: NaiveDate,
}

/// Outcome of a pull request review.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Pending,
}

impl ReviewState {
    /// Marker shown in front of a review in the detailed report.
    pub fn marker(self) -> &'static str {
        match self {
            ReviewState::Approved => "✅",
            ReviewState::ChangesRequested => "❌",
            ReviewState::Commented => "💬",
            ReviewState::Pending => "🔄",
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ReviewState::Approved => "approved",
            ReviewState::ChangesRequested => "changes requested",
            ReviewState::Commented => "commented",
            ReviewState::Pending => "pending",
        };
        f.write_str(label)
    }
}

/// A pull request the reviewer acted on, collapsed to their latest review.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewedPullRequest {
    pub repository: RepoId,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub state: ReviewState,
    pub reviewed_at: NaiveDate,
}

/// Everything the report is rendered from.
#[derive(Clone, Debug)]
pub struct SprintSummary {
    pub interval: DateInterval,
    pub tickets: Vec<Ticket>,
    pub reviews: Vec<ReviewedPullRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_id_from_api_url() {
        let repo_id = RepoId::from_api_url("https://api.github.com/repos/rust-lang/rust").unwrap();
        assert_eq!(repo_id.owner, "rust-lang");
        assert_eq!(repo_id.repo, "rust");
        assert_eq!(repo_id.to_string(), "rust-lang/rust");
    }

    #[test]
    fn test_repo_id_from_enterprise_api_url() {
        let repo_id =
            RepoId::from_api_url("https://git.example.com/api/v3/repos/platform/billing/").unwrap();
        assert_eq!(repo_id.owner, "platform");
        assert_eq!(repo_id.repo, "billing");
    }

    #[test]
    fn test_repo_id_from_invalid_url() {
        assert!(RepoId::from_api_url("https://api.github.com/users/octocat").is_none());
        assert!(RepoId::from_api_url("rust").is_none());
    }

    #[test]
    fn test_repo_id_ordering() {
        let a = RepoId {
            owner: "acme".to_string(),
            repo: "zeta".to_string(),
        };
        let b = RepoId {
            owner: "beta".to_string(),
            repo: "alpha".to_string(),
        };
        assert!(a < b);
    }
}
