use std::fmt;

/// The upstream service a failed request was addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Service {
    Tracker,
    HostingPlatform,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Tracker => f.write_str("JIRA"),
            Service::HostingPlatform => f.write_str("GitHub"),
        }
    }
}

/// Errors that terminate a run.
#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("invalid date input '{input}': expected YYYY-MM-DD or a number of days back")]
    InvalidDateInput { input: String },

    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingConfiguration(Vec<&'static str>),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] envy::Error),

    #[error("failed to read interactive input")]
    Input(#[from] std::io::Error),

    #[error("{service} is unavailable")]
    UpstreamUnavailable {
        service: Service,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl SummaryError {
    pub fn invalid_date(input: impl Into<String>) -> Self {
        Self::InvalidDateInput {
            input: input.into(),
        }
    }

    pub fn upstream(service: Service, source: anyhow::Error) -> Self {
        Self::UpstreamUnavailable {
            service,
            source: source.into(),
        }
    }
}

pub type Result<T, E = SummaryError> = std::result::Result<T, E>;
