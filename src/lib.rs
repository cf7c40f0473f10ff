pub mod aggregate;
pub mod changelog;
pub mod client;
pub mod dialect;
pub mod error;
pub mod history;
pub mod models;
pub mod query_binder;
pub mod reconstruct;
pub mod search;
pub mod timestamp;

pub use client::{Auth, InstallationType, JiraClient, JiraConfig};
pub use error::{Error, Result};
pub use models::*;

// Dialect re-exports
pub use dialect::{ApiDialect, CloudDialect, ServerDialect, dialect_for};

// Query binder re-exports
pub use query_binder::{BoundingMatcher, DEFAULT_BOUND, QueryBinder};

// Search re-exports
pub use search::{AllIssuesOptions, IssueSearch};

// Changelog re-exports
pub use changelog::{ChangelogPager, HistoryPageSet};

// History re-exports
pub use history::{BatchHistoryReport, HistoryConfig, HistoryService, IssueFailure, IssueTimeline};
pub use reconstruct::{StatusChange, reconstruct};

// Aggregation re-exports
pub use aggregate::{StatusDurationSummary, TransitionStats, status_residency};

pub use timestamp::parse_jira_timestamp;

pub use tokio_util::sync::CancellationToken;
