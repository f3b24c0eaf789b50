//! Status of a query execution as reported by the remote service.

use crate::error::{QuarryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl QueryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryState::Queued => "QUEUED",
            QueryState::Running => "RUNNING",
            QueryState::Succeeded => "SUCCEEDED",
            QueryState::Failed => "FAILED",
            QueryState::Cancelled => "CANCELLED",
        }
    }

    /// SUCCEEDED, FAILED and CANCELLED are terminal; no further transitions occur.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueryState::Succeeded | QueryState::Failed | QueryState::Cancelled
        )
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(QueryState::Queued),
            "RUNNING" => Ok(QueryState::Running),
            "SUCCEEDED" => Ok(QueryState::Succeeded),
            "FAILED" => Ok(QueryState::Failed),
            "CANCELLED" => Ok(QueryState::Cancelled),
            other => Err(format!("Unknown query state: {}", other)),
        }
    }
}

/// Snapshot of one query execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryInfo {
    pub execution_id: String,
    pub sql: String,
    pub database: Option<String>,
    pub output_location: Option<String>,
    pub state: QueryState,
    /// Why the state last changed. Often missing for cancelled queries.
    pub state_reason: Option<String>,
    pub scanned_bytes: u64,
    pub execution_time: Duration,
}

impl QueryInfo {
    pub fn finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn succeeded(&self) -> bool {
        self.state == QueryState::Succeeded
    }

    /// Turn a finished, unsuccessful execution into [`QuarryError::QueryFailed`].
    pub fn check(&self) -> Result<()> {
        if self.finished() && !self.succeeded() {
            return Err(QuarryError::QueryFailed {
                execution_id: self.execution_id.clone(),
                state: self.state,
                reason: self.state_reason.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for QueryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, scanned {} bytes in {} ms",
            self.state,
            self.scanned_bytes,
            self.execution_time.as_millis()
        )
    }
}
