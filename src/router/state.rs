//! Per-query state machine
//!
//! Received -> Classified -> Dispatched -> Completed | Failed.
//! Failed and Cancelled are reachable from any non-terminal state.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RagsqlError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    Received,
    Classified,
    Dispatched,
    Completed,
    Failed,
    Cancelled,
}

impl QueryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Completed | QueryState::Failed | QueryState::Cancelled)
    }

    pub fn can_transition_to(&self, next: QueryState) -> bool {
        use QueryState::*;
        match (self, next) {
            (Received, Classified) | (Classified, Dispatched) | (Dispatched, Completed) => true,
            (from, Failed | Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryState::Received => "received",
            QueryState::Classified => "classified",
            QueryState::Dispatched => "dispatched",
            QueryState::Completed => "completed",
            QueryState::Failed => "failed",
            QueryState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Tracks one query's progress and logs each transition
#[derive(Debug, Clone)]
pub struct QueryLifecycle {
    query_id: String,
    state: QueryState,
}

impl QueryLifecycle {
    pub fn new(query_id: impl Into<String>) -> Self {
        Self {
            query_id: query_id.into(),
            state: QueryState::Received,
        }
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn transition(&mut self, next: QueryState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(RagsqlError::InvalidState(format!(
                "{}: cannot go from {} to {}",
                self.query_id, self.state, next
            )));
        }
        log::debug!("{}: {} -> {}", self.query_id, self.state, next);
        self.state = next;
        Ok(())
    }
}
