//! Agent and requester search query construction

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors raised before a search reaches the API
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("Search term must not be empty")]
    EmptyTerm,

    #[error("Unknown user kind '{0}', expected 'agents' or 'requesters'")]
    UnknownKind(String),
}

/// Which Freshservice user collection to search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserKind {
    Agent,
    Requester,
}

impl UserKind {
    /// Collection key used in both the path and the response body
    pub fn collection(&self) -> &'static str {
        match self {
            UserKind::Agent => "agents",
            UserKind::Requester => "requesters",
        }
    }
}

impl fmt::Display for UserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserKind::Agent => write!(f, "agent"),
            UserKind::Requester => write!(f, "requester"),
        }
    }
}

impl FromStr for UserKind {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "agent" | "agents" => Ok(UserKind::Agent),
            "requester" | "requesters" => Ok(UserKind::Requester),
            other => Err(SearchError::UnknownKind(other.to_string())),
        }
    }
}

const ADVANCED_MARKERS: &[&str] = &[":", "AND ", " AND", "OR ", " OR", "(", ")", "~[", "<", ">", "!="];

/// True when the term already uses Freshservice query syntax
pub fn is_advanced_query(term: &str) -> bool {
    ADVANCED_MARKERS.iter().any(|marker| term.contains(marker))
}

/// Query expression for an agent search
///
/// A plain term becomes a prefix match over name and email; advanced
/// queries pass through untouched.
pub fn agent_query(term: &str) -> String {
    if is_advanced_query(term) {
        term.to_string()
    } else {
        format!("~[first_name|last_name|email]:'{}'", term)
    }
}

/// Relative API path for a user search
pub fn search_path(kind: UserKind, term: &str) -> Result<String, SearchError> {
    let term = term.trim();
    if term.is_empty() {
        return Err(SearchError::EmptyTerm);
    }

    let path = match kind {
        UserKind::Agent => {
            let query = agent_query(term);
            format!("/api/v2/agents?query=\"{}\"", urlencoding::encode(&query))
        }
        UserKind::Requester if term.contains('@') => {
            format!("/api/v2/requesters?email={}", urlencoding::encode(term))
        }
        UserKind::Requester => format!("/api/v2/requesters?query={}", urlencoding::encode(term)),
    };
    debug!(%kind, %path, "search_path: built");
    Ok(path)
}
