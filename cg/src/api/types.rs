//! Freshservice resource types and response normalization

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::ApiError;

/// An agent or requester
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Agents carry `email`, requesters `primary_email`
    #[serde(default, alias = "primary_email")]
    pub email: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default, alias = "department")]
    pub department_name: Option<String>,
}

impl User {
    /// "First Last", then `name`, then a placeholder
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) if !first.is_empty() || !last.is_empty() => {
                format!("{} {}", first, last).trim().to_string()
            }
            (Some(first), None) if !first.is_empty() => first.clone(),
            _ => self.name.clone().unwrap_or_else(|| "Unknown User".to_string()),
        }
    }
}

/// An agent group, used as the implementation group of a change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Extract a list of resources from a Freshservice response body
///
/// Accepts `{"<key>": [...]}`, a bare array, either of those wrapped in
/// `{"data": ...}`, or a JSON string holding any of the above.
pub fn parse_list<T: DeserializeOwned>(body: &str, key: &str) -> Result<Vec<T>, ApiError> {
    debug!(%key, body_len = body.len(), "parse_list: called");
    let value: Value = serde_json::from_str(body)?;
    let items = find_list(value, key, 0)
        .ok_or_else(|| ApiError::InvalidResponse(format!("expected a list of {} in response", key)))?;
    Ok(serde_json::from_value(Value::Array(items))?)
}

fn find_list(value: Value, key: &str, depth: u8) -> Option<Vec<Value>> {
    if depth > 3 {
        return None;
    }
    match value {
        Value::Array(items) => Some(items),
        Value::String(text) => {
            debug!("find_list: body is a JSON string, decoding again");
            let inner = serde_json::from_str(&text).ok()?;
            find_list(inner, key, depth + 1)
        }
        Value::Object(mut map) => {
            if let Some(inner) = map.remove(key) {
                return find_list(inner, key, depth + 1);
            }
            let inner = map.remove("data")?;
            find_list(inner, key, depth + 1)
        }
        _ => None,
    }
}
