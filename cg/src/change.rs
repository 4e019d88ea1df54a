//! Change request drafting and validation

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::api::{Group, User};
use crate::risk::{RiskAssessment, RiskLevel};
use crate::search::UserKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChangeError {
    #[error("Please correct the following errors: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("Unknown change type '{name}', expected one of: {allowed}")]
    UnknownType { name: String, allowed: String },

    #[error("No {kind} found matching '{term}'")]
    NoMatch { kind: String, term: String },
}

impl ChangeError {
    /// Individual validation messages
    pub fn messages(&self) -> Vec<String> {
        match self {
            ChangeError::Invalid(errors) => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// value, label, description
const DEFAULT_CHANGE_TYPES: [(&str, &str, &str); 4] = [
    (
        "standard",
        "Standard Change",
        "Pre-approved, routine changes with established procedures and low risk.",
    ),
    (
        "non-production",
        "Non-Production Change",
        "Changes to non-production environments that do not directly impact business operations.",
    ),
    (
        "emergency",
        "Emergency Change",
        "Urgent changes needed to restore service or prevent significant business impact.",
    ),
    (
        "non-standard",
        "Non-Standard Change",
        "Changes requiring additional review due to higher risk or complexity.",
    ),
];

/// Lowercase with spaces and underscores turned into hyphens
fn type_value(label: &str) -> String {
    label.trim().to_lowercase().replace([' ', '_'], "-")
}

/// One change type the operator can pick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeType {
    /// Sent as the payload `type`
    pub value: String,
    pub label: String,
    pub description: Option<String>,
}

impl ChangeType {
    /// The built-in Standard, Non-Production, Emergency and Non-Standard types
    pub fn defaults() -> Vec<ChangeType> {
        DEFAULT_CHANGE_TYPES
            .iter()
            .map(|(value, label, description)| ChangeType {
                value: value.to_string(),
                label: label.to_string(),
                description: Some(description.to_string()),
            })
            .collect()
    }

    /// A type configured by label; its value is the label in kebab case
    pub fn from_label(label: &str) -> ChangeType {
        let value = type_value(label);
        let description = DEFAULT_CHANGE_TYPES
            .iter()
            .find(|(builtin, _, _)| *builtin == value)
            .map(|(_, _, description)| description.to_string());
        ChangeType {
            value,
            label: label.trim().to_string(),
            description,
        }
    }

    /// Types on offer: the configured labels, or the defaults when none are set
    pub fn catalog(configured: &[String]) -> Vec<ChangeType> {
        let configured: Vec<ChangeType> = configured
            .iter()
            .filter(|label| !label.trim().is_empty())
            .map(|label| ChangeType::from_label(label))
            .collect();
        if configured.is_empty() {
            debug!("ChangeType::catalog: no configured types, using defaults");
            return ChangeType::defaults();
        }
        configured
    }

    /// Find the catalog entry matching a value or label, case-insensitively
    pub fn resolve(input: &str, catalog: &[ChangeType]) -> Result<ChangeType, ChangeError> {
        let wanted = type_value(input);
        catalog
            .iter()
            .find(|t| t.value == wanted || type_value(&t.label) == wanted)
            .cloned()
            .ok_or_else(|| ChangeError::UnknownType {
                name: input.to_string(),
                allowed: catalog.iter().map(|t| t.value.as_str()).collect::<Vec<_>>().join(", "),
            })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A picked requester, agent or group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub id: u64,
    pub name: String,
}

impl Selection {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }

    /// Selection given only by id
    pub fn from_id(id: u64) -> Self {
        Self::new(id, format!("#{}", id))
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

impl From<&User> for Selection {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.display_name())
    }
}

impl From<&Group> for Selection {
    fn from(group: &Group) -> Self {
        Self::new(group.id, group.name.clone())
    }
}

/// Search results narrowed towards a single pick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pick {
    One(Selection),
    /// Several candidates and none matches exactly; the operator must choose
    Many(Vec<Selection>),
}

/// Pick a requester or agent from search results
///
/// A lone result wins, then a unique exact match on name or email.
pub fn pick_user(kind: UserKind, term: &str, users: &[User]) -> Result<Pick, ChangeError> {
    debug!(%kind, %term, count = users.len(), "pick_user: called");
    let wanted = term.trim();
    let exact: Vec<&User> = users
        .iter()
        .filter(|u| {
            u.display_name().eq_ignore_ascii_case(wanted)
                || u.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(wanted))
        })
        .collect();
    narrow(
        kind.to_string(),
        term,
        users.iter().map(Selection::from).collect(),
        exact.into_iter().map(Selection::from).collect(),
    )
}

/// Pick an implementation group by name from the full group list
pub fn pick_group(term: &str, groups: &[Group]) -> Result<Pick, ChangeError> {
    debug!(%term, count = groups.len(), "pick_group: called");
    let wanted = term.trim().to_lowercase();
    let matching: Vec<&Group> = groups
        .iter()
        .filter(|g| g.name.to_lowercase().contains(&wanted))
        .collect();
    let exact = matching
        .iter()
        .filter(|g| g.name.to_lowercase() == wanted)
        .map(|g| Selection::from(*g))
        .collect();
    narrow(
        "group".to_string(),
        term,
        matching.into_iter().map(Selection::from).collect(),
        exact,
    )
}

fn narrow(kind: String, term: &str, mut candidates: Vec<Selection>, mut exact: Vec<Selection>) -> Result<Pick, ChangeError> {
    if candidates.is_empty() {
        return Err(ChangeError::NoMatch {
            kind,
            term: term.to_string(),
        });
    }
    if candidates.len() == 1 {
        return Ok(Pick::One(candidates.remove(0)));
    }
    if exact.len() == 1 {
        return Ok(Pick::One(exact.remove(0)));
    }
    Ok(Pick::Many(candidates))
}

/// Change request being filled in
#[derive(Debug, Clone, Default)]
pub struct ChangeDraft {
    pub title: String,
    pub change_type: Option<ChangeType>,
    pub requester: Option<Selection>,
    pub agent: Option<Selection>,
    pub group: Option<Selection>,
    pub risk: RiskAssessment,
}

impl ChangeDraft {
    /// Check every field and build the payload
    ///
    /// All problems are reported together, in form order.
    pub fn validate(&self) -> Result<ChangeRequest, ChangeError> {
        debug!(title = %self.title, "ChangeDraft::validate: called");
        let mut errors = Vec::new();

        if self.title.trim().is_empty() {
            errors.push("Change Title is required".to_string());
        }
        if self.change_type.is_none() {
            errors.push("Change Type is required".to_string());
        }
        if self.requester.is_none() {
            errors.push("Requester selection is required".to_string());
        }
        if self.agent.is_none() {
            errors.push("Agent selection is required".to_string());
        }
        if self.group.is_none() {
            errors.push("Implementation Group is required".to_string());
        }
        let risk = self.risk.result();
        if risk.is_none() {
            errors.push("Risk Assessment must be completed".to_string());
        }

        match (&self.change_type, &self.requester, &self.agent, &self.group, risk) {
            (Some(change_type), Some(requester), Some(agent), Some(group), Some(risk)) if errors.is_empty() => {
                Ok(ChangeRequest {
                    subject: self.title.clone(),
                    change_type: change_type.value.clone(),
                    requester_id: requester.id,
                    agent_id: agent.id,
                    group_id: group.id,
                    risk_score: risk.score,
                    risk_level: risk.level,
                })
            }
            _ => {
                debug!(count = errors.len(), "ChangeDraft::validate: invalid");
                Err(ChangeError::Invalid(errors))
            }
        }
    }
}

/// Payload sent to `/api/v2/changes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub subject: String,
    /// Value of the picked [`ChangeType`]
    #[serde(rename = "type")]
    pub change_type: String,
    pub requester_id: u64,
    pub agent_id: u64,
    pub group_id: u64,
    pub risk_score: u8,
    pub risk_level: RiskLevel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::QUESTIONS;

    fn complete_draft() -> ChangeDraft {
        let mut risk = RiskAssessment::new();
        for question in QUESTIONS.iter() {
            risk.answer(question.id, 2).unwrap();
        }
        ChangeDraft {
            title: "Upgrade core switch".to_string(),
            change_type: Some(ChangeType::from_label("Emergency")),
            requester: Some(Selection::new(11, "Grace Hopper")),
            agent: Some(Selection::new(22, "Ada Lovelace")),
            group: Some(Selection::new(33, "Network")),
            risk,
        }
    }

    #[test]
    fn test_empty_draft_reports_every_error() {
        let err = ChangeDraft::default().validate().unwrap_err();
        assert_eq!(
            err.messages(),
            vec![
                "Change Title is required",
                "Change Type is required",
                "Requester selection is required",
                "Agent selection is required",
                "Implementation Group is required",
                "Risk Assessment must be completed",
            ]
        );
    }

    #[test]
    fn test_whitespace_title_rejected() {
        let draft = ChangeDraft {
            title: "   ".to_string(),
            ..complete_draft()
        };
        assert_eq!(
            draft.validate().unwrap_err(),
            ChangeError::Invalid(vec!["Change Title is required".to_string()])
        );
    }

    #[test]
    fn test_incomplete_risk_rejected() {
        let mut draft = complete_draft();
        draft.risk = RiskAssessment::new();
        draft.risk.answer("testing", 1).unwrap();
        assert_eq!(draft.validate().unwrap_err().messages(), vec!["Risk Assessment must be completed"]);
    }

    #[test]
    fn test_payload() {
        let request = complete_draft().validate().unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "subject": "Upgrade core switch",
                "type": "emergency",
                "requester_id": 11,
                "agent_id": 22,
                "group_id": 33,
                "risk_score": 10,
                "risk_level": "Medium",
            })
        );
    }

    #[test]
    fn test_default_change_types() {
        let catalog = ChangeType::catalog(&[]);
        let values: Vec<&str> = catalog.iter().map(|t| t.as_str()).collect();
        assert_eq!(values, vec!["standard", "non-production", "emergency", "non-standard"]);
        assert!(catalog.iter().all(|t| t.description.is_some()));

        assert_eq!(ChangeType::resolve("standard", &catalog).unwrap().label, "Standard Change");
        assert_eq!(ChangeType::resolve("Non Production", &catalog).unwrap().value, "non-production");
        assert_eq!(ChangeType::resolve("non_standard", &catalog).unwrap().value, "non-standard");
        assert_eq!(ChangeType::resolve("Emergency Change", &catalog).unwrap().value, "emergency");

        let err = ChangeType::resolve("routine", &catalog).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown change type 'routine', expected one of: standard, non-production, emergency, non-standard"
        );
    }

    #[test]
    fn test_configured_change_types() {
        let configured = vec!["Major Release".to_string(), " ".to_string(), "Emergency".to_string()];
        let catalog = ChangeType::catalog(&configured);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].value, "major-release");
        assert_eq!(catalog[0].description, None);
        assert!(catalog[1].description.is_some(), "built-in value keeps its description");

        assert_eq!(ChangeType::resolve("major release", &catalog).unwrap().label, "Major Release");
        assert!(ChangeType::resolve("standard", &catalog).is_err());

        let blank_only = vec!["  ".to_string()];
        assert_eq!(ChangeType::catalog(&blank_only), ChangeType::defaults());
    }

    #[test]
    fn test_selection_from_user_and_group() {
        let user: User = serde_json::from_str(r#"{"id": 5, "first_name": "Ada", "last_name": "Lovelace"}"#).unwrap();
        assert_eq!(Selection::from(&user), Selection::new(5, "Ada Lovelace"));

        let group = Group {
            id: 9,
            name: "DBA".to_string(),
            description: None,
        };
        assert_eq!(Selection::from(&group).name, "DBA");
        assert_eq!(Selection::from(&group).to_string(), "DBA (9)");
        assert_eq!(Selection::from_id(7).name, "#7");
    }

    fn users(json: &str) -> Vec<User> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_pick_user() {
        let one = users(r#"[{"id": 1, "first_name": "Grace", "last_name": "Hopper"}]"#);
        assert_eq!(
            pick_user(UserKind::Requester, "hopper", &one),
            Ok(Pick::One(Selection::new(1, "Grace Hopper")))
        );

        let several = users(
            r#"[
                {"id": 1, "first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com"},
                {"id": 2, "first_name": "Ada", "last_name": "Byron", "email": "byron@example.com"}
            ]"#,
        );
        assert_eq!(
            pick_user(UserKind::Agent, "BYRON@example.com", &several),
            Ok(Pick::One(Selection::new(2, "Ada Byron")))
        );
        assert_eq!(
            pick_user(UserKind::Agent, "ada lovelace", &several),
            Ok(Pick::One(Selection::new(1, "Ada Lovelace")))
        );
        match pick_user(UserKind::Agent, "ada", &several) {
            Ok(Pick::Many(candidates)) => assert_eq!(candidates.len(), 2),
            other => panic!("expected several candidates, got {:?}", other),
        }

        let err = pick_user(UserKind::Agent, "nobody", &[]).unwrap_err();
        assert_eq!(err.to_string(), "No agent found matching 'nobody'");
    }

    #[test]
    fn test_pick_group() {
        let groups: Vec<Group> = serde_json::from_str(
            r#"[{"id": 1, "name": "Network"}, {"id": 2, "name": "Network Security"}, {"id": 3, "name": "DBA"}]"#,
        )
        .unwrap();

        assert_eq!(pick_group("dba", &groups), Ok(Pick::One(Selection::new(3, "DBA"))));
        assert_eq!(pick_group("network", &groups), Ok(Pick::One(Selection::new(1, "Network"))));
        assert_eq!(pick_group("security", &groups), Ok(Pick::One(Selection::new(2, "Network Security"))));
        match pick_group("net", &groups) {
            Ok(Pick::Many(candidates)) => assert_eq!(candidates.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2]),
            other => panic!("expected several candidates, got {:?}", other),
        }
        assert!(matches!(pick_group("storage", &groups), Err(ChangeError::NoMatch { .. })));
    }
}
