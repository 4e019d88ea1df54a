//! Change risk questionnaire and scoring

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RiskError {
    #[error("Unknown risk question '{0}'")]
    UnknownQuestion(String),

    #[error("Answer for '{question}' must be 1, 2 or 3, got {value}")]
    InvalidAnswer { question: String, value: u8 },

    #[error("Malformed answer '{0}', expected <question>=<1-3>")]
    Malformed(String),
}

/// One selectable answer
#[derive(Debug, Clone, Copy)]
pub struct RiskOption {
    pub value: u8,
    pub text: &'static str,
}

/// One question of the questionnaire
#[derive(Debug, Clone, Copy)]
pub struct RiskQuestion {
    pub id: &'static str,
    pub text: &'static str,
    pub options: [RiskOption; 3],
}

pub const QUESTIONS: [RiskQuestion; 5] = [
    RiskQuestion {
        id: "impact_business",
        text: "What is the potential business impact if the change fails?",
        options: [
            RiskOption { value: 1, text: "Low - Limited impact on business operations" },
            RiskOption { value: 2, text: "Medium - Noticeable impact on some business operations" },
            RiskOption { value: 3, text: "High - Significant impact on business operations" },
        ],
    },
    RiskQuestion {
        id: "impact_users",
        text: "How many users will be affected by this change?",
        options: [
            RiskOption { value: 1, text: "Few (<50 users)" },
            RiskOption { value: 2, text: "Some (50-200 users)" },
            RiskOption { value: 3, text: "Many (>200 users)" },
        ],
    },
    RiskQuestion {
        id: "complexity",
        text: "How complex is this change?",
        options: [
            RiskOption { value: 1, text: "Simple - Routine change with established procedures" },
            RiskOption { value: 2, text: "Moderate - Some complexity but well understood" },
            RiskOption { value: 3, text: "Complex - Multiple systems or uncommon procedures" },
        ],
    },
    RiskQuestion {
        id: "testing",
        text: "What level of testing has been performed?",
        options: [
            RiskOption { value: 1, text: "Comprehensive - Thoroughly tested in multiple environments" },
            RiskOption { value: 2, text: "Adequate - Primary functions tested in test environment" },
            RiskOption { value: 3, text: "Limited - Minimal testing or testing not possible" },
        ],
    },
    RiskQuestion {
        id: "rollback",
        text: "Is there a rollback plan available?",
        options: [
            RiskOption { value: 1, text: "Yes - Detailed rollback plan with proven procedures" },
            RiskOption { value: 2, text: "Partial - Basic rollback steps identified" },
            RiskOption { value: 3, text: "No - No rollback possible or very difficult" },
        ],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Score thresholds: above 10 is High, above 7 is Medium
    pub fn from_score(score: u8) -> Self {
        if score > 10 {
            RiskLevel::High
        } else if score > 7 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

/// Score of a completed questionnaire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskResult {
    pub score: u8,
    pub level: RiskLevel,
}

/// Answers collected so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    answers: BTreeMap<String, u8>,
}

impl RiskAssessment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an answer, replacing any earlier one for the same question
    pub fn answer(&mut self, question: &str, value: u8) -> Result<(), RiskError> {
        debug!(%question, value, "RiskAssessment::answer: called");
        if !QUESTIONS.iter().any(|q| q.id == question) {
            return Err(RiskError::UnknownQuestion(question.to_string()));
        }
        if !(1..=3).contains(&value) {
            return Err(RiskError::InvalidAnswer {
                question: question.to_string(),
                value,
            });
        }
        self.answers.insert(question.to_string(), value);
        Ok(())
    }

    /// Parse and record an `id=value` pair
    pub fn answer_pair(&mut self, pair: &str) -> Result<(), RiskError> {
        let (question, value) = pair
            .split_once('=')
            .ok_or_else(|| RiskError::Malformed(pair.to_string()))?;
        let value: u8 = value
            .trim()
            .parse()
            .map_err(|_| RiskError::Malformed(pair.to_string()))?;
        self.answer(question.trim(), value)
    }

    pub fn get(&self, question: &str) -> Option<u8> {
        self.answers.get(question).copied()
    }

    /// Questions still missing an answer
    pub fn unanswered(&self) -> Vec<&'static str> {
        QUESTIONS
            .iter()
            .filter(|q| !self.answers.contains_key(q.id))
            .map(|q| q.id)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.unanswered().is_empty()
    }

    /// Score the questionnaire; `None` until every question is answered
    pub fn result(&self) -> Option<RiskResult> {
        if !self.is_complete() {
            return None;
        }
        let score = self.answers.values().sum();
        Some(RiskResult {
            score,
            level: RiskLevel::from_score(score),
        })
    }
}
