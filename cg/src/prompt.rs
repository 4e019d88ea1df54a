//! Interactive terminal prompts

use colored::Colorize;
use eyre::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use crate::change::Selection;
use crate::config::{ApiConfig, format_api_url};
use crate::risk::{QUESTIONS, RiskAssessment};

/// Line editor for prompting the operator
pub struct Prompter {
    rl: DefaultEditor,
}

impl Prompter {
    pub fn new() -> Result<Self> {
        let rl = DefaultEditor::new().map_err(|e| eyre::eyre!("Failed to initialize readline: {}", e))?;
        Ok(Self { rl })
    }

    /// Read one line; `None` when the operator cancels with Ctrl+C or Ctrl+D
    pub fn ask(&mut self, label: &str, initial: &str) -> Result<Option<String>> {
        let prompt = format!("{} ", format!("{}:", label).bright_green());
        match self.rl.readline_with_initial(&prompt, (initial, "")) {
            Ok(line) => Ok(Some(line.trim().to_string())),
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                debug!(%label, "Prompter::ask: cancelled");
                Ok(None)
            }
            Err(err) => Err(eyre::eyre!("Readline error: {}", err)),
        }
    }

    /// Ask every unanswered risk question; `false` if the operator cancelled
    pub fn complete_risk(&mut self, assessment: &mut RiskAssessment) -> Result<bool> {
        for question in QUESTIONS.iter() {
            if assessment.get(question.id).is_some() {
                continue;
            }

            println!();
            println!("{}", question.text.bold());
            for option in &question.options {
                println!("  {} {}", format!("{})", option.value).cyan(), option.text);
            }

            loop {
                let Some(input) = self.ask("Choice", "")? else {
                    return Ok(false);
                };
                match parse_choice(&input) {
                    Some(value) => {
                        assessment.answer(question.id, value)?;
                        break;
                    }
                    None => println!("{}", "Please enter 1, 2 or 3".yellow()),
                }
            }
        }
        Ok(true)
    }

    /// Let the operator choose one of several matches; `None` if cancelled
    pub fn choose(&mut self, label: &str, candidates: &[Selection]) -> Result<Option<Selection>> {
        println!();
        println!("{}", format!("Several {}s match, choose one:", label).bold());
        for (i, candidate) in candidates.iter().enumerate() {
            println!("  {} {}", format!("{})", i + 1).cyan(), candidate);
        }

        loop {
            let Some(input) = self.ask("Choice", "")? else {
                return Ok(None);
            };
            match parse_index(&input, candidates.len()) {
                Some(index) => return Ok(candidates.get(index).cloned()),
                None => println!("{}", format!("Please enter a number from 1 to {}", candidates.len()).yellow()),
            }
        }
    }

    /// Ask for the API URL and key; `None` if the operator cancelled
    pub fn configure(&mut self, current: &ApiConfig) -> Result<Option<ApiConfig>> {
        let Some(url) = self.ask("Freshservice URL", current.url.as_deref().unwrap_or_default())? else {
            return Ok(None);
        };
        let Some(key) = self.ask("API key (leave blank to keep current)", "")? else {
            return Ok(None);
        };

        let key = if key.is_empty() { current.key.clone() } else { Some(key) };
        let url = Some(format_api_url(&url)).filter(|u| !u.is_empty());
        Ok(Some(ApiConfig {
            url,
            key,
            ..current.clone()
        }))
    }
}

/// Parse a 1-3 questionnaire answer
pub fn parse_choice(input: &str) -> Option<u8> {
    input.trim().parse::<u8>().ok().filter(|v| (1..=3).contains(v))
}

/// Parse a 1-based menu choice into an index
pub fn parse_index(input: &str, count: usize) -> Option<usize> {
    input
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|v| (1..=count).contains(v))
        .map(|v| v - 1)
}
