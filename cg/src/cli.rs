//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::config::Config;
use crate::search::UserKind;

/// changegate - Freshservice change request helper
#[derive(Parser)]
#[command(
    name = "cg",
    about = "Search Freshservice users, assess risk and draft change requests",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Freshservice URL, overrides config and environment
    #[arg(long = "api-url", global = true)]
    pub api_url: Option<String>,

    /// Freshservice API key, overrides config and environment
    #[arg(long = "api-key", global = true)]
    pub api_key: Option<String>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Shorthand for --log-level DEBUG
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search agents or requesters
    Search {
        /// Which users to search (agents, requesters)
        #[arg(value_name = "KIND")]
        kind: UserKind,

        /// Name, email, or a Freshservice query expression
        term: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Write results to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List agent groups
    Groups {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Test the configured credentials and show the rate limit
    Check {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Run the risk questionnaire
    Risk {
        /// Pre-filled answer as <question>=<1-3>; missing answers are prompted
        #[arg(short, long = "answer", value_name = "ID=VALUE")]
        answers: Vec<String>,
    },

    /// Draft, validate and optionally submit a change request
    Change {
        /// Change title
        #[arg(short, long)]
        title: Option<String>,

        /// Change type value or label; see `change-types` in the config
        #[arg(long = "type", value_name = "TYPE")]
        change_type: Option<String>,

        /// Search requesters and pick one
        #[arg(long, value_name = "TERM", conflicts_with = "requester_id")]
        requester: Option<String>,

        /// Requester id
        #[arg(long)]
        requester_id: Option<u64>,

        /// Search agents and pick one
        #[arg(long, value_name = "TERM", conflicts_with = "agent_id")]
        agent: Option<String>,

        /// Agent id
        #[arg(long)]
        agent_id: Option<u64>,

        /// Pick an implementation group by name
        #[arg(long, value_name = "NAME", conflicts_with = "group_id")]
        group: Option<String>,

        /// Implementation group id
        #[arg(long)]
        group_id: Option<u64>,

        /// Risk answer as <question>=<1-3>
        #[arg(short, long = "answer", value_name = "ID=VALUE")]
        answers: Vec<String>,

        /// POST the change to Freshservice instead of printing it
        #[arg(long)]
        submit: bool,
    },

    /// Interactively set the API URL and key
    Configure,

    /// Inspect or reset the saved configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Configuration subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration with the key masked
    Show,

    /// Print the user config file path
    Path,

    /// Delete the user config file
    Reset,
}

pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("changegate")
        .join("logs")
        .join("changegate.log");
    debug!(?path, "get_log_path: returning path");
    path
}

pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let mut help = String::new();

    help.push_str("Configuration:\n");
    match Config::user_config_path() {
        Some(path) if path.exists() => {
            help.push_str(&format!("  \u{2705} {}\n", path.display()));
        }
        Some(path) => {
            help.push_str(&format!("  \u{274C} {} (run `cg configure`)\n", path.display()));
        }
        None => help.push_str("  \u{274C} no config directory\n"),
    }

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => {
                debug!(%s, "OutputFormat::from_str: unknown format");
                Err(format!("Unknown format: {}. Use: text, json, or csv", s))
            }
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["cg"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_search() {
        let cli = Cli::parse_from(["cg", "search", "agents", "john", "--format", "csv", "-o", "out.csv"]);
        match cli.command {
            Some(Command::Search {
                kind,
                term,
                format,
                output,
            }) => {
                assert_eq!(kind, UserKind::Agent);
                assert_eq!(term, "john");
                assert_eq!(format, OutputFormat::Csv);
                assert_eq!(output, Some(PathBuf::from("out.csv")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["cg", "search", "groups", "x"]).is_err());
    }

    #[test]
    fn test_cli_parse_change() {
        let cli = Cli::parse_from([
            "cg",
            "change",
            "--title",
            "Patch DB",
            "--type",
            "emergency",
            "--requester-id",
            "1",
            "--agent-id",
            "2",
            "--group-id",
            "3",
            "-a",
            "testing=2",
            "-a",
            "rollback=1",
            "--submit",
        ]);
        match cli.command {
            Some(Command::Change {
                title,
                change_type,
                requester_id,
                agent_id,
                group_id,
                answers,
                submit,
                ..
            }) => {
                assert_eq!(title.as_deref(), Some("Patch DB"));
                assert_eq!(change_type.as_deref(), Some("emergency"));
                assert_eq!((requester_id, agent_id, group_id), (Some(1), Some(2), Some(3)));
                assert_eq!(answers, vec!["testing=2", "rollback=1"]);
                assert!(submit);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_change_search_terms() {
        let cli = Cli::parse_from([
            "cg",
            "change",
            "--requester",
            "grace",
            "--agent",
            "ada@example.com",
            "--group",
            "Network",
        ]);
        match cli.command {
            Some(Command::Change {
                requester,
                agent,
                group,
                requester_id,
                ..
            }) => {
                assert_eq!(requester.as_deref(), Some("grace"));
                assert_eq!(agent.as_deref(), Some("ada@example.com"));
                assert_eq!(group.as_deref(), Some("Network"));
                assert_eq!(requester_id, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["cg", "change", "--group", "Network", "--group-id", "3"]).is_err());
    }

    #[test]
    fn test_global_overrides() {
        let cli = Cli::parse_from([
            "cg",
            "groups",
            "--api-url",
            "acme.freshservice.com",
            "--api-key",
            "k",
            "-v",
        ]);
        assert_eq!(cli.api_url.as_deref(), Some("acme.freshservice.com"));
        assert_eq!(cli.api_key.as_deref(), Some("k"));
        assert!(cli.verbose);
    }

    #[test]
    fn test_config_subcommand() {
        let cli = Cli::parse_from(["cg", "config", "path"]);
        assert!(matches!(
            cli.command,
            Some(Command::Config {
                command: ConfigCommand::Path
            })
        ));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!("plain".parse::<OutputFormat>(), Ok(OutputFormat::Text));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_log_path() {
        let path = get_log_path();
        assert!(path.ends_with("changegate/logs/changegate.log"));
    }
}
