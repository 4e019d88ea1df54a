//! changegate - Freshservice change request helper
//!
//! CLI entry point for searching users, scoring risk and drafting changes.

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use changegate::api::{ApiError, FreshserviceClient, Group, User};
use changegate::change::{ChangeDraft, ChangeType, Pick, Selection, pick_group, pick_user};
use changegate::cli::{Cli, Command, ConfigCommand, OutputFormat, generate_after_help, get_log_path};
use changegate::config::Config;
use changegate::export::{write_groups_csv, write_users_csv};
use changegate::prompt::Prompter;
use changegate::risk::{RiskAssessment, RiskLevel};
use changegate::scheduler::{QueueState, RequestScheduler};
use changegate::search::UserKind;

fn parse_level(level: Option<&str>) -> tracing::Level {
    match level.map(|s| s.to_uppercase()).as_deref() {
        Some("TRACE") => tracing::Level::TRACE,
        Some("DEBUG") => tracing::Level::DEBUG,
        Some("INFO") | None => tracing::Level::INFO,
        Some("WARN") | Some("WARNING") => tracing::Level::WARN,
        Some("ERROR") => tracing::Level::ERROR,
        Some(other) => {
            eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", other);
            tracing::Level::INFO
        }
    }
}

fn setup_logging(level: tracing::Level) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .try_init()
        .map_err(|e| eyre::eyre!("Failed to install log subscriber: {}", e))?;

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

/// Used when the log file cannot be opened; only warnings reach the terminal
fn setup_logging_stderr() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Build command with dynamic after_help that shows config and log locations
    let cmd = Cli::command().after_help(generate_after_help());

    // Parse CLI arguments using the modified command
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        parse_level(cli.log_level.as_deref())
    };
    if let Err(e) = setup_logging(level) {
        eprintln!("Warning: {:#}, logging to stderr", e);
        setup_logging_stderr();
    }

    // Load configuration: file chain, then environment, then flags
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.apply_overrides(cli.api_url.as_deref(), cli.api_key.as_deref());

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Search {
            kind,
            term,
            format,
            output,
        }) => cmd_search(&config, kind, &term, format, output.as_deref()).await,
        Some(Command::Groups { format }) => cmd_groups(&config, format).await,
        Some(Command::Check { format }) => cmd_check(&config, format).await,
        Some(Command::Risk { answers }) => cmd_risk(&answers),
        Some(Command::Change {
            title,
            change_type,
            requester,
            requester_id,
            agent,
            agent_id,
            group,
            group_id,
            answers,
            submit,
        }) => {
            let catalog = ChangeType::catalog(&config.change_types);
            let draft = ChangeDraft {
                title: title.unwrap_or_default(),
                change_type: change_type
                    .as_deref()
                    .map(|t| ChangeType::resolve(t, &catalog))
                    .transpose()?,
                requester: requester_id.map(Selection::from_id),
                agent: agent_id.map(Selection::from_id),
                group: group_id.map(Selection::from_id),
                risk: collect_answers(&answers)?,
            };
            let lookups = Lookups {
                requester,
                agent,
                group,
            };
            cmd_change(&config, draft, lookups, submit).await
        }
        Some(Command::Configure) => cmd_configure(&config, cli.config.as_ref()),
        Some(Command::Config { command }) => cmd_config(&config, command, cli.config.as_ref()),
        None => {
            Cli::command().after_help(generate_after_help()).print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Validate config and build a client on a fresh scheduler
fn build_client(config: &Config) -> Result<FreshserviceClient> {
    debug!("build_client: called");
    config.validate()?;
    let scheduler = RequestScheduler::spawn(config.scheduler.clone());
    let client = FreshserviceClient::from_config(&config.api, scheduler)?;
    Ok(client)
}

/// Print to stdout or write to a file
fn emit(rendered: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, rendered).context(format!("Failed to write {}", path.display()))?;
            eprintln!("{} {}", "Wrote".green(), path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

fn render_users(users: &[User], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(users)?)),
        OutputFormat::Csv => {
            let mut buffer = Vec::new();
            write_users_csv(&mut buffer, users)?;
            Ok(String::from_utf8(buffer)?)
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for user in users {
                out.push_str(&format!(
                    "{:>10}  {:<28} {:<32} {}\n",
                    user.id,
                    user.display_name(),
                    user.email.as_deref().unwrap_or("-"),
                    user.job_title.as_deref().unwrap_or("")
                ));
            }
            Ok(out)
        }
    }
}

fn render_groups(groups: &[Group], format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(groups)?)),
        OutputFormat::Csv => {
            let mut buffer = Vec::new();
            write_groups_csv(&mut buffer, groups)?;
            Ok(String::from_utf8(buffer)?)
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for group in groups {
                out.push_str(&format!(
                    "{:>10}  {:<28} {}\n",
                    group.id,
                    group.name,
                    group.description.as_deref().unwrap_or("")
                ));
            }
            Ok(out)
        }
    }
}

async fn cmd_search(
    config: &Config,
    kind: UserKind,
    term: &str,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    debug!(%kind, %term, %format, "cmd_search: called");
    let client = build_client(config)?;
    let users = client.search_users(kind, term).await?;

    if users.is_empty() && format == OutputFormat::Text {
        eprintln!("{}", format!("No {}s found matching '{}'", kind, term).yellow());
        return Ok(());
    }
    if format == OutputFormat::Text && output.is_none() {
        eprintln!("{}", format!("Found {} {}(s)", users.len(), kind).bold());
    }
    emit(&render_users(&users, &format)?, output)
}

async fn cmd_groups(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(%format, "cmd_groups: called");
    let client = build_client(config)?;
    let groups = client.list_groups().await?;
    emit(&render_groups(&groups, &format)?, None)
}

async fn cmd_check(config: &Config, format: OutputFormat) -> Result<()> {
    debug!(%format, "cmd_check: called");
    let client = build_client(config)?;
    let quota = client.test_credentials().await?;
    let state = client.scheduler().queue_state();

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "ok": true,
                "url": client.base_url(),
                "rate_limit": quota,
                "scheduler": state,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text | OutputFormat::Csv => {
            println!("{} {}", "\u{2705} Connected to".green(), client.base_url());
            print_quota(&state);
        }
    }
    Ok(())
}

fn print_quota(state: &QueueState) {
    let quota = state.quota;
    println!("Rate limit");
    println!("----------");
    println!("  Limit:     {}", quota.limit);
    println!("  Remaining: {}", quota.remaining);
    match quota.reset_at.and_then(|secs| chrono::DateTime::from_timestamp(secs as i64, 0)) {
        Some(reset) => println!(
            "  Resets at: {}",
            reset.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("  Resets at: unknown"),
    }
}

fn collect_answers(answers: &[String]) -> Result<RiskAssessment> {
    let mut assessment = RiskAssessment::new();
    for pair in answers {
        assessment.answer_pair(pair)?;
    }
    Ok(assessment)
}

fn colored_level(level: RiskLevel) -> colored::ColoredString {
    match level {
        RiskLevel::High => level.to_string().red().bold(),
        RiskLevel::Medium => level.to_string().yellow().bold(),
        RiskLevel::Low => level.to_string().green().bold(),
    }
}

fn cmd_risk(answers: &[String]) -> Result<()> {
    debug!(count = answers.len(), "cmd_risk: called");
    let mut assessment = collect_answers(answers)?;

    if !assessment.is_complete() {
        println!("{}", "Change Risk Assessment".bright_cyan().bold());
        println!("Please answer all questions to determine the risk level of this change.");
        let mut prompter = Prompter::new()?;
        if !prompter.complete_risk(&mut assessment)? {
            return Err(eyre::eyre!("Risk assessment cancelled"));
        }
    }

    let result = assessment
        .result()
        .ok_or_else(|| eyre::eyre!("Please answer all questions to calculate the risk level."))?;
    println!();
    println!("Risk Score: {}", result.score);
    println!("Risk Level: {}", colored_level(result.level));
    Ok(())
}

/// Search terms for the parts of a change picked from Freshservice
struct Lookups {
    requester: Option<String>,
    agent: Option<String>,
    group: Option<String>,
}

impl Lookups {
    fn any(&self) -> bool {
        self.requester.is_some() || self.agent.is_some() || self.group.is_some()
    }
}

async fn search_if(client: &FreshserviceClient, kind: UserKind, term: Option<&str>) -> Result<Vec<User>, ApiError> {
    match term {
        Some(term) => client.search_users(kind, term).await,
        None => Ok(Vec::new()),
    }
}

async fn groups_if(client: &FreshserviceClient, wanted: bool) -> Result<Vec<Group>, ApiError> {
    if wanted {
        client.list_groups().await
    } else {
        Ok(Vec::new())
    }
}

/// Turn a pick into one selection, asking the operator when it is ambiguous
fn settle_pick(pick: Pick, label: &str, term: &str) -> Result<Selection> {
    let candidates = match pick {
        Pick::One(selection) => {
            info!(%label, %term, id = selection.id, "Selected {}", selection.name);
            return Ok(selection);
        }
        Pick::Many(candidates) => candidates,
    };

    if !std::io::stdin().is_terminal() {
        let names: Vec<String> = candidates.iter().map(Selection::to_string).collect();
        return Err(eyre::eyre!(
            "Several {}s match '{}': {}. Narrow the term or pass --{}-id",
            label,
            term,
            names.join(", "),
            label
        ));
    }

    Prompter::new()?
        .choose(label, &candidates)?
        .ok_or_else(|| eyre::eyre!("No {} chosen", label))
}

/// Fill the draft's requester, agent and group from searches
async fn resolve_lookups(config: &Config, draft: &mut ChangeDraft, lookups: &Lookups) -> Result<()> {
    debug!(
        requester = ?lookups.requester,
        agent = ?lookups.agent,
        group = ?lookups.group,
        "resolve_lookups: called"
    );
    let client = build_client(config)?;

    // All three go through the one queue; only the choosing is sequential
    let (requesters, agents, groups) = tokio::try_join!(
        search_if(&client, UserKind::Requester, lookups.requester.as_deref()),
        search_if(&client, UserKind::Agent, lookups.agent.as_deref()),
        groups_if(&client, lookups.group.is_some()),
    )?;

    if let Some(term) = &lookups.requester {
        let pick = pick_user(UserKind::Requester, term, &requesters)?;
        draft.requester = Some(settle_pick(pick, "requester", term)?);
    }
    if let Some(term) = &lookups.agent {
        let pick = pick_user(UserKind::Agent, term, &agents)?;
        draft.agent = Some(settle_pick(pick, "agent", term)?);
    }
    if let Some(term) = &lookups.group {
        let pick = pick_group(term, &groups)?;
        draft.group = Some(settle_pick(pick, "group", term)?);
    }
    Ok(())
}

async fn cmd_change(config: &Config, mut draft: ChangeDraft, lookups: Lookups, submit: bool) -> Result<()> {
    debug!(submit, "cmd_change: called");
    if lookups.any() {
        resolve_lookups(config, &mut draft, &lookups).await?;
    }

    let request = match draft.validate() {
        Ok(request) => request,
        Err(e) => {
            eprintln!("{}", "Please correct the following errors:".red().bold());
            for message in e.messages() {
                eprintln!("  {} {}", "\u{274C}".red(), message);
            }
            return Err(eyre::eyre!("Change request is invalid"));
        }
    };

    if let Some(change_type) = &draft.change_type {
        eprintln!(
            "{} {}",
            change_type.label.bold(),
            change_type.description.as_deref().unwrap_or_default().dimmed()
        );
    }
    for (label, selection) in [
        ("Requester", &draft.requester),
        ("Agent", &draft.agent),
        ("Group", &draft.group),
    ] {
        if let Some(selection) = selection {
            eprintln!("{}: {}", label, selection);
        }
    }
    eprintln!("Risk Level: {} (score {})", colored_level(request.risk_level), request.risk_score);

    if !submit {
        println!("{}", serde_json::to_string_pretty(&request)?);
        return Ok(());
    }

    let client = build_client(config)?;
    let created = client.submit_change(&request).await?;
    println!("{}", "Change request submitted successfully!".green().bold());
    println!("{}", serde_json::to_string_pretty(&created)?);
    Ok(())
}

fn cmd_configure(config: &Config, config_path: Option<&PathBuf>) -> Result<()> {
    debug!(?config_path, "cmd_configure: called");
    let path = match config_path {
        Some(path) => path.clone(),
        None => Config::user_config_path().ok_or_else(|| eyre::eyre!("Could not determine config directory"))?,
    };

    // Start from what is on disk so environment values are not persisted
    let mut saved = if path.exists() {
        Config::load_from_file(&path)?
    } else {
        Config::default()
    };

    let mut prompter = Prompter::new()?;
    let Some(api) = prompter.configure(&config.api)? else {
        warn!("cmd_configure: cancelled");
        println!("Cancelled, nothing saved");
        return Ok(());
    };
    saved.api = api;

    if let Err(e) = saved.validate() {
        println!("{} {}", "Warning:".yellow(), e);
    }
    let written = match config_path {
        Some(path) => {
            saved.save_to(path)?;
            path.clone()
        }
        None => saved.save()?,
    };
    println!("{} {}", "Saved".green(), written.display());
    Ok(())
}

fn cmd_config(config: &Config, command: ConfigCommand, config_path: Option<&PathBuf>) -> Result<()> {
    debug!(?command, "cmd_config: called");
    let path = config_path.cloned().or_else(Config::user_config_path);

    match command {
        ConfigCommand::Show => {
            print!("{}", serde_yaml::to_string(&config.redacted())?);
        }
        ConfigCommand::Path => match path {
            Some(path) => println!("{}", path.display()),
            None => return Err(eyre::eyre!("Could not determine config directory")),
        },
        ConfigCommand::Reset => {
            let path = path.ok_or_else(|| eyre::eyre!("Could not determine config directory"))?;
            if Config::reset_at(&path)? {
                println!("{} {}", "Removed".green(), path.display());
            } else {
                println!("No config at {}", path.display());
            }
        }
    }
    Ok(())
}
