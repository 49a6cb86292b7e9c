use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use ragsql::bootstrap::{self, App};
use ragsql::config::{GlobalConfig, load_config};
use ragsql::question::Question;
use ragsql::session::Session;
use ragsql::synth::{Answer, apology};

mod cli;

use cli::Cli;
use cli::commands::Commands;

/// Upper bound on one question in interactive mode
const QUERY_TIMEOUT: Duration = Duration::from_secs(60);

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ragsql")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("ragsql.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn print_answer(answer: &Answer, verbose: bool) {
    println!("{}", answer.text);
    if !answer.caveats.is_empty() && answer.caveats.join(" ") != answer.text {
        for caveat in &answer.caveats {
            println!("{} {}", "Note:".yellow(), caveat);
        }
    }
    if !answer.sources.is_empty() {
        println!("{} {}", "Sources:".dimmed(), answer.sources.join(", ").dimmed());
    }
    if verbose {
        println!("{} {}", "Tools:".dimmed(), answer.tools_used.join(", ").dimmed());
    }
}

async fn handle_ask_command(app: &App, question: &str, tools: &[String], verbose: bool) -> Result<()> {
    info!("Answering one question (tools: {:?})", tools);
    let session = app.session();
    match session.ask_with(question, tools).await {
        Ok(answer) => {
            print_answer(&answer, verbose);
            Ok(())
        }
        Err(e) => {
            log::warn!("question failed: {}", e);
            println!("{}", apology(&e).red());
            Err(e).wrap_err("No answer")
        }
    }
}

async fn handle_route_command(app: &App, question: &str) -> Result<()> {
    let question = Question::new(question)?;
    let decision = app.router.route(&question).await?;
    println!("{} {}", "Tools:".green(), decision.tool_ids.join(", "));
    println!(
        "{} {} (confidence {:.2})",
        "Tier:".green(),
        decision.tier,
        decision.confidence
    );
    println!("{} {}", "Why:".green(), decision.rationale);
    Ok(())
}

async fn handle_schema_command(app: &App, samples: usize) -> Result<()> {
    let Some(database) = &app.database else {
        eyre::bail!("No database configured; set sources.database in the config file");
    };
    let stats = database.inspect(samples).await.context("Failed to inspect database")?;

    println!("{} {}", "Database:".green(), database.path().display());
    for table in stats {
        println!();
        println!("{} {} ({} rows)", "Table".cyan(), table.table.name.bold(), table.row_count);
        for column in &table.table.columns {
            let mut flags = Vec::new();
            if column.primary_key {
                flags.push("primary key");
            }
            if column.not_null {
                flags.push("not null");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            println!("  - {} {}{}", column.name, column.data_type.dimmed(), flags);
        }
        if !table.sample.rows.is_empty() {
            println!("  {}", "Sample:".dimmed());
            for row in &table.sample.rows {
                let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
                println!("    {}", cells.join(" | "));
            }
        }
    }
    Ok(())
}

/// Ask one question in chat mode, bounded by the query timeout and Ctrl-C
async fn chat_turn(session: &Session, line: &str, verbose: bool) {
    let outcome = tokio::select! {
        result = tokio::time::timeout(QUERY_TIMEOUT, session.ask(line)) => result,
        _ = tokio::signal::ctrl_c() => {
            session.cancel_current();
            println!("{}", "Cancelled.".yellow());
            return;
        }
    };

    match outcome {
        Ok(Ok(answer)) => print_answer(&answer, verbose),
        Ok(Err(e)) => {
            log::warn!("question failed: {}", e);
            println!("{}", apology(&e).red());
        }
        Err(_) => {
            session.cancel_current();
            println!(
                "{}",
                format!("No answer after {} seconds; please try again.", QUERY_TIMEOUT.as_secs()).red()
            );
        }
    }
}

async fn run_chat(app: &App, verbose: bool) -> Result<()> {
    info!("Starting chat");
    let session = app.session();
    println!("{}", "Ask a question (quit, exit or q to stop).".cyan());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".green().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line.to_lowercase().as_str(), "quit" | "exit" | "q") {
            break;
        }
        chat_turn(&session, line, verbose).await;
        println!();
    }

    println!("{}", "Goodbye.".cyan());
    Ok(())
}

async fn run_application(cli: &Cli, config: GlobalConfig) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    let app = bootstrap::build(config).await.context("Failed to start")?;

    let result = match &cli.command {
        None | Some(Commands::Chat) => run_chat(&app, cli.is_verbose()).await,
        Some(Commands::Ask { question, tools }) => handle_ask_command(&app, question, tools, cli.is_verbose()).await,
        Some(Commands::Route { question }) => handle_route_command(&app, question).await,
        Some(Commands::Schema { samples }) => handle_schema_command(&app, *samples).await,
    };

    if let Some(usage) = app.llm_usage() {
        info!(
            "LLM usage: {} input + {} output tokens",
            usage.input_tokens, usage.output_tokens
        );
        if cli.is_verbose() {
            println!("{} {} tokens", "LLM usage:".dimmed(), usage.total());
        }
    }
    result
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, config).await.context("Application failed")?;

    Ok(())
}
