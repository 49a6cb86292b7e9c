//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - ask: answer one question
//! - chat: interactive conversation (default)
//! - route: show the routing decision only
//! - schema: describe the database

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ragsql - answer questions from a database and a document collection
#[derive(Parser, Debug)]
#[command(name = "ragsql")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a single question
    Ask {
        /// The question to answer
        question: String,

        /// Send the question to these tools instead of classifying it
        #[arg(short, long = "tool")]
        tools: Vec<String>,
    },

    /// Interactive conversation; type quit, exit or q to stop
    Chat,

    /// Show which tools a question would be routed to
    Route {
        /// The question to classify
        question: String,
    },

    /// Show tables, columns, row counts and sample rows
    Schema {
        /// Sample rows per table
        #[arg(short, long, default_value_t = 3)]
        samples: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_no_subcommand_defaults_to_chat() {
        let cli = Cli::try_parse_from(["ragsql"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.is_verbose());
    }

    #[test]
    fn test_ask_command() {
        let cli = Cli::try_parse_from(["ragsql", "ask", "What is the privacy policy?"]).unwrap();
        match cli.command {
            Some(Commands::Ask { question, tools }) => {
                assert_eq!(question, "What is the privacy policy?");
                assert!(tools.is_empty());
            }
            _ => panic!("Expected ask command"),
        }
    }

    #[test]
    fn test_ask_with_tools() {
        let cli = Cli::try_parse_from([
            "ragsql",
            "ask",
            "Who is Paula Walker?",
            "--tool",
            "sql_tool",
            "-t",
            "document_tool",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Ask { tools, .. }) => {
                assert_eq!(tools, vec!["sql_tool", "document_tool"]);
            }
            _ => panic!("Expected ask command"),
        }
    }

    #[test]
    fn test_route_command() {
        let cli = Cli::try_parse_from(["ragsql", "route", "How many people?"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Route { question }) if question == "How many people?"));
    }

    #[test]
    fn test_schema_samples_default() {
        let cli = Cli::try_parse_from(["ragsql", "schema"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Schema { samples: 3 })));
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::try_parse_from(["ragsql", "chat", "--config", "/tmp/r.yml", "-v"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/r.yml")));
        assert!(cli.is_verbose());
        assert!(matches!(cli.command, Some(Commands::Chat)));
    }

    #[test]
    fn test_help_works() {
        // Verify help doesn't panic
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_flag() {
        let result = Cli::try_parse_from(["ragsql", "--version"]);
        // Version flag causes early exit with error (expected)
        assert!(result.is_err());
    }
}
