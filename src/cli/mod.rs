//! CLI module for ragsql - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for one-shot questions,
//! interactive chat, routing inspection and schema display.

pub mod commands;

pub use commands::Cli;
