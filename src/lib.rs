//! ragsql - hybrid question answering over a SQL database and a document collection
//!
//! A question is classified by explicit routing rules, dispatched concurrently to a
//! text-to-SQL tool, a passage retrieval tool or both, and the results are merged into
//! one cited answer.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod id;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod question;
pub mod router;
pub mod session;
pub mod synth;
pub mod tools;

pub use error::{RagsqlError, Result};
