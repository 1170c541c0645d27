//! # Portfolio Chat
//!
//! A retrieval-augmented assistant that answers questions about one person
//! from a local folder of their documents (CV, bio, project notes).
//!
//! Documents are split into overlapping word windows, embedded, and stored
//! in a vector index. Each question is embedded the same way; the closest
//! chunks, the recent conversation and the question are assembled into a
//! prompt for a language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────┐
//! │   Corpus    │──▶│ Chunk+Embed  │──▶│ VectorIndex │
//! │ txt/md/pdf/ │   │ (knowledge)  │   │   SQLite    │
//! │    docx     │   └──────────────┘   └──────┬──────┘
//! └─────────────┘                             │ retrieve
//!                  ┌──────────┐        ┌──────▼──────┐   ┌────────────┐
//!                  │ Sessions │◀──────▶│    Chat     │──▶│ Completion │
//!                  └──────────┘        │ Orchestrator│   │  backend   │
//!                                      └──────┬──────┘   └────────────┘
//!                                  ┌──────────┴──────────┐
//!                                  ▼                     ▼
//!                            ┌──────────┐          ┌──────────┐
//!                            │   CLI    │          │   HTTP   │
//!                            │ (pchat)  │          │  (axum)  │
//!                            └──────────┘          └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! pchat init                       # create the index file
//! pchat index                      # load ./about_me
//! pchat search "programming languages"
//! pchat chat                       # talk to the assistant
//! pchat serve                      # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Library error type |
//! | [`corpus`] | Corpus folder scanning |
//! | [`extract`] | Text extraction (txt, md, pdf, docx) |
//! | [`chunk`] | Word-window chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index trait and backends |
//! | [`knowledge`] | Corpus loading and retrieval |
//! | [`session`] | Conversation history |
//! | [`prompt`] | Prompt assembly |
//! | [`completion`] | Language-model backends |
//! | [`chat`] | Application context and chat orchestration |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chat;
pub mod chunk;
pub mod completion;
pub mod config;
pub mod corpus;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod knowledge;
pub mod migrate;
pub mod models;
pub mod prompt;
pub mod server;
pub mod session;

pub use error::{Error, Result};
