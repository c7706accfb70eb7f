//! # repo-qa
//!
//! A Rust web service that links git repositories, indexes their files into
//! semantically searchable embeddings, summarizes commit history, and
//! answers natural-language questions about the codebase with retrieved
//! file context.
//!
//! ## Pipeline
//!
//! ```text
//!   repository URL
//!        │
//!        ▼
//!   ┌──────────────┐  count   ┌───────────────┐
//!   │ File Counter  ├─────────▶│ credit check  │  (pre-flight, no downloads)
//!   └──────────────┘          └───────┬───────┘
//!                                     │ ok
//!        ┌────────────────────────────┴─────────────────┐
//!        ▼                                              ▼
//!   ┌──────────────┐   batches of 2   ┌──────────┐  ┌────────────────┐
//!   │    Walker     ├─────────────────▶│summarize │  │ Commit Ingestor │
//!   │ (fan-out 5)  │                  │ + embed  │  │ (newest 15,    │
//!   └──────────────┘                  └────┬─────┘  │  set difference)│
//!                                          │        └────────┬────────┘
//!                                          ▼                 ▼
//!                                 ┌────────────────────────────────┐
//!                                 │   project-scoped stores         │
//!                                 │   (embeddings + commits)        │
//!                                 └───────────────┬────────────────┘
//!                                                 │ cosine > 0.5, top 10
//!   question ──▶ embed ──▶ similarity search ─────┘
//!                                │
//!                                ▼
//!                   context block ──▶ streamed answer + citations
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, stores, and providers
//! - [`models`] - Shared data types: `Project`, `Commit`, `Question`, request/response types
//! - [`error`] - Caller-facing typed failures and their HTTP mapping
//! - [`source`] - Repository hosting collaborator: walker, file counter, GitHub REST client
//! - [`llm`] - Language-model collaborator: summaries, embeddings, streaming, retry policy
//! - [`store`] - JSON-file persistence: projects/users/commits/questions and the embedding store
//! - [`indexer`] - Batch orchestrator for walk → summarize → embed → persist
//! - [`ingest`] - Incremental commit ingestor with per-commit failure isolation
//! - [`answer`] - Retrieval and streamed answer generation
//! - [`project`] - Project lifecycle: pre-flight credit check and full setup
//! - [`api`] - Axum HTTP handlers for the caller-facing operations
//! - [`state`] - Shared application state wiring concrete collaborators

pub mod answer;
pub mod api;
pub mod config;
pub mod error;
pub mod indexer;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod project;
pub mod source;
pub mod state;
pub mod store;
