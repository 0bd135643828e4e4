//! # ragdesk
//!
//! Multi-tenant document ingestion and retrieval-augmented question
//! answering.
//!
//! Tenants upload PDF or plain-text documents, which are split into
//! overlapping chunks, embedded, and written to a tenant-scoped vector
//! index. Questions are answered by retrieving the tenant's nearest chunks
//! and conditioning a generative model on them. Every question/answer pair
//! is kept in the tenant's history.
//!
//! The runtime-agnostic pipeline (chunker, index contract, QA engine,
//! error taxonomy) lives in `ragdesk-core`; this crate provides the SQLite
//! storage, HTTP providers, identity verification, server and CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────────────┐   ┌──────────────┐
//! │  Upload  │──▶│ Load → Chunk → Embed │──▶│ SqliteIndex  │
//! └──────────┘   └─────────────────────┘   └──────┬───────┘
//!                                                 │ top-k
//! ┌──────────┐   ┌─────────────────────┐          │
//! │ Question │──▶│ Embed → Query → Gen │◀─────────┘
//! └──────────┘   └─────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`loader`] | PDF and text extraction |
//! | [`provider`] | Timeouts and retries for remote model calls |
//! | [`embedding`] | Ollama and OpenAI embedders |
//! | [`generation`] | Ollama and OpenAI generators |
//! | [`sqlite_index`] | SQLite vector index |
//! | [`records`] | SQLite document and history stores |
//! | [`identity`] | Bearer-token verification |
//! | [`ingest`] | Upload ingestion pipeline |
//! | [`service`] | The application service object |
//! | [`server`] | HTTP server |
//! | [`stats`] | `ragdesk stats` |

pub mod config;
pub mod db;
pub mod embedding;
pub mod generation;
pub mod identity;
pub mod ingest;
pub mod loader;
pub mod migrate;
pub mod provider;
pub mod records;
pub mod server;
pub mod service;
pub mod sqlite_index;
pub mod stats;
