//! # ragdesk core
//!
//! Runtime-agnostic logic for ragdesk: data models, error taxonomy,
//! chunking, the vector index abstraction, provider traits, record stores
//! and the retrieval-augmented answer algorithm.
//!
//! This crate contains no tokio, sqlx, HTTP or filesystem dependencies.
//! Concrete providers and the SQLite backends live in the `ragdesk` crate.

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod identity;
pub mod index;
pub mod models;
pub mod records;

pub use error::{RagError, Result};
