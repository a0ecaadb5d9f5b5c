//! Product text-to-vector enrichment for marketplace catalogs.
//!
//! Every product written to the catalog carries a fixed-length embedding of
//! its name, category, description, and tags. Generating that embedding
//! never blocks product creation: when the backend is missing, failing, or
//! slow, a zero-vector placeholder is stored and flagged for later
//! re-enrichment.
//!
//! | Outcome | Stored vector | `embedding_status` |
//! |---------|---------------|--------------------|
//! | Backend answered | backend output, unchanged | `embedded` |
//! | Empty text, backend unavailable, call failed, timeout | zeros | `placeholder` |
//! | Backend answered with the wrong length | nothing, request fails | n/a |
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`embedding`]: Embedding backends: local ONNX Runtime and OpenAI-compatible HTTP
//! - [`enrich`]: Canonical text, the shared enrichment service, typed results
//! - [`catalog`]: SQLite product store with a fixed-length sqlite-vec column
//! - [`server`]: HTTP product-creation API

pub mod catalog;
pub mod config;
pub mod embedding;
pub mod enrich;
pub mod server;
