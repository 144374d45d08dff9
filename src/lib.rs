//! # Ask Your Documents
//!
//! Upload PDF and Word files, then ask questions about them. Answers come
//! from a hosted chat model that is handed the passages most similar to the
//! question.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────────┐   ┌──────────────┐
//! │ File Store │──▶│ Extract + Chunk │──▶│ Vector Index │
//! │ (uploads)  │   │   PDF / DOCX    │   │  (in memory) │
//! └────────────┘   └─────────────────┘   └──────┬───────┘
//!                                               │ top-k
//!                  ┌──────────────┐      ┌──────▼───────┐
//!                  │ Session + UI │◀─────│   Answerer   │──▶ chat API
//!                  │ (axum, HTML) │      └──────────────┘
//!                  └──────────────┘
//! ```
//!
//! Any change to the stored files throws the index away; the next page load
//! rebuilds it from every file.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Domain error taxonomy |
//! | [`models`] | Core data types |
//! | [`file_store`] | Flat upload directory |
//! | [`extract`] | PDF and DOCX text extraction |
//! | [`chunk`] | Fixed-size overlapping chunker |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory cosine-similarity index |
//! | [`ingest`] | Store → extract → chunk → index pipeline |
//! | [`llm`] | Chat-completion client |
//! | [`answer`] | Retrieval-augmented answering |
//! | [`session`] | Per-session state machine |
//! | [`app`] | Page controller |
//! | [`render`] | HTML rendering |
//! | [`server`] | HTTP server |

pub mod answer;
pub mod app;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod file_store;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod render;
pub mod server;
pub mod session;
