//! # PerDocMan
//!
//! A local, single-user vault for PDF documents.
//!
//! PerDocMan copies documents into a managed storage directory under
//! collision-free names, fingerprints them with SHA-256 so the same bytes are
//! never stored twice, records their metadata in SQLite, and keeps an audit
//! trail of every run as a session. A destructive reset returns the vault to
//! an empty but usable state.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────────────┐   ┌──────────────┐
//! │   CLI    │──▶│ Vault                        │──▶│ SQLite       │
//! │ (main)   │   │ allocate → copy → digest →   │   │ documents    │
//! ├──────────┤   │ preview → check-and-insert   │   │ sessions     │
//! │   HTTP   │──▶│                              │   └──────────────┘
//! │ (server) │   │ reset · sessions             │──▶ <vault>/documents/
//! └──────────┘   └──────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! perdocman init
//! perdocman ingest statement.pdf --category finance --tags bank,statement
//! perdocman list
//! perdocman serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and vault paths |
//! | [`vault`] | Shared vault context |
//! | [`ingest`] | Ingestion pipeline |
//! | [`allocate`] | Collision-free storage names |
//! | [`digest`] | SHA-256 content digests |
//! | [`extract`] | Best-effort PDF text preview |
//! | [`store`] | Metadata store (documents, sessions) |
//! | [`session`] | Session tracking |
//! | [`reset`] | Vault reset |
//! | [`server`] | HTTP adapter |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod allocate;
pub mod config;
pub mod db;
pub mod digest;
pub mod error;
pub mod extract;
pub mod get;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod reset;
pub mod server;
pub mod session;
pub mod stats;
pub mod store;
pub mod vault;

pub use error::{Result, VaultError};
pub use models::{Classification, Document};
pub use vault::Vault;
