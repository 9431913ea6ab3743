//! # cindex — semantic type index for C
//!
//! Walks the AST of each translation unit, records user-defined types
//! (struct/union/enum), the names they can be referred to by, their members,
//! and miscellaneous uses, and persists everything into a relational store
//! that the `query` tool reads.
//!
//! ## Crate layout
//!
//! - [`model`] — durable references, source locations, record entries
//! - [`store`] — the record store boundary and its three backends
//! - [`stage`] — the per-aggregate staging scoreboard
//! - [`front`] — the tree-sitter C frontend adapter
//! - [`index`] — the AST translator driving it all
//! - [`query`] — query command parsing and execution
//!
//! The crate is primarily the `indexer` and `query` binaries; the library
//! surface exists for integration testing and benchmarking.

pub mod compdb;
pub mod error;
pub mod front;
pub mod index;
pub mod model;
pub mod query;
pub mod stage;
pub mod stdio;
pub mod store;

pub use error::{exit, IndexError, Result};
pub use index::Indexer;
pub use store::{open_durable, open_mem, open_nop, RecordStore};

/// Default output database path.
pub const DEFAULT_DB_PATH: &str = "cf.db";
