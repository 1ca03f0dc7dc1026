//! # viking-db
//!
//! Infrastructure layer for Viking - object storage and vector indexing.
//!
//! This crate provides the storage implementations that are isolated from the
//! domain logic in `viking-core`. `viking-core` only sees the traits:
//!
//! - [`object::ObjectStore`]: hierarchical byte storage (files and directories)
//! - [`vector::VectorIndexBackend`]: similarity search over tenant-tagged vectors
//!
//! ## Architecture
//!
//! ```text
//! viking-cli → viking-core → (traits)
//!                   ↑
//!              viking-db (object store + vector index backends)
//!              viking-model (embedding + vision providers)
//! ```
//!
//! ## Modules
//!
//! - `object`: Object store backends (memory, local directory)
//! - `vector`: Vector index backends (memory, simple JSONL)
//!
//! ## Usage
//!
//! ```ignore
//! use viking_db::object::{open_object_store, ObjectStoreConfig};
//! use viking_db::vector::{open_vector_index, VectorIndexConfig};
//!
//! let store = open_object_store(&ObjectStoreConfig::default()).await?;
//! let index = open_vector_index(&VectorIndexConfig::new(256)).await?;
//! ```

pub mod error;
pub mod object;
pub mod vector;

pub use error::{DbError, DbResult};
