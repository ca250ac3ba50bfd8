//! Roadnet: scenario folder discovery and road network graph import
//!
//! This crate takes a folder of simulation configuration files and turns it into
//! a queryable road graph:
//!
//! 1. **Discovery** -- Walk the folder, classify every file by lower-cased path
//!    substrings and bind a format-specific handler for each match in parallel
//! 2. **Gating** -- Read each file's declared schema version and exclude files
//!    whose version is missing, malformed or below what their parser understands
//! 3. **Population** -- Insert roads and junctions from every road network file into
//!    a concurrent, insert-once graph store
//! 4. **Resolution** -- Resolve predecessor/successor links and junction references,
//!    reporting unresolved targets as dangling references
//!
//! # Architecture
//!
//! - **Closed handler set** -- [`handler::Handler`] is a tagged union of parsers;
//!   the registry maps each [`file_type::FileTypeTag`] to a plain constructor
//! - **Parallel binding** -- rayon fans out file parsing and per-file store insertion
//! - **Sharded store** -- DashMap keyed with FxHash; first writer wins
//! - **Barrier by borrow** -- link resolution takes `&mut GraphStore`, so it can
//!   only start once all inserting workers have returned
//! - **Diagnostics, not aborts** -- only a missing root directory stops an import
//!
//! # Key Modules
//!
//! - [`discover`] -- Folder importer producing priority-ordered handlers
//! - [`load`] -- End-to-end pipeline with diagnostics and a serializable summary
//! - [`store`] -- Graph store and link resolution
//! - [`scenery`] -- OpenDRIVE road network parser
//! - [`road`] -- Road, lane, geometry and junction data model
//! - [`version`] -- Dotted version parsing and ordering
//! - [`handler`] -- Handler contract and catalog handler
//! - [`file_type`] -- File type registry and data kinds
//! - [`document`] -- Generic XML element tree
//! - [`stats`] -- Atomic import counters
//! - [`config`] -- Constants for classification and validation
//!
//! # Example Usage
//!
//! ```bash
//! # List classified files with versions and data kinds
//! roadnet scan configs/
//!
//! # Import on 4 worker threads and print a JSON report
//! roadnet load configs/ --threads 4 --json
//! ```

pub mod config;
pub mod discover;
pub mod document;
pub mod error;
pub mod file_type;
pub mod handler;
pub mod load;
pub mod road;
pub mod scenery;
pub mod stats;
pub mod store;
pub mod version;

pub use error::{Error, Result};
