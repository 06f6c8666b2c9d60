//! Offline consistency checker for a record-based graph store.
//!
//! Records are read through [`store::RecordAccess`] and every violation is
//! handed to a [`report::ConsistencyReporter`]; nothing is repaired. The
//! usual entry point is [`full::check_consistency`]:
//!
//! ```no_run
//! use sombra_consistency::full::check_consistency;
//! use sombra_consistency::options::CheckOptions;
//! use sombra_consistency::report::CollectingReporter;
//! use sombra_consistency::schema::AllOnline;
//! use sombra_consistency::store::InMemoryStore;
//!
//! let store = InMemoryStore::new();
//! let reporter = CollectingReporter::new();
//! let summary = check_consistency(&store, &AllOnline, &reporter, &CheckOptions::default())?;
//! assert!(summary.success);
//! # Ok::<(), sombra_consistency::error::ConsistencyError>(())
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod check;
pub mod error;
pub mod full;
pub mod options;
pub mod primitives;
pub mod report;
pub mod schema;
pub mod store;

pub use error::{ConsistencyError, Result};
pub use full::{check_consistency, ConsistencySummary};
pub use options::{ChainCheckMode, CheckOptions};
