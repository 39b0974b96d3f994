//! `saresp-recon` - column reconciliation and multi-source joins for school
//! assessment tables.
//!
//! Pure engine crate: receives pre-loaded tables, returns a unified table
//! plus diagnostics. No CLI or IO dependencies.

pub mod aggregate;
pub mod concat;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod join;
pub mod model;
pub mod normalize;
pub mod pivot;
pub mod stats;
pub mod table;

pub use config::PipelineConfig;
pub use diagnostics::{Diagnostics, TableDiagnostics};
pub use engine::run;
pub use error::ReconError;
pub use join::{join_all, join_tables, JoinSpec};
pub use model::{JoinMode, PipelineInput, PipelineResult};
pub use normalize::{normalize_columns, AliasTable, CollisionPolicy};
pub use table::{KeyValue, Table, Value};
