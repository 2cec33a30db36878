//! Version-controlled baseline management.
//!
//! The baseline is the accepted reference set of rasters that future
//! captures are compared against. This module stores it durably with
//! versions, branches, backups, rollback, and structural auto-selection.

pub mod select;
pub mod store;
pub mod types;

pub use select::{auto_select, BaselineCandidate, DEFAULT_SELECT_THRESHOLD};
pub use store::{BaselineStore, UpdateOptions};
pub use types::{
    BaselineBranch, BaselineError, BaselineMetadata, BaselineResult, BaselineVersion,
    RollbackRecord,
};
