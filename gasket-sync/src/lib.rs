//! # gasket-sync
//!
//! Bidirectional sync between a local working copy and a hosted script
//! project.
//!
//! - [`manifest`]: the last-synchronized state, `.gasket/manifest.json`
//! - [`diff`]: pure change-set computation and the three-way planner
//! - [`plan`]: one round's operations for a direction
//! - [`executor`]: applies a plan and advances the manifest
//! - [`pipeline`]: [`SyncEngine`], the per-round entry point
//! - [`lock`]: the cross-process round lock in `.gasket/`
//! - [`remote`], [`naming`], [`analyzer`], [`checkpoint`]: collaborators
//!
//! Call [`SyncEngine::sync`] with a [`SyncRequest`] to run a round.

pub mod analyzer;
pub mod cache;
pub mod checkpoint;
pub mod diff;
pub mod error;
pub mod executor;
pub mod lock;
pub mod manifest;
pub mod naming;
pub mod pipeline;
pub mod plan;
pub mod remote;
pub mod status;
pub mod working_copy;

pub use error::SyncError;
pub use pipeline::{RoundPreview, SyncEngine, SyncReport, SyncRequest};
