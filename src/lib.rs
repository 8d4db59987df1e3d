//! Upgrades xyuv pixel-format templates to the 2.x plane field layout.
//!
//! A [`RuleTable`] of ordered substring renames is applied by a [`RewriteEngine`] to every
//! string field of each entry in a template's `planes` array. [`upgrade_dir`] drives a whole
//! directory through a [`DocumentStore`], isolating per-file failures in a [`BatchReport`].
#![forbid(unsafe_code)]

mod foundation;

pub mod batch;
pub mod rewrite;
pub mod rules;
pub mod store;
pub mod template;

pub use crate::batch::{BatchOpts, BatchReport, FileOutcome, FileStatus, upgrade_dir, upgrade_file};
pub use crate::foundation::error::{UpgradeError, UpgradeResult};
pub use crate::rewrite::{Rewrite, RewriteEngine};
pub use crate::rules::{RenameRule, RuleTable};
pub use crate::store::{DocumentStore, FsStore, MemoryStore};
pub use crate::template::{FormatTemplate, PLANES_KEY};
