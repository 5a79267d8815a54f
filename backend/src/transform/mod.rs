//! Transformation module.
//!
//! - Merge: left joins of salaries and training onto people
//! - Derive: age, tenure and department deviation
//! - Pipeline: source to [`pipeline::Dataset`]

pub mod derive;
pub mod merge;
pub mod pipeline;

pub use derive::{age_on, apply_department_deviation, department_means, derive_all, tenure_on};
pub use merge::{aggregate_training, attach_training, merge_compensation, training_detail, MergeOutcome};
pub use pipeline::{build_dataset, load_dataset, Dataset, JoinReport, PipelineOptions, RawSheets, WorkbookLayout};
