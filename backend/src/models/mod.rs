//! Domain models.
//!
//! - [`table`]: the raw sheet shape shared by sources, uploads and saves
//! - [`records`]: typed per-sheet records and the merged outputs

pub mod records;
pub mod table;

pub use records::{
    Compensation, Employee, FinanceEntry, FromRow, OpportunityRecord, Person, RecruitmentCase,
    SheetRecords, TrainingDetail, TrainingRecord, NOT_AT_MINIMUM_WAGE, UNDEFINED,
};
pub use table::{fold_key, Cell, RawTable, RowView};
