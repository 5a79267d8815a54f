//! Dashboard figures computed from a loaded [`Dataset`].
//!
//! Everything here is a pure read of the dataset. The department filter
//! applies to people and training; recruitment, finances and the sales
//! pipeline are company-wide.
//!
//! - [`workforce`]: headcount, pay, directory, employee card
//! - [`budget`]: training, consolidated budget, raise simulation, recruitment, CRM

pub mod budget;
pub mod workforce;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::models::{Employee, TrainingDetail};
use crate::transform::pipeline::Dataset;

pub use budget::{
    annual_loaded_cost, budget_consolidation, opportunity_pipeline, raise_simulation,
    recruitment_summary, training_summary, BudgetConsolidation, OpportunityPipeline,
    RaiseSimulation, RecruitmentSummary, StageTotals, TrainingSummary, EMPLOYER_CHARGES,
    MONTHS_PER_YEAR,
};
pub use workforce::{
    directory, employee_card, headcount_by_category, pay_gap_index, payroll_by_category_position,
    workforce_summary, CategoryCount, DirectoryEntry, EmployeeCard, PayrollSlice, TrainingLine,
    WorkforceSummary,
};

/// Label the dashboard uses for "no department filter".
pub const ALL_DEPARTMENTS: &str = "Tous";

/// Department selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "department", rename_all = "camelCase")]
pub enum DepartmentFilter {
    #[default]
    All,
    Only(String),
}

impl DepartmentFilter {
    /// Parse a query value. Absent, blank and "Tous" mean no filter.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => DepartmentFilter::All,
            Some(v) if v.eq_ignore_ascii_case(ALL_DEPARTMENTS) => DepartmentFilter::All,
            Some(v) => DepartmentFilter::Only(v.to_string()),
        }
    }

    pub fn matches(&self, department: &str) -> bool {
        match self {
            DepartmentFilter::All => true,
            DepartmentFilter::Only(name) => name == department,
        }
    }
}

pub fn filter_employees<'a>(employees: &'a [Employee], filter: &DepartmentFilter) -> Vec<&'a Employee> {
    employees.iter().filter(|e| filter.matches(&e.department)).collect()
}

pub fn filter_training<'a>(detail: &'a [TrainingDetail], filter: &DepartmentFilter) -> Vec<&'a TrainingDetail> {
    detail.iter().filter(|t| filter.matches(&t.department)).collect()
}

/// Sorted distinct departments, for the filter list.
pub fn departments(employees: &[Employee]) -> Vec<String> {
    employees
        .iter()
        .map(|e| e.department.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Every dashboard figure for one filter and raise percentage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardKpis {
    pub filter: DepartmentFilter,
    pub departments: Vec<String>,
    pub workforce: WorkforceSummary,
    pub headcount_by_category: Vec<CategoryCount>,
    pub payroll_by_category_position: Vec<PayrollSlice>,
    pub directory: Vec<DirectoryEntry>,
    pub training: TrainingSummary,
    pub budget: BudgetConsolidation,
    pub simulation: RaiseSimulation,
    pub recruitment: RecruitmentSummary,
    pub opportunities: OpportunityPipeline,
}

pub fn dashboard(dataset: &Dataset, filter: &DepartmentFilter, raise_pct: f64) -> DashboardKpis {
    let employees = filter_employees(&dataset.employees, filter);
    let training = filter_training(&dataset.training_detail, filter);

    DashboardKpis {
        filter: filter.clone(),
        departments: departments(&dataset.employees),
        workforce: workforce_summary(&employees),
        headcount_by_category: headcount_by_category(&employees),
        payroll_by_category_position: payroll_by_category_position(&employees),
        directory: directory(&employees, &[], &[]),
        training: training_summary(&training),
        budget: budget_consolidation(&employees, &dataset.recruitment),
        simulation: raise_simulation(&employees, &dataset.finances, raise_pct),
        recruitment: recruitment_summary(&dataset.recruitment),
        opportunities: opportunity_pipeline(&dataset.opportunities),
    }
}

/// Card for `name`, looked up over all departments.
pub fn employee_card_for(dataset: &Dataset, name: &str) -> Option<EmployeeCard> {
    dataset
        .employee(name)
        .map(|e| employee_card(e, &dataset.training_detail))
}
