//! Cost figures: training, consolidated budget, raise simulation,
//! recruitment and the sales pipeline.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{Employee, FinanceEntry, OpportunityRecord, RecruitmentCase, TrainingDetail};

/// Employer on-cost multiplier applied to gross salaries.
pub const EMPLOYER_CHARGES: f64 = 1.45;
pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Yearly loaded cost of a monthly payroll.
pub fn annual_loaded_cost(monthly_payroll: f64) -> f64 {
    monthly_payroll * MONTHS_PER_YEAR * EMPLOYER_CHARGES
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSummary {
    pub budget: f64,
    pub events: usize,
    pub by_type: BTreeMap<String, f64>,
    pub by_category: BTreeMap<String, f64>,
}

pub fn training_summary(detail: &[&TrainingDetail]) -> TrainingSummary {
    let mut by_type = BTreeMap::new();
    let mut by_category = BTreeMap::new();
    for t in detail {
        *by_type.entry(t.training_type.clone()).or_insert(0.0) += t.cost;
        *by_category.entry(t.category.clone()).or_insert(0.0) += t.cost;
    }
    TrainingSummary {
        budget: detail.iter().map(|t| t.cost).sum(),
        events: detail.len(),
        by_type,
        by_category,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetConsolidation {
    /// Yearly salaries with employer charges.
    pub salaries: f64,
    pub training: f64,
    pub recruitment: f64,
    pub total: f64,
}

/// Salaries and training follow the department filter; recruitment is
/// company-wide.
pub fn budget_consolidation(employees: &[&Employee], recruitment: &[RecruitmentCase]) -> BudgetConsolidation {
    let salaries = annual_loaded_cost(employees.iter().map(|e| e.salary).sum());
    let training: f64 = employees.iter().map(|e| e.training_cost).sum();
    let recruitment: f64 = recruitment.iter().map(|r| r.cost).sum();
    BudgetConsolidation {
        salaries,
        training,
        recruitment,
        total: salaries + training + recruitment,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaiseSimulation {
    pub raise_pct: f64,
    pub extra_cost: f64,
    pub current_margin: f64,
    pub future_margin: f64,
}

/// Yearly cost of raising every salary by `raise_pct` percent (clamped to
/// 0..=100) against the margin from the finance flows.
pub fn raise_simulation(employees: &[&Employee], finances: &[FinanceEntry], raise_pct: f64) -> RaiseSimulation {
    let raise_pct = if raise_pct.is_finite() { raise_pct.clamp(0.0, 100.0) } else { 0.0 };
    let payroll: f64 = employees.iter().map(|e| e.salary).sum();
    let extra_cost = annual_loaded_cost(payroll * raise_pct / 100.0);
    let current_margin: f64 = finances.iter().map(|f| f.flow).sum();
    RaiseSimulation {
        raise_pct,
        extra_cost,
        current_margin,
        future_margin: current_margin - extra_cost,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecruitmentSummary {
    pub cases: usize,
    pub total_cost: f64,
    pub open_positions: usize,
    pub candidates: u32,
    /// Over closed cases with both dates.
    pub mean_days_to_fill: Option<f64>,
    pub cost_by_channel: BTreeMap<String, f64>,
}

pub fn recruitment_summary(cases: &[RecruitmentCase]) -> RecruitmentSummary {
    let filled: Vec<i64> = cases.iter().filter_map(RecruitmentCase::days_to_fill).collect();
    let mut cost_by_channel = BTreeMap::new();
    for case in cases {
        *cost_by_channel.entry(case.channel.clone()).or_insert(0.0) += case.cost;
    }
    RecruitmentSummary {
        cases: cases.len(),
        total_cost: cases.iter().map(|c| c.cost).sum(),
        open_positions: cases.iter().filter(|c| c.is_open()).count(),
        candidates: cases.iter().map(|c| c.candidates).sum(),
        mean_days_to_fill: (!filled.is_empty())
            .then(|| filled.iter().sum::<i64>() as f64 / filled.len() as f64),
        cost_by_channel,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTotals {
    pub stage: String,
    pub count: usize,
    pub amount: f64,
    pub weighted_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityPipeline {
    pub total_amount: f64,
    pub weighted_amount: f64,
    pub stages: Vec<StageTotals>,
}

pub fn opportunity_pipeline(opportunities: &[OpportunityRecord]) -> OpportunityPipeline {
    let mut stages: BTreeMap<&str, StageTotals> = BTreeMap::new();
    for o in opportunities {
        let totals = stages.entry(o.stage.as_str()).or_insert_with(|| StageTotals {
            stage: o.stage.clone(),
            count: 0,
            amount: 0.0,
            weighted_amount: 0.0,
        });
        totals.count += 1;
        totals.amount += o.estimated_amount;
        totals.weighted_amount += o.weighted_amount();
    }
    OpportunityPipeline {
        total_amount: opportunities.iter().map(|o| o.estimated_amount).sum(),
        weighted_amount: opportunities.iter().map(OpportunityRecord::weighted_amount).sum(),
        stages: stages.into_values().collect(),
    }
}
