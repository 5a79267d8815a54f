//! Headcount, pay and per-employee figures.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::models::{Employee, TrainingDetail};

pub const MALE: &str = "Homme";
pub const FEMALE: &str = "Femme";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkforceSummary {
    pub headcount: usize,
    pub mean_salary: f64,
    /// Monthly sum of base salaries.
    pub payroll: f64,
    /// `(mean(Homme) - mean(Femme)) / mean(Homme) * 100`, 0 without men.
    pub pay_gap_index: f64,
    pub mean_rating: f64,
}

pub fn workforce_summary(employees: &[&Employee]) -> WorkforceSummary {
    let headcount = employees.len();
    let payroll: f64 = employees.iter().map(|e| e.salary).sum();
    let mean = |total: f64| if headcount == 0 { 0.0 } else { total / headcount as f64 };

    WorkforceSummary {
        headcount,
        mean_salary: mean(payroll),
        payroll,
        pay_gap_index: pay_gap_index(employees),
        mean_rating: mean(employees.iter().map(|e| e.rating).sum()),
    }
}

/// Gender pay gap. A missing women group counts as a zero mean.
pub fn pay_gap_index(employees: &[&Employee]) -> f64 {
    let mut by_gender: HashMap<&str, (f64, usize)> = HashMap::new();
    for e in employees {
        let entry = by_gender.entry(e.gender.as_str()).or_insert((0.0, 0));
        entry.0 += e.salary;
        entry.1 += 1;
    }
    let mean_of = |gender: &str| by_gender.get(gender).map(|(sum, n)| sum / *n as f64);

    match mean_of(MALE) {
        Some(men) if men != 0.0 => (men - mean_of(FEMALE).unwrap_or(0.0)) / men * 100.0,
        _ => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: String,
    pub headcount: usize,
}

/// Headcount per CSP, largest first.
pub fn headcount_by_category(employees: &[&Employee]) -> Vec<CategoryCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for e in employees {
        *counts.entry(e.category.as_str()).or_insert(0) += 1;
    }
    let mut out: Vec<_> = counts
        .into_iter()
        .map(|(category, headcount)| CategoryCount {
            category: category.to_string(),
            headcount,
        })
        .collect();
    out.sort_by(|a, b| b.headcount.cmp(&a.headcount));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayrollSlice {
    pub category: String,
    pub position: String,
    pub payroll: f64,
    pub headcount: usize,
}

/// Payroll grouped by CSP, then by position within it.
pub fn payroll_by_category_position(employees: &[&Employee]) -> Vec<PayrollSlice> {
    let mut groups: BTreeMap<(&str, &str), (f64, usize)> = BTreeMap::new();
    for e in employees {
        let entry = groups
            .entry((e.category.as_str(), e.position.as_str()))
            .or_insert((0.0, 0));
        entry.0 += e.salary;
        entry.1 += 1;
    }
    groups
        .into_iter()
        .map(|((category, position), (payroll, headcount))| PayrollSlice {
            category: category.to_string(),
            position: position.to_string(),
            payroll,
            headcount,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub position: String,
    pub category: String,
    pub department: String,
    pub email: Option<String>,
}

/// Staff directory. Empty `categories` or `positions` means no filter on it.
pub fn directory(employees: &[&Employee], categories: &[String], positions: &[String]) -> Vec<DirectoryEntry> {
    employees
        .iter()
        .filter(|e| categories.is_empty() || categories.contains(&e.category))
        .filter(|e| positions.is_empty() || positions.contains(&e.position))
        .map(|e| DirectoryEntry {
            name: e.name.clone(),
            position: e.position.clone(),
            category: e.category.clone(),
            department: e.department.clone(),
            email: e.email.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingLine {
    pub training_type: String,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeCard {
    pub name: String,
    pub position: String,
    pub category: String,
    pub department: String,
    pub tenure_years: f64,
    pub salary: f64,
    pub bonus: f64,
    pub future_bonus: f64,
    /// Salary plus current bonus.
    pub current_pay: f64,
    /// Current pay plus planned bonus.
    pub projected_pay: f64,
    pub minimum_wage_alert: bool,
    pub trainings: Vec<TrainingLine>,
}

pub fn employee_card(employee: &Employee, training_detail: &[TrainingDetail]) -> EmployeeCard {
    let current_pay = employee.salary + employee.bonus;
    EmployeeCard {
        name: employee.name.clone(),
        position: employee.position.clone(),
        category: employee.category.clone(),
        department: employee.department.clone(),
        tenure_years: employee.tenure_years,
        salary: employee.salary,
        bonus: employee.bonus,
        future_bonus: employee.future_bonus,
        current_pay,
        projected_pay: current_pay + employee.future_bonus,
        minimum_wage_alert: employee.is_at_minimum_wage(),
        trainings: training_detail
            .iter()
            .filter(|t| t.name == employee.name)
            .map(|t| TrainingLine {
                training_type: t.training_type.clone(),
                cost: t.cost,
            })
            .collect(),
    }
}
