//! Typed records, one kind per sheet.
//!
//! Raw rows are mapped into these structs once, right after header
//! normalization. Numbers go through the fail-to-zero normalizer, dates
//! through the day-first parser, and blank categorical fields take the
//! [`UNDEFINED`] sentinel.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::table::{fold_key, RawTable, RowView};
use crate::normalize::canonical as col;
use crate::normalize::{coerce_number, parse_date, Coerced};

/// Sentinel for a categorical field with no value.
pub const UNDEFINED: &str = "Non défini";

/// Default for the minimum-wage flag when no salary row exists.
pub const NOT_AT_MINIMUM_WAGE: &str = "Non";

/// Map one normalized row into a record.
pub trait FromRow: Sized {
    fn from_row(row: RowView<'_>) -> Self;
}

/// Records of one sheet, plus the headers they were read from so merge
/// steps can tell a missing key column from a missing value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetRecords<T> {
    pub sheet: String,
    pub columns: Vec<String>,
    pub records: Vec<T>,
}

impl<T: FromRow> SheetRecords<T> {
    pub fn from_table(table: &RawTable) -> Self {
        Self {
            sheet: table.name.clone(),
            columns: table.headers.clone(),
            records: table.iter_rows().map(T::from_row).collect(),
        }
    }
}

impl<T> SheetRecords<T> {
    pub fn has_column(&self, name: &str) -> bool {
        let key = fold_key(name);
        self.columns.iter().any(|c| fold_key(c) == key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn categorical(row: &RowView<'_>, column: &str) -> String {
    row.text(column).unwrap_or_else(|| UNDEFINED.to_string())
}

fn key(row: &RowView<'_>, column: &str) -> String {
    row.text(column).unwrap_or_default()
}

fn amount(row: &RowView<'_>, column: &str) -> f64 {
    coerce_number(row.get(column)).value()
}

fn optional_amount(row: &RowView<'_>, column: &str) -> Option<f64> {
    match coerce_number(row.get(column)) {
        Coerced::Value(v) => Some(v),
        Coerced::Defaulted => None,
    }
}

/// Row of the "Données Sociales" sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub hire_date: Option<NaiveDate>,
    pub position: String,
    pub category: String,
    pub department: String,
    pub gender: String,
    pub email: Option<String>,
    /// Some workbook revisions keep these on the social sheet.
    pub minimum_wage: Option<String>,
    pub rating: Option<f64>,
}

impl FromRow for Person {
    fn from_row(row: RowView<'_>) -> Self {
        Self {
            name: key(&row, col::NAME),
            birth_date: parse_date(row.get(col::BIRTH_DATE)),
            hire_date: parse_date(row.get(col::HIRE_DATE)),
            position: categorical(&row, col::POSITION),
            category: categorical(&row, col::CATEGORY),
            department: categorical(&row, col::DEPARTMENT),
            gender: categorical(&row, col::GENDER),
            email: row.text(col::EMAIL),
            minimum_wage: row.text(col::MINIMUM_WAGE),
            rating: optional_amount(&row, col::RATING),
        }
    }
}

/// Row of the "Salaires" sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compensation {
    pub name: String,
    pub salary: f64,
    pub bonus: f64,
    pub future_bonus: f64,
    pub minimum_wage: Option<String>,
    pub rating: Option<f64>,
}

impl FromRow for Compensation {
    fn from_row(row: RowView<'_>) -> Self {
        Self {
            name: key(&row, col::NAME),
            salary: amount(&row, col::SALARY),
            bonus: amount(&row, col::BONUS),
            future_bonus: amount(&row, col::FUTURE_BONUS),
            minimum_wage: row.text(col::MINIMUM_WAGE),
            rating: optional_amount(&row, col::RATING),
        }
    }
}

/// Row of the "Formation" sheet: one training event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRecord {
    pub name: String,
    pub training_type: String,
    pub cost: f64,
}

impl FromRow for TrainingRecord {
    fn from_row(row: RowView<'_>) -> Self {
        Self {
            name: key(&row, col::NAME),
            training_type: categorical(&row, col::TRAINING_TYPE),
            cost: amount(&row, col::TRAINING_COST),
        }
    }
}

/// Row of the "Recrutement" sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecruitmentCase {
    pub position: String,
    pub opened: Option<NaiveDate>,
    pub closed: Option<NaiveDate>,
    pub cost: f64,
    pub candidates: u32,
    pub channel: String,
}

impl RecruitmentCase {
    /// Days between opening and closing, when both dates are known and ordered.
    pub fn days_to_fill(&self) -> Option<i64> {
        match (self.opened, self.closed) {
            (Some(open), Some(close)) if close >= open => Some((close - open).num_days()),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.closed.is_none()
    }
}

impl FromRow for RecruitmentCase {
    fn from_row(row: RowView<'_>) -> Self {
        let candidates = amount(&row, col::CANDIDATES);
        Self {
            position: categorical(&row, col::POSITION),
            opened: parse_date(row.get(col::OPENED)),
            closed: parse_date(row.get(col::CLOSED)),
            cost: amount(&row, col::RECRUITMENT_COST),
            candidates: if candidates > 0.0 { candidates.round() as u32 } else { 0 },
            channel: categorical(&row, col::CHANNEL),
        }
    }
}

/// Row of a CRM "pipeline" sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityRecord {
    pub opportunity: String,
    pub client: String,
    pub estimated_amount: f64,
    /// Percentage, clamped to 0..=100.
    pub probability: f64,
    pub stage: String,
}

impl OpportunityRecord {
    pub fn weighted_amount(&self) -> f64 {
        self.estimated_amount * self.probability / 100.0
    }
}

impl FromRow for OpportunityRecord {
    fn from_row(row: RowView<'_>) -> Self {
        Self {
            opportunity: key(&row, col::OPPORTUNITY),
            client: categorical(&row, col::CLIENT),
            estimated_amount: amount(&row, col::ESTIMATED_AMOUNT),
            probability: amount(&row, col::PROBABILITY).clamp(0.0, 100.0),
            stage: categorical(&row, col::STAGE),
        }
    }
}

/// Row of the "Finances" sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceEntry {
    pub label: Option<String>,
    pub flow: f64,
}

impl FromRow for FinanceEntry {
    fn from_row(row: RowView<'_>) -> Self {
        Self {
            label: row.text(col::LABEL),
            flow: amount(&row, col::FLOW),
        }
    }
}

/// One person after the salary and training joins and the derived columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub hire_date: Option<NaiveDate>,
    pub position: String,
    pub category: String,
    pub department: String,
    pub gender: String,
    pub email: Option<String>,
    pub salary: f64,
    pub bonus: f64,
    pub future_bonus: f64,
    pub minimum_wage: String,
    pub rating: f64,
    pub training_cost: f64,
    pub age: u32,
    pub tenure_years: f64,
    pub department_mean_salary: f64,
    pub salary_deviation: f64,
}

impl Employee {
    /// Unjoined employee: compensation and derived fields at zero.
    pub fn from_person(person: Person) -> Self {
        Self {
            name: person.name,
            birth_date: person.birth_date,
            hire_date: person.hire_date,
            position: person.position,
            category: person.category,
            department: person.department,
            gender: person.gender,
            email: person.email,
            salary: 0.0,
            bonus: 0.0,
            future_bonus: 0.0,
            minimum_wage: person
                .minimum_wage
                .unwrap_or_else(|| NOT_AT_MINIMUM_WAGE.to_string()),
            rating: person.rating.unwrap_or(0.0),
            training_cost: 0.0,
            age: 0,
            tenure_years: 0.0,
            department_mean_salary: 0.0,
            salary_deviation: 0.0,
        }
    }

    /// Copy salary-sheet figures. Flags present on the salary sheet win
    /// over the social sheet.
    pub fn apply_compensation(&mut self, comp: &Compensation) {
        self.salary = comp.salary;
        self.bonus = comp.bonus;
        self.future_bonus = comp.future_bonus;
        if let Some(flag) = &comp.minimum_wage {
            self.minimum_wage = flag.clone();
        }
        if let Some(rating) = comp.rating {
            self.rating = rating;
        }
    }

    pub fn is_at_minimum_wage(&self) -> bool {
        self.minimum_wage.trim().eq_ignore_ascii_case("oui")
    }
}

/// A training event enriched with the trainee's department and category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingDetail {
    pub name: String,
    pub training_type: String,
    pub cost: f64,
    pub department: String,
    pub category: String,
}
