//! Load pipeline: workbook sheets to a normalized [`Dataset`].
//!
//! ```text
//! source ─▶ raw sheets ─▶ normalize headers ─▶ typed records ─▶ joins ─▶ derived columns
//! ```
//!
//! The whole transform is one pass with no partial commit. Only source
//! failures abort it; bad cells are defaulted along the way.
//!
//! # Example
//!
//! ```rust,ignore
//! use pilotage::source::XlsxSource;
//! use pilotage::transform::pipeline::{load_dataset, PipelineOptions};
//!
//! let source = XlsxSource::new("Test_Dashboard.xlsx");
//! let dataset = load_dataset(&source, &PipelineOptions::default()).await?;
//! println!("{} employees", dataset.employees.len());
//! ```

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::derive::derive_all;
use super::merge::{attach_training, merge_compensation, training_detail};
use crate::api::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::error::{PipelineResult, SourceError};
use crate::models::{
    Compensation, Employee, FinanceEntry, OpportunityRecord, Person, RawTable, RecruitmentCase,
    SheetRecords, TrainingDetail, TrainingRecord,
};
use crate::normalize::{canonical as col, normalize_headers};
use crate::source::SheetSource;

/// Sheet names of one workbook revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkbookLayout {
    /// Workbook (file stem or remote name) the sheets live in.
    pub workbook: String,
    pub people: String,
    pub salaries: String,
    pub training: String,
    pub recruitment: String,
    pub finances: String,
    /// CRM revisions only.
    pub opportunities: Option<String>,
}

impl Default for WorkbookLayout {
    fn default() -> Self {
        Self {
            workbook: "Test_Dashboard".to_string(),
            people: "Données Sociales".to_string(),
            salaries: "Salaires".to_string(),
            training: "Formation".to_string(),
            recruitment: "Recrutement".to_string(),
            finances: "Finances".to_string(),
            opportunities: None,
        }
    }
}

/// Options for one load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOptions {
    pub layout: WorkbookLayout,
    /// Date ages and tenures are computed against. `None` is today's date.
    pub reference_date: Option<NaiveDate>,
}

impl PipelineOptions {
    pub fn today(&self) -> NaiveDate {
        self.reference_date.unwrap_or_else(|| Local::now().date_naive())
    }
}

/// Sheets as fetched, before any normalization.
#[derive(Debug, Clone, Default)]
pub struct RawSheets {
    pub workbook: String,
    pub people: RawTable,
    pub salaries: RawTable,
    pub training: RawTable,
    pub recruitment: RawTable,
    pub finances: RawTable,
    pub opportunities: RawTable,
}

/// Which joins ran. `false` means a key column was missing and the left
/// side was kept unjoined.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinReport {
    pub compensation: bool,
    pub training: bool,
}

/// Normalized tables handed to the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub workbook: String,
    pub loaded_on: NaiveDate,
    pub employees: Vec<Employee>,
    pub training_detail: Vec<TrainingDetail>,
    pub recruitment: Vec<RecruitmentCase>,
    pub finances: Vec<FinanceEntry>,
    pub opportunities: Vec<OpportunityRecord>,
    pub joins: JoinReport,
    /// Non-fatal problems met during the load.
    pub warnings: Vec<String>,
}

impl Dataset {
    pub fn employee(&self, name: &str) -> Option<&Employee> {
        let name = name.trim();
        self.employees.iter().find(|e| e.name == name)
    }
}

/// Fetch every sheet of the layout and build the dataset.
///
/// People and salary sheets are required. The others may be absent from
/// the workbook and then load as empty tables. Any other source failure
/// aborts the load.
pub async fn load_dataset(source: &dyn SheetSource, options: &PipelineOptions) -> PipelineResult<Dataset> {
    let layout = &options.layout;
    log_info(format!("📖 Loading workbook '{}'...", source.workbook()));

    let mut warnings = Vec::new();
    let people = read_required(source, &layout.people).await?;
    let salaries = read_required(source, &layout.salaries).await?;
    let training = read_optional(source, &layout.training, &mut warnings).await?;
    let recruitment = read_optional(source, &layout.recruitment, &mut warnings).await?;
    let finances = read_optional(source, &layout.finances, &mut warnings).await?;
    let opportunities = match &layout.opportunities {
        Some(sheet) => read_optional(source, sheet, &mut warnings).await?,
        None => RawTable::empty("opportunities"),
    };

    let sheets = RawSheets {
        workbook: source.workbook().to_string(),
        people,
        salaries,
        training,
        recruitment,
        finances,
        opportunities,
    };
    let mut dataset = build_dataset(sheets, options.today());
    warnings.append(&mut dataset.warnings);
    dataset.warnings = warnings;
    log_success(format!(
        "{} employees, {} training events, {} recruitment cases",
        dataset.employees.len(),
        dataset.training_detail.len(),
        dataset.recruitment.len()
    ));
    Ok(dataset)
}

async fn read_required(source: &dyn SheetSource, sheet: &str) -> Result<RawTable, SourceError> {
    let table = source.read_sheet(sheet).await?;
    log_info_indent(format!("{}: {} rows", sheet, table.len()), 1);
    Ok(table)
}

async fn read_optional(
    source: &dyn SheetSource,
    sheet: &str,
    warnings: &mut Vec<String>,
) -> Result<RawTable, SourceError> {
    match source.read_sheet(sheet).await {
        Ok(table) => {
            log_info_indent(format!("{}: {} rows", sheet, table.len()), 1);
            Ok(table)
        }
        Err(e) if e.is_sheet_not_found() => {
            let message = format!("Sheet '{}' not found, using an empty table", sheet);
            log_warning(message.as_str());
            warnings.push(message);
            Ok(RawTable::empty(sheet))
        }
        Err(e) => Err(e),
    }
}

/// Pure transform from raw sheets to the dataset.
pub fn build_dataset(mut sheets: RawSheets, today: NaiveDate) -> Dataset {
    for table in [
        &mut sheets.people,
        &mut sheets.salaries,
        &mut sheets.training,
        &mut sheets.recruitment,
        &mut sheets.finances,
        &mut sheets.opportunities,
    ] {
        normalize_headers(table);
    }

    let people = SheetRecords::<Person>::from_table(&sheets.people);
    let salaries = SheetRecords::<Compensation>::from_table(&sheets.salaries);
    let training = SheetRecords::<TrainingRecord>::from_table(&sheets.training);

    let detail = training_detail(&training, &people);
    let merged = merge_compensation(people, &salaries);
    let mut employees = merged.value;
    let training_joined = attach_training(&mut employees, &training);
    derive_all(&mut employees, today);

    let mut warnings = Vec::new();
    if !merged.joined {
        warnings.push(format!("Salaries not joined: '{}' missing in a sheet", col::NAME));
    }
    if !training_joined && !sheets.training.headers.is_empty() {
        warnings.push("Training costs not joined".to_string());
    }

    Dataset {
        workbook: sheets.workbook,
        loaded_on: today,
        employees,
        training_detail: detail,
        recruitment: SheetRecords::<RecruitmentCase>::from_table(&sheets.recruitment).records,
        finances: SheetRecords::<FinanceEntry>::from_table(&sheets.finances).records,
        opportunities: SheetRecords::<OpportunityRecord>::from_table(&sheets.opportunities).records,
        joins: JoinReport {
            compensation: merged.joined,
            training: training_joined,
        },
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::models::Cell;
    use crate::source::MemorySource;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sheet(name: &str, headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            name,
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|v| Cell::from(*v)).collect())
                .collect(),
        )
    }

    fn workbook() -> MemorySource {
        MemorySource::new("Test_Dashboard")
            .with_sheet(sheet(
                "Données Sociales",
                &[" Nom ", "Date Naissance", "Date Entrée", "Service", "CSP"],
                &[
                    &["A", "01/01/1990", "01/01/2020", "RH", "Cadre"],
                    &["B", "15/06/1985", "", "RH", "ETAM"],
                    &["C", "", "01/01/2023", "IT", "Cadre"],
                ],
            ))
            .with_sheet(sheet(
                "Salaires",
                &["Nom", "Salaire (€)", "Primes(€)"],
                &[&["A", "3 000,00 €", "500"], &["C", "4 000 €", ""]],
            ))
            .with_sheet(sheet(
                "Formation",
                &["Nom", "Type de Formation", "Cout Formation (€)"],
                &[&["C", "Sécurité", "500€"], &["C", "Excel", "1 200,50€"], &["A", "Excel", "300"]],
            ))
    }

    fn options() -> PipelineOptions {
        PipelineOptions {
            reference_date: Some(ymd(2024, 1, 1)),
            ..PipelineOptions::default()
        }
    }

    #[tokio::test]
    async fn test_age_on_reference_date() {
        let dataset = load_dataset(&workbook(), &options()).await.unwrap();
        let a = dataset.employee("A").unwrap();
        assert_eq!(a.age, 34);
        assert!((a.tenure_years - 4.0).abs() < 0.01);
        assert_eq!(dataset.employee("C").unwrap().age, 0);
    }

    #[tokio::test]
    async fn test_person_without_salary_row() {
        let dataset = load_dataset(&workbook(), &options()).await.unwrap();
        let b: Vec<_> = dataset.employees.iter().filter(|e| e.name == "B").collect();
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].salary, 0.0);
        assert_eq!(b[0].bonus, 0.0);
        assert!(dataset.joins.compensation);
    }

    #[tokio::test]
    async fn test_training_aggregated_and_detailed() {
        let dataset = load_dataset(&workbook(), &options()).await.unwrap();
        assert_eq!(dataset.employee("C").unwrap().training_cost, 1700.5);
        assert_eq!(dataset.employee("B").unwrap().training_cost, 0.0);
        assert_eq!(dataset.training_detail.len(), 3);
        assert_eq!(dataset.training_detail[0].department, "IT");
        assert_eq!(dataset.training_detail[0].training_type, "Sécurité");
    }

    #[tokio::test]
    async fn test_department_deviation() {
        let dataset = load_dataset(&workbook(), &options()).await.unwrap();
        let a = dataset.employee("A").unwrap();
        let b = dataset.employee("B").unwrap();
        assert_eq!(a.department_mean_salary, 1500.0);
        assert_eq!(b.department_mean_salary, 1500.0);
        assert_eq!(a.salary_deviation, 1500.0);
        assert_eq!(b.salary_deviation, -1500.0);
        assert_eq!(a.bonus, 500.0);
    }

    #[tokio::test]
    async fn test_optional_sheets_may_be_missing() {
        let dataset = load_dataset(&workbook(), &options()).await.unwrap();
        assert!(dataset.recruitment.is_empty());
        assert!(dataset.finances.is_empty());
        assert_eq!(dataset.warnings.len(), 2);
        assert_eq!(dataset.workbook, "Test_Dashboard");
    }

    #[tokio::test]
    async fn test_missing_required_sheet_aborts() {
        let source = MemorySource::new("wb").with_sheet(sheet("Données Sociales", &["Nom"], &[&["A"]]));
        let err = load_dataset(&source, &options()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Source(SourceError::SheetNotFound { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_source_aborts() {
        let source = workbook();
        source.set_offline(true);
        assert!(load_dataset(&source, &options()).await.is_err());
    }

    #[test]
    fn test_missing_key_keeps_people() {
        let sheets = RawSheets {
            people: sheet("p", &["Nom", "Service"], &[&["A", "RH"], &["B", "IT"]]),
            salaries: sheet("s", &["Employé", "Salaire (€)"], &[&["A", "2000"]]),
            ..RawSheets::default()
        };
        let dataset = build_dataset(sheets, ymd(2024, 1, 1));
        assert_eq!(dataset.employees.len(), 2);
        assert!(!dataset.joins.compensation);
        assert!(!dataset.joins.training);
        assert_eq!(dataset.warnings.len(), 1);
        assert!(dataset.employees.iter().all(|e| e.salary == 0.0 && e.salary_deviation == 0.0));
    }

    #[test]
    fn test_recruitment_and_crm_sheets() {
        let sheets = RawSheets {
            people: sheet("p", &["Nom"], &[&["A"]]),
            salaries: sheet("s", &["Nom"], &[]),
            recruitment: sheet(
                "r",
                &["Poste", "Date Ouverture Poste", "Date Cloture Poste", "Cout Recrutement (€)"],
                &[&["Dev", "01/02/2024", "11/02/2024", "2 500 €"]],
            ),
            finances: sheet("f", &["Libellé", "Flux"], &[&["Ventes", "10 000"], &["Loyer", "-2 000"]]),
            opportunities: sheet(
                "o",
                &["Opportunite", "Client", "Montant Estime (€)", "Probabilite (%)", "Etape"],
                &[&["Deal", "ACME", "10 000", "50", "Proposition"]],
            ),
            ..RawSheets::default()
        };
        let dataset = build_dataset(sheets, ymd(2024, 3, 1));
        assert_eq!(dataset.recruitment[0].days_to_fill(), Some(10));
        assert_eq!(dataset.recruitment[0].cost, 2500.0);
        assert_eq!(dataset.finances.iter().map(|f| f.flow).sum::<f64>(), 8000.0);
        assert_eq!(dataset.opportunities[0].weighted_amount(), 5000.0);
        assert_eq!(dataset.opportunities[0].stage, "Proposition");
    }
}
