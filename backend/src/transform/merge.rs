//! Cross-sheet joins.
//!
//! ```text
//! Données Sociales ──left join on Nom──▶ Salaires
//!        │                                  │
//!        │                 Formation ── sum(cost) by Nom ──left join──▶ employees
//!        └──── department/category ──▶ Formation (detail, one row per event)
//! ```
//!
//! A join whose key column is missing on either side does not fail: the
//! left side comes back unjoined with the dependent figures at zero.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::api::logs::log_warning;
use crate::models::{
    Compensation, Employee, Person, SheetRecords, TrainingDetail, TrainingRecord, UNDEFINED,
};
use crate::normalize::canonical as col;

/// Result of a join step and whether the join actually happened.
#[derive(Debug, Clone)]
pub struct MergeOutcome<T> {
    pub value: T,
    pub joined: bool,
}

/// Left join of people onto salary rows, keyed by name.
///
/// Every distinct person name appears exactly once in the output. Duplicate
/// people keep their first row; duplicate salary rows use the first match.
pub fn merge_compensation(
    people: SheetRecords<Person>,
    compensation: &SheetRecords<Compensation>,
) -> MergeOutcome<Vec<Employee>> {
    let key_present = people.has_column(col::NAME) && compensation.has_column(col::NAME);
    let sheet = people.sheet.clone();

    let mut seen = HashSet::new();
    let mut duplicates = 0usize;
    let mut employees = Vec::with_capacity(people.records.len());
    for person in people.records {
        if !person.name.is_empty() && !seen.insert(person.name.clone()) {
            duplicates += 1;
            continue;
        }
        employees.push(Employee::from_person(person));
    }
    if duplicates > 0 {
        log_warning(format!("{}: {} duplicate name(s) ignored", sheet, duplicates));
    }

    if !key_present {
        log_warning(format!(
            "Column '{}' missing in '{}' or '{}': salaries left at 0",
            col::NAME,
            sheet,
            compensation.sheet
        ));
        return MergeOutcome { value: employees, joined: false };
    }

    let mut by_name: HashMap<&str, &Compensation> = HashMap::new();
    for comp in compensation.records.iter().filter(|c| !c.name.is_empty()) {
        by_name.entry(comp.name.as_str()).or_insert(comp);
    }

    let mut unmatched = 0usize;
    for employee in employees.iter_mut() {
        match by_name.get(employee.name.as_str()) {
            Some(comp) if !employee.name.is_empty() => employee.apply_compensation(comp),
            _ => unmatched += 1,
        }
    }
    if unmatched > 0 {
        log_warning(format!("{} person(s) without a salary row", unmatched));
    }

    MergeOutcome { value: employees, joined: true }
}

/// Total training cost per person.
pub fn aggregate_training(trainings: &[TrainingRecord]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for record in trainings.iter().filter(|t| !t.name.is_empty()) {
        *totals.entry(record.name.clone()).or_insert(0.0) += record.cost;
    }
    totals
}

/// Left join of the per-person training total onto `employees`; absent
/// totals are zero. Returns whether the join ran.
pub fn attach_training(employees: &mut [Employee], trainings: &SheetRecords<TrainingRecord>) -> bool {
    if !trainings.has_column(col::NAME) || !trainings.has_column(col::TRAINING_COST) {
        if !trainings.columns.is_empty() {
            log_warning(format!(
                "'{}' lacks '{}' or '{}': training cost left at 0",
                trainings.sheet,
                col::NAME,
                col::TRAINING_COST
            ));
        }
        employees.iter_mut().for_each(|e| e.training_cost = 0.0);
        return false;
    }

    let totals = aggregate_training(&trainings.records);
    for employee in employees.iter_mut() {
        employee.training_cost = totals.get(&employee.name).copied().unwrap_or(0.0);
    }
    true
}

/// Training events enriched with the trainee's department and category.
///
/// Not aggregated: one output row per training row. Empty when the training
/// sheet cannot be keyed.
pub fn training_detail(
    trainings: &SheetRecords<TrainingRecord>,
    people: &SheetRecords<Person>,
) -> Vec<TrainingDetail> {
    if !trainings.has_column(col::NAME) || !trainings.has_column(col::TRAINING_COST) {
        return Vec::new();
    }

    let mut lookup: HashMap<&str, (&str, &str)> = HashMap::new();
    if people.has_column(col::NAME) {
        for p in people.records.iter().filter(|p| !p.name.is_empty()) {
            lookup
                .entry(p.name.as_str())
                .or_insert((p.department.as_str(), p.category.as_str()));
        }
    }

    trainings
        .records
        .iter()
        .map(|t| {
            let (department, category) = lookup
                .get(t.name.as_str())
                .copied()
                .unwrap_or((UNDEFINED, UNDEFINED));
            TrainingDetail {
                name: t.name.clone(),
                training_type: t.training_type.clone(),
                cost: t.cost,
                department: department.to_string(),
                category: category.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, RawTable};

    fn people(rows: &[(&str, &str)]) -> SheetRecords<Person> {
        let table = RawTable::new(
            "Données Sociales",
            vec!["Nom".into(), "Service".into()],
            rows.iter().map(|(n, s)| vec![Cell::from(*n), Cell::from(*s)]).collect(),
        );
        SheetRecords::from_table(&table)
    }

    fn salaries(headers: &[&str], rows: Vec<Vec<Cell>>) -> SheetRecords<Compensation> {
        let table = RawTable::new("Salaires", headers.iter().map(|h| h.to_string()).collect(), rows);
        SheetRecords::from_table(&table)
    }

    fn trainings(rows: &[(&str, &str, &str)]) -> SheetRecords<TrainingRecord> {
        let table = RawTable::new(
            "Formation",
            vec!["Nom".into(), "Type Formation".into(), "Coût Formation (€)".into()],
            rows.iter()
                .map(|(n, t, c)| vec![Cell::from(*n), Cell::from(*t), Cell::from(*c)])
                .collect(),
        );
        SheetRecords::from_table(&table)
    }

    #[test]
    fn test_left_join_keeps_everyone_once() {
        let p = people(&[("A", "RH"), ("B", "IT"), ("A", "Compta")]);
        let s = salaries(
            &["Nom", "Salaire (€)"],
            vec![
                vec![Cell::text("A"), Cell::text("2 000 €")],
                vec![Cell::text("A"), Cell::text("9 999 €")],
                vec![Cell::text("Z"), Cell::text("1 000 €")],
            ],
        );

        let out = merge_compensation(p, &s);
        assert!(out.joined);
        let names: Vec<_> = out.value.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(out.value[0].salary, 2000.0);
        assert_eq!(out.value[0].department, "RH");
    }

    #[test]
    fn test_missing_salary_row_defaults_to_zero() {
        let p = people(&[("B", "IT")]);
        let s = salaries(&["Nom", "Salaire (€)"], vec![vec![Cell::text("A"), Cell::Number(1.0)]]);

        let out = merge_compensation(p, &s);
        assert_eq!(out.value.len(), 1);
        assert_eq!(out.value[0].name, "B");
        assert_eq!(out.value[0].salary, 0.0);
        assert_eq!(out.value[0].minimum_wage, "Non");
    }

    #[test]
    fn test_missing_key_column_falls_back_unjoined() {
        let p = people(&[("A", "RH")]);
        let s = salaries(&["Employé", "Salaire (€)"], vec![vec![Cell::text("A"), Cell::Number(3000.0)]]);

        let out = merge_compensation(p, &s);
        assert!(!out.joined);
        assert_eq!(out.value.len(), 1);
        assert_eq!(out.value[0].salary, 0.0);
    }

    #[test]
    fn test_training_sum_per_person() {
        let t = trainings(&[("C", "Sécurité", "500€"), ("C", "Excel", "1 200,50€"), ("D", "Excel", "oops")]);
        let totals = aggregate_training(&t.records);
        assert_eq!(totals["C"], 1700.5);
        assert_eq!(totals["D"], 0.0);
    }

    #[test]
    fn test_attach_training_fills_zero() {
        let mut employees = merge_compensation(
            people(&[("C", "RH"), ("E", "IT")]),
            &salaries(&["Nom"], vec![]),
        )
        .value;
        let t = trainings(&[("C", "Excel", "100")]);
        assert!(attach_training(&mut employees, &t));
        assert_eq!(employees[0].training_cost, 100.0);
        assert_eq!(employees[1].training_cost, 0.0);
    }

    #[test]
    fn test_attach_training_without_cost_column() {
        let mut employees = merge_compensation(people(&[("C", "RH")]), &salaries(&["Nom"], vec![])).value;
        let table = RawTable::new("Formation", vec!["Nom".into()], vec![vec![Cell::text("C")]]);
        let t = SheetRecords::<TrainingRecord>::from_table(&table);
        assert!(!attach_training(&mut employees, &t));
        assert_eq!(employees[0].training_cost, 0.0);
        assert!(training_detail(&t, &people(&[("C", "RH")])).is_empty());
    }

    #[test]
    fn test_detail_keeps_each_event() {
        let t = trainings(&[("C", "Sécurité", "500"), ("C", "Excel", "200"), ("X", "Excel", "50")]);
        let detail = training_detail(&t, &people(&[("C", "RH")]));
        assert_eq!(detail.len(), 3);
        assert_eq!(detail[0].department, "RH");
        assert_eq!(detail[1].department, "RH");
        assert_eq!(detail[2].department, UNDEFINED);
    }
}
