//! Derived columns: age, tenure and salary deviation from the department mean.
//!
//! All of them are recomputed on every load against the load's reference date.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::models::Employee;

const DAYS_PER_YEAR: f64 = 365.0;

/// Whole calendar years from `birth` to `today`. Missing or future dates give 0.
pub fn age_on(birth: Option<NaiveDate>, today: NaiveDate) -> u32 {
    birth.and_then(|b| today.years_since(b)).unwrap_or(0)
}

/// Fractional years (days / 365) since `hire`. Missing or future dates give 0.
pub fn tenure_on(hire: Option<NaiveDate>, today: NaiveDate) -> f64 {
    match hire {
        Some(h) if h <= today => (today - h).num_days() as f64 / DAYS_PER_YEAR,
        _ => 0.0,
    }
}

/// Mean salary per department.
pub fn department_means(employees: &[Employee]) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for e in employees {
        let entry = sums.entry(e.department.clone()).or_insert((0.0, 0));
        entry.0 += e.salary;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(dept, (sum, count))| (dept, sum / count as f64))
        .collect()
}

/// Broadcast each department's mean back onto its members and set
/// `salary_deviation = salary - department_mean_salary`.
pub fn apply_department_deviation(employees: &mut [Employee]) {
    let means = department_means(employees);
    for e in employees.iter_mut() {
        let mean = means.get(&e.department).copied().unwrap_or(0.0);
        e.department_mean_salary = mean;
        e.salary_deviation = e.salary - mean;
    }
}

/// Fill every derived column.
pub fn derive_all(employees: &mut [Employee], today: NaiveDate) {
    for e in employees.iter_mut() {
        e.age = age_on(e.birth_date, today);
        e.tenure_years = tenure_on(e.hire_date, today);
    }
    apply_department_deviation(employees);
}
