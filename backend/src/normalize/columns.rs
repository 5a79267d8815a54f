//! Header normalization.
//!
//! Sheet headers are typed by hand and drift between workbook revisions
//! (`"Primes(€)"` vs `"Primes (€)"`, `"Cout"` vs `"Coût"`). Every header is
//! trimmed, then rewritten to its canonical name when it matches a known
//! variant. Matching goes through [`fold_key`], so case and spacing
//! differences of a canonical name converge without an explicit entry.
//! Unknown headers pass through trimmed.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::models::table::{fold_key, RawTable};

/// Canonical column names the pipeline is written against.
pub mod canonical {
    // Données sociales
    pub const NAME: &str = "Nom";
    pub const BIRTH_DATE: &str = "Date Naissance";
    pub const HIRE_DATE: &str = "Date Entrée";
    pub const POSITION: &str = "Poste";
    pub const CATEGORY: &str = "CSP";
    pub const DEPARTMENT: &str = "Service";
    pub const GENDER: &str = "Sexe";
    pub const EMAIL: &str = "Email";

    // Salaires
    pub const SALARY: &str = "Salaire (€)";
    pub const BONUS: &str = "Primes (€)";
    pub const FUTURE_BONUS: &str = "Primes Futures (€)";
    pub const MINIMUM_WAGE: &str = "Au SMIC";
    pub const RATING: &str = "Évaluation (1-5)";

    // Formation
    pub const TRAINING_COST: &str = "Coût Formation (€)";
    pub const TRAINING_TYPE: &str = "Type Formation";

    // Recrutement
    pub const OPENED: &str = "Date Ouverture Poste";
    pub const CLOSED: &str = "Date Clôture Poste";
    pub const RECRUITMENT_COST: &str = "Coût Recrutement (€)";
    pub const CANDIDATES: &str = "Nb Candidats";
    pub const CHANNEL: &str = "Canal";

    // Finances
    pub const LABEL: &str = "Libellé";
    pub const FLOW: &str = "Flux";

    // CRM
    pub const OPPORTUNITY: &str = "Opportunité";
    pub const CLIENT: &str = "Client";
    pub const ESTIMATED_AMOUNT: &str = "Montant Estimé (€)";
    pub const PROBABILITY: &str = "Probabilité (%)";
    pub const STAGE: &str = "Étape";

    pub const ALL: &[&str] = &[
        NAME, BIRTH_DATE, HIRE_DATE, POSITION, CATEGORY, DEPARTMENT, GENDER, EMAIL,
        SALARY, BONUS, FUTURE_BONUS, MINIMUM_WAGE, RATING,
        TRAINING_COST, TRAINING_TYPE,
        OPENED, CLOSED, RECRUITMENT_COST, CANDIDATES, CHANNEL,
        LABEL, FLOW,
        OPPORTUNITY, CLIENT, ESTIMATED_AMOUNT, PROBABILITY, STAGE,
    ];
}

use canonical as c;

/// Observed header spellings and the canonical name they stand for.
pub const ALIASES: &[(&str, &str)] = &[
    ("Nom Prénom", c::NAME),
    ("Salarié", c::NAME),
    ("Date de Naissance", c::BIRTH_DATE),
    ("Date Entree", c::HIRE_DATE),
    ("Date d'Entrée", c::HIRE_DATE),
    ("Date d'embauche", c::HIRE_DATE),
    ("Catégorie", c::CATEGORY),
    ("Département", c::DEPARTMENT),
    ("Genre", c::GENDER),
    ("Salaire", c::SALARY),
    ("Salaire Base (€)", c::SALARY),
    ("Primes", c::BONUS),
    ("Primes Futures", c::FUTURE_BONUS),
    ("SMIC", c::MINIMUM_WAGE),
    ("Evaluation (1-5)", c::RATING),
    ("Évaluation", c::RATING),
    ("Cout Formation (€)", c::TRAINING_COST),
    ("Cout Formation", c::TRAINING_COST),
    ("Coût Formation", c::TRAINING_COST),
    ("Type de Formation", c::TRAINING_TYPE),
    ("Date Cloture Poste", c::CLOSED),
    ("Cout Recrutement (€)", c::RECRUITMENT_COST),
    ("Coût Recrutement", c::RECRUITMENT_COST),
    ("Nombre Candidats", c::CANDIDATES),
    ("Canal Sourcing", c::CHANNEL),
    ("Opportunite", c::OPPORTUNITY),
    ("Montant Estime (€)", c::ESTIMATED_AMOUNT),
    ("Montant (€)", c::ESTIMATED_AMOUNT),
    ("Probabilite (%)", c::PROBABILITY),
    ("Probabilité", c::PROBABILITY),
    ("Etape", c::STAGE),
];

/// Folded key -> canonical name. Canonical names map to themselves.
static REWRITES: Lazy<HashMap<String, &'static str>> = Lazy::new(|| {
    let mut map: HashMap<String, &'static str> = c::ALL.iter().map(|name| (fold_key(name), *name)).collect();
    for (variant, target) in ALIASES {
        map.entry(fold_key(variant)).or_insert(*target);
    }
    map
});

/// Canonical form of a single header.
pub fn canonical_header(raw: &str) -> String {
    let trimmed = raw.trim_matches(|ch: char| ch.is_whitespace());
    match REWRITES.get(&fold_key(trimmed)) {
        Some(name) => (*name).to_string(),
        None => trimmed.to_string(),
    }
}

/// Rewrite every header of `table` in place.
pub fn normalize_headers(table: &mut RawTable) {
    for header in table.headers.iter_mut() {
        let normalized = canonical_header(header);
        if normalized != *header {
            tracing::debug!(sheet = %table.name, from = %header, to = %normalized, "header rewritten");
            *header = normalized;
        }
    }
}
