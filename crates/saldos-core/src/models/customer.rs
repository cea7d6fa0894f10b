//! Customer master records from a legacy customer listing.

use serde::{Deserialize, Serialize};

/// A customer row from the legacy master file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// One-based row number in the sheet.
    pub row_number: usize,

    /// Legacy customer number.
    pub code: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Tax identifier reduced to its digits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,

    /// Legacy tax category code (RI, M, CF...), passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_category: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Name fragments that mark a legal entity rather than a person.
const COMPANY_INDICATORS: &[&str] = &[
    "S.A.", "SA ", "SRL", "S.R.L.", "SAS", "S.A.S.", "SOCIEDAD", "EMPRESA", "CIA", "COMPAÑIA",
    "LTDA", "S.C.", "S.H.", "COOPERATIVA", "FUNDACION",
];

impl CustomerRecord {
    /// Whether the name looks like a company ("CLIENTE EJEMPLO SA").
    pub fn is_company(&self) -> bool {
        is_company_name(&self.name)
    }
}

/// Company heuristic over a display name.
pub fn is_company_name(name: &str) -> bool {
    let upper = name.trim().to_uppercase();
    if upper.is_empty() {
        return false;
    }
    upper.ends_with(" SA")
        || COMPANY_INDICATORS
            .iter()
            .any(|indicator| upper.contains(indicator))
}

/// A customer row that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedCustomer {
    pub row_number: usize,
    pub code: String,
    pub reason: String,
}

/// Outcome of a customer master extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerExtraction {
    /// One-based row holding the column captions.
    pub header_row: usize,
    pub customers: Vec<CustomerRecord>,
    pub rejected: Vec<RejectedCustomer>,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_company_name() {
        assert!(is_company_name("CLIENTE EJEMPLO SA"));
        assert!(is_company_name("Portal del Iguazu S.A."));
        assert!(is_company_name("OTRO CLIENTE SRL"));
        assert!(is_company_name("Cooperativa Agricola Obera"));
        assert!(!is_company_name("JUAN PEREZ"));
        assert!(!is_company_name("   "));
    }
}
