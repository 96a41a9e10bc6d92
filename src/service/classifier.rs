use bigdecimal::{BigDecimal, Zero};
use std::collections::{BTreeSet, HashSet};

use crate::models::{Category, LineItem};

/// Revenue codes for invoice withholdings (retenções).
pub const DEFAULT_RETENTION_CODES: [&str; 3] = ["5952", "0561", "1062"];

/// Lowercased marker for individual-contributor rows ("contribuinte individual").
const INDIVIDUAL_MARKER: &str = "individ";

/// Decides which category a line item belongs to
#[derive(Debug, Clone)]
pub struct Classifier {
    retention_codes: HashSet<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_CODES)
    }
}

impl Classifier {
    /// Codes are normalized the same way item codes are, so `"05.61"` matches `"0561"`.
    pub fn new<I, S>(retention_codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            retention_codes: retention_codes
                .into_iter()
                .map(|code| normalize_code(code.as_ref()))
                .filter(|code| !code.is_empty())
                .collect(),
        }
    }

    pub fn category(&self, item: &LineItem) -> Category {
        if self.retention_codes.contains(&normalize_code(&item.code)) {
            return Category::Retention;
        }
        let is_individual = item
            .description
            .as_deref()
            .map(|d| d.to_lowercase().contains(INDIVIDUAL_MARKER))
            .unwrap_or(false);
        if is_individual {
            Category::Individual
        } else {
            Category::Employee
        }
    }

    pub fn classify(&self, items: &[LineItem]) -> Classification {
        let mut out = Classification::default();
        for (idx, item) in items.iter().enumerate() {
            match self.category(item) {
                Category::Retention => {
                    out.retention.insert(idx);
                }
                Category::Individual => {
                    out.individual.insert(idx);
                    out.sum_individual = &out.sum_individual + &item.total;
                }
                Category::Employee => {
                    out.employee.insert(idx);
                    out.sum_employee = &out.sum_employee + &item.total;
                }
            }
        }
        out
    }
}

/// Result of partitioning a document's items.
///
/// The three index sets are disjoint and together cover every item.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub sum_employee: BigDecimal,
    pub sum_individual: BigDecimal,
    pub retention: BTreeSet<usize>,
    pub individual: BTreeSet<usize>,
    pub employee: BTreeSet<usize>,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            sum_employee: BigDecimal::zero(),
            sum_individual: BigDecimal::zero(),
            retention: BTreeSet::new(),
            individual: BTreeSet::new(),
            employee: BTreeSet::new(),
        }
    }
}

impl Classification {
    pub fn category_of(&self, index: usize) -> Option<Category> {
        if self.retention.contains(&index) {
            Some(Category::Retention)
        } else if self.individual.contains(&index) {
            Some(Category::Individual)
        } else if self.employee.contains(&index) {
            Some(Category::Employee)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.retention.len() + self.individual.len() + self.employee.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps only the digits: `"0561-07"` becomes `"056107"`, `" 5952 "` becomes `"5952"`.
pub fn normalize_code(code: &str) -> String {
    code.chars().filter(|c| c.is_ascii_digit()).collect()
}
