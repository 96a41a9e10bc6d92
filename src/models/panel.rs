use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bucket a line item falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Retention,
    Individual,
    Employee,
}

/// Which category sum the panel adjusts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMode {
    #[default]
    Employee,
    Individual,
}

impl CalculationMode {
    /// Category whose rows feed the final value in this mode.
    pub fn primary_category(self) -> Category {
        match self {
            CalculationMode::Employee => Category::Employee,
            CalculationMode::Individual => Category::Individual,
        }
    }
}

/// Panel-level copy flow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyStage {
    #[default]
    Idle,
    Verifying,
    Copied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowEmphasis {
    Primary,
    Retention,
    Muted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowView {
    pub index: usize,
    pub code: String,
    pub description: Option<String>,
    pub total: BigDecimal,
    pub category: Category,
    pub emphasis: RowEmphasis,
    pub copyable: bool,
    pub copied: bool,
}

/// Point-in-time rendering of a calculation panel
#[derive(Debug, Clone, Serialize)]
pub struct PanelView {
    pub document_id: Uuid,
    pub mode: CalculationMode,
    pub withholding_input: String,
    pub withholding: BigDecimal,
    pub sum_employee: BigDecimal,
    pub sum_individual: BigDecimal,
    pub final_value: BigDecimal,
    pub final_value_display: String,
    pub stage: CopyStage,
    pub validation_message: Option<String>,
    pub focus_withholding: bool,
    pub rows: Vec<RowView>,
}
