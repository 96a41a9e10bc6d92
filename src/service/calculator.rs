use bigdecimal::{BigDecimal, Zero};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use crate::format::{format_decimal_br, mask_cents_input, parse_localized};
use crate::models::{
    CalculationMode, Category, CopyStage, ExtractionResult, PanelView, RowEmphasis, RowView,
};
use crate::service::classifier::Classification;

/// How long the panel shows "Copied" before going back to Idle.
pub const COPIED_ACK: Duration = Duration::from_millis(2500);
/// Per-row acknowledgment window.
pub const ROW_COPIED_ACK: Duration = Duration::from_millis(2000);

pub const WITHHOLDING_REQUIRED: &str = "Informe o valor da retenção antes de copiar.";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PanelError {
    #[error("no withholding confirmation is pending")]
    NotVerifying,

    #[error("row {0} does not exist")]
    RowOutOfRange(usize),

    #[error("row {0} is not a retention row")]
    NotRetentionRow(usize),
}

/// What the caller has to do after a copy request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyDecision {
    /// Write this text to the clipboard, then call `mark_copied`.
    Copy(String),
    /// Ask the user whether a withholding amount exists.
    Verify,
    /// The user said a withholding exists but the field is still zero.
    Rejected,
}

/// Calculation panel state for one document. Timers expire against the
/// caller's `now`.
#[derive(Debug, Clone, Default)]
pub struct CalculationPanel {
    mode: CalculationMode,
    withholding_input: String,
    stage: CopyStage,
    copied_until: Option<Instant>,
    validation: Option<String>,
    focus_withholding: bool,
    row_copied_until: HashMap<usize, Instant>,
}

impl CalculationPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> CalculationMode {
        self.mode
    }

    /// Switching modes drops any pending confirmation.
    pub fn set_mode(&mut self, mode: CalculationMode) {
        self.mode = mode;
        self.reset_stage();
    }

    /// Applies the cents mask and returns the rendered text.
    pub fn set_withholding_input(&mut self, raw: &str) -> &str {
        self.withholding_input = mask_cents_input(raw);
        self.validation = None;
        self.focus_withholding = false;
        &self.withholding_input
    }

    pub fn withholding_input(&self) -> &str {
        &self.withholding_input
    }

    pub fn withholding(&self) -> BigDecimal {
        parse_localized(&self.withholding_input)
    }

    pub fn final_value(&self, classification: &Classification) -> BigDecimal {
        self.final_value_with(classification, &self.withholding())
    }

    /// Employee: `max(0, sum - withholding)`. Individual: `sum + withholding`.
    fn final_value_with(&self, classification: &Classification, withholding: &BigDecimal) -> BigDecimal {
        match self.mode {
            CalculationMode::Employee => {
                let value = &classification.sum_employee - withholding;
                if value < BigDecimal::zero() {
                    BigDecimal::zero()
                } else {
                    value
                }
            }
            CalculationMode::Individual => &classification.sum_individual + withholding,
        }
    }

    pub fn stage(&self, now: Instant) -> CopyStage {
        match (self.stage, self.copied_until) {
            (CopyStage::Copied, Some(until)) if now >= until => CopyStage::Idle,
            (stage, _) => stage,
        }
    }

    pub fn validation_message(&self) -> Option<&str> {
        self.validation.as_deref()
    }

    pub fn focus_withholding(&self) -> bool {
        self.focus_withholding
    }

    /// Entry point of the copy button.
    pub fn request_copy(&mut self, classification: &Classification, now: Instant) -> CopyDecision {
        self.expire(now);
        if self.withholding() > BigDecimal::zero() {
            return CopyDecision::Copy(format_decimal_br(&self.final_value(classification)));
        }
        self.stage = CopyStage::Verifying;
        self.copied_until = None;
        CopyDecision::Verify
    }

    /// Answer to "is there a withholding amount?" while Verifying.
    pub fn confirm_withholding(
        &mut self,
        has_withholding: bool,
        classification: &Classification,
        now: Instant,
    ) -> Result<CopyDecision, PanelError> {
        self.expire(now);
        if self.stage != CopyStage::Verifying {
            return Err(PanelError::NotVerifying);
        }

        if !has_withholding {
            let unadjusted = self.final_value_with(classification, &BigDecimal::zero());
            return Ok(CopyDecision::Copy(format_decimal_br(&unadjusted)));
        }

        if self.withholding() > BigDecimal::zero() {
            return Ok(CopyDecision::Copy(format_decimal_br(&self.final_value(classification))));
        }

        self.validation = Some(WITHHOLDING_REQUIRED.to_string());
        self.focus_withholding = true;
        Ok(CopyDecision::Rejected)
    }

    pub fn mark_copied(&mut self, now: Instant) {
        self.stage = CopyStage::Copied;
        self.copied_until = Some(now + COPIED_ACK);
        self.validation = None;
        self.focus_withholding = false;
    }

    /// Clipboard write failed: no acknowledgment, back to Idle.
    pub fn mark_copy_failed(&mut self) {
        self.reset_stage();
    }

    /// Text for a single retention row.
    pub fn request_row_copy(
        &self,
        result: &ExtractionResult,
        classification: &Classification,
        index: usize,
    ) -> Result<String, PanelError> {
        let item = result
            .items
            .get(index)
            .ok_or(PanelError::RowOutOfRange(index))?;
        if classification.category_of(index) != Some(Category::Retention) {
            return Err(PanelError::NotRetentionRow(index));
        }
        Ok(format_decimal_br(&item.total))
    }

    pub fn mark_row_copied(&mut self, index: usize, now: Instant) {
        self.row_copied_until.retain(|_, until| *until > now);
        self.row_copied_until.insert(index, now + ROW_COPIED_ACK);
    }

    pub fn row_copied(&self, index: usize, now: Instant) -> bool {
        self.row_copied_until
            .get(&index)
            .map(|until| now < *until)
            .unwrap_or(false)
    }

    /// Primary for the active mode, Retention always, Muted for the other mode.
    pub fn emphasis(&self, category: Category) -> RowEmphasis {
        if category == Category::Retention {
            RowEmphasis::Retention
        } else if category == self.mode.primary_category() {
            RowEmphasis::Primary
        } else {
            RowEmphasis::Muted
        }
    }

    pub fn view(
        &self,
        document_id: Uuid,
        result: &ExtractionResult,
        classification: &Classification,
        now: Instant,
    ) -> PanelView {
        let rows = result
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let category = classification.category_of(index).unwrap_or(Category::Employee);
                RowView {
                    index,
                    code: item.code.clone(),
                    description: item.description.clone(),
                    total: item.total.clone(),
                    category,
                    emphasis: self.emphasis(category),
                    copyable: category == Category::Retention,
                    copied: self.row_copied(index, now),
                }
            })
            .collect();

        let final_value = self.final_value(classification);
        PanelView {
            document_id,
            mode: self.mode,
            withholding_input: self.withholding_input.clone(),
            withholding: self.withholding(),
            sum_employee: classification.sum_employee.clone(),
            sum_individual: classification.sum_individual.clone(),
            final_value_display: format_decimal_br(&final_value),
            final_value,
            stage: self.stage(now),
            validation_message: self.validation.clone(),
            focus_withholding: self.focus_withholding,
            rows,
        }
    }

    fn expire(&mut self, now: Instant) {
        if self.stage(now) != self.stage {
            self.reset_stage();
        }
    }

    fn reset_stage(&mut self) {
        self.stage = CopyStage::Idle;
        self.copied_until = None;
        self.validation = None;
        self.focus_withholding = false;
    }
}
