//! Checklist gate: pass/fail evaluation of a workflow's quality checklist
//!
//! Independent of level progression. The state machine consults it only
//! when the final level is approved.

use chrono::{DateTime, Utc};
use review_types::{
    Checklist, ChecklistItemId, ChecklistItemStatus, ChecklistShortfall, ChecklistStatus,
    ReviewError, ReviewResult,
};

/// Outcome of consulting the gate
#[derive(Clone, Debug, PartialEq)]
pub enum GateVerdict {
    /// No checklist, or every required item passed
    Open,
    Blocked(ChecklistShortfall),
}

impl GateVerdict {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ChecklistGate;

impl ChecklistGate {
    pub fn new() -> Self {
        Self
    }

    /// Recompute the checklist's aggregate status and score
    pub fn evaluate(&self, checklist: &mut Checklist, now: DateTime<Utc>) -> ChecklistStatus {
        let status = checklist.recompute(now);
        tracing::debug!(
            checklist_id = %checklist.id,
            status = status.as_str(),
            score = checklist.overall_score,
            "Checklist evaluated"
        );
        status
    }

    /// Update one item and re-evaluate
    pub fn set_item_status(
        &self,
        checklist: &mut Checklist,
        item_id: &ChecklistItemId,
        status: ChecklistItemStatus,
        checked_by: &str,
        now: DateTime<Utc>,
    ) -> ReviewResult<ChecklistStatus> {
        if checked_by.trim().is_empty() {
            return Err(ReviewError::InvalidInput(
                "checklist items must name who checked them".to_string(),
            ));
        }
        let item = checklist
            .item_mut(item_id)
            .ok_or_else(|| ReviewError::ChecklistItemNotFound(item_id.clone()))?;

        item.status = status;
        match status {
            ChecklistItemStatus::Pending => {
                item.checked_by = None;
                item.checked_at = None;
            }
            ChecklistItemStatus::Passed | ChecklistItemStatus::Failed => {
                item.checked_by = Some(checked_by.to_string());
                item.checked_at = Some(now);
            }
        }
        Ok(self.evaluate(checklist, now))
    }

    /// Whether a workflow owning `checklist` may be approved
    pub fn verdict(&self, checklist: Option<&Checklist>) -> GateVerdict {
        let Some(checklist) = checklist else {
            return GateVerdict::Open;
        };
        match checklist.aggregate() {
            (ChecklistStatus::Passed, _) => GateVerdict::Open,
            _ => GateVerdict::Blocked(checklist.shortfall().unwrap_or_else(|| {
                ChecklistShortfall {
                    checklist_id: checklist.id.clone(),
                    pending: Vec::new(),
                    failed: Vec::new(),
                }
            })),
        }
    }

    /// Fail with `ChecklistIncomplete` unless the gate is open
    pub fn check(&self, checklist: Option<&Checklist>) -> ReviewResult<()> {
        match self.verdict(checklist) {
            GateVerdict::Open => Ok(()),
            GateVerdict::Blocked(shortfall) => Err(ReviewError::ChecklistIncomplete(shortfall)),
        }
    }
}
