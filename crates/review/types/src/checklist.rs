//! Quality checklist attached to a workflow

use crate::{ChecklistId, ChecklistItemId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate checklist state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistStatus {
    #[default]
    Pending,
    Passed,
    Failed,
}

impl ChecklistStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }
}

/// Result of checking one item
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistItemStatus {
    #[default]
    Pending,
    Passed,
    Failed,
}

/// Declaration of an item, used by templates and `attach_checklist`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItemDefinition {
    pub category: String,
    pub title: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl ChecklistItemDefinition {
    pub fn required(category: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            title: title.into(),
            required: true,
        }
    }

    pub fn optional(category: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(category, title)
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: ChecklistItemId,
    pub category: String,
    pub title: String,
    pub required: bool,
    pub status: ChecklistItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
}

impl From<ChecklistItemDefinition> for ChecklistItem {
    fn from(def: ChecklistItemDefinition) -> Self {
        Self {
            id: ChecklistItemId::generate(),
            category: def.category,
            title: def.title,
            required: def.required,
            status: ChecklistItemStatus::Pending,
            checked_by: None,
            checked_at: None,
        }
    }
}

/// Required items that keep a checklist from passing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistShortfall {
    pub checklist_id: ChecklistId,
    /// Titles of required items still pending
    pub pending: Vec<String>,
    /// Titles of required items that failed
    pub failed: Vec<String>,
}

impl std::fmt::Display for ChecklistShortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} required item(s) pending, {} failed",
            self.pending.len(),
            self.failed.len()
        )
    }
}

/// A workflow's quality gate.
///
/// `status` and `overall_score` are derived from the items and only change
/// through [`Checklist::recompute`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checklist {
    pub id: ChecklistId,
    pub status: ChecklistStatus,
    pub overall_score: f64,
    pub items: Vec<ChecklistItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluated_at: Option<DateTime<Utc>>,
}

impl Checklist {
    pub fn from_definitions(definitions: impl IntoIterator<Item = ChecklistItemDefinition>) -> Self {
        let mut checklist = Self {
            id: ChecklistId::generate(),
            status: ChecklistStatus::Pending,
            overall_score: 0.0,
            items: definitions.into_iter().map(ChecklistItem::from).collect(),
            evaluated_at: None,
        };
        let (status, score) = checklist.aggregate();
        checklist.status = status;
        checklist.overall_score = score;
        checklist
    }

    pub fn item(&self, id: &ChecklistItemId) -> Option<&ChecklistItem> {
        self.items.iter().find(|i| &i.id == id)
    }

    pub fn item_mut(&mut self, id: &ChecklistItemId) -> Option<&mut ChecklistItem> {
        self.items.iter_mut().find(|i| &i.id == id)
    }

    pub fn is_passed(&self) -> bool {
        self.status == ChecklistStatus::Passed
    }

    /// Aggregate status and score implied by the current items.
    ///
    /// Score is the fraction of all items passed, 1.0 when there are none.
    /// Status is passed when every required item passed, failed when any
    /// required item failed, otherwise pending.
    pub fn aggregate(&self) -> (ChecklistStatus, f64) {
        let score = if self.items.is_empty() {
            1.0
        } else {
            let passed = self
                .items
                .iter()
                .filter(|i| i.status == ChecklistItemStatus::Passed)
                .count();
            passed as f64 / self.items.len() as f64
        };

        let mut required = self.items.iter().filter(|i| i.required);
        let status = if required
            .clone()
            .any(|i| i.status == ChecklistItemStatus::Failed)
        {
            ChecklistStatus::Failed
        } else if required.all(|i| i.status == ChecklistItemStatus::Passed) {
            ChecklistStatus::Passed
        } else {
            ChecklistStatus::Pending
        };
        (status, score)
    }

    /// Store the derived status and score. Returns the new status.
    pub fn recompute(&mut self, now: DateTime<Utc>) -> ChecklistStatus {
        let (status, score) = self.aggregate();
        self.status = status;
        self.overall_score = score;
        self.evaluated_at = Some(now);
        status
    }

    /// Required items blocking the checklist, or `None` when it passes
    pub fn shortfall(&self) -> Option<ChecklistShortfall> {
        let mut pending = Vec::new();
        let mut failed = Vec::new();
        for item in self.items.iter().filter(|i| i.required) {
            match item.status {
                ChecklistItemStatus::Pending => pending.push(item.title.clone()),
                ChecklistItemStatus::Failed => failed.push(item.title.clone()),
                ChecklistItemStatus::Passed => {}
            }
        }
        if pending.is_empty() && failed.is_empty() {
            return None;
        }
        Some(ChecklistShortfall {
            checklist_id: self.id.clone(),
            pending,
            failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checklist() -> Checklist {
        Checklist::from_definitions(vec![
            ChecklistItemDefinition::required("brand", "Logo usage"),
            ChecklistItemDefinition::required("legal", "Licences cleared"),
            ChecklistItemDefinition::optional("copy", "Spelling"),
        ])
    }

    fn set(checklist: &mut Checklist, index: usize, status: ChecklistItemStatus) {
        checklist.items[index].status = status;
        checklist.recompute(Utc::now());
    }

    #[test]
    fn test_empty_checklist_passes_with_full_score() {
        let checklist = Checklist::from_definitions(Vec::new());
        assert_eq!(checklist.status, ChecklistStatus::Passed);
        assert_eq!(checklist.overall_score, 1.0);
        assert!(checklist.shortfall().is_none());
    }

    #[test]
    fn test_optional_items_do_not_gate() {
        let mut checklist = checklist();
        assert_eq!(checklist.status, ChecklistStatus::Pending);

        set(&mut checklist, 0, ChecklistItemStatus::Passed);
        set(&mut checklist, 1, ChecklistItemStatus::Passed);
        assert_eq!(checklist.status, ChecklistStatus::Passed);
        assert!((checklist.overall_score - 2.0 / 3.0).abs() < f64::EPSILON);

        set(&mut checklist, 2, ChecklistItemStatus::Failed);
        assert_eq!(checklist.status, ChecklistStatus::Passed);
    }

    #[test]
    fn test_required_failure_fails_checklist() {
        let mut checklist = checklist();
        set(&mut checklist, 1, ChecklistItemStatus::Failed);
        assert_eq!(checklist.status, ChecklistStatus::Failed);

        let shortfall = checklist.shortfall().unwrap();
        assert_eq!(shortfall.pending, vec!["Logo usage".to_string()]);
        assert_eq!(shortfall.failed, vec!["Licences cleared".to_string()]);
        assert_eq!(shortfall.to_string(), "1 required item(s) pending, 1 failed");
    }
}
