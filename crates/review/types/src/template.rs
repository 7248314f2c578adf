//! Workflow templates: the ordered level definitions a workflow type expands to

use crate::{ApproverType, ChecklistItemDefinition};
use serde::{Deserialize, Serialize};

/// How a level settles when one required approver rejects
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RejectionPolicy {
    /// The first required rejection settles the level as rejected
    #[default]
    FailFast,
    /// Wait for every required approver before settling
    AwaitAll,
}

/// Which level a resubmitted workflow re-enters at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReentryPolicy {
    /// Restart review from level 1
    #[default]
    FirstLevel,
    /// Resume at the level that rejected; earlier approvals stand
    RejectedLevel,
}

/// One approver requirement on a level definition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverRequirement {
    pub approver: ApproverType,
    #[serde(default = "default_true")]
    pub required: bool,
}

impl ApproverRequirement {
    pub fn required(approver: ApproverType) -> Self {
        Self {
            approver,
            required: true,
        }
    }

    pub fn optional(approver: ApproverType) -> Self {
        Self {
            approver,
            required: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Template for a single approval level
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub approvers: Vec<ApproverRequirement>,
    /// Hours after activation before the level counts as overdue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_offset_hours: Option<u32>,
    #[serde(default)]
    pub rejection_policy: RejectionPolicy,
}

impl LevelDefinition {
    pub fn new(name: impl Into<String>, approvers: Vec<ApproverRequirement>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            approvers,
            deadline_offset_hours: None,
            rejection_policy: RejectionPolicy::FailFast,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_deadline_hours(mut self, hours: u32) -> Self {
        self.deadline_offset_hours = Some(hours);
        self
    }

    pub fn with_rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.rejection_policy = policy;
        self
    }
}

/// A named workflow type
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub workflow_type: String,
    #[serde(default)]
    pub description: String,
    pub levels: Vec<LevelDefinition>,
    #[serde(default)]
    pub reentry: ReentryPolicy,
    /// Items attached as a checklist when the workflow is created
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checklist: Vec<ChecklistItemDefinition>,
}

impl WorkflowTemplate {
    pub fn new(workflow_type: impl Into<String>, levels: Vec<LevelDefinition>) -> Self {
        Self {
            workflow_type: workflow_type.into(),
            description: String::new(),
            levels,
            reentry: ReentryPolicy::FirstLevel,
            checklist: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_reentry(mut self, reentry: ReentryPolicy) -> Self {
        self.reentry = reentry;
        self
    }

    pub fn with_checklist(mut self, items: Vec<ChecklistItemDefinition>) -> Self {
        self.checklist = items;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_defaults_from_json() {
        let json = r#"{
            "name": "Client Review",
            "approvers": [
                { "approver": { "kind": "role", "role": "account-manager" } },
                { "approver": { "kind": "external", "email": "c@client.io", "name": "C" }, "required": false }
            ]
        }"#;
        let level: LevelDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(level.rejection_policy, RejectionPolicy::FailFast);
        assert!(level.approvers[0].required);
        assert!(!level.approvers[1].required);
        assert!(level.deadline_offset_hours.is_none());
    }

    #[test]
    fn test_template_builder() {
        let template = WorkflowTemplate::new(
            "express",
            vec![LevelDefinition::new(
                "Lead",
                vec![ApproverRequirement::required(ApproverType::role("lead"))],
            )
            .with_deadline_hours(8)],
        )
        .with_reentry(ReentryPolicy::RejectedLevel);

        assert_eq!(template.levels.len(), 1);
        assert_eq!(template.levels[0].deadline_offset_hours, Some(8));
        assert_eq!(template.reentry, ReentryPolicy::RejectedLevel);
    }
}
