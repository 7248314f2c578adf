//! Engine configuration: workflow templates, role membership and policies

use review_types::{
    ApproverIdentity, ApproverRequirement, ApproverType, ChecklistItemDefinition,
    LevelDefinition, ReentryPolicy, RejectionPolicy, WorkflowTemplate,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Whether a resubmission must carry new content
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResubmissionPolicy {
    /// The same version may be resubmitted as-is
    #[default]
    AllowSameVersion,
    /// A newer version of the same deliverable must be supplied
    RequireNewVersion,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub templates: Vec<WorkflowTemplate>,
    /// Role name to the identities holding it
    pub roles: BTreeMap<String, Vec<ApproverIdentity>>,
    pub resubmission: ResubmissionPolicy,
    pub event_channel_capacity: usize,
    /// How often a decision or comment write is retried after losing a race
    pub max_reevaluations: u32,
    /// Actor name recorded on audit entries the engine writes itself
    pub system_actor: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            templates: builtin_templates(),
            roles: BTreeMap::new(),
            resubmission: ResubmissionPolicy::AllowSameVersion,
            event_channel_capacity: 1024,
            max_reevaluations: 3,
            system_actor: "review-engine".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_role(mut self, role: impl Into<String>, members: Vec<ApproverIdentity>) -> Self {
        self.roles.insert(role.into(), members);
        self
    }

    pub fn with_template(mut self, template: WorkflowTemplate) -> Self {
        self.templates
            .retain(|t| t.workflow_type != template.workflow_type);
        self.templates.push(template);
        self
    }

    pub fn with_resubmission(mut self, policy: ResubmissionPolicy) -> Self {
        self.resubmission = policy;
        self
    }
}

/// Templates available without any configuration.
///
/// - `standard`: internal review, then client review
/// - `express`: a single lead sign-off
/// - `regulated`: peer, compliance and executive levels, resuming at the
///   rejecting level after a revision
pub fn builtin_templates() -> Vec<WorkflowTemplate> {
    vec![
        WorkflowTemplate::new(
            "standard",
            vec![
                LevelDefinition::new(
                    "Internal Review",
                    vec![ApproverRequirement::required(ApproverType::role("team-lead"))],
                )
                .with_description("Team lead checks the deliverable before it leaves the studio")
                .with_deadline_hours(48),
                LevelDefinition::new(
                    "Client Review",
                    vec![ApproverRequirement::required(ApproverType::role(
                        "account-manager",
                    ))],
                )
                .with_description("Account manager signs off on behalf of the client")
                .with_deadline_hours(72),
            ],
        )
        .with_description("Two-stage internal and client review")
        .with_checklist(vec![
            ChecklistItemDefinition::required("brand", "Brand guidelines followed"),
            ChecklistItemDefinition::required("legal", "Asset licences cleared"),
            ChecklistItemDefinition::optional("quality", "Copy proofread"),
        ]),
        WorkflowTemplate::new(
            "express",
            vec![LevelDefinition::new(
                "Lead Sign-off",
                vec![ApproverRequirement::required(ApproverType::role("team-lead"))],
            )
            .with_deadline_hours(24)],
        )
        .with_description("Single sign-off for low-risk changes"),
        WorkflowTemplate::new(
            "regulated",
            vec![
                LevelDefinition::new(
                    "Peer Review",
                    vec![ApproverRequirement::required(ApproverType::role("reviewer"))],
                )
                .with_rejection_policy(RejectionPolicy::AwaitAll)
                .with_deadline_hours(72),
                LevelDefinition::new(
                    "Compliance",
                    vec![ApproverRequirement::required(ApproverType::role(
                        "compliance-officer",
                    ))],
                )
                .with_deadline_hours(120),
                LevelDefinition::new(
                    "Executive Sign-off",
                    vec![ApproverRequirement::required(ApproverType::role("executive"))],
                ),
            ],
        )
        .with_description("Peer, compliance and executive approval")
        .with_reentry(ReentryPolicy::RejectedLevel)
        .with_checklist(vec![
            ChecklistItemDefinition::required("compliance", "Regulatory disclosures present"),
            ChecklistItemDefinition::required("legal", "Claims substantiated"),
            ChecklistItemDefinition::required("quality", "Accessibility checked"),
        ]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_carries_builtin_templates() {
        let config = EngineConfig::default();
        let types: Vec<_> = config
            .templates
            .iter()
            .map(|t| t.workflow_type.as_str())
            .collect();
        assert_eq!(types, vec!["standard", "express", "regulated"]);
        assert_eq!(config.max_reevaluations, 3);
        assert_eq!(config.resubmission, ResubmissionPolicy::AllowSameVersion);
    }

    #[test]
    fn test_with_template_replaces_same_type() {
        let custom = WorkflowTemplate::new(
            "express",
            vec![LevelDefinition::new(
                "Anyone",
                vec![ApproverRequirement::required(ApproverType::user("u1", "U"))],
            )],
        );
        let config = EngineConfig::default().with_template(custom);
        let express: Vec<_> = config
            .templates
            .iter()
            .filter(|t| t.workflow_type == "express")
            .collect();
        assert_eq!(express.len(), 1);
        assert_eq!(express[0].levels[0].name, "Anyone");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "resubmission": "require_new_version" }"#).unwrap();
        assert_eq!(config.resubmission, ResubmissionPolicy::RequireNewVersion);
        assert_eq!(config.templates.len(), 3);
        assert_eq!(config.event_channel_capacity, 1024);
    }
}
