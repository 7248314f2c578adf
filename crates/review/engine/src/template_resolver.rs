//! Level template resolver: workflow type to ordered level definitions
//!
//! Templates are validated once when the resolver is built. Lookups are
//! pure and never mutate.

use review_types::{LevelDefinition, ReviewError, ReviewResult, WorkflowTemplate};
use std::collections::HashMap;

/// Registry of workflow templates keyed by workflow type
#[derive(Clone, Debug, Default)]
pub struct LevelTemplateResolver {
    templates: HashMap<String, WorkflowTemplate>,
}

impl LevelTemplateResolver {
    pub fn new(templates: impl IntoIterator<Item = WorkflowTemplate>) -> ReviewResult<Self> {
        let mut resolver = Self::default();
        for template in templates {
            resolver.register(template)?;
        }
        Ok(resolver)
    }

    /// Validate and add a template. Registering a type twice is an error.
    pub fn register(&mut self, template: WorkflowTemplate) -> ReviewResult<()> {
        validate(&template)?;
        if self.templates.contains_key(&template.workflow_type) {
            return Err(ReviewError::InvalidTemplate(format!(
                "workflow type '{}' registered twice",
                template.workflow_type
            )));
        }

        tracing::debug!(
            workflow_type = %template.workflow_type,
            levels = template.levels.len(),
            "Workflow template registered"
        );
        self.templates
            .insert(template.workflow_type.clone(), template);
        Ok(())
    }

    /// Ordered level definitions for a workflow type
    pub fn resolve(&self, workflow_type: &str) -> ReviewResult<&[LevelDefinition]> {
        self.template(workflow_type).map(|t| t.levels.as_slice())
    }

    pub fn template(&self, workflow_type: &str) -> ReviewResult<&WorkflowTemplate> {
        self.templates
            .get(workflow_type)
            .ok_or_else(|| ReviewError::UnknownWorkflowType(workflow_type.to_string()))
    }

    /// Registered workflow types, sorted
    pub fn workflow_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn count(&self) -> usize {
        self.templates.len()
    }
}

fn validate(template: &WorkflowTemplate) -> ReviewResult<()> {
    let invalid = |reason: String| {
        Err(ReviewError::InvalidTemplate(format!(
            "{}: {reason}",
            template.workflow_type
        )))
    };

    if template.workflow_type.trim().is_empty() {
        return invalid("workflow type is empty".to_string());
    }
    if template.levels.is_empty() {
        return invalid("no levels defined".to_string());
    }
    for (index, level) in template.levels.iter().enumerate() {
        let number = index + 1;
        if level.name.trim().is_empty() {
            return invalid(format!("level {number} has no name"));
        }
        if !level.approvers.iter().any(|a| a.required) {
            return invalid(format!(
                "level {number} '{}' has no required approver",
                level.name
            ));
        }
    }
    if template
        .checklist
        .iter()
        .any(|item| item.title.trim().is_empty())
    {
        return invalid("checklist item without a title".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_templates;
    use review_types::{ApproverRequirement, ApproverType};

    #[test]
    fn test_resolve_builtin_order() {
        let resolver = LevelTemplateResolver::new(builtin_templates()).unwrap();
        let levels = resolver.resolve("standard").unwrap();
        let names: Vec<_> = levels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Internal Review", "Client Review"]);
        assert_eq!(resolver.workflow_types(), vec!["express", "regulated", "standard"]);
    }

    #[test]
    fn test_unknown_type() {
        let resolver = LevelTemplateResolver::new(builtin_templates()).unwrap();
        let err = resolver.resolve("video").unwrap_err();
        assert_eq!(err, ReviewError::UnknownWorkflowType("video".into()));
    }

    #[test]
    fn test_rejects_level_without_required_approver() {
        let template = WorkflowTemplate::new(
            "loose",
            vec![LevelDefinition::new(
                "Optional",
                vec![ApproverRequirement::optional(ApproverType::role("anyone"))],
            )],
        );
        let err = LevelTemplateResolver::new(vec![template]).unwrap_err();
        assert!(matches!(err, ReviewError::InvalidTemplate(ref m) if m.contains("no required approver")));
    }

    #[test]
    fn test_rejects_duplicate_and_empty() {
        let mut resolver = LevelTemplateResolver::new(builtin_templates()).unwrap();
        let dup = builtin_templates().remove(0);
        assert!(resolver.register(dup).is_err());

        let empty = WorkflowTemplate::new("empty", Vec::new());
        assert!(matches!(
            resolver.register(empty),
            Err(ReviewError::InvalidTemplate(_))
        ));
        assert_eq!(resolver.count(), 3);
    }
}
