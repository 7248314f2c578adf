//! State machine: level progression, approver aggregation and revision rounds
//!
//! Every function here is a pure transformation of an in-memory
//! [`Workflow`]. It validates the requested transition against the current
//! state, mutates the workflow, and returns the events the transition
//! produces. Persisting the result (and deciding what to do when the
//! write loses a race) is the orchestrator's job.

use crate::checklist_gate::{ChecklistGate, GateVerdict};
use crate::role_directory::RoleDirectory;
use chrono::{DateTime, Utc};
use review_types::*;
use serde::Serialize;

/// What a recorded approver decision led to
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Stored; the level is still waiting on other approvers
    Recorded { level_number: u32 },
    /// The level completed and the next one opened
    LevelAdvanced { from: u32, to: u32 },
    /// The final level completed but the checklist has not passed yet
    AwaitingChecklist { shortfall: ChecklistShortfall },
    WorkflowApproved,
    /// The level was rejected and a new revision round opened
    RevisionRequested { round: u32 },
    /// Stored, but a concurrent call had already settled the level
    Superseded {
        status: WorkflowStatus,
        current_level: u32,
    },
}

/// Aggregate state of a level's approver slots
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LevelVerdict {
    Open,
    Approved,
    Rejected,
}

/// Transition logic for review workflows
#[derive(Clone, Debug, Default)]
pub struct StateMachine {
    gate: ChecklistGate,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            gate: ChecklistGate::new(),
        }
    }

    pub fn gate(&self) -> &ChecklistGate {
        &self.gate
    }

    // ── Instantiation ────────────────────────────────────────────────

    /// Build levels and approver slots from definitions, resolving roles
    /// to concrete identities.
    pub fn instantiate_levels(
        &self,
        definitions: &[LevelDefinition],
        roles: &dyn RoleDirectory,
    ) -> ReviewResult<Vec<Level>> {
        let mut levels = Vec::with_capacity(definitions.len());
        for (index, definition) in definitions.iter().enumerate() {
            let mut approvers: Vec<Approver> = Vec::new();
            for requirement in &definition.approvers {
                for identity in resolve_requirement(&definition.name, requirement, roles)? {
                    match approvers.iter_mut().find(|a| a.id == identity.id) {
                        // Listed twice: keep one slot, required wins
                        Some(existing) => existing.required |= requirement.required,
                        None => approvers.push(Approver::new(
                            identity,
                            requirement.approver.clone(),
                            requirement.required,
                        )),
                    }
                }
            }
            if !approvers.iter().any(|a| a.required) {
                return Err(ReviewError::InvalidTemplate(format!(
                    "level '{}' resolves to no required approver",
                    definition.name
                )));
            }

            let level = Level::new(
                index as u32 + 1,
                definition.name.clone(),
                approvers,
                definition.rejection_policy,
            )
            .with_description(definition.description.clone())
            .with_approver_types(
                definition
                    .approvers
                    .iter()
                    .map(|r| r.approver.clone())
                    .collect(),
            )
            .with_deadline_offset(definition.deadline_offset_hours);
            levels.push(level);
        }
        Ok(levels)
    }

    // ── Review lifecycle ─────────────────────────────────────────────

    /// `draft -> in_review`, opening level 1
    pub fn start_review(
        &self,
        workflow: &mut Workflow,
        now: DateTime<Utc>,
    ) -> ReviewResult<Vec<ReviewEvent>> {
        workflow.ensure_status(WorkflowStatus::Draft)?;

        workflow.status = WorkflowStatus::InReview;
        workflow.current_level = 1;
        let activated = activate(workflow, 1, now)?;
        workflow.touch(now);

        Ok(vec![
            ReviewEvent::ReviewStarted {
                workflow_id: workflow.id.clone(),
            },
            activated,
        ])
    }

    /// Check that `approver_id` may decide on `level_id` right now.
    ///
    /// Returns the level number and the approver's display name.
    pub fn validate_decision(
        &self,
        workflow: &Workflow,
        level_id: &LevelId,
        approver_id: &ApproverId,
    ) -> ReviewResult<(u32, String)> {
        workflow.ensure_not_terminal()?;
        workflow.ensure_status(WorkflowStatus::InReview)?;

        let level = workflow
            .level_by_id(level_id)
            .ok_or_else(|| ReviewError::LevelNotFound(level_id.clone()))?;
        if level.status != LevelStatus::InProgress {
            return Err(ReviewError::invalid_transition(
                format!("level {}", level.level_number),
                LevelStatus::InProgress.as_str(),
                level.status.as_str(),
            ));
        }

        let approver = level
            .approver(approver_id)
            .ok_or_else(|| ReviewError::UnauthorizedApprover {
                approver: approver_id.clone(),
                level_number: level.level_number,
            })?;
        if !approver.is_pending() {
            return Err(ReviewError::invalid_transition(
                format!("approver {} on level {}", approver_id, level.level_number),
                "pending",
                approver.status.as_str(),
            ));
        }
        Ok((level.level_number, approver.name.clone()))
    }

    /// Aggregate a level's slots under its rejection policy.
    ///
    /// Only required approvers count. Optional approvers are advisory.
    pub fn settle(&self, level: &Level) -> LevelVerdict {
        let rejected = level
            .required_approvers()
            .any(|a| a.status == ApproverStatus::Rejected);

        if rejected {
            return match level.rejection_policy {
                RejectionPolicy::FailFast => LevelVerdict::Rejected,
                RejectionPolicy::AwaitAll if level.quorum_decided() => LevelVerdict::Rejected,
                RejectionPolicy::AwaitAll => LevelVerdict::Open,
            };
        }
        if level.quorum_approved() {
            LevelVerdict::Approved
        } else {
            LevelVerdict::Open
        }
    }

    /// Apply a level verdict to the workflow
    pub fn apply_verdict(
        &self,
        workflow: &mut Workflow,
        level_number: u32,
        verdict: LevelVerdict,
        now: DateTime<Utc>,
    ) -> ReviewResult<(DecisionOutcome, Vec<ReviewEvent>)> {
        match verdict {
            LevelVerdict::Open => Ok((DecisionOutcome::Recorded { level_number }, Vec::new())),
            LevelVerdict::Approved => self.complete_level(workflow, level_number, now),
            LevelVerdict::Rejected => self.request_revision(workflow, level_number, now),
        }
    }

    fn complete_level(
        &self,
        workflow: &mut Workflow,
        level_number: u32,
        now: DateTime<Utc>,
    ) -> ReviewResult<(DecisionOutcome, Vec<ReviewEvent>)> {
        let workflow_id = workflow.id.clone();
        let level = level_mut(workflow, level_number)?;
        level.settle(LevelStatus::Approved, now);
        let mut events = vec![ReviewEvent::LevelApproved {
            workflow_id,
            level_id: level.id.clone(),
        }];
        workflow.touch(now);

        if !workflow.is_final_level(level_number) {
            let next = level_number + 1;
            workflow.current_level = next;
            events.push(activate(workflow, next, now)?);
            return Ok((
                DecisionOutcome::LevelAdvanced {
                    from: level_number,
                    to: next,
                },
                events,
            ));
        }

        match self.gate.verdict(workflow.checklist.as_ref()) {
            GateVerdict::Open => {
                events.extend(self.approve(workflow, now));
                Ok((DecisionOutcome::WorkflowApproved, events))
            }
            GateVerdict::Blocked(shortfall) => {
                tracing::info!(
                    workflow_id = %workflow.id,
                    pending = shortfall.pending.len(),
                    failed = shortfall.failed.len(),
                    "Final level approved, awaiting checklist"
                );
                Ok((DecisionOutcome::AwaitingChecklist { shortfall }, events))
            }
        }
    }

    fn request_revision(
        &self,
        workflow: &mut Workflow,
        level_number: u32,
        now: DateTime<Utc>,
    ) -> ReviewResult<(DecisionOutcome, Vec<ReviewEvent>)> {
        let workflow_id = workflow.id.clone();
        let round = workflow.revision_round;
        let level = level_mut(workflow, level_number)?;

        let (requested_by, requested_by_name, reason) = level
            .rejection(round)
            .map(|(approver, reason)| {
                (
                    approver.id.clone(),
                    approver.name.clone(),
                    reason.map(str::to_string),
                )
            })
            .ok_or_else(|| {
                ReviewError::invalid_transition(
                    format!("level {level_number}"),
                    "a required rejection",
                    "none",
                )
            })?;
        level.settle(LevelStatus::Rejected, now);
        let level_id = level.id.clone();

        workflow.revision_rounds.push(RevisionRound {
            round_number: round,
            status: WorkflowStatus::RevisionRequested,
            rejected_level: level_number,
            requested_by,
            requested_by_name,
            reason: reason.clone(),
            created_at: now,
        });
        workflow.revision_round = round + 1;
        workflow.status = WorkflowStatus::RevisionRequested;

        // The rejected level keeps its status as evidence until resubmission
        let reentry = workflow.reentry_level(level_number);
        workflow.current_level = reentry;
        for level in workflow
            .levels
            .iter_mut()
            .filter(|l| l.level_number >= reentry && l.level_number != level_number)
        {
            level.reset();
        }

        let next_round = workflow.revision_round;
        let mut events = vec![
            ReviewEvent::LevelRejected {
                workflow_id: workflow_id.clone(),
                level_id,
                reason,
            },
            ReviewEvent::RevisionRequested {
                workflow_id,
                round: next_round,
            },
        ];
        // Decisions stay refused until resubmission: the workflow is not in review
        if reentry != level_number {
            events.push(activate(workflow, reentry, now)?);
        }
        workflow.touch(now);

        Ok((DecisionOutcome::RevisionRequested { round: next_round }, events))
    }

    /// `revision_requested -> in_review`, reopening the re-entry level.
    /// `rebind` moves the workflow onto a newer version.
    pub fn resubmit(
        &self,
        workflow: &mut Workflow,
        rebind: Option<VersionId>,
        now: DateTime<Utc>,
    ) -> ReviewResult<Vec<ReviewEvent>> {
        workflow.ensure_not_terminal()?;
        workflow.ensure_status(WorkflowStatus::RevisionRequested)?;

        if let Some(version_id) = rebind {
            if version_id != workflow.version_id {
                let previous = std::mem::replace(&mut workflow.version_id, version_id);
                workflow.version_history.push(previous);
            }
        }

        // An already reopened re-entry level keeps its reset slots and only
        // has its deadline restarted
        let reentry = workflow.current_level;
        for level in workflow.levels.iter_mut().filter(|l| {
            l.level_number > reentry
                || (l.level_number == reentry && l.status != LevelStatus::InProgress)
        }) {
            level.reset();
        }
        workflow.status = WorkflowStatus::InReview;
        let activated = activate(workflow, reentry, now)?;
        workflow.touch(now);

        Ok(vec![
            ReviewEvent::Resubmitted {
                workflow_id: workflow.id.clone(),
                round: workflow.revision_round,
                version_id: workflow.version_id.clone(),
            },
            activated,
        ])
    }

    /// Any non-terminal status -> `rejected`
    pub fn cancel(
        &self,
        workflow: &mut Workflow,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> ReviewResult<Vec<ReviewEvent>> {
        workflow.ensure_not_terminal()?;

        workflow.status = WorkflowStatus::Rejected;
        workflow.cancellation_reason = reason;
        workflow.completed_at = Some(now);
        workflow.touch(now);

        Ok(vec![ReviewEvent::WorkflowRejected {
            workflow_id: workflow.id.clone(),
        }])
    }

    // ── Final approval and checklist ─────────────────────────────────

    /// True when only the checklist stands between the workflow and approval
    pub fn awaiting_checklist(&self, workflow: &Workflow) -> bool {
        workflow.status == WorkflowStatus::InReview
            && workflow.is_final_level(workflow.current_level)
            && workflow
                .current()
                .map(|l| l.status == LevelStatus::Approved)
                .unwrap_or(false)
    }

    /// Explicit final-approval attempt. Fails without mutating when the
    /// checklist has not passed.
    pub fn finalize(
        &self,
        workflow: &mut Workflow,
        now: DateTime<Utc>,
    ) -> ReviewResult<Vec<ReviewEvent>> {
        workflow.ensure_not_terminal()?;
        workflow.ensure_status(WorkflowStatus::InReview)?;
        if !self.awaiting_checklist(workflow) {
            let actual = workflow
                .current()
                .map(|l| format!("level {} {}", l.level_number, l.status))
                .unwrap_or_else(|| "no current level".to_string());
            return Err(ReviewError::invalid_transition(
                format!("workflow {}", workflow.id),
                "final level approved",
                actual,
            ));
        }
        self.gate.check(workflow.checklist.as_ref())?;
        Ok(self.approve(workflow, now))
    }

    pub fn attach_checklist(
        &self,
        workflow: &mut Workflow,
        items: Vec<ChecklistItemDefinition>,
        now: DateTime<Utc>,
    ) -> ReviewResult<Vec<ReviewEvent>> {
        workflow.ensure_not_terminal()?;
        if workflow.checklist.is_some() {
            return Err(ReviewError::ChecklistAlreadyAttached(workflow.id.clone()));
        }
        if items.iter().any(|i| i.title.trim().is_empty()) {
            return Err(ReviewError::InvalidInput(
                "checklist items need a title".to_string(),
            ));
        }

        let mut checklist = Checklist::from_definitions(items);
        self.gate.evaluate(&mut checklist, now);
        let mut events = vec![evaluated(&workflow.id, &checklist)];
        workflow.checklist = Some(checklist);
        events.extend(self.approve_if_unblocked(workflow, now));
        workflow.touch(now);
        Ok(events)
    }

    pub fn set_checklist_item(
        &self,
        workflow: &mut Workflow,
        item_id: &ChecklistItemId,
        status: ChecklistItemStatus,
        checked_by: &str,
        now: DateTime<Utc>,
    ) -> ReviewResult<Vec<ReviewEvent>> {
        workflow.ensure_not_terminal()?;
        let checklist = workflow
            .checklist
            .as_mut()
            .ok_or_else(|| ReviewError::ChecklistItemNotFound(item_id.clone()))?;
        self.gate
            .set_item_status(checklist, item_id, status, checked_by, now)?;

        let mut events = vec![evaluated(&workflow.id, checklist)];
        events.extend(self.approve_if_unblocked(workflow, now));
        workflow.touch(now);
        Ok(events)
    }

    pub fn evaluate_checklist(
        &self,
        workflow: &mut Workflow,
        now: DateTime<Utc>,
    ) -> ReviewResult<Vec<ReviewEvent>> {
        workflow.ensure_not_terminal()?;
        let workflow_id = workflow.id.clone();
        let checklist = workflow.checklist.as_mut().ok_or_else(|| {
            ReviewError::invalid_transition(format!("workflow {workflow_id}"), "a checklist", "none")
        })?;
        self.gate.evaluate(checklist, now);

        let mut events = vec![evaluated(&workflow_id, checklist)];
        events.extend(self.approve_if_unblocked(workflow, now));
        workflow.touch(now);
        Ok(events)
    }

    fn approve_if_unblocked(&self, workflow: &mut Workflow, now: DateTime<Utc>) -> Vec<ReviewEvent> {
        if self.awaiting_checklist(workflow) && self.gate.verdict(workflow.checklist.as_ref()).is_open() {
            self.approve(workflow, now)
        } else {
            Vec::new()
        }
    }

    fn approve(&self, workflow: &mut Workflow, now: DateTime<Utc>) -> Vec<ReviewEvent> {
        if let Some(checklist) = workflow.checklist.as_mut() {
            self.gate.evaluate(checklist, now);
        }
        workflow.status = WorkflowStatus::Approved;
        workflow.current_level = workflow.final_level_number() + 1;
        workflow.completed_at = Some(now);
        workflow.touch(now);

        tracing::info!(workflow_id = %workflow.id, round = workflow.revision_round, "Workflow approved");
        vec![ReviewEvent::WorkflowApproved {
            workflow_id: workflow.id.clone(),
        }]
    }
}

fn resolve_requirement(
    level_name: &str,
    requirement: &ApproverRequirement,
    roles: &dyn RoleDirectory,
) -> ReviewResult<Vec<ApproverIdentity>> {
    match &requirement.approver {
        ApproverType::User { id, name } => Ok(vec![ApproverIdentity {
            id: id.clone(),
            name: name.clone(),
        }]),
        ApproverType::External { email, name } => {
            Ok(vec![ApproverIdentity::new(email.clone(), name.clone())])
        }
        ApproverType::Role { role } => {
            let members = roles.members(role);
            if members.is_empty() {
                return Err(ReviewError::InvalidTemplate(format!(
                    "role '{role}' on level '{level_name}' has no members"
                )));
            }
            Ok(members)
        }
    }
}

fn level_mut(workflow: &mut Workflow, level_number: u32) -> ReviewResult<&mut Level> {
    let workflow_id = workflow.id.clone();
    workflow.level_mut(level_number).ok_or_else(|| {
        ReviewError::invalid_transition(
            format!("workflow {workflow_id}"),
            format!("level {level_number}"),
            "no such level",
        )
    })
}

fn activate(
    workflow: &mut Workflow,
    level_number: u32,
    now: DateTime<Utc>,
) -> ReviewResult<ReviewEvent> {
    let workflow_id = workflow.id.clone();
    let level = level_mut(workflow, level_number)?;
    level.activate(now);
    tracing::debug!(workflow_id = %workflow_id, level = level_number, "Level activated");
    Ok(ReviewEvent::LevelActivated {
        workflow_id,
        level_id: level.id.clone(),
        level_number,
        deadline: level.deadline,
    })
}

fn evaluated(workflow_id: &WorkflowId, checklist: &Checklist) -> ReviewEvent {
    ReviewEvent::ChecklistEvaluated {
        workflow_id: workflow_id.clone(),
        checklist_id: checklist.id.clone(),
        status: checklist.status,
        overall_score: checklist.overall_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role_directory::StaticRoleDirectory;

    fn roles() -> StaticRoleDirectory {
        StaticRoleDirectory::new()
            .with_role(
                "leads",
                vec![
                    ApproverIdentity::new("u-ana", "Ana"),
                    ApproverIdentity::new("u-ben", "Ben"),
                ],
            )
            .with_role("client", vec![ApproverIdentity::new("u-cat", "Cat")])
    }

    fn definitions(policy: RejectionPolicy) -> Vec<LevelDefinition> {
        vec![
            LevelDefinition::new(
                "Internal",
                vec![ApproverRequirement::required(ApproverType::role("leads"))],
            )
            .with_rejection_policy(policy),
            LevelDefinition::new(
                "Client",
                vec![ApproverRequirement::required(ApproverType::role("client"))],
            )
            .with_deadline_hours(24),
        ]
    }

    fn workflow(policy: RejectionPolicy) -> Workflow {
        let machine = StateMachine::new();
        let levels = machine
            .instantiate_levels(&definitions(policy), &roles())
            .unwrap();
        Workflow::new(
            VersionId::generate(),
            DeliverableId::generate(),
            "test",
            levels,
        )
    }

    fn decide(wf: &mut Workflow, level: u32, approver: &str, decision: Decision, comment: Option<&str>) {
        let round = wf.revision_round;
        let lvl = wf.level_mut(level).unwrap();
        let name = lvl.approver(&ApproverId::new(approver)).unwrap().name.clone();
        lvl.apply_decision(DecisionRecord {
            round,
            level_number: level,
            approver_id: ApproverId::new(approver),
            approver_name: name,
            decision,
            comment: comment.map(str::to_string),
            decided_at: Utc::now(),
        })
        .unwrap();
    }

    fn settle(machine: &StateMachine, wf: &mut Workflow, level: u32) -> DecisionOutcome {
        let verdict = machine.settle(wf.level(level).unwrap());
        machine.apply_verdict(wf, level, verdict, Utc::now()).unwrap().0
    }

    #[test]
    fn test_roles_expand_to_slots() {
        let wf = workflow(RejectionPolicy::FailFast);
        assert_eq!(wf.levels.len(), 2);
        assert_eq!(wf.levels[0].approvers.len(), 2);
        assert_eq!(wf.levels[0].approver_types, vec![ApproverType::role("leads")]);
        assert_eq!(wf.levels[1].deadline_offset_hours, Some(24));
    }

    #[test]
    fn test_duplicate_identity_collapses_to_one_slot() {
        let defs = vec![LevelDefinition::new(
            "Mixed",
            vec![
                ApproverRequirement::optional(ApproverType::user("u-ana", "Ana")),
                ApproverRequirement::required(ApproverType::role("leads")),
            ],
        )];
        let levels = StateMachine::new().instantiate_levels(&defs, &roles()).unwrap();
        assert_eq!(levels[0].approvers.len(), 2);
        assert!(levels[0].approvers.iter().all(|a| a.required));
    }

    #[test]
    fn test_empty_role_is_invalid_template() {
        let defs = vec![LevelDefinition::new(
            "Ghost",
            vec![ApproverRequirement::required(ApproverType::role("nobody"))],
        )];
        let err = StateMachine::new()
            .instantiate_levels(&defs, &roles())
            .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidTemplate(_)));
    }

    #[test]
    fn test_start_review_activates_first_level() {
        let machine = StateMachine::new();
        let mut wf = workflow(RejectionPolicy::FailFast);
        let events = machine.start_review(&mut wf, Utc::now()).unwrap();

        assert_eq!(wf.status, WorkflowStatus::InReview);
        assert_eq!(wf.levels[0].status, LevelStatus::InProgress);
        assert_eq!(wf.levels[1].status, LevelStatus::Pending);
        assert_eq!(events.len(), 2);

        assert!(matches!(
            machine.start_review(&mut wf, Utc::now()),
            Err(ReviewError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_validate_decision_errors() {
        let machine = StateMachine::new();
        let mut wf = workflow(RejectionPolicy::FailFast);
        let l1 = wf.levels[0].id.clone();
        let l2 = wf.levels[1].id.clone();

        // draft
        assert!(matches!(
            machine.validate_decision(&wf, &l1, &ApproverId::new("u-ana")),
            Err(ReviewError::InvalidTransition { .. })
        ));

        machine.start_review(&mut wf, Utc::now()).unwrap();
        assert!(machine
            .validate_decision(&wf, &l1, &ApproverId::new("u-ana"))
            .is_ok());
        assert!(matches!(
            machine.validate_decision(&wf, &l1, &ApproverId::new("u-cat")),
            Err(ReviewError::UnauthorizedApprover { level_number: 1, .. })
        ));
        assert!(matches!(
            machine.validate_decision(&wf, &l2, &ApproverId::new("u-cat")),
            Err(ReviewError::InvalidTransition { ref actual, .. }) if actual == "pending"
        ));
        assert!(matches!(
            machine.validate_decision(&wf, &LevelId::new("nope"), &ApproverId::new("u-ana")),
            Err(ReviewError::LevelNotFound(_))
        ));

        decide(&mut wf, 1, "u-ana", Decision::Approve, None);
        assert!(matches!(
            machine.validate_decision(&wf, &l1, &ApproverId::new("u-ana")),
            Err(ReviewError::InvalidTransition { ref actual, .. }) if actual == "approved"
        ));
    }

    #[test]
    fn test_level_advances_only_when_quorum_approved() {
        let machine = StateMachine::new();
        let mut wf = workflow(RejectionPolicy::FailFast);
        machine.start_review(&mut wf, Utc::now()).unwrap();

        decide(&mut wf, 1, "u-ana", Decision::Approve, None);
        assert_eq!(settle(&machine, &mut wf, 1), DecisionOutcome::Recorded { level_number: 1 });
        assert_eq!(wf.current_level, 1);

        decide(&mut wf, 1, "u-ben", Decision::Approve, None);
        assert_eq!(
            settle(&machine, &mut wf, 1),
            DecisionOutcome::LevelAdvanced { from: 1, to: 2 }
        );
        assert_eq!(wf.current_level, 2);
        assert_eq!(wf.levels[0].status, LevelStatus::Approved);
        assert_eq!(wf.levels[1].status, LevelStatus::InProgress);
        assert!(wf.levels[1].deadline.is_some());
    }

    #[test]
    fn test_final_level_without_checklist_approves() {
        let machine = StateMachine::new();
        let mut wf = workflow(RejectionPolicy::FailFast);
        machine.start_review(&mut wf, Utc::now()).unwrap();
        decide(&mut wf, 1, "u-ana", Decision::Approve, None);
        decide(&mut wf, 1, "u-ben", Decision::Approve, None);
        settle(&machine, &mut wf, 1);
        decide(&mut wf, 2, "u-cat", Decision::Approve, None);

        assert_eq!(settle(&machine, &mut wf, 2), DecisionOutcome::WorkflowApproved);
        assert_eq!(wf.status, WorkflowStatus::Approved);
        assert_eq!(wf.current_level, 3);
        assert!(wf.completed_at.is_some());
    }

    #[test]
    fn test_checklist_blocks_then_auto_approves() {
        let machine = StateMachine::new();
        let mut wf = workflow(RejectionPolicy::FailFast).with_checklist(Checklist::from_definitions(vec![
            ChecklistItemDefinition::required("legal", "Licences cleared"),
        ]));
        let item = wf.checklist.as_ref().unwrap().items[0].id.clone();
        machine.start_review(&mut wf, Utc::now()).unwrap();
        decide(&mut wf, 1, "u-ana", Decision::Approve, None);
        decide(&mut wf, 1, "u-ben", Decision::Approve, None);
        settle(&machine, &mut wf, 1);
        decide(&mut wf, 2, "u-cat", Decision::Approve, None);

        let outcome = settle(&machine, &mut wf, 2);
        assert!(matches!(outcome, DecisionOutcome::AwaitingChecklist { .. }));
        assert_eq!(wf.status, WorkflowStatus::InReview);
        assert!(machine.awaiting_checklist(&wf));

        let before = wf.clone();
        assert!(matches!(
            machine.finalize(&mut wf, Utc::now()),
            Err(ReviewError::ChecklistIncomplete(_))
        ));
        assert_eq!(wf, before);

        let events = machine
            .set_checklist_item(&mut wf, &item, ChecklistItemStatus::Passed, "qa", Utc::now())
            .unwrap();
        assert_eq!(wf.status, WorkflowStatus::Approved);
        assert_eq!(wf.checklist.as_ref().unwrap().status, ChecklistStatus::Passed);
        assert_eq!(events.last().map(ReviewEvent::name), Some("workflow.approved"));
    }

    #[test]
    fn test_fail_fast_rejection_opens_revision_round() {
        let machine = StateMachine::new();
        let mut wf = workflow(RejectionPolicy::FailFast);
        machine.start_review(&mut wf, Utc::now()).unwrap();
        decide(&mut wf, 1, "u-ana", Decision::Approve, None);
        decide(&mut wf, 1, "u-ben", Decision::Approve, None);
        settle(&machine, &mut wf, 1);
        decide(&mut wf, 2, "u-cat", Decision::Reject, Some("missing asset"));

        assert_eq!(
            settle(&machine, &mut wf, 2),
            DecisionOutcome::RevisionRequested { round: 2 }
        );
        assert_eq!(wf.status, WorkflowStatus::RevisionRequested);
        assert_eq!(wf.revision_round, 2);
        assert_eq!(wf.revision_rounds.len(), 1);
        let round = &wf.revision_rounds[0];
        assert_eq!(round.round_number, 1);
        assert_eq!(round.reason.as_deref(), Some("missing asset"));
        assert_eq!(round.requested_by, ApproverId::new("u-cat"));

        assert_eq!(wf.current_level, 1);
        assert_eq!(wf.levels[0].status, LevelStatus::InProgress);
        assert!(wf.levels[0].approvers.iter().all(Approver::is_pending));
        assert_eq!(wf.levels[0].decisions.len(), 2);
        assert_eq!(wf.levels[1].status, LevelStatus::Rejected);

        // reopened, but closed to decisions until resubmission
        let l1 = wf.levels[0].id.clone();
        assert!(matches!(
            machine.validate_decision(&wf, &l1, &ApproverId::new("u-ana")),
            Err(ReviewError::InvalidTransition { .. })
        ));

        let events = machine.resubmit(&mut wf, None, Utc::now()).unwrap();
        assert_eq!(wf.status, WorkflowStatus::InReview);
        assert_eq!(wf.levels[0].status, LevelStatus::InProgress);
        assert_eq!(wf.levels[1].status, LevelStatus::Pending);
        assert_eq!(events.last().map(ReviewEvent::name), Some("level.activated"));
    }

    #[test]
    fn test_await_all_waits_for_every_required_approver() {
        let machine = StateMachine::new();
        let mut wf = workflow(RejectionPolicy::AwaitAll);
        machine.start_review(&mut wf, Utc::now()).unwrap();

        decide(&mut wf, 1, "u-ana", Decision::Reject, Some("typo"));
        assert_eq!(settle(&machine, &mut wf, 1), DecisionOutcome::Recorded { level_number: 1 });
        assert_eq!(wf.levels[0].status, LevelStatus::InProgress);

        decide(&mut wf, 1, "u-ben", Decision::Approve, None);
        assert_eq!(
            settle(&machine, &mut wf, 1),
            DecisionOutcome::RevisionRequested { round: 2 }
        );
        assert_eq!(wf.revision_rounds[0].reason.as_deref(), Some("typo"));
    }

    #[test]
    fn test_resubmit_reopens_reentry_level() {
        let machine = StateMachine::new();
        let mut wf = workflow(RejectionPolicy::FailFast);
        machine.start_review(&mut wf, Utc::now()).unwrap();
        decide(&mut wf, 1, "u-ana", Decision::Reject, None);
        settle(&machine, &mut wf, 1);

        let new_version = VersionId::generate();
        let original = wf.version_id.clone();
        let events = machine
            .resubmit(&mut wf, Some(new_version.clone()), Utc::now())
            .unwrap();

        assert_eq!(wf.status, WorkflowStatus::InReview);
        assert_eq!(wf.levels[0].status, LevelStatus::InProgress);
        assert_eq!(wf.version_id, new_version);
        assert_eq!(wf.version_history, vec![original]);
        assert_eq!(events[0].name(), "workflow.resubmitted");

        assert!(matches!(
            machine.resubmit(&mut wf, None, Utc::now()),
            Err(ReviewError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_rejected_level_reentry_keeps_earlier_approvals() {
        let machine = StateMachine::new();
        let mut wf = workflow(RejectionPolicy::FailFast).with_reentry(ReentryPolicy::RejectedLevel);
        machine.start_review(&mut wf, Utc::now()).unwrap();
        decide(&mut wf, 1, "u-ana", Decision::Approve, None);
        decide(&mut wf, 1, "u-ben", Decision::Approve, None);
        settle(&machine, &mut wf, 1);
        decide(&mut wf, 2, "u-cat", Decision::Reject, None);
        settle(&machine, &mut wf, 2);

        assert_eq!(wf.current_level, 2);
        assert_eq!(wf.levels[0].status, LevelStatus::Approved);

        machine.resubmit(&mut wf, None, Utc::now()).unwrap();
        assert_eq!(wf.levels[0].status, LevelStatus::Approved);
        assert_eq!(wf.levels[1].status, LevelStatus::InProgress);
        assert!(wf.levels[1].approvers.iter().all(Approver::is_pending));
    }

    #[test]
    fn test_cancel_is_terminal() {
        let machine = StateMachine::new();
        let mut wf = workflow(RejectionPolicy::FailFast);
        machine.start_review(&mut wf, Utc::now()).unwrap();
        machine
            .cancel(&mut wf, Some("brief withdrawn".into()), Utc::now())
            .unwrap();
        assert_eq!(wf.status, WorkflowStatus::Rejected);
        assert_eq!(wf.cancellation_reason.as_deref(), Some("brief withdrawn"));

        assert!(machine.cancel(&mut wf, None, Utc::now()).is_err());
        assert!(machine
            .attach_checklist(&mut wf, Vec::new(), Utc::now())
            .is_err());
    }

    #[test]
    fn test_finalize_requires_final_level() {
        let machine = StateMachine::new();
        let mut wf = workflow(RejectionPolicy::FailFast);
        machine.start_review(&mut wf, Utc::now()).unwrap();
        let err = machine.finalize(&mut wf, Utc::now()).unwrap_err();
        assert!(matches!(err, ReviewError::InvalidTransition { ref expected, .. } if expected == "final level approved"));
    }

    #[test]
    fn test_attach_checklist_once() {
        let machine = StateMachine::new();
        let mut wf = workflow(RejectionPolicy::FailFast);
        let events = machine
            .attach_checklist(
                &mut wf,
                vec![ChecklistItemDefinition::required("brand", "Logo")],
                Utc::now(),
            )
            .unwrap();
        assert_eq!(events[0].name(), "checklist.evaluated");
        assert!(matches!(
            machine.attach_checklist(&mut wf, Vec::new(), Utc::now()),
            Err(ReviewError::ChecklistAlreadyAttached(_))
        ));
    }
}
