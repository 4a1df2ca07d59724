//! Reconciliation of Deputy employees against the canonical student list.
//!
//! Three passes, each keyed by email and each idempotent on re-run:
//! - [`ReconciliationEngine::reconcile_years`] creates or replaces the
//!   TrainingRecord holding a student's year level.
//! - [`ReconciliationEngine::reconcile_deletions`] deactivates bursary
//!   students who are no longer in the canonical list.
//! - [`ReconciliationEngine::reconcile_reinstatements`] reactivates
//!   discarded bursary students who are back in the list.
//!
//! Outcomes like "not found" or "already correct" are counted in the
//! returned [`ReconcileSummary`], never raised as errors.
//!
//! # Consistency
//! Changing a year is a delete of the old record followed by a create. The
//! pair is not atomic: if the create fails the employee is left without a
//! year assignment and [`DeputyError::IncompleteYearUpdate`] says which.

use std::collections::HashSet;

use chrono::{Local, NaiveDateTime};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use crate::contract::Transport;
use crate::error::{DeputyError, Result};
use crate::fetch::ResourceClient;
use crate::record::{Employee, Resource, TrainingRecord};
use crate::views::{EmailIndex, Views, YearAssignment, YearModules};

/// One row of the canonical student list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StudentTarget {
    pub login: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub year: Option<String>,
    pub mobile: Option<String>,
}

impl StudentTarget {
    pub fn name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Emails of a canonical list, for the delete and reinstate passes.
pub fn canonical_emails(targets: &[StudentTarget]) -> HashSet<String> {
    targets.iter().map(|t| t.email.clone()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationDecision {
    Create,
    UpdateYear { old_record_id: i64 },
    NoOpAlreadyCorrect,
    /// The target's email is not an active employee in Deputy.
    NotFoundLocally,
    Delete,
    Reinstate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub email: String,
    pub employee_id: Option<i64>,
    pub decision: ReconciliationDecision,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub processed: usize,
    pub not_found: usize,
    pub already_correct: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub reinstated: usize,
    /// Targets without a year level, ignored by the year pass.
    pub skipped: usize,
}

impl ReconcileSummary {
    pub fn mutations(&self) -> usize {
        self.created + self.updated + self.deleted + self.reinstated
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub messages: Vec<String>,
    pub summary: ReconcileSummary,
    pub decisions: Vec<Decision>,
}

impl ReconcileOutcome {
    fn decide(&mut self, email: &str, employee_id: Option<i64>, decision: ReconciliationDecision) {
        info!(email, ?employee_id, ?decision, "Reconciliation decision");
        self.decisions.push(Decision {
            email: email.to_string(),
            employee_id,
            decision,
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileConfig {
    /// TrainingDate stamped on new year records; now when unset.
    pub training_date: Option<NaiveDateTime>,
}

pub struct ReconciliationEngine<'a, T> {
    client: &'a ResourceClient<T>,
    config: ReconcileConfig,
}

impl<'a, T: Transport> ReconciliationEngine<'a, T> {
    pub fn new(client: &'a ResourceClient<T>, config: ReconcileConfig) -> Self {
        Self { client, config }
    }

    fn training_date(&self) -> String {
        self.config
            .training_date
            .unwrap_or_else(|| Local::now().naive_local())
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string()
    }

    /// Bring every target's year level in Deputy in line with the list.
    pub async fn reconcile_years(&self, targets: &[StudentTarget]) -> Result<ReconcileOutcome> {
        let views = Views::new(self.client);
        let employees = views.employees_by_email().await?;
        let years = views.year_modules().await?;
        let mut assignments = views.year_levels_by_id(&years).await?;

        // Unmapped years are a configuration problem; refuse before writing anything.
        for target in targets {
            if let Some(year) = &target.year {
                if years.module_for(year).is_none() {
                    return Err(DeputyError::configuration(format!(
                        "no training module titled {year} for {} ({})",
                        target.name(),
                        target.email
                    )));
                }
            }
        }

        let mut outcome = ReconcileOutcome::default();
        for target in targets {
            let Some(year) = target.year.as_deref() else {
                outcome.summary.skipped += 1;
                continue;
            };
            self.reconcile_year(target, year, &employees, &years, &mut assignments, &mut outcome)
                .await?;
        }

        let s = &outcome.summary;
        let lines = [
            format!("Processed {} students.", s.processed),
            format!("{} students not found in Deputy.", s.not_found),
            format!("{} students already had the correct year level.", s.already_correct),
            format!("Added year level to {} students.", s.created),
            format!("Changed year level for {} students.", s.updated),
        ];
        outcome.messages.extend(lines);
        Ok(outcome)
    }

    async fn reconcile_year(
        &self,
        target: &StudentTarget,
        year: &str,
        employees: &EmailIndex,
        years: &YearModules,
        assignments: &mut IndexMap<i64, YearAssignment>,
        outcome: &mut ReconcileOutcome,
    ) -> Result<()> {
        let Some(employee) = employees.get(&target.email) else {
            outcome
                .messages
                .push(format!("Not Found: {} ({})", target.name(), target.email));
            outcome.summary.not_found += 1;
            outcome.decide(&target.email, None, ReconciliationDecision::NotFoundLocally);
            return Ok(());
        };
        outcome.summary.processed += 1;

        let module = years
            .module_for(year)
            .ok_or_else(|| DeputyError::configuration(format!("no training module titled {year}")))?;

        match assignments.get(&employee.id).cloned() {
            Some(current) if current.year == year => {
                outcome.summary.already_correct += 1;
                outcome.decide(&target.email, Some(employee.id), ReconciliationDecision::NoOpAlreadyCorrect);
            }
            Some(current) => {
                outcome.decide(
                    &target.email,
                    Some(employee.id),
                    ReconciliationDecision::UpdateYear {
                        old_record_id: current.record_id,
                    },
                );
                self.client.delete(TrainingRecord::NAME, current.record_id).await?;
                assignments.shift_remove(&employee.id);

                let record_id = self
                    .create_year_record(employee.id, module)
                    .await
                    .map_err(|e| {
                        error!(
                            employee = employee.id,
                            deleted = current.record_id,
                            error = %e,
                            "Year record deleted but replacement failed; employee has no year"
                        );
                        DeputyError::IncompleteYearUpdate {
                            employee_id: employee.id,
                            deleted_record_id: current.record_id,
                            source: Box::new(e),
                        }
                    })?;
                assignments.insert(
                    employee.id,
                    YearAssignment {
                        year: year.to_string(),
                        record_id,
                    },
                );
                outcome.messages.push(format!(
                    "Student {} ({}) moved from {} to {}",
                    target.name(),
                    employee.id,
                    current.year,
                    year
                ));
                outcome.summary.updated += 1;
            }
            None => {
                outcome.decide(&target.email, Some(employee.id), ReconciliationDecision::Create);
                let record_id = self.create_year_record(employee.id, module).await?;
                assignments.insert(
                    employee.id,
                    YearAssignment {
                        year: year.to_string(),
                        record_id,
                    },
                );
                outcome
                    .messages
                    .push(format!("Student {} ({}) is in {}", target.name(), employee.id, year));
                outcome.summary.created += 1;
            }
        }
        Ok(())
    }

    /// Returns the new record id. A response without one is a parse error,
    /// since the id is needed to replace the record later in the same run.
    async fn create_year_record(&self, employee_id: i64, module: i64) -> Result<i64> {
        let mut fields = Map::new();
        fields.insert("Employee".to_string(), json!(employee_id));
        fields.insert("Module".to_string(), json!(module));
        fields.insert("TrainingDate".to_string(), json!(self.training_date()));
        fields.insert("Active".to_string(), json!(true));

        let response = self.client.create(TrainingRecord::NAME, fields).await?;
        response.get("Id").and_then(Value::as_i64).ok_or_else(|| {
            warn!(employee_id, "Created year record without an Id in the response");
            DeputyError::ResponseParse {
                path: format!("resource/{}", TrainingRecord::NAME),
                detail: "created record has no Id".to_string(),
            }
        })
    }

    async fn set_active(&self, employee_id: i64, active: bool) -> Result<()> {
        let mut fields = Map::new();
        fields.insert("Active".to_string(), json!(active));
        self.client.update(Employee::NAME, employee_id, fields).await?;
        Ok(())
    }

    /// Deactivate active bursary students whose email is not in `canonical`.
    ///
    /// Pass an empty set at the end of a cycle to deactivate every bursary
    /// student. Employees without a year level are never touched.
    pub async fn reconcile_deletions(&self, canonical: &HashSet<String>) -> Result<ReconcileOutcome> {
        let views = Views::new(self.client);
        let employees = views.employees_by_email().await?;
        let years = views.year_modules().await?;
        let assignments = views.year_levels_by_id(&years).await?;

        let mut outcome = ReconcileOutcome::default();
        for (email, employee) in &employees.by_email {
            outcome.summary.processed += 1;
            if canonical.contains(email) {
                outcome.summary.already_correct += 1;
                continue;
            }
            let Some(assignment) = assignments.get(&employee.id) else {
                continue;
            };
            outcome.decide(email, Some(employee.id), ReconciliationDecision::Delete);
            self.set_active(employee.id, false).await?;
            outcome.messages.push(format!(
                "Deactivated {} ({}) in {}",
                employee.display_name, email, assignment.year
            ));
            outcome.summary.deleted += 1;
        }

        outcome.messages.push(format!("Checked {} active employees.", outcome.summary.processed));
        outcome
            .messages
            .push(format!("Deactivated {} bursary students.", outcome.summary.deleted));
        Ok(outcome)
    }

    /// Reactivate discarded bursary students whose email is in `canonical`.
    pub async fn reconcile_reinstatements(&self, canonical: &HashSet<String>) -> Result<ReconcileOutcome> {
        let views = Views::new(self.client);
        let discarded = EmailIndex::build(&views.discarded_employees().await?);
        let years = views.year_modules().await?;
        let assignments = views.year_levels_by_id(&years).await?;

        let mut outcome = ReconcileOutcome::default();
        for (email, employee) in &discarded.by_email {
            outcome.summary.processed += 1;
            if !canonical.contains(email) {
                continue;
            }
            let Some(assignment) = assignments.get(&employee.id) else {
                continue;
            };
            outcome.decide(email, Some(employee.id), ReconciliationDecision::Reinstate);
            self.set_active(employee.id, true).await?;
            outcome.messages.push(format!(
                "Reinstated {} ({}) in {}",
                employee.display_name, email, assignment.year
            ));
            outcome.summary.reinstated += 1;
        }

        outcome
            .messages
            .push(format!("Checked {} discarded employees.", outcome.summary.processed));
        outcome
            .messages
            .push(format!("Reinstated {} bursary students.", outcome.summary.reinstated));
        Ok(outcome)
    }
}
