//! Read-only views built from one or more fetched collections.
//!
//! These are the college specific readings of generic Deputy data: a
//! "bursary student" is an active employee holding a TrainingRecord whose
//! module is titled like `Year1`, and roster/timesheet activity is tallied
//! per employee with a [`Counter`].

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{info, warn};

use crate::contract::Transport;
use crate::counter::{Counter, CounterTotal};
use crate::error::{MissingRelatedObject, Result};
use crate::fetch::{ResourceClient, ResourceCollection};
use crate::query::{DateRange, FilterOp, ResourceQuery};
use crate::record::{Employee, Journal, Resource, Roster, Timesheet, TrainingModule, TrainingRecord};

/// Module titles must start with this, then a digit, to count as a year level.
pub const YEAR_PREFIX: &str = "Year";
/// Historical module with a space in its title, never to be used.
pub const EXCLUDED_YEAR_TITLE: &str = "Year 3";

/// One line of summary output, e.g. "Bursary Students: 42".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    pub id: String,
    pub title: String,
    pub value: u64,
}

impl Stat {
    pub fn new(id: &str, title: &str, value: usize) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            value: value as u64,
        }
    }
}

impl From<CounterTotal> for Stat {
    fn from(total: CounterTotal) -> Self {
        Self {
            id: total.id,
            title: total.title,
            value: total.count,
        }
    }
}

/// An employee's year level and the TrainingRecord that stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearAssignment {
    pub year: String,
    pub record_id: i64,
}

/// Year-level training modules, both ways round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearModules {
    pub by_title: IndexMap<String, i64>,
    pub by_id: HashMap<i64, String>,
}

/// `Year1`, `Year2`, `Year1NR` qualify; `YearX` and the historical `Year 3` do not.
pub fn is_year_title(title: &str) -> bool {
    if title == EXCLUDED_YEAR_TITLE {
        return false;
    }
    title
        .strip_prefix(YEAR_PREFIX)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

impl YearModules {
    pub fn from_modules<'a>(modules: impl IntoIterator<Item = &'a TrainingModule>) -> Self {
        let mut years = YearModules::default();
        for module in modules {
            if !is_year_title(&module.title) {
                continue;
            }
            years.by_title.insert(module.title.clone(), module.id);
            years.by_id.insert(module.id, module.title.clone());
        }
        years
    }

    pub fn module_for(&self, year: &str) -> Option<i64> {
        self.by_title.get(year).copied()
    }

    pub fn year_for(&self, module_id: i64) -> Option<&str> {
        self.by_id.get(&module_id).map(String::as_str)
    }
}

/// Active employees keyed by their joined contact email.
#[derive(Debug, Clone, Default)]
pub struct EmailIndex {
    pub by_email: IndexMap<String, Employee>,
    /// Employees skipped because their contact was not joined.
    pub missing: Vec<MissingRelatedObject>,
}

impl EmailIndex {
    /// Duplicate emails resolve last-write-wins in collection order.
    pub fn build(employees: &ResourceCollection<Employee>) -> Self {
        let mut index = EmailIndex::default();
        for employee in employees.values() {
            match employee.email() {
                Ok(email) => {
                    if let Some(previous) = index.by_email.insert(email.to_string(), employee.clone()) {
                        warn!(
                            email,
                            replaced = previous.id,
                            kept = employee.id,
                            "Duplicate employee email, keeping the later record"
                        );
                    }
                }
                Err(missing) => {
                    warn!(error = %missing, "Skipping employee without contact");
                    index.missing.push(missing);
                }
            }
        }
        index
    }

    pub fn get(&self, email: &str) -> Option<&Employee> {
        self.by_email.get(email)
    }

    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }
}

/// Which shift resource to tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftSource {
    Roster,
    Timesheet,
}

#[derive(Debug, Clone)]
pub struct StudentCounts {
    pub counter: Counter<i64>,
    /// Records fetched before the location filter.
    pub fetched: usize,
    /// Records skipped because the operational unit was not joined.
    pub missing: Vec<MissingRelatedObject>,
    pub stats: Vec<Stat>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BursaryStudent {
    pub id: i64,
    pub name: String,
    pub year: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct BursaryList {
    pub students: Vec<BursaryStudent>,
    pub missing: Vec<MissingRelatedObject>,
    pub stats: Vec<Stat>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub date: String,
    pub name: String,
    pub email: String,
    pub category: String,
    pub comment: String,
    pub creator: String,
}

/// Builders for every derived view, sharing one [`ResourceClient`].
pub struct Views<'a, T> {
    client: &'a ResourceClient<T>,
}

impl<'a, T: Transport> Views<'a, T> {
    pub fn new(client: &'a ResourceClient<T>) -> Self {
        Self { client }
    }

    fn employee_query(active: bool) -> ResourceQuery {
        ResourceQuery::new(Employee::NAME)
            .sort("LastName")
            .join(Employee::CONTACT)
            .filter("Active", FilterOp::Eq, active)
    }

    /// Active employees by id, sorted by last name, contact joined.
    pub async fn active_employees(&self) -> Result<ResourceCollection<Employee>> {
        self.client.fetch(&Self::employee_query(true)).await
    }

    /// Deactivated employees by id, sorted by last name, contact joined.
    pub async fn discarded_employees(&self) -> Result<ResourceCollection<Employee>> {
        self.client.fetch(&Self::employee_query(false)).await
    }

    pub async fn employees_by_email(&self) -> Result<EmailIndex> {
        let employees = self.active_employees().await?;
        Ok(EmailIndex::build(&employees))
    }

    pub async fn year_modules(&self) -> Result<YearModules> {
        let modules: ResourceCollection<TrainingModule> =
            self.client.fetch(&ResourceQuery::new(TrainingModule::NAME)).await?;
        let years = YearModules::from_modules(modules.values());
        info!(years = years.by_title.len(), modules = modules.len(), "Resolved year modules");
        Ok(years)
    }

    /// Year level per employee id.
    ///
    /// Assumes one year per employee. When several year records exist for
    /// the same employee the last one in `Id` order wins.
    pub async fn year_levels_by_id(&self, years: &YearModules) -> Result<IndexMap<i64, YearAssignment>> {
        let records: ResourceCollection<TrainingRecord> =
            self.client.fetch(&ResourceQuery::new(TrainingRecord::NAME)).await?;

        let mut result = IndexMap::new();
        for record in records.values() {
            let Some(year) = years.year_for(record.module) else {
                continue;
            };
            let assignment = YearAssignment {
                year: year.to_string(),
                record_id: record.id,
            };
            if let Some(previous) = result.insert(record.employee, assignment) {
                warn!(
                    employee = record.employee,
                    replaced = previous.record_id,
                    kept = record.id,
                    "Employee has more than one year record"
                );
            }
        }
        info!(students = result.len(), "Resolved year levels");
        Ok(result)
    }

    /// Per-employee roster or timesheet tallies for one location (or all).
    pub async fn student_counters(
        &self,
        location_name: Option<&str>,
        source: ShiftSource,
        date_range: Option<&DateRange>,
    ) -> Result<StudentCounts> {
        match source {
            ShiftSource::Roster => self.roster_counts(location_name, date_range).await,
            ShiftSource::Timesheet => self.timesheet_counts(location_name, date_range).await,
        }
    }

    fn shift_query(resource: &str, date_range: Option<&DateRange>) -> ResourceQuery {
        let query = ResourceQuery::new(resource)
            .join(crate::record::OPERATIONAL_UNIT)
            .filter("Employee", FilterOp::Ne, 0);
        match date_range {
            Some(range) => query.filters(range.filters()),
            None => query,
        }
    }

    async fn roster_counts(&self, location_name: Option<&str>, date_range: Option<&DateRange>) -> Result<StudentCounts> {
        let rosters: ResourceCollection<Roster> =
            self.client.fetch(&Self::shift_query(Roster::NAME, date_range)).await?;

        let mut counter = Counter::new();
        counter
            .add_counter("rostered", "Rosters Rostered")
            .add_counter("completed", "Rosters Completed")
            .add_counter("open", "Rosters Open");
        let mut missing = Vec::new();

        for roster in rosters.values() {
            if let Some(location) = location_name {
                match roster.operational_unit() {
                    Ok(unit) if unit.company_name.as_deref() == Some(location) => {}
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "Skipping roster without operational unit");
                        missing.push(e);
                        continue;
                    }
                }
            }
            counter.count(roster.employee, "rostered");
            if roster.matched_by_timesheet.unwrap_or(0) > 0 {
                counter.count(roster.employee, "completed");
            }
            if roster.open {
                counter.count(roster.employee, "open");
            }
        }

        let mut stats = vec![
            Stat::new("rosters", "Rosters (for all locations)", rosters.len()),
            Stat::new("students", "Rosters with Students", counter.len()),
        ];
        stats.extend(counter.totals().into_iter().map(Stat::from));

        Ok(StudentCounts {
            counter,
            fetched: rosters.len(),
            missing,
            stats,
        })
    }

    async fn timesheet_counts(&self, location_name: Option<&str>, date_range: Option<&DateRange>) -> Result<StudentCounts> {
        let timesheets: ResourceCollection<Timesheet> =
            self.client.fetch(&Self::shift_query(Timesheet::NAME, date_range)).await?;

        let mut counter = Counter::new();
        counter
            .add_counter("timesheet", "Timesheets")
            .add_counter("approved_timesheet", "Approved Timesheets");
        let mut missing = Vec::new();

        for timesheet in timesheets.values() {
            if let Some(location) = location_name {
                match timesheet.operational_unit() {
                    Ok(unit) if unit.company_name.as_deref() == Some(location) => {}
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(error = %e, "Skipping timesheet without operational unit");
                        missing.push(e);
                        continue;
                    }
                }
            }
            if timesheet.is_leave {
                continue;
            }
            counter.count(timesheet.employee, "timesheet");
            if timesheet.time_approved {
                counter.count(timesheet.employee, "approved_timesheet");
            }
        }

        let mut stats = vec![
            Stat::new("timesheets", "Timesheets (for all locations)", timesheets.len()),
            Stat::new("students", "Timesheets with Students", counter.len()),
        ];
        stats.extend(counter.totals().into_iter().map(Stat::from));

        Ok(StudentCounts {
            counter,
            fetched: timesheets.len(),
            missing,
            stats,
        })
    }

    /// Active employees that hold a year level, in last-name order.
    pub async fn bursary_students(&self) -> Result<BursaryList> {
        let employees = self.active_employees().await?;
        let years = self.year_modules().await?;
        let assignments = self.year_levels_by_id(&years).await?;

        let mut students = Vec::new();
        let mut missing = Vec::new();
        for employee in employees.values() {
            let Some(assignment) = assignments.get(&employee.id) else {
                continue;
            };
            match employee.email() {
                Ok(email) => students.push(BursaryStudent {
                    id: employee.id,
                    name: employee.display_name.clone(),
                    year: assignment.year.clone(),
                    email: email.to_string(),
                }),
                Err(e) => {
                    warn!(error = %e, "Skipping bursary student without contact");
                    missing.push(e);
                }
            }
        }

        let stats = vec![
            Stat::new("students", "Students", employees.len()),
            Stat::new("bursary_students", "Bursary Students", students.len()),
            Stat::new("missing_contacts", "Students without Contact", missing.len()),
        ];
        Ok(BursaryList {
            students,
            missing,
            stats,
        })
    }

    /// Journal entries for employees that are still active.
    pub async fn journal_entries(&self) -> Result<(Vec<JournalEntry>, Vec<Stat>)> {
        let employees = self.active_employees().await?;
        let journals: ResourceCollection<Journal> =
            self.client.fetch(&ResourceQuery::new(Journal::NAME)).await?;

        let mut entries = Vec::new();
        for journal in journals.values() {
            let Some(employee) = employees.get(journal.employee_id) else {
                continue;
            };
            let email = match employee.email() {
                Ok(email) => email.to_string(),
                Err(e) => {
                    warn!(error = %e, journal = journal.id, "Journal employee has no contact");
                    String::new()
                }
            };
            let creator = employees
                .get(journal.creator)
                .map(|c| c.display_name.clone())
                .unwrap_or_default();
            entries.push(JournalEntry {
                date: journal.date.chars().take(10).collect(),
                name: employee.display_name.clone(),
                email,
                category: journal
                    .category
                    .first()
                    .map(|c| c.category.clone())
                    .unwrap_or_default(),
                comment: journal.comment.clone(),
                creator,
            });
        }
        let stats = vec![Stat::new("journal_entries", "Journal Entries", entries.len())];
        Ok((entries, stats))
    }
}
