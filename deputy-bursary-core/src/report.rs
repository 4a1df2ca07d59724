//! Student compliance report: one row per bursary student.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::contract::Transport;
use crate::counter::Counter;
use crate::error::{DeputyError, Result};
use crate::fetch::ResourceClient;
use crate::query::DateRange;
use crate::views::{BursaryStudent, ShiftSource, Stat, Views};

pub const INCOMPLETE_ROSTER: &str = "Incomplete roster. ";
pub const OUTSTANDING_SHIFTS: &str = "Outstanding Shifts.";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportConfig {
    /// Required rostered shifts per year level, e.g. `Year1 -> 10`.
    pub obligations: BTreeMap<String, u32>,
    /// Emails reported with no obligation, whatever their year.
    pub always_include: BTreeSet<String>,
    /// Only count shifts at this location (operational unit company name).
    pub location_name: Option<String>,
    pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub name: String,
    pub year: String,
    pub obligation: u32,
    pub rostered: u64,
    pub open: u64,
    pub completed: u64,
    pub percent_rostered: String,
    pub percent_completed: String,
    pub issues: String,
    pub email: String,
    pub timesheets: u64,
    pub approved_timesheets: u64,
}

impl ReportRow {
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Report {
    pub rows: Vec<ReportRow>,
    pub stats: Vec<Stat>,
}

/// `n / obligation` as a whole percentage, e.g. `"75%"`. Halves round to even.
pub fn percentage(n: u64, obligation: u32) -> String {
    let ratio = n as f64 / f64::from(obligation);
    format!("{:.0}%", ratio * 100.0)
}

/// Every non-exempt student's year must have an obligation.
pub fn check_obligations(students: &[BursaryStudent], config: &ReportConfig) -> Result<()> {
    for student in students {
        if config.always_include.contains(&student.email) {
            continue;
        }
        if !config.obligations.contains_key(&student.year) {
            return Err(DeputyError::configuration(format!(
                "no shift obligation configured for {} (student {})",
                student.year, student.name
            )));
        }
    }
    Ok(())
}

/// Combine students with their roster and timesheet tallies.
///
/// Fails before producing any row if a year has no obligation.
pub fn assemble(
    students: &[BursaryStudent],
    rosters: &Counter<i64>,
    timesheets: &Counter<i64>,
    config: &ReportConfig,
) -> Result<Report> {
    check_obligations(students, config)?;

    let mut counts: Counter<()> = Counter::new();
    for year in config.obligations.keys() {
        counts.add_counter(year, &format!("Students in {year}"));
    }
    counts
        .add_counter("roster_rostered_count", "Rostered")
        .add_counter("roster_completed_count", "Completed Rosters")
        .add_counter("roster_open_count", "Open Rosters")
        .add_counter("timesheet_count", "Timesheets");

    let mut rows = Vec::with_capacity(students.len());
    for student in students {
        let rostered = rosters.get_count(&student.id, "rostered");
        let completed = rosters.get_count(&student.id, "completed");
        let open = rosters.get_count(&student.id, "open");
        let sheets = timesheets.get_count(&student.id, "timesheet");
        let approved = timesheets.get_count(&student.id, "approved_timesheet");

        counts.count_by((), "roster_rostered_count", rostered);
        counts.count_by((), "roster_completed_count", completed);
        counts.count_by((), "roster_open_count", open);
        counts.count_by((), "timesheet_count", sheets);

        let exempt = config.always_include.contains(&student.email);
        let obligation = if exempt {
            0
        } else {
            counts.count((), &student.year);
            config.obligations[&student.year]
        };

        let mut issues = String::new();
        let (percent_rostered, percent_completed) = if obligation == 0 {
            (String::new(), String::new())
        } else {
            if rostered < u64::from(obligation) {
                issues.push_str(INCOMPLETE_ROSTER);
            }
            if completed < u64::from(obligation) {
                issues.push_str(OUTSTANDING_SHIFTS);
            }
            (percentage(rostered, obligation), percentage(completed, obligation))
        };

        rows.push(ReportRow {
            name: student.name.clone(),
            year: student.year.clone(),
            obligation,
            rostered,
            open,
            completed,
            percent_rostered,
            percent_completed,
            issues,
            email: student.email.clone(),
            timesheets: sheets,
            approved_timesheets: approved,
        });
    }

    let mut stats = vec![
        Stat::new("student_bursary", "Bursary Students", students.len()),
        Stat::new("student_roster", "Students with Rosters", rosters.len()),
        Stat::new("student_timesheet", "Students with Timesheets", timesheets.len()),
    ];
    stats.extend(counts.totals().into_iter().map(Stat::from));

    Ok(Report { rows, stats })
}

/// Fetch everything the report needs and assemble it.
pub async fn student_report<T: Transport>(client: &ResourceClient<T>, config: &ReportConfig) -> Result<Report> {
    let views = Views::new(client);
    let students = views.bursary_students().await?;
    check_obligations(&students.students, config)?;

    let location = config.location_name.as_deref();
    let range = config.date_range.as_ref();
    let rosters = views.student_counters(location, ShiftSource::Roster, range).await?;
    let timesheets = views.student_counters(location, ShiftSource::Timesheet, range).await?;

    let mut report = assemble(&students.students, &rosters.counter, &timesheets.counter, config)?;
    info!(rows = report.rows.len(), "Assembled student report");

    let mut stats = students.stats;
    stats.push(Stat::new("rosters", "Rosters (for all locations)", rosters.fetched));
    stats.push(Stat::new("timesheets", "Timesheets (for all locations)", timesheets.fetched));
    stats.append(&mut report.stats);
    report.stats = stats;
    Ok(report)
}
