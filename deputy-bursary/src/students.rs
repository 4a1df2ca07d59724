//! Student list from the college's Synergetic CSV export, and the Deputy
//! bulk user import file generated from it.
//!
//! The export is hand-maintained and inconsistent, so each row goes through
//! a set of fixups before it becomes a [`StudentTarget`]. Every fixup is
//! reported as a message for the operator to review.

use std::fs::File;
use std::io;
use std::path::Path;

use anyhow::{bail, Context, Result};
use deputy_bursary_core::reconcile::StudentTarget;
use serde::Deserialize;
use tracing::{info, warn};

/// Columns read from the export. Any others are ignored.
pub const SYNERGETIC_COLUMNS: [&str; 7] = [
    "Preferred",
    "Surname",
    "NetworkLogin",
    "OccupEmail",
    "Course",
    "YearatUni",
    "MobilePhoneActual",
];

/// Columns of the Deputy bulk user creation upload.
pub const DEPUTY_COLUMNS: [&str; 11] = [
    "First Name",
    "Last Name",
    "Time Card Number",
    "Email",
    "Mobile Number",
    "Birth Date",
    "Employment Date",
    "Weekday",
    "Saturday",
    "Sunday",
    "Public Holiday",
];

/// Bursary students are in years 1 to 3.
pub const MAX_YEAR_AT_UNI: i64 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentCsvConfig {
    pub email_test: Option<String>,
    pub email_domain: Option<String>,
    pub exclude: Vec<String>,
    pub postgrad: Vec<String>,
    pub include_mobile: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynergeticRow {
    #[serde(rename = "Preferred")]
    pub preferred: String,
    #[serde(rename = "Surname")]
    pub surname: String,
    #[serde(rename = "NetworkLogin")]
    pub network_login: String,
    #[serde(rename = "OccupEmail")]
    pub occup_email: String,
    #[serde(rename = "Course")]
    pub course: String,
    #[serde(rename = "YearatUni")]
    pub year_at_uni: String,
    #[serde(rename = "MobilePhoneActual")]
    pub mobile_phone: String,
}

#[derive(Debug, Clone, Default)]
pub struct StudentImport {
    pub students: Vec<StudentTarget>,
    pub messages: Vec<String>,
    pub excluded: usize,
}

/// Apply the fixups to one row. `None` means the row is excluded.
pub fn parse_student_record(row: &SynergeticRow, config: &StudentCsvConfig) -> (Vec<String>, Option<StudentTarget>) {
    let mut messages = Vec::new();
    let first_name = row.preferred.trim().to_string();
    let last_name = row.surname.trim().to_string();
    let name = format!("{first_name} {last_name}");
    let mut email = row.occup_email.trim().to_string();
    let course = row.course.trim();

    let mut login = row.network_login.trim().to_string();
    if login.is_empty() {
        login = email.split('@').next().unwrap_or_default().to_string();
        messages.push(format!(
            "Missing NetworkLogin for {name}. Setting to {login} using email {email}."
        ));
    }

    if config.exclude.iter().any(|e| *e == login) {
        messages.push(format!("Excluded {name} ({login}) who is on the exclude list."));
        return (messages, None);
    }

    if let Some(marker) = config.postgrad.iter().find(|p| !p.is_empty() && course.contains(p.as_str())) {
        messages.push(format!(
            "Excluded {name} ({login}) for Post Grad course {course} (matched {marker})."
        ));
        return (messages, None);
    }

    let mut year_at_uni = row.year_at_uni.trim().to_string();
    match year_at_uni.parse::<i64>() {
        Ok(n) if n > MAX_YEAR_AT_UNI => {
            messages.push(format!(
                "Excluded {name} ({login}), Year at Uni {n} > {MAX_YEAR_AT_UNI} in course {course}."
            ));
            return (messages, None);
        }
        Ok(_) => {}
        Err(_) => {
            messages.push(format!("Missing YearatUni for {name} ({login}). Setting to 1."));
            year_at_uni = "1".to_string();
        }
    }
    let year = format!("Year{year_at_uni}");

    let mobile = if config.include_mobile {
        let (mobile, message) = normalise_mobile(&row.mobile_phone);
        if let Some(message) = message {
            messages.push(format!("{message} for {name} ({login})."));
        }
        mobile
    } else {
        None
    };

    if let Some(test) = config.email_test.as_deref() {
        if !email.contains(test) {
            messages.push(format!(
                "Incorrect {test} email address {name} ({login}): {email}. Fixing."
            ));
            email = match config.email_domain.as_deref() {
                Some(domain) => format!("{login}@{domain}"),
                None => String::new(),
            };
        }
    }

    let student = StudentTarget {
        login,
        email,
        first_name,
        last_name,
        year: Some(year),
        mobile,
    };
    (messages, Some(student))
}

/// Australian mobile as `0XXX XXX XXX`, or `None` with the reason.
pub fn normalise_mobile(raw: &str) -> (Option<String>, Option<String>) {
    let mut mobile: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if mobile.is_empty() {
        return (None, Some("Missing phone number".to_string()));
    }

    if let Some(rest) = mobile.strip_prefix("+61").or_else(|| mobile.strip_prefix("61")) {
        mobile = format!("0{rest}");
    }
    if mobile.starts_with("00") || mobile.starts_with('+') {
        return (None, Some(format!("International phone number {mobile}. Setting to blank")));
    }
    // Spreadsheets drop the leading zero.
    if mobile.len() == 9 {
        mobile.insert(0, '0');
    }
    if mobile.len() != 10 || !mobile.chars().all(|c| c.is_ascii_digit()) {
        return (None, Some(format!("Incorrect mobile number {mobile}. Setting to blank")));
    }
    (
        Some(format!("{} {} {}", &mobile[0..4], &mobile[4..7], &mobile[7..10])),
        None,
    )
}

/// Read and fix up every row of an export.
pub fn read_students<R: io::Read>(reader: R, config: &StudentCsvConfig) -> Result<StudentImport> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);
    let headers = reader.headers().context("reading student CSV header")?.clone();
    for column in SYNERGETIC_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            bail!("Student CSV is missing the {column} column");
        }
    }

    let mut import = StudentImport::default();
    for (line, row) in reader.deserialize::<SynergeticRow>().enumerate() {
        let row = row.with_context(|| format!("reading student CSV row {}", line + 2))?;
        let (messages, student) = parse_student_record(&row, config);
        import.messages.extend(messages);
        match student {
            Some(student) => import.students.push(student),
            None => import.excluded += 1,
        }
    }
    info!(
        students = import.students.len(),
        excluded = import.excluded,
        fixups = import.messages.len(),
        "Read student list"
    );
    Ok(import)
}

pub fn read_students_file(path: &Path, config: &StudentCsvConfig) -> Result<StudentImport> {
    info!(path = ?path, "Opening student CSV");
    let file = File::open(path).with_context(|| format!("opening student CSV {}", path.display()))?;
    read_students(file, config).with_context(|| format!("in {}", path.display()))
}

/// Write the Deputy bulk user import file. Unused Deputy columns stay blank.
pub fn write_user_import<W: io::Write>(writer: W, students: &[StudentTarget]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(DEPUTY_COLUMNS)?;
    for student in students {
        if student.email.is_empty() {
            warn!(login = %student.login, "Writing user without an email");
        }
        let mut record = vec![
            student.first_name.as_str(),
            student.last_name.as_str(),
            student.login.as_str(),
            student.email.as_str(),
            student.mobile.as_deref().unwrap_or_default(),
        ];
        record.resize(DEPUTY_COLUMNS.len(), "");
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_numbers_are_normalised() {
        assert_eq!(normalise_mobile("0412 345 678").0.as_deref(), Some("0412 345 678"));
        assert_eq!(normalise_mobile("+61412345678").0.as_deref(), Some("0412 345 678"));
        assert_eq!(normalise_mobile("61412345678").0.as_deref(), Some("0412 345 678"));
        assert_eq!(normalise_mobile("412345678").0.as_deref(), Some("0412 345 678"));
    }

    #[test]
    fn unusable_mobile_numbers_are_blanked_with_a_reason() {
        let (mobile, message) = normalise_mobile("+44 7700 900123");
        assert!(mobile.is_none());
        assert!(message.unwrap().starts_with("International"));

        let (mobile, message) = normalise_mobile("12345");
        assert!(mobile.is_none());
        assert!(message.unwrap().starts_with("Incorrect"));

        assert_eq!(normalise_mobile("  ").1.as_deref(), Some("Missing phone number"));
    }
}
