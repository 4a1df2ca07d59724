//! Console output as readable text or as CSV.
//!
//! In CSV mode data rows go to stdout through a CSV writer and everything
//! else (titles, messages, stats) goes to stderr, so stdout can be piped
//! straight into a spreadsheet.

use std::io::{self, Stderr, Stdout, Write};

use anyhow::Result;
use deputy_bursary_core::views::Stat;

pub struct Printer<O: Write, E: Write> {
    out: O,
    err: E,
    csv: bool,
}

impl Printer<Stdout, Stderr> {
    pub fn stdout(csv: bool) -> Self {
        Self::new(io::stdout(), io::stderr(), csv)
    }
}

impl<O: Write, E: Write> Printer<O, E> {
    pub fn new(out: O, err: E, csv: bool) -> Self {
        Self {
            out,
            err,
            csv,
        }
    }

    pub fn is_csv(&self) -> bool {
        self.csv
    }

    /// Prose. Goes to stderr in CSV mode.
    pub fn text(&mut self, line: impl AsRef<str>) -> Result<()> {
        let line = line.as_ref();
        if self.is_csv() {
            writeln!(self.err, "{line}")?;
        } else {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    pub fn lines<I, S>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.text(line)?;
        }
        Ok(())
    }

    /// Column headers, written only in CSV mode.
    pub fn headers(&mut self, headers: &[&str]) -> Result<()> {
        if self.csv {
            self.write_csv(headers)?;
        }
        Ok(())
    }

    /// One record: `fields` as CSV, or `line` as text.
    pub fn data<S: AsRef<str>>(&mut self, line: impl AsRef<str>, fields: &[S]) -> Result<()> {
        if self.csv {
            self.write_csv(fields)
        } else {
            self.text(line)
        }
    }

    pub fn stats(&mut self, stats: &[Stat]) -> Result<()> {
        self.text("")?;
        for stat in stats {
            self.text(format!("{}: {}", stat.title, stat.value))?;
        }
        Ok(())
    }

    /// Pretty JSON straight to stdout, whatever the mode.
    pub fn json(&mut self, value: &serde_json::Value) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.out, value)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn write_csv<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<()> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(fields.iter().map(|f| f.as_ref()))?;
        let record = writer.into_inner().map_err(|e| e.into_error())?;
        self.out.write_all(&record)?;
        Ok(())
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(title: &str, value: u64) -> Stat {
        Stat {
            id: title.to_lowercase(),
            title: title.to_string(),
            value,
        }
    }

    #[test]
    fn text_mode_prints_lines_and_skips_headers() {
        let mut p = Printer::new(Vec::new(), Vec::new(), false);
        p.text("Journal Entries.").unwrap();
        p.headers(&["Date", "Name"]).unwrap();
        p.data("[2016-04-14] Ann Able", &["2016-04-14", "Ann Able"]).unwrap();
        p.stats(&[stat("Journal Entries", 1)]).unwrap();

        let (out, err) = p.into_inner();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Journal Entries.\n[2016-04-14] Ann Able\n\nJournal Entries: 1\n"
        );
        assert!(err.is_empty());
    }

    #[test]
    fn csv_mode_keeps_stdout_for_records() {
        let mut p = Printer::new(Vec::new(), Vec::new(), true);
        p.text("Student compliance report.").unwrap();
        p.headers(&["Name", "Issues"]).unwrap();
        p.data("ignored", &["Able, Ann", "Outstanding Shifts."]).unwrap();
        p.stats(&[stat("Bursary Students", 1)]).unwrap();

        let (out, err) = p.into_inner();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Name,Issues\n\"Able, Ann\",Outstanding Shifts.\n"
        );
        let err = String::from_utf8(err).unwrap();
        assert!(err.starts_with("Student compliance report.\n"));
        assert!(err.contains("Bursary Students: 1"));
    }
}
