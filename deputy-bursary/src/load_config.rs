/// `load_config` module: reads the YAML config file and injects the access token from the environment.
///
/// The file holds no secrets. Its three sections map onto the three
/// concerns of the tool:
/// - `deputy`: API endpoint and HTTP timeout
/// - `import`: the student CSV export and the fixups applied to it
/// - `report`: shift obligations per year and which shifts count
///
/// The access token comes from `DEPUTY_ACCESS_TOKEN` (a `.env` file is
/// honoured). Command line flags override both, see [`CliConfig::apply_overrides`].
///
/// # Errors
/// Everything here returns `anyhow::Error` with enough context to fix the
/// file by hand; these errors surface directly at the CLI boundary.
use anyhow::{anyhow, bail, Result};
use chrono::NaiveDate;
use deputy_bursary_core::query::DateRange;
use deputy_bursary_core::report::ReportConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use crate::students::StudentCsvConfig;

pub const ACCESS_TOKEN_ENV: &str = "DEPUTY_ACCESS_TOKEN";
pub const DEFAULT_CONFIG_FILE: &str = "deputy.yaml";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CliConfig {
    pub deputy: DeputySection,
    pub import: ImportSection,
    pub report: ReportSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeputySection {
    /// e.g. `https://college.au.deputy.com/api/v1/`
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
    /// Never read from or written to the file.
    #[serde(skip)]
    pub access_token: Option<String>,
}

impl Default for DeputySection {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            access_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImportSection {
    pub import_csv: PathBuf,
    pub deputy_csv: PathBuf,
    /// Emails not containing this are rewritten to `<login>@<email_domain>`.
    pub email_test: Option<String>,
    pub email_domain: Option<String>,
    /// Logins that never do bursary shifts.
    pub exclude: Vec<String>,
    /// Course name fragments marking a postgraduate course.
    pub postgrad: Vec<String>,
}

impl Default for ImportSection {
    fn default() -> Self {
        Self {
            import_csv: PathBuf::from("import.csv"),
            deputy_csv: PathBuf::from("deputy.csv"),
            email_test: None,
            email_domain: None,
            exclude: Vec::new(),
            postgrad: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportSection {
    pub location_name: Option<String>,
    /// Required shifts per year level, e.g. `Year1: 10`.
    pub obligations: BTreeMap<String, u32>,
    /// Emails always reported, without an obligation.
    pub always_include: Vec<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl CliConfig {
    /// Flags given on the command line win over the file and the environment.
    pub fn apply_overrides(&mut self, endpoint: Option<String>, token: Option<String>, timeout_secs: Option<u64>) {
        if endpoint.is_some() {
            self.deputy.endpoint = endpoint;
        }
        if token.is_some() {
            self.deputy.access_token = token;
        }
        if let Some(timeout) = timeout_secs {
            self.deputy.timeout_secs = timeout;
        }
    }

    pub fn endpoint(&self) -> Result<&str> {
        self.deputy
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| anyhow!("No API endpoint configured: set deputy.endpoint in the config file or pass --endpoint"))
    }

    pub fn access_token(&self) -> Result<&str> {
        self.deputy
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("No access token: set {ACCESS_TOKEN_ENV} or pass --token"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.deputy.timeout_secs)
    }

    pub fn report_config(&self) -> Result<ReportConfig> {
        let report = &self.report;
        if let (Some(from), Some(to)) = (report.date_from, report.date_to) {
            if from > to {
                bail!("report.date_from {from} is after report.date_to {to}");
            }
        }
        let date_range = (report.date_from.is_some() || report.date_to.is_some()).then_some(DateRange {
            from: report.date_from,
            to: report.date_to,
        });
        Ok(ReportConfig {
            obligations: report.obligations.clone(),
            always_include: report.always_include.iter().cloned().collect(),
            location_name: report.location_name.clone(),
            date_range,
        })
    }

    pub fn student_csv_config(&self, include_mobile: bool) -> StudentCsvConfig {
        StudentCsvConfig {
            email_test: self.import.email_test.clone(),
            email_domain: self.import.email_domain.clone(),
            exclude: self.import.exclude.clone(),
            postgrad: self.import.postgrad.clone(),
            include_mobile,
        }
    }
}

/// Loads a static YAML config file (no secrets) and injects the access token from the environment.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let mut config: CliConfig = if config_content.trim().is_empty() {
        CliConfig::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    inject_env(&mut config);
    Ok(config)
}

/// Config from `path`, or from `deputy.yaml` when present, or defaults.
///
/// Also returns the file actually read, `None` for defaults.
pub fn resolve_config(path: Option<&Path>) -> Result<(CliConfig, Option<PathBuf>)> {
    match path {
        Some(path) => Ok((load_config(path)?, Some(path.to_path_buf()))),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Ok((load_config(DEFAULT_CONFIG_FILE)?, Some(PathBuf::from(DEFAULT_CONFIG_FILE))))
        }
        None => {
            info!("No config file, using defaults and environment");
            let mut config = CliConfig::default();
            inject_env(&mut config);
            Ok((config, None))
        }
    }
}

fn inject_env(config: &mut CliConfig) {
    match env::var(ACCESS_TOKEN_ENV) {
        Ok(token) if !token.is_empty() => {
            info!(env = ACCESS_TOKEN_ENV, "Access token taken from environment");
            config.deputy.access_token = Some(token);
        }
        _ => info!(env = ACCESS_TOKEN_ENV, "No access token in environment"),
    }
}
