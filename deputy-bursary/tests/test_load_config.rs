use chrono::NaiveDate;
use deputy_bursary::load_config::{
    load_config, resolve_config, ACCESS_TOKEN_ENV, DEFAULT_CONFIG_FILE, DEFAULT_TIMEOUT_SECS,
};
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::{tempdir, NamedTempFile};

fn config_file(yaml: &str) -> NamedTempFile {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), yaml).unwrap();
    config_file
}

/// A full static config loads every section and takes the token from the environment.
#[tokio::test]
#[serial]
async fn test_load_config_all_sections_with_env_token() {
    let config_yaml = r#"
deputy:
  endpoint: https://college.au.deputy.com/api/v1/
  timeout_secs: 45
import:
  import_csv: ./data/synergetic.csv
  deputy_csv: ./data/deputy.csv
  email_test: college.edu
  email_domain: student.college.edu
  exclude: [jsmith, bwayne]
  postgrad: [Master, Doctor]
report:
  location_name: College
  obligations:
    Year1: 10
    Year2: 8
    Year3: 6
  always_include: [warden@college.edu]
  date_from: 2016-02-01
  date_to: 2016-11-30
"#;
    let file = config_file(config_yaml);
    env::set_var(ACCESS_TOKEN_ENV, "secret-token");

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.endpoint().unwrap(), "https://college.au.deputy.com/api/v1/");
    assert_eq!(config.timeout(), Duration::from_secs(45));
    assert_eq!(config.access_token().unwrap(), "secret-token");
    assert_eq!(config.import.import_csv, PathBuf::from("./data/synergetic.csv"));
    assert_eq!(config.import.exclude, vec!["jsmith", "bwayne"]);
    assert_eq!(config.report.obligations["Year2"], 8);

    let report = config.report_config().unwrap();
    assert_eq!(report.location_name.as_deref(), Some("College"));
    assert!(report.always_include.contains("warden@college.edu"));
    let range = report.date_range.unwrap();
    assert_eq!(range.from, NaiveDate::from_ymd_opt(2016, 2, 1));
    assert_eq!(range.to, NaiveDate::from_ymd_opt(2016, 11, 30));

    let students = config.student_csv_config(true);
    assert_eq!(students.email_domain.as_deref(), Some("student.college.edu"));
    assert_eq!(students.postgrad, vec!["Master", "Doctor"]);
    assert!(students.include_mobile);
}

/// Missing sections fall back to defaults.
#[tokio::test]
#[serial]
async fn test_load_config_defaults_for_missing_sections() {
    let file = config_file("deputy:\n  endpoint: https://x.deputy.com/api/v1/\n");
    env::remove_var(ACCESS_TOKEN_ENV);

    let config = load_config(file.path()).expect("Partial config should load");

    assert_eq!(config.deputy.timeout_secs, DEFAULT_TIMEOUT_SECS);
    assert_eq!(config.import.import_csv, PathBuf::from("import.csv"));
    assert_eq!(config.import.deputy_csv, PathBuf::from("deputy.csv"));
    assert!(config.report.obligations.is_empty());
    assert!(config.report_config().unwrap().date_range.is_none());

    let err = config.access_token().unwrap_err();
    assert!(err.to_string().contains(ACCESS_TOKEN_ENV), "got: {err}");
}

/// Command line flags win over file and environment.
#[tokio::test]
#[serial]
async fn test_command_line_overrides() {
    let file = config_file("deputy:\n  endpoint: https://file.deputy.com/api/v1/\n  timeout_secs: 10\n");
    env::set_var(ACCESS_TOKEN_ENV, "from-env");

    let mut config = load_config(file.path()).unwrap();
    config.apply_overrides(
        Some("https://flag.deputy.com/api/v1/".to_string()),
        Some("from-flag".to_string()),
        Some(90),
    );

    assert_eq!(config.endpoint().unwrap(), "https://flag.deputy.com/api/v1/");
    assert_eq!(config.access_token().unwrap(), "from-flag");
    assert_eq!(config.timeout(), Duration::from_secs(90));

    let mut untouched = load_config(file.path()).unwrap();
    untouched.apply_overrides(None, None, None);
    assert_eq!(untouched.endpoint().unwrap(), "https://file.deputy.com/api/v1/");
    assert_eq!(untouched.access_token().unwrap(), "from-env");
    env::remove_var(ACCESS_TOKEN_ENV);
}

/// The token is never read from the file.
#[tokio::test]
#[serial]
async fn test_access_token_in_file_is_ignored() {
    let file = config_file("deputy:\n  endpoint: https://x.deputy.com/api/v1/\n  access_token: leaked\n");
    env::remove_var(ACCESS_TOKEN_ENV);

    let config = load_config(file.path()).unwrap();

    assert!(config.deputy.access_token.is_none());
}

#[tokio::test]
#[serial]
async fn test_reversed_date_range_is_rejected() {
    let file = config_file("report:\n  date_from: 2016-12-01\n  date_to: 2016-01-01\n");

    let config = load_config(file.path()).unwrap();
    let err = config.report_config().unwrap_err();

    assert!(err.to_string().contains("after"), "got: {err}");
}

/// This test ensures that if the config file is not valid YAML, load_config errors and reports as such.
#[tokio::test]
#[serial]
async fn test_load_config_errors_for_invalid_file() {
    let file = config_file("not-yaml: [:::");

    let err = load_config(file.path()).unwrap_err();
    let msg = err.to_string();
    assert!(
        msg.contains("parse") || msg.contains("YAML"),
        "Parse error expected, got: {msg}"
    );
}

#[tokio::test]
#[serial]
async fn test_load_config_errors_for_missing_file() {
    let err = load_config("/definitely/not/here/deputy.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

/// Without --config, ./deputy.yaml is used when present and reported as the source.
#[tokio::test]
#[serial]
async fn test_resolve_config_reports_the_file_it_read() {
    let dir = tempdir().unwrap();
    let previous = env::current_dir().unwrap();
    env::set_current_dir(dir.path()).unwrap();

    let (_, none) = resolve_config(None).unwrap();
    write(DEFAULT_CONFIG_FILE, "deputy:\n  endpoint: https://cwd.deputy.com/api/v1/\n").unwrap();
    let (config, found) = resolve_config(None).unwrap();

    env::set_current_dir(previous).unwrap();
    assert_eq!(none, None);
    assert_eq!(found, Some(PathBuf::from(DEFAULT_CONFIG_FILE)));
    assert_eq!(config.endpoint().unwrap(), "https://cwd.deputy.com/api/v1/");

    let file = config_file("{}");
    let (_, explicit) = resolve_config(Some(file.path())).unwrap();
    assert_eq!(explicit, Some(file.path().to_path_buf()));
}
