use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::{read_to_string, write};
use tempfile::{tempdir, NamedTempFile};

const EXPORT: &str = "\
Preferred,Surname,NetworkLogin,OccupEmail,Course,YearatUni,MobilePhoneActual
Ann,Able,aable,aable@student.college.edu,Bachelor of Arts,1,0412 345 678
Bob,Bell,bbell,bob@gmail.com,Bachelor of Science,2,412345678
Cat,Cole,ccole,ccole@student.college.edu,Master of Laws,1,
";

fn config_with(contents: &str) -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    write(config.path(), contents).expect("Writing temp config failed");
    config
}

fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("deputy-bursary").expect("Binary exists");
    cmd.env_remove("DEPUTY_ACCESS_TOKEN").env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_every_command() {
    cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("report")
            .and(predicate::str::contains("user-csv"))
            .and(predicate::str::contains("add-year"))
            .and(predicate::str::contains("delete-users"))
            .and(predicate::str::contains("reinstate-users"))
            .and(predicate::str::contains("journal"))
            .and(predicate::str::contains("explore")),
    );
}

#[test]
fn user_csv_writes_deputy_import_file_without_touching_the_api() {
    let dir = tempdir().unwrap();
    let import = dir.path().join("import.csv");
    let output = dir.path().join("deputy.csv");
    write(&import, EXPORT).unwrap();
    let config = config_with(&format!(
        "import:\n  import_csv: {}\n  deputy_csv: {}\n  email_test: college.edu\n  email_domain: student.college.edu\n  postgrad: [Master]\n",
        import.display(),
        output.display()
    ));

    cmd()
        .current_dir(dir.path())
        .arg("--config")
        .arg(config.path())
        .arg("user-csv")
        .arg("--mobile")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Processed 2 students.")
                .and(predicate::str::contains("Students in Year1: 1; Year2: 1; Year3: 0"))
                .and(predicate::str::contains("Excluded Cat Cole (ccole) for Post Grad course"))
                .and(predicate::str::contains("Incorrect college.edu email address Bob Bell")),
        );

    let written = read_to_string(&output).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(
        lines[0],
        "First Name,Last Name,Time Card Number,Email,Mobile Number,Birth Date,Employment Date,Weekday,Saturday,Sunday,Public Holiday"
    );
    assert_eq!(lines[1], "Ann,Able,aable,aable@student.college.edu,0412 345 678,,,,,,");
    assert_eq!(lines[2], "Bob,Bell,bbell,bbell@student.college.edu,0412 345 678,,,,,,");
    assert_eq!(lines.len(), 3);
}

#[test]
fn api_command_without_endpoint_fails_with_one_line() {
    let dir = tempdir().unwrap();
    let config = config_with("report:\n  obligations:\n    Year1: 10\n");

    cmd()
        .current_dir(dir.path())
        .arg("--config")
        .arg(config.path())
        .arg("report")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No API endpoint configured"));
}

#[test]
fn api_command_without_token_names_the_variable() {
    let dir = tempdir().unwrap();

    cmd()
        .current_dir(dir.path())
        .args(["--endpoint", "https://college.au.deputy.com/api/v1/", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DEPUTY_ACCESS_TOKEN"));
}

#[test]
fn unreachable_endpoint_is_a_transport_error() {
    let dir = tempdir().unwrap();

    cmd()
        .current_dir(dir.path())
        .args([
            "--endpoint",
            "http://127.0.0.1:9/api/v1/",
            "--token",
            "not-a-real-token",
            "--timeout",
            "5",
            "intro",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("[transport]"));
}

#[test]
fn invalid_config_yaml_is_reported() {
    let dir = tempdir().unwrap();
    let config = config_with("deputy: [:::");

    cmd()
        .current_dir(dir.path())
        .arg("--config")
        .arg(config.path())
        .arg("intro")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse config YAML"));
}

#[test]
fn config_names_the_default_file_it_read() {
    let dir = tempdir().unwrap();
    write(
        dir.path().join("deputy.yaml"),
        "deputy:\n  endpoint: http://127.0.0.1:9/api/v1/\n  timeout_secs: 5\n",
    )
    .unwrap();

    cmd()
        .current_dir(dir.path())
        .args(["--token", "not-a-real-token", "config"])
        .assert()
        .code(1)
        .stdout(
            predicate::str::contains("Using config (deputy.yaml)")
                .and(predicate::str::contains("http://127.0.0.1:9/api/v1/"))
                .and(predicate::str::contains("access token: set")),
        )
        .stderr(predicate::str::contains("[transport]"));
}

#[test]
fn config_without_a_file_says_defaults() {
    let dir = tempdir().unwrap();

    cmd()
        .current_dir(dir.path())
        .arg("config")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Using config (defaults)"))
        .stderr(predicate::str::contains("No API endpoint configured"));
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{event:?}"));
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector { events: events.clone() };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use deputy_bursary::cli::{run, Cli, Commands};

    // A missing config file fails the run, after the start event.
    let cli = Cli {
        config: Some(std::path::PathBuf::from("dummy.yaml")),
        csv: false,
        endpoint: None,
        token: None,
        timeout: None,
        command: Some(Commands::Intro),
    };

    let result = run(cli).await;
    assert!(result.is_err());

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
