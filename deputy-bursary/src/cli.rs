/// # deputy-bursary CLI Interface (Module)
///
/// Command parsing and orchestration for the `deputy-bursary` binary.
/// Everything that reasons about Deputy data lives in `deputy-bursary-core`;
/// this module wires the HTTP client, the config file and the student CSV
/// into it and prints the results.
///
/// ## How To Use
/// - For command-line users: run `deputy-bursary --help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
use crate::api::DeputyHttpClient;
use crate::load_config::{resolve_config, CliConfig};
use crate::output::Printer;
use crate::students::{read_students_file, write_user_import};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deputy_bursary_core::contract::FetchProgress;
use deputy_bursary_core::explore::{Explorer, REFERENCE_SCANS};
use deputy_bursary_core::fetch::ResourceClient;
use deputy_bursary_core::query::ResourceQuery;
use deputy_bursary_core::reconcile::{canonical_emails, ReconcileConfig, ReconcileOutcome, ReconciliationEngine};
use deputy_bursary_core::record::ResourceRecord;
use deputy_bursary_core::report::student_report;
use deputy_bursary_core::views::{Stat, Views};
use deputy_bursary_core::DeputyError;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{Stderr, Stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const PROJECT_URL: &str = "https://github.com/tonyallan/deputy/";

type ConsolePrinter = Printer<Stdout, Stderr>;

/// Deputy reporting and utilities for bursary students.
#[derive(Parser, Debug)]
#[clap(
    name = "deputy-bursary",
    version,
    about = "Deputy reporting and utilities: bursary student reports, year levels and user lifecycle"
)]
pub struct Cli {
    /// Path to the YAML config file (default: ./deputy.yaml when present)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Format records as CSV on stdout; messages go to stderr
    #[clap(long, global = true)]
    pub csv: bool,

    /// API endpoint, e.g. https://college.au.deputy.com/api/v1/ (overrides config)
    #[clap(short = 'e', long, global = true)]
    pub endpoint: Option<String>,

    /// Access token (overrides DEPUTY_ACCESS_TOKEN)
    #[clap(short = 'a', long, global = true)]
    pub token: Option<String>,

    /// HTTP timeout in seconds (overrides config)
    #[clap(short = 't', long, global = true)]
    pub timeout: Option<u64>,

    #[clap(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the Deputy version and the logged in user
    Intro,
    /// Show the configuration in use
    Config,
    /// List bursary students with their year level and email
    List,
    /// Student compliance report against the shift obligations
    Report {
        /// Only show students with issues
        #[clap(long)]
        hide_ok: bool,
    },
    /// Journal entries for active employees
    Journal,
    /// Convert the student CSV export into a Deputy user import file
    UserCsv {
        /// Include mobile phone numbers
        #[clap(long)]
        mobile: bool,
        /// Student CSV export (overrides config)
        #[clap(long)]
        import_csv: Option<PathBuf>,
        /// Deputy user import file to write (overrides config)
        #[clap(long)]
        deputy_csv: Option<PathBuf>,
    },
    /// Set each listed student's year level as a TrainingRecord
    AddYear {
        #[clap(long)]
        import_csv: Option<PathBuf>,
    },
    /// Deactivate bursary students no longer in the student CSV
    DeleteUsers {
        /// Deactivate every bursary student, ignoring the CSV
        #[clap(long)]
        end_of_cycle: bool,
        #[clap(long)]
        import_csv: Option<PathBuf>,
    },
    /// Reactivate discarded bursary students who are back in the student CSV
    ReinstateUsers {
        #[clap(long)]
        import_csv: Option<PathBuf>,
    },
    /// GET any API path and print the JSON, e.g. `api resource/EmployeeRole`
    Api {
        #[clap(default_value = "me")]
        path: String,
    },
    /// Fetch every record of a resource, e.g. `resource Employee`
    Resource {
        #[clap(default_value = "Employee")]
        name: String,
        /// Inline a related object, e.g. `--join ContactObject`
        #[clap(long)]
        join: Option<String>,
    },
    /// Show which records in every resource refer to which employee
    Explore {
        /// Only references to this employee id (unknown ids are always shown)
        #[clap(short = 'i', long)]
        id: Option<i64>,
        /// List all employees, active or not, instead
        #[clap(short = 'l', long)]
        list: bool,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let (mut config, config_source) = resolve_config(cli.config.as_deref())?;
    config.apply_overrides(cli.endpoint.clone(), cli.token.clone(), cli.timeout);
    let command = cli.command.clone().unwrap_or(Commands::Intro);
    let mut printer = Printer::stdout(cli.csv);

    tracing::info!(?command, csv = cli.csv, "Running command");
    tokio::select! {
        result = execute(command, &config, config_source.as_deref(), &mut printer) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted");
            Err(DeputyError::UserCancelled.into())
        }
    }
}

fn connect(config: &CliConfig) -> Result<ResourceClient<DeputyHttpClient>> {
    let transport = DeputyHttpClient::new(config.endpoint()?, config.access_token()?, config.timeout())?;
    let progress = Arc::new(|p: &FetchProgress| {
        if p.finished {
            tracing::debug!(resource = %p.resource, records = p.position, "Fetch finished");
        } else {
            eprintln!("[Fetching resource={} {}]", p.resource, p.position);
        }
    });
    Ok(ResourceClient::new(transport).with_progress(progress))
}

fn import_path(config: &CliConfig, flag: &Option<PathBuf>) -> PathBuf {
    flag.clone().unwrap_or_else(|| config.import.import_csv.clone())
}

async fn execute(
    command: Commands,
    config: &CliConfig,
    config_source: Option<&Path>,
    p: &mut ConsolePrinter,
) -> Result<()> {
    match command {
        Commands::Intro => {
            let me = connect(config)?.me().await?;
            p.text(format!("DeputyVersion: {} running as {}.\n", me.deputy_version, me.name))?;
            p.text("A tool for the Deputy API. Use --help to see a list of commands.")?;
            p.text(format!("For more information, see {PROJECT_URL}\n"))?;
            p.text("For a list of commands use --help")
        }
        Commands::Config => {
            let source = config_source
                .map(|c| c.display().to_string())
                .unwrap_or_else(|| "defaults".to_string());
            p.text(format!("Using config ({source})"))?;
            p.text(serde_yaml::to_string(config).context("rendering config")?)?;
            let token = if config.deputy.access_token.is_some() { "set" } else { "not set" };
            p.text(format!("access token: {token}\n"))?;
            let me = connect(config)?.me().await?;
            p.text(format!("DeputyVersion: {} running as {}.", me.deputy_version, me.name))
        }
        Commands::List => list(&connect(config)?, p).await,
        Commands::Report { hide_ok } => report(&connect(config)?, config, p, hide_ok).await,
        Commands::Journal => journal(&connect(config)?, p).await,
        Commands::UserCsv {
            mobile,
            import_csv,
            deputy_csv,
        } => user_csv(config, p, mobile, import_path(config, &import_csv), deputy_csv),
        Commands::AddYear { import_csv } => {
            add_year(&connect(config)?, config, p, &import_path(config, &import_csv)).await
        }
        Commands::DeleteUsers {
            end_of_cycle,
            import_csv,
        } => delete_users(&connect(config)?, config, p, end_of_cycle, &import_path(config, &import_csv)).await,
        Commands::ReinstateUsers { import_csv } => {
            reinstate_users(&connect(config)?, config, p, &import_path(config, &import_csv)).await
        }
        Commands::Api { path } => {
            let client = connect(config)?;
            p.text(format!("Fetching api...{path}"))?;
            let value = client.api(&path).await?;
            p.json(&value)?;
            let count = match &value {
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                _ => 1,
            };
            p.text(format!("{count} API records returned."))
        }
        Commands::Resource { name, join } => resource(&connect(config)?, p, &name, join.as_deref()).await,
        Commands::Explore { id, list } => explore(&connect(config)?, p, id, list).await,
    }
}

async fn resource(
    client: &ResourceClient<DeputyHttpClient>,
    p: &mut ConsolePrinter,
    name: &str,
    join: Option<&str>,
) -> Result<()> {
    p.text(format!("Fetching resource...{name}"))?;
    let mut query = ResourceQuery::new(name);
    if let Some(object) = join {
        query = query.join(object);
    }
    let records = client.fetch::<ResourceRecord>(&query).await?;

    let mut map = Map::new();
    for (key, record) in records.iter() {
        map.insert(key.to_string(), Value::Object(record.0.clone()));
    }
    p.json(&Value::Object(map))?;
    p.text(format!("{} Resource records returned.", records.len()))?;

    if let Some(object) = join {
        let unjoined = records
            .values()
            .filter_map(|record| record.joined(name, object).err())
            .inspect(|missing| tracing::warn!(error = %missing, "Record without joined object"))
            .count();
        p.text(format!("{unjoined} records without {object}."))?;
    }
    Ok(())
}

async fn explore(
    client: &ResourceClient<DeputyHttpClient>,
    p: &mut ConsolePrinter,
    find_id: Option<i64>,
    list: bool,
) -> Result<()> {
    let me = client.me().await?;
    p.text(format!("DeputyVersion: {} running as {}.\n", me.deputy_version, me.name))?;
    let explorer = Explorer::new(client);

    if list {
        p.headers(&["Id", "Name"])?;
        let employees = explorer.all_employees().await?;
        for e in employees.values() {
            p.data(
                format!("[{}] {}", e.id, e.display_name),
                &[e.id.to_string(), e.display_name.clone()],
            )?;
        }
        return p.stats(&[Stat::new("employees", "Employees", employees.len())]);
    }

    p.headers(&["Resource", "Record", "Attribute", "Employee", "Employee Id"])?;
    let results = explorer.scan(REFERENCE_SCANS, find_id).await?;
    for result in &results {
        p.text(format!(
            "Imported {} records from resource {}.",
            result.fetched, result.resource
        ))?;
        for r in &result.references {
            p.data(
                format!("  {r}"),
                &[
                    r.resource.clone(),
                    r.record.to_string(),
                    r.attribute.clone(),
                    r.employee_name.clone().unwrap_or_default(),
                    r.employee_id.to_string(),
                ],
            )?;
        }
    }
    let unknown = results
        .iter()
        .flat_map(|r| &r.references)
        .filter(|r| r.employee_name.is_none())
        .count();
    p.stats(&[
        Stat::new("resources", "Resources", results.len()),
        Stat::new("unknown_employees", "References to unknown employees", unknown),
    ])
}

fn user_csv(
    config: &CliConfig,
    p: &mut ConsolePrinter,
    mobile: bool,
    import_csv: PathBuf,
    deputy_csv: Option<PathBuf>,
) -> Result<()> {
    let deputy_csv = deputy_csv.unwrap_or_else(|| config.import.deputy_csv.clone());
    let import = read_students_file(&import_csv, &config.student_csv_config(mobile))?;
    p.lines(&import.messages)?;

    let out = File::create(&deputy_csv).with_context(|| format!("creating {}", deputy_csv.display()))?;
    write_user_import(out, &import.students)?;

    let mut per_year: BTreeMap<&str, usize> = ["Year1", "Year2", "Year3"].into_iter().map(|y| (y, 0)).collect();
    for student in &import.students {
        if let Some(year) = student.year.as_deref() {
            *per_year.entry(year).or_default() += 1;
        }
    }
    let summary: Vec<String> = per_year.iter().map(|(y, n)| format!("{y}: {n}")).collect();
    p.text(format!("Students in {}", summary.join("; ")))?;
    p.text(format!("Processed {} students.", import.students.len()))?;
    p.text(format!("Wrote {}", deputy_csv.display()))
}

async fn list(client: &ResourceClient<DeputyHttpClient>, p: &mut ConsolePrinter) -> Result<()> {
    p.text("List of Bursary Students and their year level and email.\n")?;
    p.headers(&["Id", "Name", "Year", "Email"])?;
    let list = Views::new(client).bursary_students().await?;
    for s in &list.students {
        p.data(
            format!("[{}] {} ({}, {})", s.id, s.name, s.year, s.email),
            &[s.id.to_string(), s.name.clone(), s.year.clone(), s.email.clone()],
        )?;
    }
    p.stats(&list.stats)
}

async fn report(
    client: &ResourceClient<DeputyHttpClient>,
    config: &CliConfig,
    p: &mut ConsolePrinter,
    hide_ok: bool,
) -> Result<()> {
    let report_config = config.report_config()?;
    p.text("Student compliance report.\n")?;
    p.headers(&[
        "Name",
        "Year",
        "Obligation",
        "Rostered",
        "Open",
        "Completed",
        "% Rostered",
        "% Completed",
        "Issues",
        "Email",
        "Timesheets",
        "Approved Timesheets",
    ])?;
    let report = student_report(client, &report_config).await?;
    for row in report.rows.iter().filter(|r| !(hide_ok && r.is_ok())) {
        p.data(
            format!(
                "{} ({}): {}, {}, {} {} {} {} {}",
                row.name,
                row.year,
                row.obligation,
                row.rostered,
                row.open,
                row.completed,
                row.percent_rostered,
                row.percent_completed,
                row.issues
            ),
            &[
                row.name.clone(),
                row.year.clone(),
                row.obligation.to_string(),
                row.rostered.to_string(),
                row.open.to_string(),
                row.completed.to_string(),
                row.percent_rostered.clone(),
                row.percent_completed.clone(),
                row.issues.clone(),
                row.email.clone(),
                row.timesheets.to_string(),
                row.approved_timesheets.to_string(),
            ],
        )?;
    }
    p.stats(&report.stats)
}

async fn journal(client: &ResourceClient<DeputyHttpClient>, p: &mut ConsolePrinter) -> Result<()> {
    p.text("Journal Entries.\n")?;
    p.headers(&["Date", "Name", "Email", "Category", "Comment", "Creator"])?;
    let (entries, stats) = Views::new(client).journal_entries().await?;
    for e in &entries {
        p.data(
            format!(
                "[{}] {} ({}) [{}] {} (by {})",
                e.date, e.name, e.email, e.category, e.comment, e.creator
            ),
            &[&e.date, &e.name, &e.email, &e.category, &e.comment, &e.creator],
        )?;
    }
    p.stats(&stats)
}

fn print_outcome(p: &mut ConsolePrinter, outcome: &ReconcileOutcome) -> Result<()> {
    p.lines(&outcome.messages)?;
    tracing::info!(summary = ?outcome.summary, "Reconciliation finished");
    Ok(())
}

fn canonical_from_csv(config: &CliConfig, import_csv: &Path) -> Result<HashSet<String>> {
    let import = read_students_file(import_csv, &config.student_csv_config(false))?;
    Ok(canonical_emails(&import.students))
}

async fn add_year(
    client: &ResourceClient<DeputyHttpClient>,
    config: &CliConfig,
    p: &mut ConsolePrinter,
    import_csv: &Path,
) -> Result<()> {
    p.text("Add year level as a TrainingRecord for each student.")?;
    let import = read_students_file(import_csv, &config.student_csv_config(false))?;
    let engine = ReconciliationEngine::new(client, ReconcileConfig::default());
    let outcome = engine.reconcile_years(&import.students).await?;
    print_outcome(p, &outcome)
}

async fn delete_users(
    client: &ResourceClient<DeputyHttpClient>,
    config: &CliConfig,
    p: &mut ConsolePrinter,
    end_of_cycle: bool,
    import_csv: &Path,
) -> Result<()> {
    let canonical = if end_of_cycle {
        p.text("End of cycle: deactivating every bursary student.")?;
        HashSet::new()
    } else {
        p.text("Deactivating bursary students who are not in the student list.")?;
        canonical_from_csv(config, import_csv)?
    };
    let engine = ReconciliationEngine::new(client, ReconcileConfig::default());
    let outcome = engine.reconcile_deletions(&canonical).await?;
    print_outcome(p, &outcome)
}

async fn reinstate_users(
    client: &ResourceClient<DeputyHttpClient>,
    config: &CliConfig,
    p: &mut ConsolePrinter,
    import_csv: &Path,
) -> Result<()> {
    p.text("Reinstating discarded bursary students who are in the student list.")?;
    let canonical = canonical_from_csv(config, import_csv)?;
    let engine = ReconciliationEngine::new(client, ReconcileConfig::default());
    let outcome = engine.reconcile_reinstatements(&canonical).await?;
    print_outcome(p, &outcome)
}
