use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{Datelike, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod csv_codec;
mod editor;
mod models;
mod report;
mod store;
mod trends;

use config::{Config, Overrides};
use editor::EntryDraft;
use models::{Entry, Question};
use store::{RecordStore, Upserted};
use trends::EntryFilter;

#[derive(Parser)]
#[command(name = "survey-trends")]
#[command(about = "Record course survey results and report participant-weighted trends", long_about = None)]
struct Cli {
    /// Config file (defaults to .survey-trends.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory holding the persisted settings and entries
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true, allow_negative_numbers = true)]
    scale_min: Option<f64>,
    #[arg(long, global = true, allow_negative_numbers = true)]
    scale_max: Option<f64>,
    /// URL of the upstream survey source
    #[arg(long, global = true)]
    source_url: Option<String>,
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    InitConfig,
    /// Load realistic sample entries
    Seed,
    /// Record a new survey entry
    Add {
        #[command(flatten)]
        fields: EntryFields,
    },
    /// Change fields of an existing entry
    Edit {
        #[arg(long)]
        id: String,
        #[command(flatten)]
        fields: EntryFields,
    },
    /// Delete an entry by id
    Remove {
        #[arg(long)]
        id: String,
    },
    /// List entries
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Show the question schema
    Questions,
    /// Rename a question
    Label {
        #[arg(long)]
        question: String,
        #[arg(long)]
        label: String,
    },
    /// Merge entries from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Write all entries to a CSV file
    Export {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the monthly weighted trend
    Trends {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Print quick stats
    Stats {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Generate a markdown dashboard
    Report {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct EntryFields {
    #[arg(long)]
    course: Option<String>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    month: Option<u32>,
    #[arg(long, allow_negative_numbers = true)]
    participants: Option<i64>,
    /// Score as QUESTION=VALUE, repeatable
    #[arg(long = "score", value_parser = parse_score)]
    scores: Vec<(String, String)>,
}

impl EntryFields {
    fn apply(self, draft: &mut EntryDraft) {
        if let Some(course) = self.course {
            draft.course = course;
        }
        if let Some(year) = self.year {
            draft.year = year;
        }
        if let Some(month) = self.month {
            draft.month = month;
        }
        if let Some(participants) = self.participants {
            draft.participants = participants;
        }
        for (question_id, raw) in self.scores {
            draft.set_score(&question_id, &raw);
        }
    }
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    course: Option<String>,
}

impl From<FilterArgs> for EntryFilter {
    fn from(args: FilterArgs) -> Self {
        EntryFilter {
            year: args.year,
            course: args.course,
        }
    }
}

fn parse_score(value: &str) -> Result<(String, String), String> {
    let (question, score) = value
        .split_once('=')
        .ok_or_else(|| format!("expected QUESTION=VALUE, got {value:?}"))?;
    Ok((question.trim().to_string(), score.trim().to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    config.merge(&Overrides {
        data_dir: cli.data_dir.clone(),
        scale_min: cli.scale_min,
        scale_max: cli.scale_max,
        source_url: cli.source_url.clone(),
    });
    let scale = config.scale()?;
    if let Some(ref url) = config.source.url {
        debug!("Source URL configured: {url}");
    }

    let mut store = RecordStore::open(&config.storage.data_dir, scale);
    info!("Using data directory {}", store.dir().display());
    store
        .apply_scale(scale)
        .context("failed to persist scale settings")?;

    match cli.command {
        Commands::InitConfig => init_config()?,
        Commands::Seed => {
            let entries = seed_entries(&store)?;
            let summary = store.merge(entries)?;
            println!(
                "Seed data loaded ({} new, {} updated).",
                summary.inserted, summary.replaced
            );
        }
        Commands::Add { fields } => {
            let today = Utc::now().date_naive();
            let mut draft = EntryDraft {
                year: today.year(),
                month: today.month(),
                ..EntryDraft::default()
            };
            fields.apply(&mut draft);
            save_draft(&mut store, &draft)?;
        }
        Commands::Edit { id, fields } => {
            let Some(existing) = store.find(&id) else {
                bail!("no entry with id {id}");
            };
            let mut draft = EntryDraft::from_entry(existing);
            fields.apply(&mut draft);
            save_draft(&mut store, &draft)?;
        }
        Commands::Remove { id } => {
            if store.remove(&id)? {
                println!("Removed entry {id}.");
            } else {
                println!("No entry with id {id}; nothing removed.");
            }
        }
        Commands::List { filter } => {
            let entries = EntryFilter::from(filter).apply(store.entries());
            if entries.is_empty() {
                println!("No entries recorded.");
            }
            for entry in &entries {
                print_entry(entry, &store.settings().questions);
            }
        }
        Commands::Questions => {
            for question in &store.settings().questions {
                println!("{}: {}", question.id, question.label);
            }
        }
        Commands::Label { question, label } => {
            if !store.rename_question(&question, &label)? {
                bail!("no question with id {question}");
            }
            println!("Question {question} is now labelled {label:?}.");
        }
        Commands::Import { csv } => {
            let text = tokio::fs::read_to_string(&csv)
                .await
                .with_context(|| format!("failed to read {}", csv.display()))?;
            let decoded = csv_codec::decode(&text, &store.settings().question_ids(), scale)
                .with_context(|| format!("failed to import {}", csv.display()))?;
            let summary = store.merge(decoded.entries)?;
            println!(
                "Imported {} entries ({} new, {} updated) from {}.",
                summary.inserted + summary.replaced,
                summary.inserted,
                summary.replaced,
                csv.display()
            );
            for row in &decoded.skipped {
                println!("- skipped line {}: {}", row.line, row.reason);
            }
        }
        Commands::Export { out } => {
            let out = out.unwrap_or_else(|| PathBuf::from(&config.export.file_name));
            let text = csv_codec::encode(store.entries(), &store.settings().question_ids())?;
            std::fs::write(&out, text)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Exported {} entries to {}.", store.entries().len(), out.display());
        }
        Commands::Trends { filter } => {
            let entries = EntryFilter::from(filter).apply(store.entries());
            let settings = store.settings();
            let months = trends::aggregate(&entries, &settings.questions);

            if months.is_empty() {
                println!("No entries match these filters.");
                return Ok(());
            }

            println!("Weighted overall by month:");
            for month in &months {
                println!(
                    "- {} {} across {} entries ({} participants) {}",
                    month.label(),
                    report::format_score(month.overall),
                    month.entries,
                    month.participants,
                    report::score_bar(month.overall, settings)
                );
                for question in &settings.questions {
                    println!(
                        "    {}: {}",
                        question.label,
                        report::format_score(month.question(&question.id))
                    );
                }
            }
        }
        Commands::Stats { filter } => {
            let entries = EntryFilter::from(filter).apply(store.entries());
            let stats = trends::quick_stats(&entries, &store.settings().questions);
            for line in report::format_stats(&stats) {
                println!("{line}");
            }
            let years: Vec<String> = trends::years(store.entries())
                .iter()
                .map(i32::to_string)
                .collect();
            println!("Years on record: {}", years.join(", "));
            println!("Courses on record: {}", trends::courses(store.entries()).join(", "));
        }
        Commands::Report { filter, out } => {
            let report = report::build_report(
                &EntryFilter::from(filter),
                store.settings(),
                store.entries(),
                Utc::now().date_naive(),
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn init_config() -> anyhow::Result<()> {
    let path = std::path::Path::new(config::DEFAULT_CONFIG_FILE);
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Created {} with default settings.", path.display());
    Ok(())
}

fn load_config(explicit: Option<&std::path::Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        info!("Loading config from {}", path.display());
        return Ok(Config::load(path)?);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded config from {}", config::DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(err) => {
            warn!("Failed to load config: {err}");
            Ok(Config::default())
        }
    }
}

fn save_draft(store: &mut RecordStore, draft: &EntryDraft) -> anyhow::Result<()> {
    let entry = editor::submit(draft, store.settings()).context("entry rejected")?;
    let id = entry.id.clone();
    match store.upsert(entry)? {
        Upserted::Inserted => println!("Added entry {id}."),
        Upserted::Replaced => println!("Updated entry {id}."),
    }
    Ok(())
}

fn print_entry(entry: &Entry, questions: &[Question]) {
    println!(
        "{} {:04}-{:02} {} ({} participants) overall {}",
        entry.id,
        entry.year,
        entry.month,
        entry.course,
        entry.participants,
        report::format_score(trends::entry_overall(entry, questions).map(trends::round2))
    );
}

fn seed_entries(store: &RecordStore) -> anyhow::Result<Vec<Entry>> {
    let rows = [
        ("seed-001", "Intro to Data Analysis", 2025, 9, 16, ["9.4", "9.0", "9.2", "9.1", "9.3"]),
        ("seed-002", "Web Foundations", 2025, 9, 20, ["9.0", "9.2", "9.1", "9.0", "9.2"]),
        ("seed-003", "Intro to Data Analysis", 2025, 10, 14, ["8.8", "9.1", "", "8.6", "9.0"]),
        ("seed-004", "Web Foundations", 2025, 10, 22, ["8.9", "8.7", "9.0", "", "8.8"]),
        ("seed-005", "Career Readiness", 2025, 11, 11, ["9.5", "9.6", "9.3", "9.2", "9.7"]),
    ];

    let question_ids = store.settings().question_ids();
    let mut entries = Vec::new();
    for (id, course, year, month, participants, scores) in rows {
        let draft = EntryDraft {
            id: Some(id.to_string()),
            course: course.to_string(),
            year,
            month,
            participants,
            scores: question_ids
                .iter()
                .cloned()
                .zip(scores.iter().map(|s| s.to_string()))
                .collect(),
        };
        entries.push(editor::submit(&draft, store.settings()).context("invalid seed entry")?);
    }
    Ok(entries)
}
