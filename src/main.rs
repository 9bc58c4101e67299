use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod errors;
mod evaluator;
mod loader;
mod models;
mod report;

use crate::config::GradingPolicy;
use crate::evaluator::Evaluator;
use crate::models::{AttendanceRecord, Category, Snapshot};

#[derive(Parser)]
#[command(name = "performance-evaluator")]
#[command(
    about = "Grades, attendance risk and improvement suggestions for a student",
    long_about = None
)]
struct Cli {
    /// JSON file overriding grading thresholds
    #[arg(long, global = true, env = "EVALUATOR_POLICY")]
    policy: Option<PathBuf>,
    /// Evaluate as of this timestamp instead of the local clock
    #[arg(long, global = true, env = "EVALUATOR_NOW")]
    now: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Categorize activities and build suggestions for a snapshot
    Evaluate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Build a snapshot from a gradebook CSV export
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value_t = 0)]
        absent: u32,
        #[arg(long, default_value_t = 0)]
        late: u32,
        #[arg(long)]
        percentage: Option<f64>,
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        out: PathBuf,
    },
    /// Write a sample snapshot
    Seed {
        #[arg(long, default_value = "snapshot.json")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "performance_evaluator=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let policy =
        GradingPolicy::load(cli.policy.as_deref()).context("failed to load grading policy")?;
    let now = config::resolve_now(cli.now.as_deref()).context("invalid --now value")?;
    let evaluator = Evaluator::new(policy);

    match cli.command {
        Commands::Evaluate { input, format } => {
            let snapshot = loader::load_snapshot(&input)
                .with_context(|| format!("failed to read snapshot {}", input.display()))?;
            let summary = evaluator.evaluate(&snapshot, now);

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                OutputFormat::Text => {
                    match summary.percentage {
                        Some(pct) => println!("Status: {} ({pct:.2}%)", summary.status.label()),
                        None => println!("Status: {}", summary.status.label()),
                    }
                    println!("{}", summary.headline);
                    println!("Activities ({} total):", summary.counts.total);
                    for category in Category::ALL {
                        println!("- {}: {}", category.label(), summary.counts.get(category));
                    }
                    println!(
                        "Effective absences: {}{}",
                        summary.total_effective_absences,
                        if summary.attendance.is_critical {
                            " (droppable)"
                        } else if summary.attendance.is_at_risk {
                            " (at risk)"
                        } else {
                            ""
                        }
                    );
                    if summary.attendance.late_warning {
                        println!(
                            "Late warning: {} more late converts to an absence.",
                            evaluator
                                .policy()
                                .lates_per_absence
                                .saturating_sub(summary.attendance.late_remainder)
                        );
                    }
                    if !summary.suggestions.is_empty() {
                        println!("Suggestions:");
                        for suggestion in summary.suggestions.iter() {
                            println!("- {}", suggestion.text);
                        }
                    }
                }
            }
        }
        Commands::Report { input, out } => {
            let snapshot = loader::load_snapshot(&input)
                .with_context(|| format!("failed to read snapshot {}", input.display()))?;
            let summary = evaluator.evaluate(&snapshot, now);
            let report = report::build_report(&snapshot, &summary, now);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Import {
            csv,
            absent,
            late,
            percentage,
            student,
            subject,
            out,
        } => {
            let activities = loader::import_csv(&csv)
                .with_context(|| format!("failed to import {}", csv.display()))?;
            let count = activities.len();
            let snapshot = Snapshot {
                student,
                subject,
                weighted_percentage: percentage.filter(|p| p.is_finite()),
                attendance: AttendanceRecord { absent, late },
                activities,
            };
            loader::write_snapshot(&out, &snapshot)?;
            println!(
                "Imported {count} activities from {} into {}.",
                csv.display(),
                out.display()
            );
        }
        Commands::Seed { out } => {
            loader::write_snapshot(&out, &loader::sample_snapshot())?;
            println!("Sample snapshot written to {}.", out.display());
        }
    }

    Ok(())
}
