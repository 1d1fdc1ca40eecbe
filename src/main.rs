use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

mod aggregate;
mod config;
mod cycle;
mod db;
mod error;
mod indices;
mod models;
mod persist;
mod report;
mod risk;
mod storage;
mod survey;

use crate::aggregate::ImageCatalog;
use crate::config::Settings;
use crate::cycle::CycleOutcome;
use crate::indices::ComputedIndices;
use crate::models::{Disease, ImageFilter, IndexType};
use crate::storage::{ImageStorage, LocalImageStorage};
use crate::survey::{LeptospirosisInput, LeptospirosisSample, MalariaInput, MalariaSample, SurveySample};

/// Owner for seeded images when no user is configured.
const SEED_OWNER: Uuid = Uuid::from_u128(0x6f1c_2a9e_4d7b_4e3a_9b5f_0c8d_2e71_a4b3);

#[derive(Parser)]
#[command(name = "surveillance-indices")]
#[command(about = "Vector surveillance index calculator and dashboard", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CycleOptions {
    /// Identity that owns saved indices (defaults to SURVEILLANCE_USER_ID)
    #[arg(long)]
    user: Option<Uuid>,
    /// Compute and print without saving
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample surveillance images
    Seed {
        #[arg(long)]
        user: Option<Uuid>,
    },
    /// Calculate and save malaria larval indices
    Malaria {
        #[arg(long)]
        houses_inspected: Option<String>,
        #[arg(long)]
        houses_with_larvae: Option<String>,
        #[arg(long)]
        containers_inspected: Option<String>,
        #[arg(long)]
        containers_with_larvae: Option<String>,
        #[arg(long)]
        positive_containers: Option<String>,
        #[command(flatten)]
        options: CycleOptions,
    },
    /// Calculate and save leptospirosis rodent indices
    Leptospirosis {
        #[arg(long)]
        locations_inspected: Option<String>,
        #[arg(long)]
        locations_with_rodents: Option<String>,
        #[arg(long)]
        total_rodents_caught: Option<String>,
        #[arg(long)]
        infected_rodents: Option<String>,
        #[command(flatten)]
        options: CycleOptions,
    },
    /// Run one calculation cycle per row of a survey CSV
    Import {
        #[arg(long)]
        csv: PathBuf,
        #[command(flatten)]
        options: CycleOptions,
    },
    /// Upload a surveillance image
    Upload {
        #[arg(long, value_enum)]
        disease: Disease,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        user: Option<Uuid>,
    },
    /// List uploaded images, newest first
    Images {
        #[arg(long, value_enum)]
        disease: Option<Disease>,
    },
    /// Show dashboard image counts
    Dashboard {
        #[arg(long, value_enum)]
        disease: Option<Disease>,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown dashboard report
    Report {
        #[arg(long, value_enum)]
        disease: Option<Disease>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("surveillance_indices=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;
    init_tracing();

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&settings).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed { user } => {
            let owner = settings.current_user(user).unwrap_or(SEED_OWNER);
            let pool = connect(&settings).await?;
            let inserted = db::seed(&pool, owner).await?;
            println!("Inserted {inserted} sample images.");
        }
        Commands::Malaria {
            houses_inspected,
            houses_with_larvae,
            containers_inspected,
            containers_with_larvae,
            positive_containers,
            options,
        } => {
            let sample = SurveySample::Malaria(MalariaSample::validate(&MalariaInput {
                houses_inspected,
                houses_with_larvae,
                containers_inspected,
                containers_with_larvae,
                positive_containers,
            }));
            let owner = settings.cycle_owner(options.user, options.dry_run);
            let store = cycle_store(&settings, owner)?;
            let outcome = cycle::run_cycle(store.as_ref(), owner, sample).await;
            print_cycle(&outcome, owner.is_some());
        }
        Commands::Leptospirosis {
            locations_inspected,
            locations_with_rodents,
            total_rodents_caught,
            infected_rodents,
            options,
        } => {
            let sample =
                SurveySample::Leptospirosis(LeptospirosisSample::validate(&LeptospirosisInput {
                    locations_inspected,
                    locations_with_rodents,
                    total_rodents_caught,
                    infected_rodents,
                }));
            let owner = settings.cycle_owner(options.user, options.dry_run);
            let store = cycle_store(&settings, owner)?;
            let outcome = cycle::run_cycle(store.as_ref(), owner, sample).await;
            print_cycle(&outcome, owner.is_some());
        }
        Commands::Import { csv, options } => {
            let samples = cycle::read_survey_file(&csv)
                .with_context(|| format!("failed to read {}", csv.display()))?;
            let owner = settings.cycle_owner(options.user, options.dry_run);
            let store = cycle_store(&settings, owner)?;
            let mut saved = 0usize;
            let mut failed = 0usize;

            for (row, sample) in samples.into_iter().enumerate() {
                let outcome = cycle::run_cycle(store.as_ref(), owner, sample).await;
                println!("Row {}:", row + 1);
                print_cycle(&outcome, owner.is_some());
                if let Some(report) = &outcome.persistence {
                    saved += report.saved();
                    failed += report.failures().count();
                }
            }

            println!("Saved {saved} indices from {} ({failed} failed).", csv.display());
        }
        Commands::Upload {
            disease,
            file,
            description,
            user,
        } => {
            let owner = settings
                .current_user(user)
                .context("sign in first: pass --user or set SURVEILLANCE_USER_ID")?;
            let storage =
                LocalImageStorage::new(&settings.storage_root, settings.storage_quota_bytes);
            let stored = storage
                .upload_image(owner, disease, &file)
                .await
                .context("failed to upload image")?;
            let pool = connect(&settings).await?;
            let id = db::record_image(
                &pool,
                owner,
                disease,
                &stored.file_path,
                &stored.file_name,
                description.as_deref(),
            )
            .await?;
            println!("Image uploaded successfully ({id}).");
        }
        Commands::Images { disease } => {
            let store = db::PgSurveillanceStore::new(connect(&settings).await?);
            let storage =
                LocalImageStorage::new(&settings.storage_root, settings.storage_quota_bytes);
            let filter = disease.map_or_else(ImageFilter::all, ImageFilter::disease);
            let images = store
                .list_images(&filter)
                .await
                .context("failed to fetch images")?;

            if images.is_empty() {
                println!("No images uploaded yet.");
                return Ok(());
            }

            for image in &images {
                println!(
                    "- {} [{}] {} {}",
                    image.uploaded_at.date_naive(),
                    image.disease,
                    image.file_name,
                    storage.resolve(&image.file_path).display()
                );
                if let Some(description) = &image.description {
                    println!("    {description}");
                }
            }
        }
        Commands::Dashboard { disease, json } => {
            let store = db::PgSurveillanceStore::new(connect(&settings).await?);
            let dashboard = aggregate::get_dashboard_stats(&store, disease, Utc::now()).await;
            if !dashboard.failures.is_empty() {
                eprintln!("Failed to load some dashboard counts; they are shown as 0.");
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&dashboard.stats)?);
            } else {
                let stats = dashboard.stats;
                println!("Total images:         {}", stats.total_images);
                println!("Malaria images:       {}", stats.malaria_images);
                println!("Leptospirosis images: {}", stats.leptospirosis_images);
                println!(
                    "Recent uploads:       {} (last {} days)",
                    stats.recent_uploads,
                    aggregate::RECENT_WINDOW_DAYS
                );
            }
        }
        Commands::Report { disease, out } => {
            let now = Utc::now();
            let store = db::PgSurveillanceStore::new(connect(&settings).await?);
            let dashboard = aggregate::get_dashboard_stats(&store, disease, now).await;
            let filter = disease.map_or_else(ImageFilter::all, ImageFilter::disease);
            let images = store
                .list_images(&filter)
                .await
                .context("failed to fetch images")?;
            let report = report::build_report(disease, now, &dashboard, &images);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn connect(settings: &Settings) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect(settings.require_database_url()?)
        .await
        .context("failed to connect to Postgres")
}

/// A store only when the cycle has an owner to save for. The pool connects on
/// first write, so an unreachable database shows up as failed writes.
fn cycle_store(
    settings: &Settings,
    owner: Option<Uuid>,
) -> anyhow::Result<Option<db::PgSurveillanceStore>> {
    if owner.is_none() {
        return Ok(None);
    }

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect_lazy(settings.require_database_url()?)
        .context("invalid DATABASE_URL")?;
    Ok(Some(db::PgSurveillanceStore::new(pool)))
}

/// Why an index has no value: its counters are missing, or the denominator is zero.
fn missing_reason(sample: &SurveySample, index_type: IndexType) -> &'static str {
    let computable = match sample {
        SurveySample::Malaria(m) => {
            let flags = m.computable();
            match index_type {
                IndexType::HouseIndex => flags.house_index,
                IndexType::ContainerIndex => flags.container_index,
                _ => flags.breteau_index,
            }
        }
        SurveySample::Leptospirosis(l) => {
            let flags = l.computable();
            match index_type {
                IndexType::RodentIndex => flags.rodent_index,
                _ => flags.infection_rate,
            }
        }
    };

    if computable {
        "zero denominator"
    } else {
        "missing counts"
    }
}

fn print_cycle(outcome: &CycleOutcome, signed_in: bool) {
    let rows: Vec<(IndexType, Option<f64>)> = match &outcome.indices {
        ComputedIndices::Malaria(m) => vec![
            (IndexType::HouseIndex, m.house_index),
            (IndexType::ContainerIndex, m.container_index),
            (IndexType::BreteauIndex, m.breteau_index),
        ],
        ComputedIndices::Leptospirosis(l) => vec![
            (IndexType::RodentIndex, l.rodent_index),
            (IndexType::InfectionRate, l.infection_rate),
        ],
    };

    for (field, raw) in outcome.sample.invalid_fields() {
        println!("  ! {field}: '{raw}' is not a count");
    }

    for (index_type, value) in rows {
        match value {
            Some(value) => println!(
                "  {:<16} {}",
                index_type.label(),
                index_type.format_value(value)
            ),
            None => println!(
                "  {:<16} -- ({})",
                index_type.label(),
                missing_reason(&outcome.sample, index_type)
            ),
        }
    }

    if let ComputedIndices::Leptospirosis(l) = &outcome.indices {
        match l.risk_level {
            Some(level) => println!("  {:<16} {level}: {}", "Risk Level", level.guidance()),
            None => println!("  {:<16} --", "Risk Level"),
        }
    }

    match &outcome.persistence {
        Some(report) if report.is_complete() => {
            println!("  Indices calculated and saved successfully.");
        }
        Some(report) => {
            for outcome in &report.outcomes {
                println!("  {}", outcome.describe());
            }
            if report.is_partial() {
                println!(
                    "  Saved {} of {} indices.",
                    report.saved(),
                    report.outcomes.len()
                );
            }
        }
        None if !signed_in => println!("  Not saved (no signed-in user or dry run)."),
        None => println!("  Nothing to save."),
    }
}
