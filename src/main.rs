mod adapters;
mod config;
mod db;
mod dedupe;
mod discover;
mod fetch;
mod models;
mod reconcile;
mod scrape;
mod seed;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::Config;
use db::Database;
use models::Ats;

#[derive(Parser)]
#[command(name = "boardfeed")]
#[command(about = "Aggregate job postings from ATS provider APIs into one deduplicated dataset")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Scrape verified company boards and upsert their postings
    Scrape {
        /// Scrape only this ATS (greenhouse, lever, ashby, ...)
        #[arg(long)]
        ats: Option<String>,

        /// Scrape only this company slug
        #[arg(long)]
        company: Option<String>,

        /// Max companies to scrape
        #[arg(long)]
        limit: Option<usize>,

        /// Fetch and parse but don't write to the database
        #[arg(long)]
        dry_run: bool,

        /// Ignore any checkpoint and start fresh
        #[arg(long)]
        fresh: bool,
    },

    /// Discover and verify new company boards
    Discover {
        /// Only probe existing unverified companies
        #[arg(long)]
        probe_only: bool,

        /// Only mine the GitHub seed lists
        #[arg(long)]
        github_only: bool,

        /// Only cross-probe name-only companies
        #[arg(long)]
        cross_probe_only: bool,

        /// Don't write to the database
        #[arg(long)]
        dry_run: bool,
    },

    /// Seed companies (and optionally postings) from collected JSON result files
    Seed {
        /// Directory containing JSON result files
        #[arg(long)]
        data_dir: PathBuf,

        /// Substring filter on file names
        #[arg(long)]
        filter: Option<String>,

        /// Also seed postings, not just companies
        #[arg(long)]
        seed_jobs: bool,

        /// Don't write to the database
        #[arg(long)]
        dry_run: bool,
    },

    /// Deactivate stale postings and purge long-inactive ones
    Reconcile {
        /// Report what would change without modifying anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let database = Database::open(&config)?;

    match cli.command {
        Commands::Init => {
            database.init()?;
            println!("Database initialized at {}", database.path().display());
        }

        Commands::Scrape {
            ats,
            company,
            limit,
            dry_run,
            fresh,
        } => {
            let opts = scrape::ScrapeOptions {
                ats: ats.as_deref().map(Ats::resolve).transpose()?,
                company,
                limit,
                dry_run,
                fresh,
            };
            let summary = scrape::run(&config, &database, &opts).await?;

            println!("=== SCRAPE COMPLETE ===");
            println!("Time: {:.1}s", summary.elapsed_secs);
            println!(
                "Companies with postings: {} / {}",
                summary.companies_with_postings, summary.companies_total
            );
            println!("Total postings found: {}", summary.total_found);
            println!("New postings: {}", summary.new_found);
            println!("Errors: {}", summary.errors);
            if !dry_run {
                println!(
                    "Total postings in DB: {}",
                    database.posting_count(false)?
                );
            } else {
                println!("(Dry run - nothing was written)");
            }
        }

        Commands::Discover {
            probe_only,
            github_only,
            cross_probe_only,
            dry_run,
        } => {
            let opts = if probe_only {
                discover::DiscoverOptions {
                    github: false,
                    probe: true,
                    cross_probe: false,
                    dry_run,
                }
            } else if github_only {
                discover::DiscoverOptions {
                    github: true,
                    probe: false,
                    cross_probe: false,
                    dry_run,
                }
            } else if cross_probe_only {
                discover::DiscoverOptions {
                    github: false,
                    probe: false,
                    cross_probe: true,
                    dry_run,
                }
            } else {
                discover::DiscoverOptions {
                    dry_run,
                    ..Default::default()
                }
            };

            let summary = discover::run(&config, &database, &opts).await?;

            println!("=== DISCOVERY COMPLETE ===");
            println!("New candidates recorded: {}", summary.discovered);
            println!(
                "Probed: {} (verified {})",
                summary.probed, summary.verified
            );
            println!("Cross-probe finds: {}", summary.cross_found);
            println!("Errors: {}", summary.errors);
            if !dry_run {
                println!("Total companies in DB: {}", database.company_count()?);
            }
        }

        Commands::Seed {
            data_dir,
            filter,
            seed_jobs,
            dry_run,
        } => {
            let opts = seed::SeedOptions {
                data_dir,
                file_filter: filter,
                seed_jobs,
                dry_run,
            };
            let summary = seed::run(&config, &database, &opts)?;

            println!("=== SEED COMPLETE ===");
            println!("Raw candidates: {}", summary.candidates);
            println!("ATS companies upserted: {}", summary.ats_companies);
            println!("Name-only companies recorded: {}", summary.name_only_companies);
            if seed_jobs {
                println!("Postings seeded: {}", summary.postings_seeded);
            }
            println!("Errors: {}", summary.errors);
        }

        Commands::Reconcile { dry_run } => {
            let summary = reconcile::run(&config, &database, dry_run)?;

            println!("=== RECONCILE COMPLETE ===");
            println!("Deactivated: {}", summary.deactivated);
            println!("Purged: {}", summary.purged);
            println!("Active postings remaining: {}", summary.active_remaining);
            if dry_run {
                println!("(Dry run - nothing was modified)");
            }
        }
    }

    Ok(())
}
