use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use listing_crawler::config::{ConfigLoader, ScraperConfig};
use listing_crawler::output::save_batch;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

#[derive(Parser)]
#[command(name = "listing-crawler")]
#[command(version = "0.1.0")]
#[command(about = "Polite single-site listing scraper", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the listings page and save the extracted records
    Run {
        /// Path to a configuration file (JSON/YAML/TOML); built-in defaults otherwise
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the target site
        #[arg(long)]
        base_url: Option<String>,

        /// Write records as CSV to this file
        #[arg(long)]
        csv: Option<String>,

        /// Write records as JSON to this file
        #[arg(long)]
        json: Option<String>,

        /// Do not fetch robots.txt first
        #[arg(long)]
        skip_robots: bool,

        /// Disable the progress spinner (stderr)
        #[arg(long)]
        no_progress: bool,
    },
    /// Validate a configuration file
    Check {
        /// Path to the configuration file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe { std::env::set_var("RUST_LOG", "info"); }
    }
    let cli = Cli::parse();
    let logger = env_logger::Builder::from_default_env().build();
    let level = logger.filter();
    let multi = Arc::new(MultiProgress::new());

    match cli.command {
        Commands::Run {
            config,
            base_url,
            csv,
            json,
            skip_robots,
            no_progress,
        } => {
            let progress = !no_progress;
            if progress {
                indicatif_log_bridge::LogWrapper::new((*multi).clone(), logger).try_init()?;
            } else {
                log::set_boxed_logger(Box::new(logger))?;
            }
            log::set_max_level(level);

            let mut config_data = match config {
                Some(path) => {
                    log::info!("Loading config from {:?}", path);
                    ConfigLoader::load(&path)?
                }
                None => ScraperConfig::default(),
            };
            if let Some(url) = base_url {
                config_data.base_url = url;
            }
            if let Some(path) = csv {
                config_data.set_csv_path(path);
            }
            if let Some(path) = json {
                config_data.set_json_path(path);
            }
            if skip_robots {
                config_data.check_robots = Some(false);
            }
            config_data.validate()?;

            let site = config_data.base_url()?;
            let mut extractor = ConfigLoader::create_extractor(&config_data)?;
            log::info!("Starting {} scraper against {}", config_data.name, site);

            let spinner = progress.then(|| {
                let pb = multi.add(ProgressBar::new_spinner());
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} [{elapsed_precise}] {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb.enable_steady_tick(Duration::from_millis(120));
                pb
            });

            if config_data.check_robots() {
                if let Some(pb) = &spinner {
                    pb.set_message("Checking robots.txt...");
                }
                extractor.fetcher_mut().check_robots_policy(&site).await;
            }

            if let Some(pb) = &spinner {
                pb.set_message("Scraping listings...");
            }
            let batch = extractor.extract_listings(&site).await;

            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }

            if batch.is_empty() {
                println!("No data scraped. The site structure may have changed.");
            } else {
                println!("Successfully scraped {} records", batch.len());

                let mut outputs = ConfigLoader::create_outputs(&config_data, Some(multi.clone()));
                save_batch(&batch, &mut outputs).await?;

                println!("\nFirst 3 results:");
                for (i, record) in batch.iter().take(3).enumerate() {
                    println!(
                        "{}. {} ({}): {}",
                        i + 1,
                        record.get("name").unwrap_or("?"),
                        record.get("symbol").unwrap_or("-"),
                        record.get("price").unwrap_or("?")
                    );
                }
            }

            println!("\n{}", extractor.stats());
        }
        Commands::Check { config } => {
            match ConfigLoader::load(&config) {
                Ok(cfg) => {
                    println!("✅ Config is valid:");
                    println!("   Name: {}", cfg.name);
                    println!("   Base URL: {}", cfg.base_url);
                    println!("   Listings path: {}", cfg.listings_path);
                    println!("   Card selector: {}", cfg.listing.card_selector);
                    println!(
                        "   Fields: {}",
                        cfg.listing.field_names().collect::<Vec<_>>().join(", ")
                    );
                    println!("   Outputs: {}", cfg.outputs.len());
                }
                Err(e) => {
                    eprintln!("❌ Config error: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
