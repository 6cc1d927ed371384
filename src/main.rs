use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use apt_intel::aggregate::Aggregator;
use apt_intel::config::Settings;
use apt_intel::export;
use apt_intel::fetch::HttpFetcher;
use apt_intel::model::{Query, Source};
use apt_intel::report;

#[derive(Parser)]
#[command(name = "apt-intel", about = "Aggregate APT group intelligence from public sources")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search every source for one threat actor
    Search {
        /// Group name or alias (prompted for when omitted)
        query: Option<String>,
        /// Print the aggregate as JSON instead of the text report
        #[arg(long)]
        json: bool,
        /// Where MITRE Navigator/report files are written
        #[arg(long, default_value = ".")]
        export_dir: PathBuf,
        /// Skip writing MITRE files
        #[arg(long)]
        no_export: bool,
        /// Per-request timeout in seconds (overrides config)
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// List the sources that are searched
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    match cli.command {
        Commands::Sources => {
            let settings = Settings::load()?;
            for source in Source::ALL {
                println!("{:<18} {}", source.name(), source_url(&settings, source));
            }
            Ok(())
        }
        Commands::Search {
            query,
            json,
            export_dir,
            no_export,
            timeout,
        } => {
            let raw = match query {
                Some(q) => q,
                None => prompt("Enter APT group name to search: ")?,
            };
            let Some(query) = Query::new(&raw) else {
                eprintln!("Please enter a valid APT name.");
                return Ok(());
            };

            let mut settings = Settings::load()?;
            settings.override_timeout(timeout);
            let fetcher = HttpFetcher::new(&settings).context("Failed to build HTTP client")?;
            let aggregator = Aggregator::with_defaults(&settings, Arc::new(fetcher));

            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
            );
            pb.set_message(format!(
                "Searching {} sources for {}",
                aggregator.sources().len(),
                query
            ));
            pb.enable_steady_tick(Duration::from_millis(120));
            let result = aggregator.run(&query).await;
            pb.finish_and_clear();

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", report::render(&result));
            }

            if !no_export {
                let saved = export::write_all(&export_dir, &query, result.groups())?;
                if !saved.is_empty() {
                    eprintln!("\nFiles saved:");
                    for path in &saved {
                        let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
                        eprintln!("   {} ({} bytes)", path.display(), size);
                    }
                }
            }

            let elapsed = t0.elapsed();
            if elapsed.as_secs() >= 1 {
                eprintln!("\nDone in {}", format_duration(elapsed));
            }
            Ok(())
        }
    }
}

fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn source_url(settings: &Settings, source: Source) -> &str {
    let s = &settings.sources;
    match source {
        Source::Etda => &s.etda_base,
        Source::Mitre => &s.mitre_base,
        Source::GoogleCloud => &s.google_cloud_url,
        Source::NetEnrich => &s.netenrich_base,
        Source::SocRadar => &s.socradar_base,
        Source::Pulsedive => &s.pulsedive_base,
        Source::QiAnXin => &s.qianxin_base,
        Source::Malpedia => &s.malpedia_base,
        Source::AptNotes => &s.aptnotes_url,
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
