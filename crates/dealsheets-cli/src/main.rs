//! Dealsheets CLI - deal calculations synced with the CRM

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dealsheets::catalog::CATALOG_FILE;
use dealsheets::{Pipeline, Settings};
use dealsheets_crm::WebhookClient;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dealsheets")]
#[command(author, version, about = "Deal calculation spreadsheets synced with the CRM")]
struct Cli {
    /// Settings file (default: ./dealsheets.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a deal into a fresh calculation and field dump
    Import {
        /// Deal ID
        deal: u64,
    },

    /// Replace the deal's line items with the edited calculation
    Export {
        /// Deal ID
        deal: u64,

        /// Price profile to export with (default: entered prices)
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Export once per configured price profile
    ExportProfiles {
        /// Deal ID
        deal: u64,
    },

    /// Write only the field dump of a deal
    Dump {
        /// Deal ID
        deal: u64,
    },

    /// Set deal prices from the catalog purchase price of a shipper
    Reprice {
        /// Deal ID
        deal: u64,

        /// Shipping company
        #[arg(short, long, value_enum)]
        shipper: Shipper,
    },

    /// Export the whole product catalog
    Catalog {
        /// Output file
        #[arg(short, long, default_value = CATALOG_FILE)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Shipper {
    Ooo,
    Ip,
}

impl Shipper {
    fn name(self) -> &'static str {
        match self {
            Shipper::Ooo => "ООО",
            Shipper::Ip => "ИП",
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    tracing::debug!(
        template = %settings.template_path.display(),
        output = %settings.output_dir.display(),
        "settings loaded"
    );
    let pipeline = connect(settings)?;

    match cli.command {
        Commands::Import { deal } => import(&pipeline, deal),
        Commands::Export { deal, profile } => export(&pipeline, deal, profile.as_deref()),
        Commands::ExportProfiles { deal } => export_profiles(&pipeline, deal),
        Commands::Dump { deal } => dump(&pipeline, deal),
        Commands::Reprice { deal, shipper } => reprice(&pipeline, deal, shipper),
        Commands::Catalog { output } => catalog(&pipeline, &output),
    }
}

fn connect(settings: Settings) -> Result<Pipeline<WebhookClient>> {
    let url = settings.require_webhook()?;
    let client = WebhookClient::with_timeout(url, Duration::from_secs(settings.timeout_secs))
        .context("Failed to create the CRM client")?;
    Ok(Pipeline::new(client, settings))
}

fn import(pipeline: &Pipeline<WebhookClient>, deal: u64) -> Result<()> {
    let report = match pipeline
        .import(deal)
        .with_context(|| format!("Failed to import deal {}", deal))?
    {
        Some(report) => report,
        None => {
            eprintln!("Deal {} has no line items", deal);
            return Ok(());
        }
    };

    if let Some(archived) = &report.archived {
        println!(
            "Archived {} previous file(s) to {}",
            archived.moved,
            archived.folder.display()
        );
    }
    if let Some(dump) = &report.dump {
        println!("Field dump:  {}", dump.display());
    }
    println!("Calculation: {}", report.calculation.display());
    println!("Line items:  {}", report.items);
    Ok(())
}

fn export(pipeline: &Pipeline<WebhookClient>, deal: u64, profile: Option<&str>) -> Result<()> {
    let report = pipeline
        .export_profile(deal, profile)
        .with_context(|| format!("Failed to export deal {}", deal))?;
    println!("Sent {} row(s) to deal {} ({})", report.rows, deal, report.source);
    Ok(())
}

fn export_profiles(pipeline: &Pipeline<WebhookClient>, deal: u64) -> Result<()> {
    let reports = pipeline
        .export_all_profiles(deal)
        .with_context(|| format!("Failed to export deal {}", deal))?;
    for report in reports {
        println!("Sent {} row(s) to deal {} ({})", report.rows, deal, report.source);
    }
    Ok(())
}

fn dump(pipeline: &Pipeline<WebhookClient>, deal: u64) -> Result<()> {
    match pipeline
        .dump(deal)
        .with_context(|| format!("Failed to dump deal {}", deal))?
    {
        Some(path) => println!("Field dump: {}", path.display()),
        None => eprintln!("Nothing to dump for deal {}", deal),
    }
    Ok(())
}

fn reprice(pipeline: &Pipeline<WebhookClient>, deal: u64, shipper: Shipper) -> Result<()> {
    let repriced = pipeline
        .reprice(deal, shipper.name())
        .with_context(|| format!("Failed to reprice deal {}", deal))?;
    println!(
        "Repriced {} row(s) of deal {} for {}",
        repriced,
        deal,
        shipper.name()
    );
    Ok(())
}

fn catalog(pipeline: &Pipeline<WebhookClient>, output: &Path) -> Result<()> {
    let count = pipeline
        .catalog(output)
        .with_context(|| format!("Failed to write '{}'", output.display()))?;
    println!("Wrote {} product(s) to '{}'", count, output.display());
    Ok(())
}
