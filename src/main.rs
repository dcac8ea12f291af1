use anyhow::Result;
use appcursor::{
    config::{Config, Theme},
    output::{print_history, print_inventory, print_json, print_profile, print_status, OutputFormat},
    profile, AppService, ScanOutcome,
};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exit codes for scripting
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const SCAN_FAILED: u8 = 2;
    pub const NOT_FOUND: u8 = 3;
    pub const SEND_FAILED: u8 = 4;
}

#[derive(Parser)]
#[command(name = "appcursor")]
#[command(
    author,
    version,
    about = "Inventory installed applications and serve them over a local HTTP API"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API until interrupted
    Serve {
        /// Address to bind
        #[arg(long, default_value = appcursor::server::DEFAULT_HOST)]
        host: String,

        /// Port to bind (defaults to the configured api_port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Start a background scan once the server is up
        #[arg(long)]
        scan: bool,
    },

    /// Collect the installed applications and store them
    Scan {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// List stored applications
    Inventory {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// List recorded scans, newest first
    History {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Delete one stored application
    DeleteApp {
        /// Application id
        id: i64,
    },

    /// Delete one scan result
    DeleteScan {
        /// Scan result id
        id: i64,
    },

    /// Write the system profile and inventory as JSON
    Export {
        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload the export document to the configured remote URL
    Send,

    /// Show the system profile
    Profile {
        /// Output format (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Show, create or edit the config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,

        /// Set the API port
        #[arg(long)]
        api_port: Option<u16>,

        /// Move the inventory database
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Set the theme (dark, light, windows98)
        #[arg(long)]
        theme: Option<String>,

        /// Start the API with the application
        #[arg(long)]
        auto_start_api: Option<bool>,

        /// Upload endpoint (http/https); empty clears it
        #[arg(long)]
        remote_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("appcursor=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

async fn run() -> Result<u8> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port, scan } => serve(&host, port, scan).await,
        Commands::Scan { format } => run_scan(parse_format(&format)?).await,
        Commands::Inventory { format } => {
            let service = AppService::open()?;
            print_inventory(&service.fetch_cached_inventory()?, parse_format(&format)?)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::History { format } => {
            let service = AppService::open()?;
            let records = service.context().store().fetch_scan_results()?;
            print_history(&records, parse_format(&format)?)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::DeleteApp { id } => {
            let service = AppService::open()?;
            let removed = service.context().store().delete_application(id)?;
            Ok(report_delete("Application", id, removed))
        }
        Commands::DeleteScan { id } => {
            let service = AppService::open()?;
            let removed = service.context().store().delete_scan_result(id)?;
            Ok(report_delete("Scan result", id, removed))
        }
        Commands::Export { output } => {
            let service = AppService::open()?;
            let document = service.context().export_document().await?;
            match output {
                Some(path) => {
                    document.write_to(&path)?;
                    eprintln!("Export written to: {}", path.display());
                }
                None => print_json(&document)?,
            }
            Ok(exit_codes::SUCCESS)
        }
        Commands::Send => {
            let service = AppService::open()?;
            let outcome = service.context().send_inventory().await?;
            print_json(&outcome)?;
            if outcome.success {
                Ok(exit_codes::SUCCESS)
            } else {
                Ok(exit_codes::SEND_FAILED)
            }
        }
        Commands::Profile { format } => {
            let profile = profile::collect().await;
            print_profile(&profile, parse_format(&format)?)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config {
            init,
            path,
            api_port,
            db_path,
            theme,
            auto_start_api,
            remote_url,
        } => {
            let edits = ConfigEdits {
                api_port,
                db_path,
                theme,
                auto_start_api,
                remote_url,
            };
            handle_config(init, path, edits)?;
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn parse_format(format: &str) -> Result<OutputFormat> {
    OutputFormat::from_str(format).map_err(|e| anyhow::anyhow!(e))
}

async fn serve(host: &str, port: Option<u16>, scan: bool) -> Result<u8> {
    let service = AppService::open()?;
    let outcome = service.start_api(Some(host), port).await?;
    println!("API listening on http://{}/api/v1", outcome.addr());

    if scan {
        match service.context().trigger_scan() {
            Ok(_) => info!("initial scan started"),
            Err(e) => info!(error = %e, "initial scan not started"),
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    service.close().await?;
    Ok(exit_codes::SUCCESS)
}

async fn run_scan(format: OutputFormat) -> Result<u8> {
    let service = AppService::open()?;
    let is_interactive = format == OutputFormat::Table;

    let progress = if is_interactive {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Collecting installed applications...");
        Some(pb)
    } else {
        None
    };

    let outcome = service.run_scan().await;

    if let Some(pb) = progress {
        match &outcome {
            ScanOutcome::Completed { count } => {
                pb.finish_with_message(format!("Stored {} applications", count))
            }
            ScanOutcome::Failed { .. } => pb.finish_with_message("Scan failed"),
            ScanOutcome::Skipped => pb.finish_with_message("Scan skipped"),
        }
    }

    if is_interactive {
        println!();
        print_status(&service.get_status());
        if let ScanOutcome::Failed { message } = &outcome {
            println!();
            println!("Error: {}", message);
        }
    } else {
        print_json(&outcome)?;
    }

    service.close().await?;

    match outcome {
        ScanOutcome::Failed { .. } => Ok(exit_codes::SCAN_FAILED),
        _ => Ok(exit_codes::SUCCESS),
    }
}

fn report_delete(kind: &str, id: i64, removed: usize) -> u8 {
    if removed == 0 {
        eprintln!("{} {} not found.", kind, id);
        exit_codes::NOT_FOUND
    } else {
        println!("{} {} deleted.", kind, id);
        exit_codes::SUCCESS
    }
}

struct ConfigEdits {
    api_port: Option<u16>,
    db_path: Option<PathBuf>,
    theme: Option<String>,
    auto_start_api: Option<bool>,
    remote_url: Option<String>,
}

impl ConfigEdits {
    fn is_empty(&self) -> bool {
        self.api_port.is_none()
            && self.db_path.is_none()
            && self.theme.is_none()
            && self.auto_start_api.is_none()
            && self.remote_url.is_none()
    }
}

fn handle_config(init: bool, show_path: bool, edits: ConfigEdits) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if !edits.is_empty() {
        return apply_config_edits(edits);
    }

    // Show current config
    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'appcursor config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}

/// Applies edits through the service setters so the database move and URL
/// validation behave as they do for the API. Port and auto-start only
/// affect a running server, so they are written straight to the file.
fn apply_config_edits(edits: ConfigEdits) -> Result<()> {
    let service = AppService::open()?;

    if let Some(theme) = edits.theme {
        let theme = Theme::from_str(&theme).map_err(|e| anyhow::anyhow!(e))?;
        service.set_theme(theme)?;
    }
    if let Some(url) = edits.remote_url {
        service.set_remote_url(&url)?;
    }
    if let Some(path) = edits.db_path {
        service.set_db_path(path)?;
    }

    if edits.api_port.is_some() || edits.auto_start_api.is_some() {
        let mut config = service.get_config();
        if let Some(port) = edits.api_port {
            config.api_port = port;
        }
        if let Some(enabled) = edits.auto_start_api {
            config.auto_start_api = enabled;
        }
        config.save_to(service.context().config_path())?;
    }

    println!("Config updated: {}", service.context().config_path().display());
    Ok(())
}
