mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use mediashelf::App;
use ms_av::{FfprobeProber, Prober, ToolKind, ToolRegistry};
use ms_core::config::Config;
use ms_core::MediaStatus;
use ms_db::pool::{get_conn, init_pool};
use ms_db::queries::media;

async fn start(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);
    for warning in config.validate() {
        tracing::warn!("Config: {warning}");
    }

    tracing::info!("Starting mediashelf");
    let app = App::create(config)?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    tracing::info!("Shutting down...");
    app.shutdown().await;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediashelf=trace,ms_harvest=trace,ms_db=debug,ms_av=debug,ms_core=debug".to_string()
        } else {
            "mediashelf=debug,ms_harvest=debug,ms_db=info,ms_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start(cli.config.as_deref()))
        }
        Commands::Add { files } => add_files(&files, cli.config.as_deref()),
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, cli.config.as_deref()))
        }
        Commands::Status => show_status(cli.config.as_deref()),
        Commands::ResetFailed => reset_failed(cli.config.as_deref()),
        Commands::CheckTools => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(check_tools(cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mediashelf {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn add_files(files: &[std::path::PathBuf], config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let pool = init_pool(&config.database.path)?;
    let conn = get_conn(&pool)?;

    let mut added = 0;
    for file in files {
        let path = match file.canonicalize() {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Skipping {}: {e}", file.display());
                continue;
            }
        };
        let path_str = path.to_string_lossy();

        if let Some(existing) = media::get_media_by_path(&conn, &path_str)? {
            println!("{} already indexed ({})", existing.id, path.display());
            continue;
        }

        let record = media::insert_media(&conn, &path_str, MediaStatus::Available)?;
        println!("{} {}", record.id, record.path);
        added += 1;
    }

    println!("Added {added} file(s)");
    Ok(())
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools);
    let ffprobe = tools.require(ToolKind::Ffprobe)?;

    let prober = FfprobeProber::new(config.tools.probe_timeout());
    let result = prober.extract(ffprobe, file).await.ok_or_else(|| {
        ms_core::Error::Probe(format!("no usable video stream in {}", file.display()))
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("File: {}", file.display());
        let secs = result.duration as u64;
        println!(
            "Duration: {:02}:{:02}:{:02} ({:.3}s)",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            result.duration
        );
        println!("Video: {} {}x{}", result.codec, result.width, result.height);
        println!("Frame rate: {:.3} fps", result.fps);
        if !result.tags.is_empty() {
            println!("\nTags:");
            for (key, value) in &result.tags {
                println!("  {key}: {value}");
            }
        }
    }

    Ok(())
}

fn show_status(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let pool = init_pool(&config.database.path)?;
    let conn = get_conn(&pool)?;

    let counts = media::count_by_metadata_status(&conn)?;
    let total: i64 = counts.iter().map(|(_, n)| n).sum();

    println!("Media records: {total}");
    for (status, count) in &counts {
        println!("  {status:<12} {count}");
    }
    Ok(())
}

fn reset_failed(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let pool = init_pool(&config.database.path)?;
    let conn = get_conn(&pool)?;

    let count = media::reset_failed_metadata_status(&conn)?;
    println!("Reset {count} failed record(s) to pending");
    Ok(())
}

async fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in tools.check_all().await {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.kind);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Metadata extraction stays paused without ffprobe.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = Config::load(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Database: {}", config.database.path.display());
    println!("  Harvester enabled: {}", config.harvester.enabled);
    println!("  Batch size: {}", config.harvester.effective_batch_size());
    println!(
        "  Tick interval: {}ms",
        config.harvester.tick_interval().as_millis()
    );

    let warnings = config.validate();
    if !warnings.is_empty() {
        println!("\nWarnings:");
        for warning in &warnings {
            println!("  - {warning}");
        }
    }

    Ok(())
}
