use anyhow::{Context, Result};
use chrome_importer::keyring::{
    select_backend, BackendFactory, DefaultBackendFactory, DesktopEnvironment, SystemEnv,
};
use chrome_importer::profile::{lookup_pref, PREFERENCES_FILE};
use chrome_importer::{ImportItems, PasswordStoreType, PasswordStrategy, SourceProfile};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

mod config;
mod export;
mod progress;

use config::ImporterConfig;
use export::JsonExportBridge;

#[derive(Parser)]
#[command(name = "chrome-import")]
#[command(about = "Import browsing data from a Chromium profile", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a profile into JSON files
    Import {
        /// Profile directory (the one holding History, Bookmarks, ...)
        #[arg(short, long)]
        profile: PathBuf,

        /// Items to import (comma-separated): history, bookmarks, cookies, passwords, or all
        #[arg(short, long, default_value = "all")]
        items: ImportItems,

        /// Output directory
        #[arg(short, long, default_value = "chrome-import")]
        output: PathBuf,

        /// Password store override: basic, gnome, gnome-libsecret, gnome-keyring, kwallet, kwallet5, kwallet6
        #[arg(long)]
        password_store: Option<PasswordStoreType>,

        /// Password source: native, login-db, or keyring
        #[arg(long, default_value = "native")]
        strategy: PasswordStrategy,

        /// Disable progress spinners
        #[arg(long)]
        no_progress: bool,
    },

    /// Show the detected desktop and the password backend that would be used
    Detect {
        /// Profile directory, to also report its local profile id
        #[arg(short, long)]
        profile: Option<PathBuf>,

        /// Password store override
        #[arg(long)]
        password_store: Option<PasswordStoreType>,
    },

    /// List profile directories under a browser user data directory
    List {
        /// e.g. ~/.config/google-chrome
        #[arg(short, long)]
        user_data_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    match cli.command {
        Commands::Import {
            profile,
            items,
            output,
            password_store,
            strategy,
            no_progress,
        } => {
            let config = ImporterConfig {
                profile,
                items,
                output,
                password_store,
                strategy,
                progress: !no_progress,
            };
            run_import(config).await?;
        }
        Commands::Detect {
            profile,
            password_store,
        } => {
            detect(profile.as_deref(), password_store);
        }
        Commands::List { user_data_dir } => {
            list_profiles(&user_data_dir)?;
        }
    }

    Ok(())
}

async fn run_import(config: ImporterConfig) -> Result<()> {
    config.validate()?;

    let importer = config.build_importer();
    let cancel = importer.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️  Interrupted, cancelling import...");
            cancel.cancel();
        }
    });

    let output = config.output.clone();
    let task = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut bridge = JsonExportBridge::new(&config.output, config.progress)?;
        let summary = importer.start_import(&config.source(), config.items, &mut bridge);
        let written = bridge.finish()?;
        Ok((summary, written))
    });
    let (summary, written) = task.await.context("Import task failed")??;

    println!("\n📊 Import Summary");
    println!("{}", "=".repeat(40));
    println!("  History:   {}", summary.history);
    println!("  Bookmarks: {}", summary.bookmarks);
    println!("  Favicons:  {}", summary.favicons);
    println!("  Cookies:   {}", summary.cookies);
    println!("  Passwords: {}", summary.passwords);
    if summary.cancelled {
        println!("  ⚠️  Cancelled before completion");
    }
    println!("\n📁 {} file(s) written to {:?}", written.len(), output);
    Ok(())
}

fn detect(profile: Option<&Path>, password_store: Option<PasswordStoreType>) {
    let desktop = DesktopEnvironment::detect(&SystemEnv);
    let factory = DefaultBackendFactory;
    let backend = select_backend(desktop, password_store, factory.libsecret_available());

    println!("🖥️  Desktop environment: {}", desktop);
    println!("🔑 Native password strategy: {}", PasswordStrategy::native());
    println!("🔐 Keyring backend: {}", backend);
    println!(
        "   libsecret support: {}",
        if factory.libsecret_available() { "yes" } else { "no" }
    );

    if let Some(path) = profile {
        match SourceProfile::new(path).local_profile_id() {
            Ok(id) => println!("👤 Local profile id: {}", id),
            Err(e) => println!("👤 Local profile id: unavailable ({})", e),
        }
    }
}

fn list_profiles(user_data_dir: &Path) -> Result<()> {
    info!("🔍 Scanning {:?}", user_data_dir);
    if !user_data_dir.is_dir() {
        anyhow::bail!("User data directory {:?} does not exist", user_data_dir);
    }

    println!("\n🌐 Profiles in {:?}", user_data_dir);
    println!("{}", "=".repeat(60));

    let mut found = 0;
    for entry in WalkDir::new(user_data_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
    {
        if !entry.path().join(PREFERENCES_FILE).is_file() {
            continue;
        }
        found += 1;

        let profile = SourceProfile::new(entry.path());
        let display_name = profile
            .read_preferences()
            .ok()
            .and_then(|prefs| {
                lookup_pref(&prefs, "profile.name")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_default();

        println!(
            "  📂 {:<20} {}",
            entry.file_name().to_string_lossy(),
            display_name
        );
    }

    if found == 0 {
        println!("  (no profiles found)");
    }
    Ok(())
}
