mod app;
mod cli;
mod config;
mod guard;
mod history;
mod local_stats;
mod logging;
mod paths;
mod render;
mod scheduler;
mod settings;
mod status;
mod usage;
mod version;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use config::AppConfig;
use std::sync::Arc;
use usage::credentials::CredentialStore;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose {
        "debug"
    } else if matches!(cli.command, Command::Watch) {
        "info"
    } else {
        "warn"
    };
    let log_file = match cli.command {
        Command::Watch => Some(paths::logs_dir()?.join("claude-stats.log")),
        _ => None,
    };
    logging::init_logging(default_level, log_file.as_deref())?;

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => paths::config_path()?,
    };
    let config = AppConfig::load(&config_path)?;
    tracing::debug!("Loaded config from {}", config_path.display());

    match cli.command {
        Command::Watch => run_watch(&config).await,
        Command::Fetch { json } => run_fetch(&config, json),
        Command::History { json } => run_history(&config, json),
        Command::Sessions { json } => run_sessions(&config, json),
        Command::Version => run_version(&config),
        Command::DismissUpdate => run_dismiss_update(&config),
        Command::Status => run_status(&config),
        Command::LocalStats { json } => run_local_stats(&config, json),
        Command::Login {
            session_key,
            cookies,
        } => run_login(&session_key, cookies.as_deref()),
        Command::Logout => run_logout(),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

async fn run_watch(config: &AppConfig) -> Result<()> {
    let settings = app::open_settings()?;
    let credentials = app::open_credentials()?;
    let poller = app::build_poller(config, credentials, &settings)?;
    let version = Arc::new(app::build_version_checker(config, settings));
    let status = Arc::new(app::build_status_checker(config));

    tracing::info!("Watching usage every {}s", config.usage.poll_interval_secs);
    app::Coordinator::new(poller, version, status)
        .run(app::Intervals::from(config))
        .await
}

fn run_fetch(config: &AppConfig, json: bool) -> Result<()> {
    let settings = app::open_settings()?;
    let credentials = app::open_credentials()?;
    let mut poller = app::build_poller(config, credentials, &settings)?;

    let report = poller.poll()?;
    if json {
        return print_json(&report);
    }
    println!("{}", render::format_report(&report, chrono::Utc::now()));
    Ok(())
}

fn run_history(config: &AppConfig, json: bool) -> Result<()> {
    let history = app::open_history(config)?;
    if json {
        return print_json(&history.load_history());
    }
    println!("{}", render::format_history(history.load_history()));
    Ok(())
}

fn run_sessions(config: &AppConfig, json: bool) -> Result<()> {
    let summaries = app::open_history(config)?.load_session_summaries();
    if json {
        return print_json(&summaries);
    }
    println!("{}", render::format_sessions(&summaries));
    Ok(())
}

fn run_version(config: &AppConfig) -> Result<()> {
    let checker = app::build_version_checker(config, app::open_settings()?);
    checker.check_for_update();

    if checker.has_update() {
        println!("{}", checker.update_text());
    } else if checker.is_up_to_date() {
        println!("{}", checker.up_to_date_text());
    } else if checker.has_checked() {
        println!("{} (dismissed)", checker.update_text());
    } else {
        println!(
            "Installed: {}  Latest: {}",
            checker.installed_version().as_deref().unwrap_or("unknown"),
            checker.latest_version().as_deref().unwrap_or("unknown")
        );
    }
    if let Some(url) = checker.changelog_url() {
        println!("Changelog: {}", url);
    }
    Ok(())
}

fn run_dismiss_update(config: &AppConfig) -> Result<()> {
    let checker = app::build_version_checker(config, app::open_settings()?);
    checker.check_for_update();

    match checker.latest_version() {
        Some(latest) => {
            checker.dismiss()?;
            println!("Update notice for v{} dismissed", latest);
        }
        None => println!("Latest release unknown; nothing to dismiss"),
    }
    Ok(())
}

fn run_status(config: &AppConfig) -> Result<()> {
    let checker = app::build_status_checker(config);
    checker.refresh();
    match checker.last_known() {
        Some(status) => println!("{}: {}", checker.status_text(), status.description),
        None => println!("Status unavailable"),
    }
    Ok(())
}

fn run_local_stats(config: &AppConfig, json: bool) -> Result<()> {
    let path = match &config.local_stats.path {
        Some(path) => path.clone(),
        None => local_stats::default_stats_path()
            .context("Could not determine the Claude stats cache location")?,
    };
    let summary = local_stats::fetch_local_stats(&path)?;
    if json {
        return print_json(&summary);
    }
    println!("{}", render::format_local_stats(&summary));
    Ok(())
}

fn run_login(session_key: &str, cookies: Option<&str>) -> Result<()> {
    let credentials = app::open_credentials()?;
    credentials.set_session_key(Some(session_key))?;
    credentials.set_full_cookies(cookies)?;
    // A new session may belong to another account.
    credentials.set_organization_id(None)?;
    println!("Session key saved to {}", paths::credentials_path()?.display());
    Ok(())
}

fn run_logout() -> Result<()> {
    app::open_credentials()?.clear()?;
    println!("Credentials removed");
    Ok(())
}
