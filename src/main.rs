//! Lyrix CLI - fetch interpretive song themes from the Lyrix backend
//!
//! Themes are cached for the configured TTL and kept in a session snapshot
//! so repeated lookups do not hit the network.

use std::process::ExitCode;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use tracing::warn;

use lyrix::cache::{FileStorage, MemoryStorage, SessionCache};
use lyrix::cli::{CacheAction, Cli, Command};
use lyrix::config;
use lyrix::logging;
use lyrix::sweep::SweepHandle;
use lyrix::theme::{ApiEndpoints, HttpThemeFetcher, ThemeLookup};
use lyrix::{Language, ThemeCoordinator};

type Coordinator = ThemeCoordinator<HttpThemeFetcher>;

/// Picks where the session snapshot lives
fn session_for(cli: &Cli, session_dir: Option<std::path::PathBuf>) -> SessionCache {
    if cli.no_persist {
        return SessionCache::new(MemoryStorage::new());
    }
    match session_dir.map(FileStorage::with_dir).or_else(FileStorage::new) {
        Some(storage) => SessionCache::new(storage),
        None => {
            warn!("no cache directory available, theme cache will not persist");
            SessionCache::new(MemoryStorage::new())
        }
    }
}

/// Prints a theme lookup, returning whether it counts as success
async fn print_theme(
    coordinator: &Coordinator,
    song_id: &str,
    lang: Language,
    refresh: bool,
    generated: bool,
) -> bool {
    if refresh {
        coordinator.invalidate(song_id, lang);
    }

    let result = if generated {
        coordinator.get_theme(song_id, lang).await
    } else {
        match coordinator.fetcher().fetch_song(song_id).await {
            Ok(song) => coordinator.resolve_theme(&song, lang).await,
            Err(e) => {
                warn!(error = %e, "could not load song, asking for a generated theme");
                coordinator.get_theme(song_id, lang).await
            }
        }
    };

    match result {
        Ok(ThemeLookup::Ready(text)) => {
            println!("{}", text);
            true
        }
        Ok(ThemeLookup::Unavailable) => {
            println!("No theme available for song {} in {}", song_id, lang.name());
            true
        }
        Ok(ThemeLookup::InProgress) => {
            println!("Theme is still being generated, try again shortly");
            true
        }
        Err(e) => {
            eprintln!("Failed to generate theme, try again: {}", e);
            false
        }
    }
}

async fn preload(coordinator: &Coordinator, song_id: &str) -> bool {
    let report = match coordinator.preload_song_themes(song_id).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Failed to preload themes: {}", e);
            return false;
        }
    };

    for lang in &report.cached {
        println!("{:<8} cached", lang.name());
    }
    for lang in &report.fetched {
        println!("{:<8} fetched", lang.name());
    }
    for lang in &report.unavailable {
        println!("{:<8} no theme available", lang.name());
    }
    for lang in &report.in_progress {
        println!("{:<8} in progress", lang.name());
    }
    for (lang, err) in &report.failed {
        println!("{:<8} failed: {}", lang.name(), err);
    }
    report.failed.is_empty()
}

fn cache_action(coordinator: &Coordinator, action: CacheAction) {
    match action {
        CacheAction::List => {
            let keys = coordinator.cached_keys();
            if keys.is_empty() {
                println!("No cached themes");
            }
            for (key, expires_at) in keys {
                println!(
                    "{:<24} expires {}",
                    key.to_string(),
                    expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        CacheAction::Clear => {
            coordinator.clear_cache();
            println!("Theme cache cleared");
        }
        CacheAction::Sweep => {
            let removed = coordinator.sweep_expired();
            println!("Removed {} expired theme(s)", removed);
        }
    }
}

async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let cfg = cli.apply_overrides(config::load(cli.config.as_deref())?)?;
    logging::init_logging(&cfg.log_level);

    let fetcher = HttpThemeFetcher::with_timeout(
        ApiEndpoints::new(cfg.api_base_url.clone()),
        cfg.request_timeout(),
    )?;
    let session = session_for(&cli, cfg.session_dir.clone());
    let coordinator = Arc::new(ThemeCoordinator::with_session(fetcher, session).with_ttl(cfg.theme_ttl())?);
    let sweeper = SweepHandle::spawn(Arc::clone(&coordinator), cfg.sweep_interval());

    let ok = match cli.command {
        Command::Theme {
            song_id,
            lang,
            refresh,
            generated,
        } => print_theme(&coordinator, &song_id, lang, refresh, generated).await,
        Command::Preload { song_id } => preload(&coordinator, &song_id).await,
        Command::Cache { action } => {
            cache_action(&coordinator, action);
            true
        }
    };

    sweeper.shutdown().await;
    Ok(ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
