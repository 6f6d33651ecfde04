//! music-stats
//!
//! Command-line front end for the Spotify session and stats crates:
//! 1. `login` starts a PKCE handshake and prints the authorization URL
//! 2. `callback` finishes it with the redirect the browser landed on
//! 3. `whoami`, `genres` and `albums` read the Web API through the gateway
//!
//! Session state lives in a JSON file (`[storage] path`) between runs.

mod commands;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use spotify_api::TimeRange;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::App;
use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "music-stats", version, about = "Spotify listening stats from the terminal")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,
    /// Print command output as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a login and print the authorization URL.
    Login,
    /// Finish a login with the URL the browser was redirected to.
    Callback {
        /// Full redirect URL, including the query string.
        redirect_url: String,
    },
    /// Show session state and token lifetime.
    Status,
    /// Forget the stored session.
    Logout,
    /// Show the signed-in profile.
    Whoami,
    /// Genre distribution across your top artists.
    Genres {
        /// Time window: short, medium or long.
        #[arg(long, default_value = "medium")]
        range: TimeRange,
        /// Number of top artists to sample (1-50).
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Most played albums in your recent history.
    Albums {
        /// Number of albums to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

fn load_config(cli_path: Option<&std::path::Path>) -> Result<Config> {
    let (path, explicit) = Config::resolve_path(cli_path);
    if !explicit && !path.exists() {
        debug!(path = %path.display(), "no config file, using defaults");
        return Config::from_env().context("invalid configuration");
    }
    info!(path = %path.display(), "loading configuration");
    Config::load(&path).with_context(|| format!("failed to load config from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = load_config(cli.config.as_deref())?;
    debug!(
        storage = %config.storage.path.display(),
        api = %config.api.base_url,
        "configuration loaded"
    );
    let app = App::open(&config, cli.json)?;

    let output = match cli.command {
        Commands::Login => app.login().await?,
        Commands::Callback { redirect_url } => app.callback(&redirect_url).await?,
        Commands::Status => app.status(),
        Commands::Logout => app.logout(),
        Commands::Whoami => app.whoami().await?,
        Commands::Genres { range, limit } => app.genres(range, limit).await?,
        Commands::Albums { limit } => app.albums(limit).await?,
    };
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_genres_with_range() {
        let cli = Cli::parse_from(["music-stats", "genres", "--range", "short", "--limit", "20"]);
        match cli.command {
            Commands::Genres { range, limit } => {
                assert_eq!(range, TimeRange::ShortTerm);
                assert_eq!(limit, 20);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_range() {
        assert!(Cli::try_parse_from(["music-stats", "genres", "--range", "decade"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "music-stats",
            "albums",
            "--json",
            "--config",
            "/tmp/stats.toml",
        ]);
        assert!(cli.json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/stats.toml")));
        assert!(matches!(cli.command, Commands::Albums { limit: 10 }));
    }

    #[test]
    fn callback_takes_url() {
        let cli = Cli::parse_from([
            "music-stats",
            "callback",
            "http://127.0.0.1:8888/callback?code=abc",
        ]);
        assert!(matches!(cli.command, Commands::Callback { ref redirect_url } if redirect_url.ends_with("code=abc")));
    }
}
