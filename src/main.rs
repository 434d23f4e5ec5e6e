use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use streamscout::commands::list::{run_list, ListOptions};
use streamscout::commands::serve::run_serve;
use streamscout::models::settings::Settings;
use streamscout::services::aggregation_service::{FilterScope, SortOrder};

const APP_NAME: &str = "streamscout";

#[derive(Parser)]
#[command(name = "streamscout", version, about = "Live Twitch channels by game category")]
struct Cli {
    /// Settings file (defaults to the per-user config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the credential-hiding proxy (`GET /api/streams`)
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Load a category through the proxy and print the live channels
    List {
        #[arg(long)]
        game_id: String,
        /// Proxy base URL, e.g. http://127.0.0.1:3000
        #[arg(long)]
        proxy: Option<String>,
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long, value_enum, default_value_t = ScopeArg::Title)]
        scope: ScopeArg,
        #[arg(long)]
        ascending: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Which fields `--query` is matched against.
#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    Title,
    /// Title or display name
    TitleUser,
}

impl From<ScopeArg> for FilterScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::Title => FilterScope::Title,
            ScopeArg::TitleUser => FilterScope::TitleUser,
        }
    }
}

/// Load settings from an explicit file, or confy's default location.
fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => confy::load_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => confy::load(APP_NAME, "settings").context("Failed to load settings"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { bind } => run_serve(settings, bind).await,
        Command::List {
            game_id,
            proxy,
            query,
            scope,
            ascending,
            limit,
        } => {
            let order = if ascending {
                SortOrder::Ascending
            } else {
                SortOrder::Descending
            };
            run_list(
                &settings,
                ListOptions {
                    game_id,
                    proxy_url: proxy,
                    query,
                    scope: scope.into(),
                    order,
                    limit,
                },
            )
            .await
        }
    }
}
