use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use commit_viewer::paths::PlatformPaths;
use commit_viewer::{CommitViewerClient, Config};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "commit-viewer",
    version,
    about = "Retrieve and browse the commit history of hosted repositories"
)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true, env = "COMMIT_VIEWER_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Retrieve a repository's history unless it is already stored
    Fetch {
        /// Repository as "owner/name"
        repo: String,
        /// Retrieve again even when already stored
        #[arg(long)]
        refresh: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the stored commits of a repository
    List {
        /// Repository as "owner/name"
        repo: String,
        /// Maximum number of commits to show
        #[arg(long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List stored repositories
    Repos,
    /// Remove a repository from the store
    Forget {
        /// Repository as "owner/name"
        repo: String,
    },
    /// Show the effective configuration
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_client(config_path: Option<&PathBuf>) -> Result<CommitViewerClient> {
    let config = match config_path {
        Some(path) => Config::from_path_with_env(path),
        None => Config::new(),
    }
    .context("Failed to load configuration")?;
    Ok(CommitViewerClient::with_config(config)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Command::Fetch {
            repo,
            refresh,
            json,
        } => {
            let client = open_client(cli.config.as_ref())?;
            let outcome = if refresh {
                client.refresh(&repo).await?
            } else {
                client.fetch(&repo).await?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}: {}", repo, outcome);
            }
        }
        Command::List { repo, limit, json } => {
            let client = open_client(cli.config.as_ref())?;
            let Some(mut commits) = client.list(&repo).await else {
                bail!(
                    "No history stored for '{}'; run `commit-viewer fetch {}` first",
                    repo,
                    repo
                );
            };
            if let Some(limit) = limit {
                commits.truncate(limit);
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&commits)?);
            } else {
                for commit in &commits {
                    println!("{}", commit);
                }
            }
        }
        Command::Repos => {
            let client = open_client(cli.config.as_ref())?;
            let repos = client.repositories().await;
            if repos.is_empty() {
                println!("No repositories stored");
            }
            for repo in repos {
                if let Some(entry) = client.stored(&repo).await {
                    println!(
                        "{}  {} commits  via {}  fetched {}",
                        repo,
                        entry.commits.len(),
                        entry.source,
                        entry.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                }
            }
        }
        Command::Forget { repo } => {
            let client = open_client(cli.config.as_ref())?;
            if client.forget(&repo).await? {
                println!("Removed {}", repo);
            } else {
                println!("{} was not stored", repo);
            }
        }
        Command::Config { init } => cmd_config(cli.config, init)?,
    }

    Ok(())
}

fn cmd_config(path: Option<PathBuf>, init: bool) -> Result<()> {
    let path = path.unwrap_or_else(PlatformPaths::default_config_path);

    if init {
        if path.exists() {
            println!("Config file already exists: {}", path.display());
        } else {
            Config::default().save(&path)?;
            println!("Wrote default config to {}", path.display());
        }
        return Ok(());
    }

    let mut config = if path.exists() {
        Config::from_path_with_env(&path)?
    } else {
        let mut config = Config::default();
        config.apply_env_overrides();
        config.validate()?;
        config
    };
    if let Some(creds) = config.api.credentials.as_mut() {
        creds.token = "********".to_string();
    }

    println!("# {}", path.display());
    print!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to render configuration")?
    );
    Ok(())
}
