use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use glob::Pattern;
use launcher::{
    client, Account, InstallManager, LauncherConfig, LauncherEvent, ManagementClient,
    ManagementServer, Offline, RemoteCatalog, Session,
};
use serble_tools::{decode_frames_json, format_inspect_pretty, inspect_frames};
use tokio::net::TcpListener;
use tracing::{info, warn};
use wire::Limits;

#[derive(Parser)]
#[command(
    name = "serble-tools",
    version,
    about = "Serble launcher management channel tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a management server against an offline catalog.
    Serve {
        /// Launcher config file (TOML). Defaults apply when missing.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Pretend this user is logged in.
        #[arg(long, requires = "username")]
        user_id: Option<String>,
        #[arg(long, requires = "user_id")]
        username: Option<String>,
    },
    /// Talk to a running launcher as a game would.
    Probe {
        #[command(subcommand)]
        action: ProbeAction,
        /// Launcher address.
        #[arg(long, global = true)]
        addr: Option<SocketAddr>,
        /// Game id sent in the handshake.
        #[arg(long, global = true, default_value = "serble-tools")]
        game_id: String,
        /// Give up after this many milliseconds.
        #[arg(long, global = true, default_value_t = 2000)]
        timeout_ms: u64,
    },
    /// Walk frame boundaries in captured stream bytes.
    Inspect {
        /// File, or directory of files, holding raw stream bytes.
        path: PathBuf,
        /// Optional glob filter when inspecting a directory.
        #[arg(long)]
        glob: Option<String>,
        /// Sort inspected captures.
        #[arg(long, value_enum)]
        sort: Option<InspectSort>,
        /// Limit the number of inspected captures (after sorting).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Decode captured stream bytes into JSON.
    Decode {
        capture: PathBuf,
        #[arg(long, value_enum, default_value_t = DecodeFormat::Json)]
        format: DecodeFormat,
    },
    /// List installed games recorded in the launcher's data directory.
    Installed {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ProbeAction {
    /// Handshake and print the login state.
    Handshake,
    /// Handshake, then request an achievement.
    Grant { achievement_id: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InspectSort {
    Size,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DecodeFormat {
    Json,
    Pretty,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            config,
            user_id,
            username,
        } => {
            let config = load_config(config.as_deref())?;
            let account = user_id
                .zip(username)
                .map(|(id, username)| Account { id, username });
            serve(config, account).await?;
        }
        Command::Probe {
            action,
            addr,
            game_id,
            timeout_ms,
        } => {
            let addr = addr.unwrap_or_else(client::local_launcher);
            let timeout = Duration::from_millis(timeout_ms);
            tokio::time::timeout(timeout, probe(addr, &game_id, action))
                .await
                .with_context(|| format!("no answer from {addr} within {timeout_ms} ms"))??;
        }
        Command::Inspect {
            path,
            glob,
            sort,
            limit,
        } => {
            let limits = Limits::default();
            if path.is_dir() {
                let entries = collect_capture_entries(&path, glob.as_deref())?;
                let mut entries = maybe_sort_entries(entries, sort);
                let limit = limit.or(sort.map(|InspectSort::Size| 10));
                if let Some(limit) = limit {
                    entries.truncate(limit);
                }
                for entry in entries {
                    let bytes = fs::read(&entry.path)
                        .with_context(|| format!("read capture {}", entry.path.display()))?;
                    println!("== {} ==", entry.path.display());
                    print!("{}", format_inspect_pretty(&inspect_frames(&bytes, &limits)));
                }
            } else {
                let bytes = fs::read(&path)
                    .with_context(|| format!("read capture {}", path.display()))?;
                print!("{}", format_inspect_pretty(&inspect_frames(&bytes, &limits)));
            }
        }
        Command::Decode { capture, format } => {
            let bytes = fs::read(&capture)
                .with_context(|| format!("read capture {}", capture.display()))?;
            let output = decode_frames_json(&bytes, &Limits::default())?;
            match format {
                DecodeFormat::Json => println!("{output}"),
                DecodeFormat::Pretty => {
                    let json = serde_json::to_string_pretty(&output).context("serialize json")?;
                    println!("{json}");
                }
            }
        }
        Command::Installed { config } => {
            let config = load_config(config.as_deref())?;
            let manager = InstallManager::builder(config, Arc::new(Offline))
                .build()
                .context("open install store")?;
            let records = manager.installed_games();
            if records.is_empty() {
                println!("no games installed");
            }
            for record in records {
                println!(
                    "{} ({}) version {} at {}",
                    record.name,
                    record.game_id,
                    record.version,
                    record.path.display()
                );
            }
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<LauncherConfig> {
    match path {
        Some(path) => {
            LauncherConfig::load(path).with_context(|| format!("load config {}", path.display()))
        }
        None => Ok(LauncherConfig::default()),
    }
}

async fn serve(config: LauncherConfig, account: Option<Account>) -> Result<()> {
    let remote: Arc<dyn RemoteCatalog> = Arc::new(Offline);
    let session = Arc::new(account.map_or_else(Session::new, Session::logged_in));

    let manager = InstallManager::builder(config.clone(), Arc::clone(&remote))
        .session(Arc::clone(&session))
        .build()
        .context("open install store")?;
    info!(
        installed = manager.installed_games().len(),
        platform = %manager.platform(),
        "install store opened"
    );
    let mut events = manager.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let LauncherEvent::GameClosed { game_id, minutes } = &event {
                info!(%game_id, minutes, "game closed");
            } else {
                info!(?event, "launcher event");
            }
        }
    });

    let listener = TcpListener::bind(config.management_addr)
        .await
        .with_context(|| format!("bind {}", config.management_addr))?;
    let server = ManagementServer::new(session, remote, config.limits());
    server
        .serve(listener, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "ctrl-c handler failed");
            }
        })
        .await?;
    Ok(())
}

async fn probe(addr: SocketAddr, game_id: &str, action: ProbeAction) -> Result<()> {
    let mut client = ManagementClient::connect(addr).await?;
    let response = client.handshake(game_id).await?;
    match (&response.username, action) {
        (_, ProbeAction::Handshake) => {
            println!(
                "logged_in: {} username: {}",
                response.is_logged_in,
                response.username.as_deref().unwrap_or("-")
            );
        }
        (None, ProbeAction::Grant { .. }) => {
            bail!("launcher has nobody logged in; grants will not be acknowledged");
        }
        (Some(username), ProbeAction::Grant { achievement_id }) => {
            client.grant_achievement(&achievement_id).await?;
            println!("granted {achievement_id} to {username}");
        }
    }
    Ok(())
}

struct CaptureEntry {
    path: PathBuf,
    size: u64,
}

fn collect_capture_entries(dir: &Path, glob: Option<&str>) -> Result<Vec<CaptureEntry>> {
    let mut entries = Vec::new();
    let pattern = match glob {
        Some(value) => Some(Pattern::new(value).context("invalid glob pattern")?),
        None => None,
    };

    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(pattern) = &pattern {
            let matches_path = pattern.matches_path(&path);
            let matches_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.matches(name));
            if !matches_path && !matches_name {
                continue;
            }
        }
        let size = entry.metadata()?.len();
        entries.push(CaptureEntry { path, size });
    }
    Ok(entries)
}

fn maybe_sort_entries(
    mut entries: Vec<CaptureEntry>,
    sort: Option<InspectSort>,
) -> Vec<CaptureEntry> {
    match sort {
        Some(InspectSort::Size) => {
            entries.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));
        }
        None => entries.sort_by(|a, b| a.path.cmp(&b.path)),
    }
    entries
}
