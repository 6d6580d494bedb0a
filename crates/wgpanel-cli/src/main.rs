//! wgpanel CLI
//!
//! Command-line front end for a WireGuard management backend, built on the
//! `wgpanel` stores.
//!
//! Every command runs one store operation, prints its result on stdout and
//! the notifications it produced on stderr. A failed operation exits non-zero.

use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use chrono::Utc;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use wgpanel::format::{
    fallback_client_config, format_bytes, format_last_handshake, write_config_file,
};
use wgpanel::{
    Config, GlobalSettings, Panel, Peer, PeerFormData, PeerUpdate,
};

/// wgpanel - manage WireGuard peers through the management API
#[derive(Parser, Debug)]
#[command(name = "wgpanel")]
#[command(version, about, long_about = None)]
struct Args {
    /// Base URL of the management backend
    #[arg(long, env = "WGPANEL_API_BASE_URL")]
    api_url: Option<String>,

    /// Log level
    #[arg(long, default_value = "warn", env = "WGPANEL_LOG_LEVEL")]
    log_level: Level,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List peers with their derived status
    List,
    /// Create a peer and print (or save) its client configuration
    Add {
        /// Display name
        #[arg(long)]
        name: String,
        /// Allowed IP range in CIDR form; repeatable
        #[arg(long = "allowed-ip", required = true)]
        allowed_ips: Vec<String>,
        /// Existing public key; a keypair is generated when omitted
        #[arg(long)]
        public_key: Option<String>,
        /// Generate a preshared key
        #[arg(long)]
        preshared_key: bool,
        #[command(flatten)]
        options: PeerOptions,
        /// File or directory to save the client configuration to
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Change selected fields of a peer
    Update {
        /// Peer id (public key)
        id: String,
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// New allowed IP ranges; repeatable, replaces the current set
        #[arg(long = "allowed-ip")]
        allowed_ips: Vec<String>,
        #[command(flatten)]
        options: PeerOptions,
    },
    /// Delete a peer
    Remove {
        /// Peer id (public key)
        id: String,
        /// Name shown in messages; looked up when omitted
        #[arg(long)]
        name: Option<String>,
    },
    /// Regenerate a peer's keys, invalidating its current configuration
    Regenerate {
        /// Peer id (public key)
        id: String,
        /// File or directory to save the new configuration to
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print or save a peer's client configuration
    Config {
        /// Peer id (public key)
        id: String,
        /// File or directory to save the configuration to
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Save a peer's configuration as a PNG QR code
    Qr {
        /// Peer id (public key)
        id: String,
        /// Destination PNG file
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Show interface statistics
    Stats {
        /// Also show the recorded traffic history
        #[arg(long)]
        history: bool,
    },
    /// Show global settings, or change them when any field is given
    Settings(SettingsArgs),
    /// Keep polling and print the peer list whenever it changes
    Watch {
        /// Refresh interval in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },
}

/// Optional per-peer client settings
#[derive(ClapArgs, Debug, Default)]
struct PeerOptions {
    /// DNS server for the client
    #[arg(long)]
    dns: Option<String>,
    /// Interface MTU
    #[arg(long)]
    mtu: Option<u32>,
    /// Persistent keepalive in seconds
    #[arg(long)]
    keepalive: Option<u32>,
}

#[derive(ClapArgs, Debug)]
struct SettingsArgs {
    /// Server tunnel address
    #[arg(long)]
    server_address: Option<String>,
    /// DNS server pushed to clients
    #[arg(long)]
    dns: Option<String>,
    /// Interface MTU
    #[arg(long)]
    mtu: Option<u32>,
    /// Keepalive in seconds
    #[arg(long)]
    keepalive: Option<u32>,
    /// Public endpoint clients connect to
    #[arg(long)]
    endpoint: Option<String>,
}

impl SettingsArgs {
    fn is_empty(&self) -> bool {
        self.server_address.is_none()
            && self.dns.is_none()
            && self.mtu.is_none()
            && self.keepalive.is_none()
            && self.endpoint.is_none()
    }

    fn apply_to(self, settings: &mut GlobalSettings) {
        if let Some(v) = self.server_address {
            settings.server_address = v;
        }
        if let Some(v) = self.dns {
            settings.dns = v;
        }
        if let Some(v) = self.mtu {
            settings.mtu = v;
        }
        if let Some(v) = self.keepalive {
            settings.keepalive = v;
        }
        if let Some(v) = self.endpoint {
            settings.endpoint = v;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays clean for command output
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let mut config = Config::from_env();
    if let Some(url) = args.api_url {
        config = config.with_api_base_url(url);
    }
    if let Command::Watch {
        interval_ms: Some(ms),
    } = &args.command
    {
        config = config
            .with_peer_poll_interval(*ms)
            .with_stats_poll_interval(*ms);
    }

    let panel = Panel::new(config).context("Invalid configuration")?;
    info!(api = %panel.config().api_base_url, "Using backend");

    let outcome = run(&panel, args.command, args.json).await;

    print_notifications(&panel);
    panel.shutdown().await;
    outcome
}

async fn run(panel: &Panel, command: Command, json: bool) -> Result<()> {
    let peers = panel.peers();

    match command {
        Command::List => {
            ensure!(peers.load().await, "could not load peers");
            print_peers(&peers.peers(), json)?;
        }

        Command::Add {
            name,
            allowed_ips,
            public_key,
            preshared_key,
            options,
            output,
        } => {
            let form = PeerFormData {
                public_key,
                dns: options.dns,
                mtu: options.mtu,
                persistent_keepalive: options.keepalive,
                pre_shared_key: preshared_key.then_some(true),
                ..PeerFormData::new(name.clone(), allowed_ips)
            };
            let Some(created) = peers.add(form).await else {
                bail!("could not add peer");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&created)?);
            }
            let config = fallback_client_config(&created);
            emit_config(&config, &name, output.as_deref(), !json)?;
        }

        Command::Update {
            id,
            name,
            allowed_ips,
            options,
        } => {
            let update = PeerUpdate {
                name,
                allowed_ips: (!allowed_ips.is_empty()).then_some(allowed_ips),
                dns: options.dns,
                mtu: options.mtu,
                persistent_keepalive: options.keepalive,
                interface_address: None,
            };
            ensure!(!update.is_empty(), "nothing to update");

            // Load first so the local entry can be patched in place
            peers.load_silent().await;
            ensure!(peers.update(&id, update).await, "could not update peer");
            match peers.get(&id) {
                Some(peer) => print_peers(std::slice::from_ref(&peer), json)?,
                None => println!("Updated {id}"),
            }
        }

        Command::Remove { id, name } => {
            let name = match name {
                Some(name) => name,
                None => {
                    peers.load_silent().await;
                    peers.get(&id).map_or_else(|| id.clone(), |p| p.name)
                }
            };
            ensure!(peers.remove(&id, &name).await, "could not remove peer");
        }

        Command::Regenerate { id, output } => {
            let Some(regenerated) = peers.regenerate_keys(&id).await else {
                bail!("could not regenerate keys");
            };
            let name = if regenerated.name.is_empty() {
                id.clone()
            } else {
                regenerated.name.clone()
            };
            let config = fallback_client_config(&regenerated);
            emit_config(&config, &name, output.as_deref(), true)?;
        }

        Command::Config { id, output } => {
            let Some(config) = peers.get_config(&id).await else {
                bail!("could not fetch peer config");
            };
            let name = match &output {
                Some(_) => {
                    peers.load_silent().await;
                    peers.get(&id).map_or_else(|| id.clone(), |p| p.name)
                }
                None => id.clone(),
            };
            emit_config(&config, &name, output.as_deref(), true)?;
        }

        Command::Qr { id, output } => {
            let Some(image) = peers.get_qr(&id).await else {
                bail!("could not fetch QR code");
            };
            save_qr(&output, &image)?;
            println!("Saved QR code to {}", output.display());
        }

        Command::Stats { history } => {
            let stats = panel.stats();
            ensure!(stats.load().await, "could not load stats");
            if history {
                ensure!(stats.load_history().await, "could not load stats history");
            }

            if json {
                let value = serde_json::json!({
                    "stats": stats.stats(),
                    "history": history.then(|| stats.history()),
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
                return Ok(());
            }

            if let Some(s) = stats.stats() {
                println!("Interface:   {}", s.interface_name);
                if let Some(port) = s.listen_port {
                    println!("Listen port: {port}");
                }
                if let Some(subnet) = &s.subnet {
                    println!("Subnet:      {subnet}");
                }
                println!("Peers:       {}", s.peer_count);
                println!("Received:    {}", format_bytes(s.total_rx));
                println!("Sent:        {}", format_bytes(s.total_tx));
            }
            if history {
                for point in stats.history() {
                    let at = point
                        .time()
                        .map_or_else(|| point.timestamp.to_string(), |t| t.to_rfc3339());
                    println!(
                        "{at}  rx {}  tx {}",
                        format_bytes(point.total_rx),
                        format_bytes(point.total_tx)
                    );
                }
            }
        }

        Command::Settings(changes) => {
            let settings = panel.settings();
            ensure!(settings.load().await, "could not load settings");

            if !changes.is_empty() {
                let mut next = settings.settings().unwrap_or_default();
                changes.apply_to(&mut next);
                ensure!(settings.save(next).await, "could not save settings");
            }

            let current = settings.settings().unwrap_or_default();
            if json {
                println!("{}", serde_json::to_string_pretty(&current)?);
            } else {
                println!("Server address: {}", current.server_address);
                println!("DNS:            {}", current.dns);
                println!("MTU:            {}", current.mtu);
                println!("Keepalive:      {}", current.keepalive);
                println!("Endpoint:       {}", current.endpoint);
            }
        }

        Command::Watch { .. } => {
            ensure!(peers.load().await, "could not load peers");
            print_peers(&peers.peers(), json)?;

            let mut changes = peers.subscribe();
            panel.start_background_refresh()?;
            info!(interval = ?panel.config().peer_poll_interval(), "Watching peers");

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        info!("Received ctrl-c, stopping");
                        break;
                    }
                    changed = changes.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = changes.borrow_and_update().clone();
                        println!();
                        print_peers(&snapshot, json)?;
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_peers(peers: &[Peer], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(peers)?);
        return Ok(());
    }

    if peers.is_empty() {
        println!("No peers");
        return Ok(());
    }

    let now = Utc::now();
    println!(
        "{:<8} {:<20} {:<32} {:<18} {:>10} {:>10}",
        "STATUS", "NAME", "ALLOWED IPS", "LAST HANDSHAKE", "RX", "TX"
    );
    for peer in peers {
        println!(
            "{:<8} {:<20} {:<32} {:<18} {:>10} {:>10}",
            peer.status.to_string(),
            peer.name,
            peer.allowed_ips.join(","),
            format_last_handshake(&peer.last_handshake, now),
            format_bytes(peer.receive_bytes),
            format_bytes(peer.transmit_bytes),
        );
    }
    Ok(())
}

/// Print a config to stdout, or save it when `output` is given.
///
/// A directory as `output` gets a file named after the peer.
fn emit_config(config: &str, peer_name: &str, output: Option<&Path>, print: bool) -> Result<()> {
    match output {
        Some(dir) if dir.is_dir() => {
            let path = write_config_file(dir, peer_name, config)
                .with_context(|| format!("Failed to save config into {}", dir.display()))?;
            println!("Saved configuration to {}", path.display());
        }
        Some(file) => {
            std::fs::write(file, config)
                .with_context(|| format!("Failed to write {}", file.display()))?;
            println!("Saved configuration to {}", file.display());
        }
        None if print => println!("{config}"),
        None => {}
    }
    Ok(())
}

fn save_qr(output: &Path, image: &[u8]) -> Result<()> {
    std::fs::write(output, image).with_context(|| format!("Failed to write {}", output.display()))
}

fn print_notifications(panel: &Panel) {
    for note in panel.notifications().list() {
        eprintln!("[{}] {}", note.kind, note.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn test_save_qr_writes_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("laptop.png");

        save_qr(&path, PNG).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), PNG);
    }

    #[test]
    fn test_save_qr_reports_path_on_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("laptop.png");

        let err = save_qr(&path, PNG).unwrap_err();
        assert!(err.to_string().starts_with("Failed to write"));
        assert!(err.to_string().contains("laptop.png"));
    }

    #[test]
    fn test_emit_config_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client.conf");

        emit_config("[Interface]\n", "laptop", Some(&path), false).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[Interface]\n");
    }
}
