#![forbid(unsafe_code)]

use pushc::attachment::AttachmentPayload;
use pushc::config::{load_config, Cli, ClientConfig, Commands};
use pushc::directory::ManifestDirectory;
use pushc::trust::{self, PinnedTrustContext};
use pushc::{ErrorKind, PushError, PushServiceClient};

use clap::Parser;
use std::io::IsTerminal;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

// ── ANSI style helpers ──────────────────────────────────────────────

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";

fn tty() -> bool {
    std::io::stdout().is_terminal()
}

// ── Shared helpers ──────────────────────────────────────────────────

const MANIFEST_FILE: &str = "directory.toml";

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let directive = match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::new(directive)
    };

    if let Some(ref path) = cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| anyhow::anyhow!("failed to open log file {path:?}: {e}"))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    Ok(())
}

fn connect(config: &ClientConfig) -> anyhow::Result<PushServiceClient> {
    let client = PushServiceClient::from_config(config)
        .map_err(|e| anyhow::anyhow!("failed to initialize push client: {e}"))?;
    debug!(
        service = %config.service_url,
        pinned = config.enforce_tls_pinning,
        "push client ready"
    );
    Ok(client)
}

fn ok(label: &str) {
    if tty() {
        println!("  {GREEN}✓{RESET} {label}");
    } else {
        println!("ok: {label}");
    }
}

/// Prints `err` and converts it for the process exit path.
fn report(action: &str, err: PushError) -> anyhow::Error {
    if tty() {
        match err.kind() {
            ErrorKind::RateLimited => {
                eprintln!("  {YELLOW}●{RESET} {action}: rate limited");
                eprintln!("    {DIM}Wait before retrying.{RESET}");
            }
            ErrorKind::PartialDelivery => {
                if let PushError::PartialDelivery { ref failed, .. } = err {
                    eprintln!("  {RED}✗{RESET} {action}: not delivered to");
                    for recipient in failed {
                        eprintln!("    {BOLD}{recipient}{RESET}");
                    }
                }
            }
            ErrorKind::Fatal | ErrorKind::Transport => {
                eprintln!("  {RED}✗{RESET} {action}");
                eprintln!("    {DIM}{err}{RESET}");
            }
        }
    }
    anyhow::anyhow!("{action}: {err}")
}

// ── Commands ────────────────────────────────────────────────────────

fn seal_trust(config: &ClientConfig, pem: &std::path::Path, out: &std::path::Path) -> anyhow::Result<()> {
    if config.trust_store_passphrase.is_empty() {
        anyhow::bail!("trust_store_passphrase must be set to seal a trust store");
    }
    let contents = std::fs::read(pem)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", pem.display()))?;
    let sealed = trust::seal(&contents, &config.trust_store_passphrase)
        .map_err(|e| report("Seal trust store", e))?;

    let context = PinnedTrustContext::load(&sealed, &config.trust_store_passphrase)
        .map_err(|e| report("Seal trust store", e))?;

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(out, &sealed)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", out.display()))?;

    info!(anchors = context.anchor_count(), path = %out.display(), "trust store sealed");
    ok(&format!(
        "Sealed {} trust anchor(s) into {}",
        context.anchor_count(),
        out.display()
    ));
    Ok(())
}

fn send(
    client: &PushServiceClient,
    recipients: &[String],
    message: &str,
    files: &[std::path::PathBuf],
) -> anyhow::Result<()> {
    let mut attachments = Vec::with_capacity(files.len());
    for path in files {
        let data = std::fs::read(path)
            .map_err(|e| anyhow::anyhow!("failed to read attachment {}: {e}", path.display()))?;
        attachments.push(AttachmentPayload::new(data));
    }

    let receipt = client
        .send_message(recipients, message, &attachments)
        .map_err(|e| report("Send", e))?;

    if tty() {
        println!("  {GREEN}✓{RESET} Sent");
        for recipient in &receipt.accepted {
            println!("    {DIM}{recipient}{RESET}");
        }
    } else {
        println!("sent: {}", receipt.accepted.join(","));
    }
    Ok(())
}

fn directory(client: &PushServiceClient, config: &ClientConfig) -> anyhow::Result<()> {
    let data_dir = config.directory.resolve();
    let store = ManifestDirectory::load(data_dir.join(MANIFEST_FILE))?;

    match client.retrieve_directory(&store, &data_dir) {
        Some(update) => {
            if tty() {
                println!(
                    "  {GREEN}✓{RESET} Directory v{} {DIM}({}){RESET}",
                    update.descriptor.version,
                    update.snapshot.display()
                );
                println!(
                    "    {DIM}capacity {} │ hashes {}{RESET}",
                    update.descriptor.capacity, update.descriptor.hash_count
                );
            } else {
                println!(
                    "directory: v{} {}",
                    update.descriptor.version,
                    update.snapshot.display()
                );
            }
            Ok(())
        }
        None => {
            if tty() {
                eprintln!("  {RED}✗{RESET} Directory retrieval failed");
                eprintln!("    {DIM}Run with -v for details.{RESET}");
            }
            anyhow::bail!("directory retrieval failed")
        }
    }
}

// ── Main ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("Failed to install rustls crypto provider - may already be installed or unsupported platform");
    }

    let cli = Cli::parse();

    init_tracing(&cli)?;

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(ref url) = cli.service_url {
        config.service_url = url.clone();
    }

    match &cli.command {
        Commands::SealTrust { pem, out } => seal_trust(&config, pem, out)?,
        Commands::CreateAccount { voice } => {
            let client = connect(&config)?;
            client
                .create_account(*voice)
                .map_err(|e| report("Create account", e))?;
            let channel = if *voice { "voice call" } else { "SMS" };
            ok(&format!(
                "Verification code requested for {} by {channel}",
                client.identity().principal()
            ));
        }
        Commands::Verify { code } => {
            let client = connect(&config)?;
            client
                .verify_account(code)
                .map_err(|e| report("Verify", e))?;
            ok("Account verified");
        }
        Commands::RegisterToken { token } => {
            let client = connect(&config)?;
            client
                .register_token(token)
                .map_err(|e| report("Register token", e))?;
            ok("Push token registered");
        }
        Commands::UnregisterToken => {
            let client = connect(&config)?;
            client
                .unregister_token()
                .map_err(|e| report("Unregister token", e))?;
            ok("Push token removed");
        }
        Commands::Send {
            recipients,
            message,
            attachments,
        } => {
            let client = connect(&config)?;
            send(&client, recipients, message, attachments)?;
        }
        Commands::Directory => {
            let client = connect(&config)?;
            directory(&client, &config)?;
        }
    }
    Ok(())
}
