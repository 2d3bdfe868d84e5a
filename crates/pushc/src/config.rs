use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI interface for the push client.
#[derive(Parser)]
#[command(name = "pushc", about = "Push service transport client")]
#[command(version)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a custom configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Push service base URL override.
    #[arg(long, global = true)]
    pub service_url: Option<String>,

    /// Increase log verbosity (repeat for more detail).
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write logs to a file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Request a verification code for the configured number.
    CreateAccount {
        /// Deliver the code by voice call instead of SMS.
        #[arg(long)]
        voice: bool,
    },
    /// Confirm the account with the received verification code.
    Verify {
        /// Verification code.
        code: String,
    },
    /// Register a device push token.
    RegisterToken {
        /// Token issued by the device notification service.
        token: String,
    },
    /// Remove the registered push token.
    UnregisterToken,
    /// Send a message, uploading attachments first.
    Send {
        /// Recipient identifiers.
        #[arg(required = true)]
        recipients: Vec<String>,
        /// Message text.
        #[arg(short, long)]
        message: String,
        /// Files to upload and attach, in order.
        #[arg(long = "attach")]
        attachments: Vec<PathBuf>,
    },
    /// Download the current directory snapshot.
    Directory,
    /// Seal a PEM bundle of trust anchors into a trust store file.
    SealTrust {
        /// PEM file holding one or more CA certificates.
        pem: PathBuf,
        /// Destination for the sealed store.
        #[arg(long)]
        out: PathBuf,
    },
}

/// Runtime configuration loaded from file, env, and defaults.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// Base URL of the push service.
    pub service_url: String,
    /// Whether service requests must be verified against the trust store.
    pub enforce_tls_pinning: bool,
    /// Sealed trust store file.
    #[serde(default)]
    pub trust_store: Option<PathBuf>,
    /// Passphrase the trust store was sealed with.
    pub trust_store_passphrase: String,
    /// Per-request timeout, in seconds.
    pub timeout_s: u64,
    /// User-Agent sent with every request.
    pub user_agent: String,
    /// Account credentials.
    #[serde(default)]
    pub account: AccountConfig,
    /// Directory snapshot storage.
    #[serde(default)]
    pub directory: DirectoryConfig,
}

/// Account credentials used for the Basic `Authorization` header.
#[derive(Deserialize, Clone, Default)]
pub struct AccountConfig {
    /// Account number (principal).
    pub number: String,
    /// Shared secret. Empty means requests are sent unauthenticated.
    pub password: String,
}

impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("number", &self.number)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where downloaded directory snapshots are kept.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DirectoryConfig {
    /// Snapshot directory. Defaults to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl DirectoryConfig {
    /// Resolves the snapshot directory, falling back to `<data dir>/pushc`.
    pub fn resolve(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|d| d.join("pushc"))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            service_url: "https://push.example.org".to_string(),
            enforce_tls_pinning: true,
            trust_store: None,
            trust_store_passphrase: String::new(),
            timeout_s: 30,
            user_agent: format!("pushc/{}", env!("CARGO_PKG_VERSION")),
            account: AccountConfig::default(),
            directory: DirectoryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Validates the configuration values are within acceptable bounds.
    /// Returns Ok(()) if valid, Err with description otherwise.
    pub fn validate(&self) -> Result<(), String> {
        if self.service_url.is_empty() {
            return Err("service URL must not be empty".to_string());
        }
        let https = self.service_url.starts_with("https://");
        if !(https || self.service_url.starts_with("http://")) {
            return Err(format!(
                "service URL must start with http:// or https://, got: {}",
                self.service_url
            ));
        }

        if self.enforce_tls_pinning {
            if !https {
                return Err(
                    "enforce_tls_pinning requires an https:// service URL".to_string(),
                );
            }
            if self.trust_store.is_none() {
                return Err(
                    "trust_store must be set when enforce_tls_pinning is enabled".to_string(),
                );
            }
        }

        if self.timeout_s == 0 {
            return Err("timeout_s must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Immutable transport settings derived from this configuration.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            service_url: self.service_url.clone(),
            enforce_tls_pinning: self.enforce_tls_pinning,
            timeout: Duration::from_secs(self.timeout_s),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Settings the transport is built from. Never changes after construction.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL every service path is appended to.
    pub service_url: String,
    /// Whether service requests must use the pinned trust context.
    pub enforce_tls_pinning: bool,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
}

impl TransportConfig {
    /// Settings for a service at `service_url` with default timeout and
    /// pinning enforced.
    pub fn new(service_url: impl Into<String>) -> Self {
        let defaults = ClientConfig::default();
        Self {
            service_url: service_url.into(),
            ..defaults.transport()
        }
    }

    /// Disables certificate pinning (test and staging services only).
    #[must_use]
    pub fn without_pinning(mut self) -> Self {
        self.enforce_tls_pinning = false;
        self
    }
}

/// # Errors
///
/// Returns an error if the configuration file cannot be read or parsed.
#[allow(clippy::cast_possible_wrap)]
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ClientConfig> {
    let defaults = ClientConfig::default();
    let mut builder = config::Config::builder()
        .set_default("service_url", defaults.service_url.as_str())?
        .set_default("enforce_tls_pinning", defaults.enforce_tls_pinning)?
        .set_default(
            "trust_store_passphrase",
            defaults.trust_store_passphrase.as_str(),
        )?
        .set_default("timeout_s", defaults.timeout_s as i64)?
        .set_default("user_agent", defaults.user_agent.as_str())?
        .set_default("account.number", defaults.account.number.as_str())?
        .set_default("account.password", defaults.account.password.as_str())?;

    if let Some(config_path) = path {
        if config_path.exists() {
            builder = builder.add_source(config::File::from(config_path));
        }
    } else {
        let native_path = dirs::config_dir().map(|d| d.join("pushc").join("config.toml"));
        let xdg_path = dirs::home_dir().map(|d| d.join(".config").join("pushc").join("config.toml"));

        let resolved = native_path
            .filter(|p| p.exists())
            .or_else(|| xdg_path.filter(|p| p.exists()));

        if let Some(config_path) = resolved {
            builder = builder.add_source(config::File::from(config_path));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PUSHC")
            .prefix_separator("_")
            .separator("__"),
    );

    let settings = builder.build()?;
    let config: ClientConfig = settings.try_deserialize()?;

    Ok(config)
}
