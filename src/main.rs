//! nodeseal - Secure envelope encryption for execution nodes
//!
//! Usage:
//!   nodeseal init                      - Write a default configuration
//!   nodeseal seal --payload <file> ... - Wrap and encrypt a JSON event
//!   nodeseal open <envelope>           - Decrypt an envelope and print its payload
//!   nodeseal inspect <envelope>        - Show envelope metadata without decrypting

use clap::{Parser, Subcommand};
use nodeseal::{
    config::Config,
    envelope::{Envelope, EnvelopeCipher, SealRequest, WireFormat},
    routing::DirectRouter,
    Error, Result,
};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use zeroize::Zeroizing;

type EventPayload = serde_json::Value;

#[derive(Parser)]
#[command(name = "nodeseal")]
#[command(author = "nodeseal Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Secure envelope encryption for execution nodes")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "~/.config/nodeseal/config.json")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Wrap a JSON event in an envelope and encrypt it
    Seal {
        /// JSON file holding the event payload
        #[arg(long)]
        payload: PathBuf,

        /// Destination node address
        #[arg(long)]
        destination: String,

        /// Sending node id
        #[arg(long)]
        source: String,

        /// Authorized role (repeatable)
        #[arg(long = "role")]
        roles: Vec<String>,

        /// Read passphrase from file
        #[arg(long)]
        password_file: Option<PathBuf>,

        /// Output file (.json or .yaml); stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decrypt an envelope and print its payload
    Open {
        /// Envelope file (.json or .yaml)
        envelope: PathBuf,

        /// Read passphrase from file
        #[arg(long)]
        password_file: Option<PathBuf>,
    },

    /// Show envelope identity and metadata
    Inspect {
        /// Envelope file (.json or .yaml)
        envelope: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Expand ~ in config path
    let config_path = expand_tilde(&cli.config);

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    init_logging(&config, cli.verbose);

    if let Err(e) = run_command(cli.command, &config_path, &config) {
        error!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path)
    } else {
        Config::from_env()
    }
}

/// Setup logging: RUST_LOG wins, then --verbose, then the config level
fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let log_file = config.logging.file.as_ref().and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| eprintln!("Cannot open log file {:?}: {}", path, e))
            .ok()
    });

    let result = match log_file {
        Some(file) => tracing::subscriber::set_global_default(
            FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .finish(),
        ),
        None => tracing::subscriber::set_global_default(
            FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .finish(),
        ),
    };

    if let Err(e) = result {
        eprintln!("Failed to set subscriber: {}", e);
    }
}

fn run_command(command: Commands, config_path: &Path, config: &Config) -> Result<()> {
    match command {
        Commands::Init { force } => cmd_init(config_path, force),
        Commands::Seal {
            payload,
            destination,
            source,
            roles,
            password_file,
            output,
        } => cmd_seal(
            config,
            &payload,
            SealTarget {
                destination,
                source,
                roles,
            },
            password_file,
            output,
        ),
        Commands::Open {
            envelope,
            password_file,
        } => cmd_open(config, &envelope, password_file),
        Commands::Inspect { envelope } => cmd_inspect(&envelope),
    }
}

struct SealTarget {
    destination: String,
    source: String,
    roles: Vec<String>,
}

fn cmd_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration already exists at {:?} (use --force to overwrite)",
            config_path
        )));
    }

    let config = Config::default();
    config.save(config_path)?;

    info!("Configuration saved to {:?}", config_path);
    info!(
        "KDF: PBKDF2-HMAC-SHA256, {} iterations",
        config.encryption.kdf_iterations
    );
    Ok(())
}

fn cmd_seal(
    config: &Config,
    payload_path: &Path,
    target: SealTarget,
    password_file: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let raw = std::fs::read_to_string(payload_path)?;
    let payload: EventPayload = serde_json::from_str(&raw)
        .map_err(|e| Error::Deserialization(format!("Payload is not valid JSON: {}", e)))?;

    let passphrase = read_passphrase(password_file, "Enter envelope passphrase: ")?;

    let cipher = EnvelopeCipher::new(&config.encryption);
    let request = SealRequest::new(payload, target.destination, target.source)
        .with_roles(target.roles);
    let envelope = cipher.create_secure_encrypted(&DirectRouter, request, passphrase.as_bytes())?;

    match output {
        Some(path) => {
            let encoded = WireFormat::from_path(&path).encode(&envelope)?;
            std::fs::write(&path, encoded)?;
            info!("Envelope {} written to {:?}", envelope.envelope_id(), path);
        }
        None => println!("{}", WireFormat::Json.encode(&envelope)?),
    }

    Ok(())
}

fn cmd_open(config: &Config, envelope_path: &Path, password_file: Option<PathBuf>) -> Result<()> {
    let envelope = read_envelope(envelope_path)?;
    let passphrase = read_passphrase(password_file, "Enter envelope passphrase: ")?;

    let cipher = EnvelopeCipher::new(&config.encryption);
    let payload = cipher.decrypt(&envelope, passphrase.as_bytes())?;

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn cmd_inspect(envelope_path: &Path) -> Result<()> {
    let envelope = read_envelope(envelope_path)?;

    println!("Envelope:    {}", envelope.envelope_id());
    println!("Source node: {}", envelope.source_node_id());
    println!("Timestamp:   {}", envelope.envelope_timestamp().to_rfc3339());
    println!(
        "Route:       {} -> {}",
        envelope.route_spec().route_type.as_str(),
        envelope.destination()
    );
    if !envelope.route_spec().hops.is_empty() {
        println!("Hops:        {}", envelope.route_spec().hops.join(", "));
    }
    if !envelope.authorized_roles().is_empty() {
        println!("Roles:       {}", envelope.authorized_roles().join(", "));
    }
    println!("Content:     {}", envelope.content_hash());
    println!("Encrypted:   {}", envelope.is_encrypted());

    if let Some(meta) = envelope.encryption_metadata() {
        println!();
        println!("Algorithm:   {}", meta.algorithm);
        println!("Key id:      {}", meta.key_id);
        println!("IV:          {}", meta.iv);
        println!("Auth tag:    {}", meta.auth_tag);
        println!("AAD hash:    {}", meta.aad_hash);
        let bound = nodeseal::envelope::aad::aad_hash(&envelope.associated_data());
        println!(
            "Identity:    {}",
            if bound == meta.aad_hash {
                "matches"
            } else {
                "MISMATCH"
            }
        );
    }

    Ok(())
}

fn read_envelope(path: &Path) -> Result<Envelope<EventPayload>> {
    let content = std::fs::read_to_string(path)?;
    WireFormat::from_path(path).decode(&content)
}

/// Read the passphrase from a file or prompt for it
fn read_passphrase(password_file: Option<PathBuf>, prompt: &str) -> Result<Zeroizing<String>> {
    let passphrase = if let Some(path) = password_file {
        std::fs::read_to_string(&path)
            .map_err(|e| Error::Internal(format!("Failed to read password file: {}", e)))?
            .trim()
            .to_string()
    } else {
        rpassword::prompt_password(prompt).map_err(|e| Error::Internal(e.to_string()))?
    };
    Ok(Zeroizing::new(passphrase))
}

/// Expand ~ to home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
