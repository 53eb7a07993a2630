//! cachet: hybrid file encryption CLI
//!
//! Commands:
//!   encrypt -f <in> [-o <out>] [-s aes-256-cbc] (--key K | --public-key P | -g)
//!   decrypt -f <in> [-o <out>] [-s aes-256-cbc] (--key K | --private-key P)
//!
//! Bulk data is AES-encrypted in one of five modes and framed in chunks;
//! with an RSA key the session key is wrapped into an envelope header
//! (hybrid scheme). Key flags accept inline values or `@path` file
//! references.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zeroize::Zeroizing;

use cachet_core::config::CachetConfig;
use cachet_core::{KeyBits, SecuritySpec};
use cachet_crypto::{derive_key, SessionKey};
use cachet_pipeline::{decrypt_file, encrypt_file, KeySource, ProgressFn};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "cachet",
    version,
    about = "Hybrid file encryption",
    long_about = "cachet: AES-encrypt files in chunks, with an optional RSA-wrapped session key"
)]
struct Cli {
    /// Path to cachet.toml configuration file
    #[arg(long, short = 'c', env = "CACHET_CONFIG", default_value = "cachet.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt a file
    Encrypt {
        /// Input file
        #[arg(long, short = 'f')]
        file: PathBuf,

        /// Output file (default: overwrite the input path)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Security mode aes-<bits>-<mode>, e.g. aes-256-cbc (overrides config)
        #[arg(long, short = 's')]
        security: Option<String>,

        /// Symmetric key material, inline or @path
        #[arg(long)]
        key: Option<String>,

        /// RSA public key (PKCS#1 PEM), inline or @path; enables the envelope
        #[arg(long)]
        public_key: Option<String>,

        /// Generate public.key/private.key in the working directory and
        /// encrypt with the fresh public key
        #[arg(long, short = 'g')]
        generate_keypair: bool,
    },

    /// Decrypt a file
    Decrypt {
        /// Input file
        #[arg(long, short = 'f')]
        file: PathBuf,

        /// Output file (default: overwrite the input path)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Security mode aes-<bits>-<mode> used at encryption time
        #[arg(long, short = 's')]
        security: Option<String>,

        /// Symmetric key material, inline or @path
        #[arg(long)]
        key: Option<String>,

        /// RSA private key (PKCS#1 PEM), inline or @path; reads the envelope
        #[arg(long)]
        private_key: Option<String>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(&config);
    tracing::debug!(config = %cli.config.display(), "configuration loaded");

    match cli.command {
        Commands::Encrypt {
            file,
            out,
            security,
            key,
            public_key,
            generate_keypair,
        } => cmd_encrypt(&config, &file, out, security, key, public_key, generate_keypair),
        Commands::Decrypt {
            file,
            out,
            security,
            key,
            private_key,
        } => cmd_decrypt(&config, &file, out, security, key, private_key),
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<CachetConfig> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(CachetConfig::default())
    }
}

fn init_logging(config: &CachetConfig) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    if config.log.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

// ── Key material ──────────────────────────────────────────────────────────────

/// Resolve a key flag value: `@path` reads the file, anything else is used
/// verbatim.
fn resolve_material(value: &str) -> Result<Zeroizing<Vec<u8>>> {
    if let Some(path) = value.strip_prefix('@') {
        Ok(Zeroizing::new(
            fs::read(path).with_context(|| format!("reading key material: {path}"))?,
        ))
    } else {
        Ok(Zeroizing::new(value.as_bytes().to_vec()))
    }
}

/// Resolve an RSA key flag (PEM is text, so `@path` is read as a string).
fn resolve_pem(value: &str) -> Result<String> {
    if let Some(path) = value.strip_prefix('@') {
        fs::read_to_string(path).with_context(|| format!("reading key file: {path}"))
    } else {
        Ok(value.to_string())
    }
}

fn random_session_key(bits: KeyBits) -> SessionKey {
    let mut bytes = vec![0u8; bits.key_len()];
    OsRng.fill_bytes(&mut bytes);
    SessionKey::new(bytes)
}

fn parse_security(config: &CachetConfig, flag: Option<&str>) -> Result<SecuritySpec> {
    let value = flag.unwrap_or(&config.cipher.security);
    value
        .parse()
        .with_context(|| format!("parsing security mode: {value}"))
}

// ── Progress bar ──────────────────────────────────────────────────────────────

fn make_progress_bar(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn bar_progress(pb: &ProgressBar) -> ProgressFn {
    let pb = pb.clone();
    Box::new(move |done, total, msg| {
        pb.set_length(total);
        pb.set_position(done);
        pb.set_message(msg.to_string());
    })
}

// ── `cachet encrypt` ──────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn cmd_encrypt(
    config: &CachetConfig,
    file: &Path,
    out: Option<PathBuf>,
    security: Option<String>,
    key: Option<String>,
    public_key: Option<String>,
    generate_keypair: bool,
) -> Result<()> {
    let spec = parse_security(config, security.as_deref())?;
    let out_path = out.unwrap_or_else(|| file.to_path_buf());

    let (session_key, public_pem) = if generate_keypair {
        if key.is_some() || public_key.is_some() {
            bail!("--generate-keypair conflicts with --key and --public-key");
        }
        let paths = cachet_envelope::generate_keypair(Path::new("."))
            .context("generating RSA keypair")?;
        println!(
            "Keypair written: {} / {}",
            paths.public.display(),
            paths.private.display()
        );
        let pem = fs::read_to_string(&paths.public)?;
        (random_session_key(spec.bits), Some(pem))
    } else if let Some(value) = public_key {
        if key.is_some() {
            bail!("--public-key conflicts with --key");
        }
        (random_session_key(spec.bits), Some(resolve_pem(&value)?))
    } else if let Some(value) = key {
        let material = resolve_material(&value)?;
        let session_key = derive_key(&material, spec.bits).context("deriving session key")?;
        (session_key, None)
    } else {
        bail!("one of --key, --public-key, or --generate-keypair is required");
    };

    println!("Encrypting {} ({spec}) → {}", file.display(), out_path.display());

    let pb = make_progress_bar("encrypt");
    let progress = bar_progress(&pb);
    let summary = encrypt_file(
        file,
        &out_path,
        &session_key,
        spec.mode,
        public_pem.as_deref(),
        config.cipher.chunk_size_bytes(),
        Some(&progress),
    )
    .with_context(|| format!("encrypting {}", file.display()))?;
    pb.finish_with_message("done".to_string());

    println!();
    println!("Encrypted:");
    println!("  chunks:  {}", summary.records);
    println!("  in:      {}", fmt_bytes(summary.bytes_in));
    println!("  out:     {}", fmt_bytes(summary.bytes_out));
    println!("  output:  {}", summary.output.display());
    Ok(())
}

// ── `cachet decrypt` ──────────────────────────────────────────────────────────

fn cmd_decrypt(
    config: &CachetConfig,
    file: &Path,
    out: Option<PathBuf>,
    security: Option<String>,
    key: Option<String>,
    private_key: Option<String>,
) -> Result<()> {
    let spec = parse_security(config, security.as_deref())?;
    let out_path = out.unwrap_or_else(|| file.to_path_buf());

    // Resolve up front so the borrow for KeySource lives long enough
    let derived;
    let pem;
    let source = match (key, private_key) {
        (Some(_), Some(_)) => bail!("--key conflicts with --private-key"),
        (None, None) => bail!("one of --key or --private-key is required"),
        (Some(value), None) => {
            let material = resolve_material(&value)?;
            derived = derive_key(&material, spec.bits).context("deriving session key")?;
            KeySource::Provided(&derived)
        }
        (None, Some(value)) => {
            pem = resolve_pem(&value)?;
            KeySource::Wrapped {
                private_key_pem: &pem,
            }
        }
    };

    println!("Decrypting {} ({spec}) → {}", file.display(), out_path.display());

    let pb = make_progress_bar("decrypt");
    let progress = bar_progress(&pb);
    let summary = decrypt_file(file, &out_path, spec.mode, source, Some(&progress))
        .with_context(|| format!("decrypting {}", file.display()))?;
    pb.finish_with_message("done".to_string());

    println!();
    println!("Decrypted:");
    println!("  records: {}", summary.records);
    println!("  out:     {}", fmt_bytes(summary.bytes_out));
    println!("  output:  {}", summary.output.display());
    Ok(())
}

// ── Utilities ─────────────────────────────────────────────────────────────────

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
