//! decvol: sectioned counter-mode volume encryption CLI
//!
//! Commands:
//!   keygen <path>               - write a random 256-bit master key
//!   init [<state>]              - write zeroed counters for the configured volume
//!   encrypt <in> <out>          - encrypt a whole volume, advancing the counters
//!   decrypt <in> <out>          - decrypt a whole volume with the stored counters
//!   rotate <volume> --section j - re-key one section of a ciphertext in place
//!   self-test                   - run the built-in known-input checks
//!   config show                 - display current configuration

mod state;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use decvol_core::config::DecConfig;
use decvol_core::Geometry;
use decvol_crypto::{BlockCipherKey, DecMode, KEY_SIZE};

use crate::state::{write_atomic, write_atomic_private, CounterStore};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "decvol",
    version,
    about = "Sectioned counter-mode volume encryption",
    long_about = "decvol: encrypt fixed-layout volumes with Magma or Kuznyechik, rotating section keys in place"
)]
struct Cli {
    /// Path to decvol.toml configuration file
    #[arg(long, short = 'c', env = "DECVOL_CONFIG", default_value = "decvol.toml")]
    config: PathBuf,

    /// Master key file (32 raw bytes)
    #[arg(long, short = 'k', env = "DECVOL_KEY_FILE")]
    key_file: Option<PathBuf>,

    /// Counter state JSON file (overrides config)
    #[arg(long, short = 's')]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a random master key
    Keygen {
        /// Destination key file
        path: PathBuf,
        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Write fresh zeroed counters sized for the configured volume
    Init {
        /// Counter state file (default: --state, then config)
        state: Option<PathBuf>,
        /// Overwrite existing counters
        #[arg(long)]
        force: bool,
    },

    /// Encrypt a whole volume
    Encrypt {
        input: PathBuf,
        output: PathBuf,
    },

    /// Decrypt a whole volume
    Decrypt {
        input: PathBuf,
        output: PathBuf,
    },

    /// Move one section of a ciphertext volume to a new key epoch, in place
    Rotate {
        volume: PathBuf,
        /// Section index (0-based)
        #[arg(long)]
        section: u64,
    },

    /// Run the built-in self-test for both ciphers
    #[command(name = "self-test")]
    SelfTest,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = DecConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;
    init_logging(&config.logging.level, &config.logging.format);
    if !cli.config.exists() {
        tracing::warn!("config file not found: {}  (using defaults)", cli.config.display());
    }

    let state_override = cli.state.as_deref();
    match cli.command {
        Commands::Keygen { path, force } => cmd_keygen(&config, &path, force),
        Commands::Init { state, force } => {
            cmd_init(&config, state.as_deref().or(state_override), force)
        }
        Commands::Encrypt { input, output } => {
            let key = load_key(&config, cli.key_file.as_deref())?;
            cmd_encrypt(&config, &key, &input, &output, state_override)
        }
        Commands::Decrypt { input, output } => {
            let key = load_key(&config, cli.key_file.as_deref())?;
            cmd_decrypt(&config, &key, &input, &output, state_override)
        }
        Commands::Rotate { volume, section } => {
            let key = load_key(&config, cli.key_file.as_deref())?;
            cmd_rotate(&config, &key, &volume, section, state_override)
        }
        Commands::SelfTest => cmd_self_test(),
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Key, state and geometry resolution ────────────────────────────────────────

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

/// Resolve the counter state path: CLI flag > config
fn resolve_state_path(config: &DecConfig, override_path: Option<&Path>) -> PathBuf {
    match override_path {
        Some(p) => p.to_path_buf(),
        None => expand_tilde(&config.state.path),
    }
}

fn geometry(config: &DecConfig) -> Result<Geometry> {
    let params = config.volume.parameters();
    params
        .validate(config.volume.cipher.block_width())
        .with_context(|| format!("invalid [volume] parameters: {params:?}"))
}

fn load_key(config: &DecConfig, key_file: Option<&Path>) -> Result<BlockCipherKey> {
    let path = key_file.context(
        "no master key file given\n\
         Pass --key-file <path> or set DECVOL_KEY_FILE.\n\
         Generate one with: decvol keygen <path>",
    )?;
    let bytes = std::fs::read(path)
        .with_context(|| format!("reading key file: {}", path.display()))?;
    BlockCipherKey::from_slice(config.volume.cipher, &bytes)
        .with_context(|| format!("loading key file: {}", path.display()))
}

fn read_volume(path: &Path, geometry: &Geometry) -> Result<Vec<u8>> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if data.len() != geometry.volume_len() {
        anyhow::bail!(
            "{} is {} bytes; the configured volume is {} bytes ({} sections x {} sectors x {} bytes)",
            path.display(),
            data.len(),
            geometry.volume_len(),
            geometry.sections(),
            geometry.sectors_per_section(),
            geometry.sector_len(),
        );
    }
    Ok(data)
}

// ── `decvol keygen` ───────────────────────────────────────────────────────────

fn cmd_keygen(config: &DecConfig, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("key file already exists: {} (use --force to overwrite)", path.display());
    }
    let key = BlockCipherKey::generate(config.volume.cipher);
    write_atomic_private(path, key.as_bytes())?;

    println!("Wrote {}-bit master key to {}", KEY_SIZE * 8, path.display());
    Ok(())
}

// ── `decvol init` ─────────────────────────────────────────────────────────────

fn cmd_init(config: &DecConfig, state_override: Option<&Path>, force: bool) -> Result<()> {
    let geometry = geometry(config)?;
    let state_path = resolve_state_path(config, state_override);
    if state_path.exists() && !force {
        anyhow::bail!(
            "counter state already exists: {} (use --force to reset; existing ciphertexts become undecryptable)",
            state_path.display()
        );
    }

    let mut store = CounterStore::create(&state_path, &geometry);
    store.flush().context("writing counter state")?;

    println!(
        "Initialised counters for {} sections x {} sectors ({}) at {}",
        geometry.sections(),
        geometry.sectors_per_section(),
        geometry.variant(),
        store.path().display()
    );
    Ok(())
}

// ── `decvol encrypt` / `decvol decrypt` ───────────────────────────────────────

fn cmd_encrypt(
    config: &DecConfig,
    key: &BlockCipherKey,
    input: &Path,
    output: &Path,
    state_override: Option<&Path>,
) -> Result<()> {
    let mode =
        DecMode::new(key, &config.volume.parameters()).context("invalid [volume] parameters")?;
    let state_path = resolve_state_path(config, state_override);
    let mut store = CounterStore::open(&state_path)?;
    let mut data = read_volume(input, mode.geometry())?;

    mode.encrypt_in_place(&mut data, store.state_mut())
        .with_context(|| format!("encrypting {}", input.display()))?;

    // counters first: a written ciphertext never pairs with counters that will repeat
    store.flush().context("writing counter state")?;
    write_atomic(output, &data)?;

    tracing::info!(input = %input.display(), output = %output.display(), "volume encrypted");
    println!("Encrypted {} → {} ({} bytes)", input.display(), output.display(), data.len());
    Ok(())
}

fn cmd_decrypt(
    config: &DecConfig,
    key: &BlockCipherKey,
    input: &Path,
    output: &Path,
    state_override: Option<&Path>,
) -> Result<()> {
    let mode =
        DecMode::new(key, &config.volume.parameters()).context("invalid [volume] parameters")?;
    let state_path = resolve_state_path(config, state_override);
    let store = CounterStore::open(&state_path)?;
    let mut data = read_volume(input, mode.geometry())?;

    mode.decrypt_in_place(&mut data, store.state())
        .with_context(|| format!("decrypting {}", input.display()))?;

    write_atomic(output, &data)?;

    tracing::info!(input = %input.display(), output = %output.display(), "volume decrypted");
    println!("Decrypted {} → {} ({} bytes)", input.display(), output.display(), data.len());
    Ok(())
}

// ── `decvol rotate` ───────────────────────────────────────────────────────────

fn cmd_rotate(
    config: &DecConfig,
    key: &BlockCipherKey,
    volume: &Path,
    section: u64,
    state_override: Option<&Path>,
) -> Result<()> {
    let mode =
        DecMode::new(key, &config.volume.parameters()).context("invalid [volume] parameters")?;
    let state_path = resolve_state_path(config, state_override);
    let mut store = CounterStore::open(&state_path)?;
    let mut data = read_volume(volume, mode.geometry())?;

    mode.reencrypt_section_in_place(&mut data, store.state_mut(), section)
        .with_context(|| format!("rotating section {section} of {}", volume.display()))?;

    // volume and counters move to the new epoch together
    let pending = store.stage().context("staging counter state")?;
    write_atomic(volume, &data)?;
    store.commit(&pending).context("writing counter state")?;

    println!(
        "Rotated section {section} of {} (epoch {})",
        volume.display(),
        store.state().section(section)
    );
    Ok(())
}

// ── `decvol self-test` ────────────────────────────────────────────────────────

fn cmd_self_test() -> Result<()> {
    decvol_crypto::selftest::run().context("self-test")?;
    println!("Self-test passed (magma, kuznyechik)");
    Ok(())
}

// ── `decvol config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &DecConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = config.to_toml().context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
