//! cryptstream - Chunked authenticated encryption for seekable files
//!
//! Usage:
//!   cryptstream keygen <key_file>                     - Create a new random key
//!   cryptstream encrypt --key <key_file> <in> <out>   - Encrypt a file
//!   cryptstream decrypt --key <key_file> <in> <out>   - Decrypt a file
//!   cryptstream cat --key <key_file> <in>             - Print a plaintext range
//!   cryptstream size <in>                             - Plaintext size without decrypting
//!   cryptstream verify --key <key_file> <in>          - Authenticate every chunk

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use cryptstream::prelude::*;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "cryptstream")]
#[command(author = "cryptstream Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Random-access authenticated encryption for files")]
struct Cli {
    /// Configuration file path (defaults to ~/.config/cryptstream/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random 256-bit key and write it as hex
    Keygen {
        /// Destination key file
        key_file: PathBuf,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Encrypt a plaintext file into chunked ciphertext
    Encrypt {
        /// Hex key file
        #[arg(short, long)]
        key: PathBuf,

        /// Plaintext input
        input: PathBuf,

        /// Ciphertext output
        output: PathBuf,
    },

    /// Decrypt a whole ciphertext file
    Decrypt {
        /// Hex key file
        #[arg(short, long)]
        key: PathBuf,

        /// Ciphertext input
        input: PathBuf,

        /// Plaintext output
        output: PathBuf,
    },

    /// Write a plaintext byte range to stdout
    Cat {
        /// Hex key file
        #[arg(short, long)]
        key: PathBuf,

        /// Plaintext offset to start at
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Number of bytes to print (defaults to the rest of the stream)
        #[arg(long)]
        length: Option<u64>,

        /// Ciphertext input
        input: PathBuf,
    },

    /// Report plaintext size from the ciphertext length alone
    Size {
        /// Ciphertext input
        input: PathBuf,
    },

    /// Authenticate every chunk without writing plaintext
    Verify {
        /// Hex key file
        #[arg(short, long)]
        key: PathBuf,

        /// Ciphertext input
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Setup logging; stdout is reserved for `cat` output
    let log_level = if cli.verbose { "debug" } else { "info" };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let config_path = cli
        .config
        .as_deref()
        .map(expand_tilde)
        .unwrap_or_else(Config::default_path);

    if let Err(e) = run_command(cli.command, &config_path) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_command(command: Commands, config_path: &Path) -> anyhow::Result<()> {
    let config = Config::load_or_default(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    match command {
        Commands::Keygen { key_file, force } => cmd_keygen(&key_file, force),
        Commands::Encrypt { key, input, output } => cmd_encrypt(&config, &key, &input, &output),
        Commands::Decrypt { key, input, output } => cmd_decrypt(&config, &key, &input, &output),
        Commands::Cat {
            key,
            offset,
            length,
            input,
        } => cmd_cat(&config, &key, &input, offset, length),
        Commands::Size { input } => cmd_size(&config, &input),
        Commands::Verify { key, input } => cmd_verify(&config, &key, &input),
    }
}

fn load_key(path: &Path) -> anyhow::Result<StreamKey> {
    StreamKey::load(path).with_context(|| format!("reading key file {}", path.display()))
}

fn open_reader(
    config: &Config,
    key: &StreamKey,
    input: &Path,
) -> anyhow::Result<EncryptedStream<FileStore>> {
    let store =
        FileStore::open(input).with_context(|| format!("opening {}", input.display()))?;
    let stream = EncryptedStream::with_config(key, store, &config.stream)?;
    stream
        .open(OpenMode::Read)
        .with_context(|| format!("{} is not a stream of this layout", input.display()))?;
    Ok(stream)
}

fn cmd_keygen(key_file: &Path, force: bool) -> anyhow::Result<()> {
    if key_file.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            key_file.display()
        );
    }

    let key = StreamKey::generate();
    let mut file = File::create(key_file)
        .with_context(|| format!("creating key file {}", key_file.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(key.to_hex().as_bytes())?;
    file.write_all(b"\n")?;

    info!("Wrote new key to {}", key_file.display());
    Ok(())
}

fn cmd_encrypt(config: &Config, key: &Path, input: &Path, output: &Path) -> anyhow::Result<()> {
    let key = load_key(key)?;
    let mut source = File::open(input).with_context(|| format!("opening {}", input.display()))?;

    let store =
        FileStore::create(output).with_context(|| format!("creating {}", output.display()))?;
    let stream = EncryptedStream::with_config(&key, store, &config.stream)?;
    stream.open(OpenMode::Write)?;

    let copied = io::copy(&mut source, &mut StreamIo::new(&stream))?;
    stream.close()?;

    info!(
        "Encrypted {} bytes from {} into {}",
        copied,
        input.display(),
        output.display()
    );
    Ok(())
}

fn cmd_decrypt(config: &Config, key: &Path, input: &Path, output: &Path) -> anyhow::Result<()> {
    let key = load_key(key)?;
    let stream = open_reader(config, &key, input)?;

    // Plaintext only appears at `output` once every chunk has authenticated
    let partial = partial_path(output);
    let mut sink =
        File::create(&partial).with_context(|| format!("creating {}", partial.display()))?;
    let copied = match io::copy(&mut StreamIo::new(&stream), &mut sink).and_then(|copied| {
        sink.sync_all()?;
        Ok(copied)
    }) {
        Ok(copied) => copied,
        Err(e) => {
            drop(sink);
            if let Err(cleanup) = std::fs::remove_file(&partial) {
                warn!(
                    "Could not remove partial output {}: {}",
                    partial.display(),
                    cleanup
                );
            }
            return Err(e).with_context(|| format!("decrypting {}", input.display()));
        }
    };
    drop(sink);
    std::fs::rename(&partial, output)
        .with_context(|| format!("moving {} into place", output.display()))?;
    stream.close()?;

    info!(
        "Decrypted {} bytes from {} into {}",
        copied,
        input.display(),
        output.display()
    );
    Ok(())
}

fn cmd_cat(
    config: &Config,
    key: &Path,
    input: &Path,
    offset: u64,
    length: Option<u64>,
) -> anyhow::Result<()> {
    let key = load_key(key)?;
    let stream = open_reader(config, &key, input)?;
    stream.seek(offset)?;

    let remaining = stream.size()? - offset;
    let length = length.map_or(remaining, |len| len.min(remaining));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    io::copy(&mut StreamIo::new(&stream).take(length), &mut out)?;
    out.flush()?;

    stream.close()?;
    Ok(())
}

fn cmd_size(config: &Config, input: &Path) -> anyhow::Result<()> {
    let raw_len = std::fs::metadata(input)
        .with_context(|| format!("reading {}", input.display()))?
        .len();
    let layout = config.stream.layout()?;
    let plaintext_len = layout.total_plaintext_length(raw_len)?;

    println!("File: {}", input.display());
    println!("  Ciphertext:  {} bytes", raw_len);
    println!("  Plaintext:   {} bytes", plaintext_len);
    println!(
        "  Chunks:      {} x {} bytes",
        layout.chunk_count(plaintext_len),
        layout.chunk_size()
    );
    Ok(())
}

fn cmd_verify(config: &Config, key: &Path, input: &Path) -> anyhow::Result<()> {
    let key = load_key(key)?;
    let stream = open_reader(config, &key, input)?;

    let chunks = stream.verify()?;
    let size = stream.size()?;
    stream.close()?;

    println!("{}: OK ({} chunks, {} bytes)", input.display(), chunks, size);
    Ok(())
}

/// Sibling of `output` used while decrypting
fn partial_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    output.with_file_name(name)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path_is_a_sibling() {
        let partial = partial_path(Path::new("/tmp/out/plain.txt"));
        assert_eq!(partial, PathBuf::from("/tmp/out/plain.txt.partial"));
        assert_eq!(partial.parent(), Some(Path::new("/tmp/out")));
    }

    #[test]
    fn test_failed_decrypt_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let key_file = dir.path().join("key");
        let input = dir.path().join("cipher");
        let output = dir.path().join("plain");

        cmd_keygen(&key_file, false).unwrap();
        let key = StreamKey::load(&key_file).unwrap();
        let config = Config::default();

        let stream =
            EncryptedStream::with_config(&key, FileStore::create(&input).unwrap(), &config.stream)
                .unwrap();
        stream.open(OpenMode::Write).unwrap();
        stream.write(&vec![0x5a; 200_000]).unwrap();
        stream.close().unwrap();

        // Corrupt the last chunk so earlier chunks decrypt before the failure
        let mut bytes = std::fs::read(&input).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(&input, &bytes).unwrap();

        assert!(cmd_decrypt(&config, &key_file, &input, &output).is_err());
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }
}
