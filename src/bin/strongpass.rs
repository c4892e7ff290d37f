//! Strongpass CLI - RSA based password encoding
//!
//! Generates key pairs and encodes/decodes single passwords using the key
//! files configured on the command line or in the environment.

use clap::{Args, Parser, Subcommand};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use strongpass::error::Result;
use strongpass::keyfile::{self, KeyLocations};
use strongpass::legacy::LegacyObfuscator;
use strongpass::rsacrypt::{AsymmetricCipher, RsaCipher};
use strongpass::secret::{ReaderSecretReader, SecretReader, TerminalSecretReader};
use strongpass::{StrongPasswordEncoder, TwoWayPasswordEncoder};

#[derive(Parser)]
#[command(name = "strongpass")]
#[command(version)]
#[command(about = "RSA based two-way password encoding.", long_about = None)]
struct Cli {
    #[command(flatten)]
    keys: KeyArgs,

    /// Log debug details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Key file locations. Unset flags fall back to the
/// `KETTLE_STRONG_PASSWORD_ENCODED_*` environment variables, then to
/// `./public.key` and `./private.key`.
#[derive(Args)]
struct KeyArgs {
    /// Directory holding the public key
    #[arg(long, global = true, value_name = "DIR")]
    public_key_dir: Option<PathBuf>,

    /// File name of the public key
    #[arg(long, global = true, value_name = "NAME")]
    public_key_file: Option<String>,

    /// Directory holding the private key
    #[arg(long, global = true, value_name = "DIR")]
    private_key_dir: Option<PathBuf>,

    /// File name of the private key
    #[arg(long, global = true, value_name = "NAME")]
    private_key_file: Option<String>,
}

impl KeyArgs {
    fn locations(self) -> KeyLocations {
        let mut locations = KeyLocations::from_env();
        if let Some(dir) = self.public_key_dir {
            locations.public.directory = dir;
        }
        if let Some(name) = self.public_key_file {
            locations.public.file_name = name;
        }
        if let Some(dir) = self.private_key_dir {
            locations.private.directory = dir;
        }
        if let Some(name) = self.private_key_file {
            locations.private.file_name = name;
        }
        locations
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new key pair and write it to the key files
    #[command(alias = "g")]
    Keygen {
        /// Replace existing key files
        #[arg(long)]
        force: bool,

        /// Also print both keys to stdout
        #[arg(long)]
        print: bool,
    },

    /// Encode a password read from the terminal (or stdin)
    #[command(alias = "e")]
    Encode {
        /// Read the password from stdin instead of from terminal
        #[arg(long)]
        secret_stdin: bool,

        /// Output bare ciphertext without the prefix
        #[arg(long)]
        no_prefix: bool,
    },

    /// Decode an encoded password
    #[command(alias = "d")]
    Decode {
        /// The encoded value
        #[arg(allow_hyphen_values = true)]
        value: String,

        /// Treat the value as bare ciphertext without a prefix
        #[arg(long, conflicts_with = "lenient")]
        strict: bool,

        /// Fall back to legacy decoding when strong decryption fails
        #[arg(long)]
        lenient: bool,
    },

    /// Print the recognized prefixes, strong first
    Prefixes,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let locations = cli.keys.locations();
    let result = match cli.command {
        Commands::Keygen { force, print } => keygen(&locations, force, print),
        Commands::Encode {
            secret_stdin,
            no_prefix,
        } => {
            let mut reader = get_secret_reader(secret_stdin);
            encode(&locations, &mut *reader, no_prefix)
        }
        Commands::Decode {
            value,
            strict,
            lenient,
        } => decode(&locations, &value, strict, lenient),
        Commands::Prefixes => {
            let encoder = StrongPasswordEncoder::new(locations);
            for prefix in encoder.prefixes() {
                println!("{}", prefix);
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e.chain_message());
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "strongpass=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn keygen(locations: &KeyLocations, force: bool, print: bool) -> Result<()> {
    let pair = RsaCipher::new().generate_key_pair()?;
    keyfile::write_key_pair(&pair, locations, force)
        .map_err(|e| e.with_context("failed to write key pair"))?;
    if print {
        println!("{}", pair.export_listing().as_str());
    }
    Ok(())
}

fn ready_encoder(locations: &KeyLocations) -> Result<StrongPasswordEncoder> {
    let legacy = LegacyObfuscator::from_env()?;
    let mut encoder = StrongPasswordEncoder::new(locations.clone()).with_legacy(legacy);
    encoder.init()?;
    Ok(encoder)
}

fn encode(locations: &KeyLocations, reader: &mut dyn SecretReader, no_prefix: bool) -> Result<()> {
    let encoder = ready_encoder(locations)?;
    let secret = reader.read_secret()?;
    let encoded = encoder.encode(&secret, !no_prefix)?;
    println!("{}", encoded);
    Ok(())
}

fn decode(locations: &KeyLocations, value: &str, strict: bool, lenient: bool) -> Result<()> {
    let encoder = ready_encoder(locations)?;
    let decoded = if lenient {
        encoder.decode_lenient(value)?
    } else {
        encoder
            .decode(Some(value), !strict)?
            .unwrap_or_default()
    };
    println!("{}", decoded);
    Ok(())
}

fn get_secret_reader(use_stdin: bool) -> Box<dyn SecretReader> {
    if use_stdin {
        Box::new(ReaderSecretReader::new(Box::new(io::stdin())))
    } else {
        Box::new(TerminalSecretReader::new())
    }
}
