use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
mod auth;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use unvault::{DecryptOptions, KdfLimits, Storage, Strategy, Unvault};
use zeroize::Zeroizing;

const LOG_ENV: &str = "UNVAULT_LOG";

#[derive(Debug, clap::Args)]
struct ScryptLimitArgs {
    /// Largest accepted scrypt log2(N) (default: 20)
    #[arg(long = "max-log-n")]
    max_log_n: Option<u8>,

    /// Largest accepted scrypt block size r (default: 32)
    #[arg(long = "max-r")]
    max_r: Option<u32>,

    /// Largest accepted scrypt parallelism p (default: 16)
    #[arg(long = "max-p")]
    max_p: Option<u32>,

    /// Largest accepted scrypt memory use in MiB (default: 1024)
    #[arg(long = "max-memory-mib")]
    max_memory_mib: Option<u64>,
}

impl ScryptLimitArgs {
    fn to_limits(&self) -> KdfLimits {
        let default = KdfLimits::default();

        KdfLimits {
            max_log_n: self.max_log_n.unwrap_or(default.max_log_n),
            max_r: self.max_r.unwrap_or(default.max_r),
            max_p: self.max_p.unwrap_or(default.max_p),
            max_memory_bytes: self
                .max_memory_mib
                .map(|mib| mib.saturating_mul(1024 * 1024))
                .unwrap_or(default.max_memory_bytes),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "unvault")]
#[command(
    version,
    about = "Decrypts password-protected authenticator vault exports offline."
)]
struct Cli {
    /// Path to the encrypted vault export
    #[arg(long, global = true, value_name = "PATH", env = "UNVAULT_VAULT")]
    vault: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Decrypts the vault and prints its database
    Decrypt {
        /// Write the database to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Re-indent the decrypted JSON
        #[arg(long, default_value_t = false)]
        pretty: bool,

        /// Try key slots on several threads
        #[arg(long, default_value_t = false)]
        parallel: bool,

        /// Worker threads for --parallel (default: available CPUs)
        #[arg(long, requires = "parallel")]
        workers: Option<usize>,

        #[command(flatten)]
        limits: ScryptLimitArgs,
    },

    /// Shows the vault's format version and key slots
    Info,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}

fn open_vault(path: Option<PathBuf>) -> Result<Unvault> {
    let path = path.context("no vault given; pass --vault or set UNVAULT_VAULT")?;
    Unvault::open(Storage::new(path))
}

fn pretty_json(plaintext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let value: serde_json::Value =
        serde_json::from_slice(plaintext).context("decrypted database is not JSON")?;
    Ok(Zeroizing::new(serde_json::to_vec_pretty(&value)?))
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let args = Cli::parse();
    match args.command {
        Commands::Decrypt {
            output,
            pretty,
            parallel,
            workers,
            limits,
        } => {
            let vault = open_vault(args.vault)?;

            let strategy = match (parallel, workers) {
                (false, _) => Strategy::Sequential,
                (true, Some(workers)) => Strategy::Parallel { workers },
                (true, None) => Strategy::parallel(),
            };
            let options = DecryptOptions {
                limits: limits.to_limits(),
                strategy,
            };

            let password = auth::read_password()?;
            let mut plaintext = vault.decrypt(password, &options)?;
            if pretty {
                plaintext = pretty_json(&plaintext)?;
            }

            match output {
                Some(path) => {
                    let target = Storage::new(path);
                    target.save(&plaintext)?;
                    println!("database written to {}", target.path().display());
                }
                None => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&plaintext)?;
                    stdout.write_all(b"\n")?;
                    stdout.flush()?;
                }
            }
        }

        Commands::Info => {
            let vault = open_vault(args.vault)?;
            println!("{}", vault.info());
        }
    }

    Ok(())
}
