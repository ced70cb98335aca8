//! Skiff CLI - air-gapped package bundles for Kubernetes

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use skiff_core::SkiffConfig;

mod commands;
mod display;
mod error;
mod exit_codes;
mod util;

use error::Result;

#[derive(Parser)]
#[command(name = "skiff")]
#[command(author = "Skiff Contributors")]
#[command(version)]
#[command(about = "Air-gapped package bundles for Kubernetes", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

/// Overrides for values read from the config file
#[derive(Args, Clone, Debug, Default)]
struct GlobalArgs {
    /// Target architecture
    #[arg(short, long, global = true, env = "SKIFF_ARCHITECTURE")]
    architecture: Option<String>,

    /// Skeleton and blob cache directory
    #[arg(long = "cache", global = true, env = "SKIFF_CACHE")]
    cache: Option<PathBuf>,

    /// Parent directory for scratch space
    #[arg(long = "tmpdir", global = true)]
    temp_dir: Option<PathBuf>,

    /// Concurrent layer downloads per package
    #[arg(long, global = true, env = "SKIFF_OCI_CONCURRENCY")]
    oci_concurrency: Option<usize>,

    /// Allow URL downloads without --shasum
    #[arg(long, global = true)]
    insecure: bool,

    /// Talk plain HTTP to registries
    #[arg(long, global = true)]
    plain_http: bool,
}

impl GlobalArgs {
    fn config(&self) -> Result<SkiffConfig> {
        let mut config = SkiffConfig::load()?;
        if let Some(arch) = &self.architecture {
            config.architecture = arch.clone();
        }
        if let Some(cache) = &self.cache {
            config.cache_dir = cache.clone();
        }
        if let Some(temp) = &self.temp_dir {
            config.temp_dir = Some(temp.clone());
        }
        if let Some(concurrency) = self.oci_concurrency {
            config.oci_concurrency = concurrency.max(1);
        }
        config.insecure |= self.insecure;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect, pull, extract, checksum, sign and verify packages
    Package {
        #[command(subcommand)]
        command: PackageCommands,
    },

    /// Tools for package authors
    Dev {
        #[command(subcommand)]
        command: DevCommands,
    },

    /// Generate a signing key pair
    Keygen {
        /// Output directory (default: ~/.skiff)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite existing keys
        #[arg(long)]
        force: bool,

        /// Do not password-protect the secret key
        #[arg(long)]
        no_password: bool,
    },
}

#[derive(Subcommand)]
enum PackageCommands {
    /// Print the definition of a package
    Inspect {
        /// Package source: oci:// reference, URL, tarball or .part000 shard
        source: String,

        /// Write the package SBOMs into this directory
        #[arg(long)]
        sbom: Option<PathBuf>,

        /// Public key to verify the package signature with
        #[arg(short, long)]
        key: Option<PathBuf>,

        /// Expected sha256 of the package
        #[arg(long)]
        shasum: Option<String>,
    },

    /// Download a package from a registry into a local archive
    Pull {
        /// oci:// reference
        reference: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Expected sha256 of the package manifest
        #[arg(long)]
        shasum: Option<String>,
    },

    /// Load a package into a directory
    Extract {
        /// Package source: oci:// reference, URL, tarball or .part000 shard
        source: String,

        /// Comma separated components to load; prefix with `-` to exclude
        #[arg(long, default_value = "")]
        components: String,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Public key to verify the package signature with
        #[arg(short, long)]
        key: Option<PathBuf>,

        /// Expected sha256 of the package
        #[arg(long)]
        shasum: Option<String>,
    },

    /// Regenerate checksums.txt for a package directory
    Checksums {
        /// Package directory
        dir: PathBuf,
    },

    /// Sign a package directory
    Sign {
        /// Package directory
        dir: PathBuf,

        /// Secret key (default: ~/.skiff/skiff.key)
        #[arg(short, long)]
        key: Option<PathBuf>,
    },

    /// Verify the checksums and signature of a package directory
    Verify {
        /// Package directory
        dir: PathBuf,

        /// Public key (default: from config)
        #[arg(short, long)]
        key: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum DevCommands {
    /// Print the definition with every import resolved
    Compose {
        /// Package directory
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Flavor to build
        #[arg(long, default_value = "")]
        flavor: String,

        /// Comma separated components to keep; prefix with `-` to exclude
        #[arg(long, default_value = "")]
        components: String,

        /// Write the definition here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the definition as a differential package
    Differential {
        /// Package directory
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// The previously built package to diff against
        #[arg(long)]
        reference: String,

        /// Flavor to build
        #[arg(long, default_value = "")]
        flavor: String,

        /// Write the definition here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let global = cli.global;

    match cli.command {
        Commands::Keygen {
            output,
            force,
            no_password,
        } => commands::keygen::run(output.as_deref(), force, no_password),

        Commands::Package { command } => {
            let config = global.config()?;
            match command {
                PackageCommands::Inspect {
                    source,
                    sbom,
                    key,
                    shasum,
                } => {
                    let opts = commands::SourceArgs {
                        source: &source,
                        key: key.as_deref(),
                        shasum: shasum.as_deref(),
                        plain_http: global.plain_http,
                    };
                    commands::inspect::run(&config, &opts, sbom.as_deref()).await
                }
                PackageCommands::Pull {
                    reference,
                    output,
                    shasum,
                } => {
                    let opts = commands::SourceArgs {
                        source: &reference,
                        key: None,
                        shasum: shasum.as_deref(),
                        plain_http: global.plain_http,
                    };
                    commands::pull::run(&config, &opts, &output).await
                }
                PackageCommands::Extract {
                    source,
                    components,
                    output,
                    key,
                    shasum,
                } => {
                    let opts = commands::SourceArgs {
                        source: &source,
                        key: key.as_deref(),
                        shasum: shasum.as_deref(),
                        plain_http: global.plain_http,
                    };
                    commands::extract::run(&config, &opts, &components, &output).await
                }
                PackageCommands::Checksums { dir } => commands::checksums::run(&dir),
                PackageCommands::Sign { dir, key } => commands::sign::run(&dir, key.as_deref()),
                PackageCommands::Verify { dir, key } => {
                    commands::verify::run(&config, &dir, key.as_deref())
                }
            }
        }

        Commands::Dev { command } => {
            let config = global.config()?;
            match command {
                DevCommands::Compose {
                    dir,
                    flavor,
                    components,
                    output,
                } => {
                    commands::compose::run(
                        &config,
                        &dir,
                        &flavor,
                        &components,
                        output.as_deref(),
                        global.plain_http,
                    )
                    .await
                }
                DevCommands::Differential {
                    dir,
                    reference,
                    flavor,
                    output,
                } => {
                    commands::differential::run(
                        &config,
                        &dir,
                        &reference,
                        &flavor,
                        output.as_deref(),
                        global.plain_http,
                    )
                    .await
                }
            }
        }
    }
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}
