use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{ItemArgs, RunArgs};

#[derive(Parser)]
#[command(name = "sgp")]
#[command(about = "Bulk score import/export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Reconcile a score file against the store. Prints the final status as JSON.
    Import {
        #[command(flatten)]
        item: ItemArgs,

        #[command(flatten)]
        run: RunArgs,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Score file (CSV)
        file: String,
    },

    /// Write the full-roster score file for an item
    Export {
        #[command(flatten)]
        item: ItemArgs,

        /// Output path; stdout when omitted
        #[arg(long)]
        out: Option<String>,

        /// Also stage the file under storage.root (csv/export/<item>.csv)
        #[arg(long, default_value_t = false)]
        stage: bool,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Check every row's checksum offline. Fails when any row changed since export.
    Verify {
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Score file (CSV)
        file: String,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience); silent when missing.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = sgp_store::pg::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = sgp_store::pg::status(&pool).await?;
                    println!("db_ok={} has_scores_table={}", s.ok, s.has_scores_table);
                }
                DbCmd::Migrate => {
                    sgp_store::pg::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = sgp_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Import {
            item,
            run,
            config_paths,
            file,
        } => {
            let cfg = commands::load_config(&config_paths)?;
            commands::import::run(&cfg, item.context(), run, &file).await?;
        }

        Commands::Export {
            item,
            out,
            stage,
            config_paths,
        } => {
            let cfg = commands::load_config(&config_paths)?;
            commands::export::run(&cfg, item.context(), out.as_deref(), stage).await?;
        }

        Commands::Verify { config_paths, file } => {
            let cfg = commands::load_config(&config_paths)?;
            commands::verify::run(&cfg, &file)?;
        }
    }

    Ok(())
}

/// Logs go to stderr; stdout carries command output only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
