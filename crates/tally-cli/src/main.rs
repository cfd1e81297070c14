use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Counting game operator CLI", long_about = None)]
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

        /// Layered config paths; the database url env var is read from them
        #[arg(long = "config", global = true)]
        config_paths: Vec<String>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> environment -> overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Evaluate an expression the way the counting channel would
    Calc {
        /// Expression text; quote it in the shell
        expr: String,
    },

    /// Print one member's statistics
    Stats {
        #[arg(long)]
        member: u64,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Print the top scores
    Leaderboard {
        #[arg(long, default_value_t = tally_runtime::LEADERBOARD_SIZE)]
        limit: usize,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Print the stored sequence state of a channel
    Sequence {
        /// Defaults to /game/channel_id of --config
        #[arg(long)]
        channel: Option<u64>,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd, config_paths } => {
            let cfg = commands::load_config(&config_paths)?;
            let pool = commands::connect(cfg.as_ref()).await?;
            match cmd {
                DbCmd::Status => {
                    let s = tally_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_members_table={} has_sequence_table={}",
                        s.ok, s.has_members_table, s.has_sequence_table
                    );
                }
                DbCmd::Migrate => {
                    tally_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = tally_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Calc { expr } => commands::game::calc(&expr)?,

        Commands::Stats {
            member,
            config_paths,
        } => commands::game::stats(&config_paths, member).await?,

        Commands::Leaderboard {
            limit,
            config_paths,
        } => commands::game::leaderboard(&config_paths, limit).await?,

        Commands::Sequence {
            channel,
            config_paths,
        } => commands::game::sequence(&config_paths, channel).await?,
    }

    Ok(())
}
