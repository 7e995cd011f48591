use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use campaign_ledger::cli::{
    ClockCommands, CorporationCommands, IdentityCommands, LogCommands, PilotCommands,
};
use campaign_ledger::config::LedgerConfig;
use campaign_ledger::types::IdentityMetadata;

const DEFAULT_LOG_FILTER: &str = "campaign_ledger=info";

#[derive(Parser)]
#[command(name = "campaign-ledger")]
#[command(about = "Campaign ledger for mech pilots, clocks, gear, and reputation", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the database (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and apply schema migrations
    Init,

    /// Auth identity events
    Identity {
        #[command(subcommand)]
        command: IdentityCommands,
    },

    /// Grant or revoke the GM flag
    Gm {
        user_id: String,

        #[arg(long)]
        revoke: bool,
    },

    /// Manage pilots
    Pilots {
        #[command(subcommand)]
        command: PilotCommands,
    },

    /// Manage corporations
    Corporations {
        #[command(subcommand)]
        command: CorporationCommands,
    },

    /// Manage clocks
    Clocks {
        #[command(subcommand)]
        command: ClockCommands,
    },

    /// Record, inspect, and revert log entries
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },

    /// Show a pilot's standing with each corporation
    Reputation {
        /// Acting user id
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: String,

        #[arg(long)]
        pilot: String,

        /// List individual changes instead of totals
        #[arg(long)]
        history: bool,
    },

    /// Show a pilot's exotic gear
    Gear {
        /// Acting user id
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: String,

        #[arg(long)]
        pilot: String,

        /// Include gear that has been lost
        #[arg(long)]
        all: bool,
    },

    /// Print the license clock size for a level
    LlSegments {
        #[arg(allow_negative_numbers = true)]
        level: i32,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<LedgerConfig> {
    let mut config = match &cli.config {
        Some(path) => LedgerConfig::from_file(path)?,
        None => LedgerConfig::default(),
    };
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let filter = match &config.log_filter {
        Some(directive) => EnvFilter::try_new(directive)?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    // stdout carries the JSON output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => campaign_ledger::cli::run_init(&config)?,
        Commands::Identity { command } => match command {
            IdentityCommands::Create {
                id,
                provider_id,
                name,
                full_name,
                avatar_url,
            } => {
                let metadata = IdentityMetadata {
                    provider_id,
                    full_name,
                    name,
                    avatar_url,
                };
                campaign_ledger::cli::run_identity_create(&config, id, metadata)?;
            }
            IdentityCommands::Delete { id } => {
                campaign_ledger::cli::run_identity_delete(&config, &id)?;
            }
        },
        Commands::Gm { user_id, revoke } => {
            campaign_ledger::cli::run_gm(&config, &user_id, revoke)?;
        }
        Commands::Pilots { command } => match command {
            PilotCommands::List { as_user } => {
                campaign_ledger::cli::run_pilot_list(&config, &as_user)?;
            }
            PilotCommands::Add {
                as_user,
                name,
                callsign,
                license_level,
            } => {
                campaign_ledger::cli::run_pilot_add(
                    &config,
                    &as_user,
                    name,
                    callsign,
                    license_level,
                )?;
            }
        },
        Commands::Corporations { command } => match command {
            CorporationCommands::List { as_user } => {
                campaign_ledger::cli::run_corporation_list(&config, &as_user)?;
            }
            CorporationCommands::Add {
                as_user,
                name,
                description,
            } => {
                campaign_ledger::cli::run_corporation_add(&config, &as_user, name, description)?;
            }
        },
        Commands::Clocks { command } => match command {
            ClockCommands::List { as_user, pilot } => {
                campaign_ledger::cli::run_clock_list(&config, &as_user, pilot.as_deref())?;
            }
            ClockCommands::Add {
                as_user,
                name,
                segments,
                pilot,
                tick_amount,
                description,
            } => {
                campaign_ledger::cli::run_clock_add(
                    &config,
                    &as_user,
                    name,
                    segments,
                    pilot,
                    tick_amount,
                    description,
                )?;
            }
        },
        Commands::Log { command } => match command {
            LogCommands::Record { as_user, file } => {
                campaign_ledger::cli::run_log_record(&config, &as_user, &file)?;
            }
            LogCommands::Show { as_user, id } => {
                campaign_ledger::cli::run_log_show(&config, &as_user, &id)?;
            }
            LogCommands::List { as_user, pilot } => {
                campaign_ledger::cli::run_log_list(&config, &as_user, &pilot)?;
            }
            LogCommands::Revert { as_user, id } => {
                campaign_ledger::cli::run_log_revert(&config, &as_user, &id)?;
            }
        },
        Commands::Reputation {
            as_user,
            pilot,
            history,
        } => {
            campaign_ledger::cli::run_reputation(&config, &as_user, &pilot, history)?;
        }
        Commands::Gear {
            as_user,
            pilot,
            all,
        } => {
            campaign_ledger::cli::run_gear(&config, &as_user, &pilot, all)?;
        }
        Commands::LlSegments { level } => campaign_ledger::cli::run_ll_segments(level)?,
    }

    Ok(())
}
