use clap::{ArgAction, Parser, Subcommand};
use commands::{auto, config, daemon, ids, import, import_show};
use poster_sync_models::{MediaType, OverwriteOption};

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "posterkeep")]
#[command(about = "posterkeep - Keep a local poster archive in step with your media server")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import posters from every library now (one full sweep)
    #[command(long_about = "Download artwork for every library on the configured server, record which items still exist, and mark posters whose item is gone as orphaned. Media types and overwrite behaviour default to the values in config.toml.")]
    Import {
        /// Media types to import (repeatable): movie, show, season, collection
        #[arg(long = "media-type", value_name = "TYPE")]
        media_types: Vec<MediaType>,

        /// What to do with posters that already exist: overwrite, copy, skip
        #[arg(long, value_name = "OPTION")]
        overwrite: Option<OverwriteOption>,

        /// Only import these libraries (by title, repeatable)
        #[arg(long = "library", value_name = "TITLE")]
        libraries: Vec<String>,
    },
    /// Import the seasons of a single show
    #[command(long_about = "Import season posters for one show and orphan that show's season posters which no longer exist on the server. The show is matched by id or by title.")]
    ImportShow {
        /// Show id or title
        show: String,

        /// Title of the TV library holding the show (defaults to the first TV library)
        #[arg(long, value_name = "TITLE")]
        library: Option<String>,

        /// What to do with posters that already exist: overwrite, copy, skip
        #[arg(long, value_name = "OPTION")]
        overwrite: Option<OverwriteOption>,
    },
    /// Run one scheduler tick: sweep only if the configured interval has elapsed
    #[command(long_about = "Run a single auto-import tick. Exits quietly when auto import is disabled, another sweep holds the lock, or the interval since the last successful sweep has not elapsed. Suitable for cron.")]
    Auto {
        /// Ignore the interval and sweep now (the lock is still honoured)
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
    /// Run in the foreground, ticking the auto-import scheduler on a cron schedule
    #[command(long_about = "Run posterkeep as a long-lived process that checks on a cron schedule whether a sweep is due. Logs go to a daily rotating file in the log directory.")]
    Daemon {
        /// Cron expression with seconds (e.g., '0 */15 * * * *')
        #[arg(long, value_name = "SCHEDULE")]
        schedule: Option<String>,

        /// Skip the tick on startup
        #[arg(long, action = ArgAction::SetTrue)]
        no_startup_tick: bool,
    },
    /// Inspect or clear stored item ids
    Ids {
        #[command(subcommand)]
        cmd: IdsCommands,
    },
    /// Configure the media server and credentials
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum IdsCommands {
    /// Show stored ids per media type and library
    Show {
        /// Only this media type
        #[arg(long = "media-type", value_name = "TYPE")]
        media_type: Option<MediaType>,
    },
    /// Remove stored ids for a media type, optionally for one library
    #[command(long_about = "Remove stored ids. Without --library every library entry of the media type is removed. The next sweep rebuilds them; until then reconciliation only trusts ids seen in that sweep.")]
    Clear {
        #[arg(long = "media-type", value_name = "TYPE")]
        media_type: MediaType,

        /// Library id to clear
        #[arg(long, value_name = "ID")]
        library: Option<String>,

        /// Do not ask for confirmation
        #[arg(long, short = 'y', action = ArgAction::SetTrue)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current configuration (tokens are masked)
    Show,
    /// Set the media server kind and URL
    Server {
        /// plex or jellyfin
        #[arg(long)]
        kind: Option<poster_sync_models::ServerKind>,

        /// Server base URL, e.g. http://192.168.1.10:32400
        #[arg(long)]
        url: Option<String>,
    },
    /// Store the API token for the configured server (prompted when omitted)
    Token {
        #[arg(long)]
        token: Option<String>,
    },
    /// Enable or disable automatic imports and set the interval
    Auto {
        #[arg(long)]
        enabled: Option<bool>,

        /// Compact duration: 30m, 6h, 1d, 2w
        #[arg(long)]
        interval: Option<String>,
    },
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // The daemon logs to a rolling file; everything else logs to stderr
    let log_file = match cli.command {
        Commands::Daemon { .. } => Some(commands::paths().daemon_log_file()),
        _ => None,
    };
    logging::init_logging_with_file(cli.verbose, cli.quiet, log_file)
        .map_err(|e| color_eyre::eyre::eyre!("{}", e))?;

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Import {
            media_types,
            overwrite,
            libraries,
        } => import::run_import(media_types, overwrite, libraries, &output).await,
        Commands::ImportShow {
            show,
            library,
            overwrite,
        } => import_show::run_import_show(show, library, overwrite, &output).await,
        Commands::Auto { force } => auto::run_auto(force, &output).await,
        Commands::Daemon {
            schedule,
            no_startup_tick,
        } => daemon::run_daemon(schedule, no_startup_tick, &output).await,
        Commands::Ids { cmd } => ids::run_ids(cmd, &output),
        Commands::Config { cmd } => config::run_config(cmd, &output),
    }
}
