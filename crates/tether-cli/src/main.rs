//! Tether CLI - Operate a follow graph from the command line
//!
//! This is the entry point for operators: it can initialize a store,
//! run the server with its reconciliation schedule, run a single
//! reconciliation pass, and poke individual follow operations for
//! smoke tests.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "tether")]
#[command(author = "Tether Contributors")]
#[command(version)]
#[command(about = "Follow graph consistency service", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a Tether store in the given directory
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Start the server with the reconciliation schedule
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "7433")]
        port: u16,

        /// Bind to 0.0.0.0 for remote access
        #[arg(long)]
        headless: bool,

        /// Store directory (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Run one reconciliation pass and print the report
    Reconcile {
        /// Store directory (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a user record (account-subsystem seam for operators)
    Adduser {
        /// The user id to create
        user: String,

        /// Store directory (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show a user's follower and following counts
    Stats {
        /// The user id to inspect
        user: String,

        /// Store directory (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Check whether one user follows another
    Status {
        /// The follower's id
        follower: String,

        /// The followed user's id
        followed: String,

        /// Store directory (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Toggle a follow edge on behalf of a user
    Toggle {
        /// The follower's id
        follower: String,

        /// The followed user's id
        followed: String,

        /// Store directory (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Serve {
            port,
            headless,
            path,
        } => commands::serve(port, headless, &path).await,
        Commands::Reconcile { path, json } => commands::reconcile(&path, json),
        Commands::Adduser { user, path } => commands::add_user(&user, &path),
        Commands::Stats { user, path } => commands::stats(&user, &path),
        Commands::Status {
            follower,
            followed,
            path,
        } => commands::status(&follower, &followed, &path),
        Commands::Toggle {
            follower,
            followed,
            path,
        } => commands::toggle(&follower, &followed, &path),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
