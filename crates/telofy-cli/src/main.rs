use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "telofy", version, about = "Telofy goal tracking CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User accounts
    User {
        #[command(subcommand)]
        action: commands::user::UserAction,
    },
    /// Login sessions
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Pre-launch waitlist
    Waitlist {
        #[command(subcommand)]
        action: commands::waitlist::WaitlistAction,
    },
    /// Objective management
    Objective {
        #[command(subcommand)]
        action: commands::objective::ObjectiveAction,
    },
    /// Weighted pillars of an objective
    Pillar {
        #[command(subcommand)]
        action: commands::pillar::PillarAction,
    },
    /// Metrics and their entries
    Metric {
        #[command(subcommand)]
        action: commands::metric::MetricAction,
    },
    /// Recurring rituals and streaks
    Ritual {
        #[command(subcommand)]
        action: commands::ritual::RitualAction,
    },
    /// Planned tasks
    Task {
        #[command(subcommand)]
        action: commands::task::TaskAction,
    },
    /// Deviation detection and resolution
    Deviation {
        #[command(subcommand)]
        action: commands::deviation::DeviationAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::User { action } => commands::user::run(action),
        Commands::Session { action } => commands::session::run(action),
        Commands::Waitlist { action } => commands::waitlist::run(action),
        Commands::Objective { action } => commands::objective::run(action),
        Commands::Pillar { action } => commands::pillar::run(action),
        Commands::Metric { action } => commands::metric::run(action),
        Commands::Ritual { action } => commands::ritual::run(action),
        Commands::Task { action } => commands::task::run(action),
        Commands::Deviation { action } => commands::deviation::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
