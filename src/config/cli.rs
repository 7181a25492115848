use crate::domain::model::CleanupStrategy;
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "inventory-control")]
#[command(about = "Duplicate lot/serial analysis, cleanup and daily reconciliation")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, default_value = "inventory-control.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Scan every lot/serial source and write the duplicate analysis
    Analyze,

    /// Renumber or flag the groups listed in the latest analysis
    Cleanup {
        /// Actually modify records (overrides `cleanup.dry_run`)
        #[arg(long)]
        apply: bool,

        /// RENUMBER or FLAG (overrides `cleanup.strategy`)
        #[arg(long)]
        strategy: Option<CleanupStrategy>,
    },

    /// Daily reconciliation sweep
    Reconcile,

    /// Generate mock transactions and run analysis, dry-run cleanup and
    /// reconciliation against them
    Demo {
        #[arg(long, default_value_t = 50)]
        count: usize,

        /// Seed for reproducible mock data
        #[arg(long)]
        seed: Option<u64>,
    },
}
