use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "repin",
    about = "Checks and upgrades pinned upstream revisions in a Nix flake",
    version
)]
pub struct Cli {
    /// Use the given path as the flake (defaults to current directory)
    #[arg(short, long, default_value = ".", global = true)]
    pub dir: String,

    /// Only act on the given packages (repeatable)
    #[arg(short = 'A', long = "attr", value_name = "PACKAGE", global = true)]
    pub attrs: Vec<String>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report how far each pinned revision is behind its upstream branch
    Check,

    /// Move each pin to the head of its tracked branch via nix-update
    Upgrade {
        /// Arguments to forward to nix-update (after --)
        #[arg(last = true, value_name = "NIX-UPDATE OPTIONS")]
        rest: Vec<String>,
    },

    /// Upgrade, and also build, test, and commit the changes
    DoUpgrade {
        /// Arguments to forward to nix-update (after --)
        #[arg(last = true, value_name = "NIX-UPDATE OPTIONS")]
        rest: Vec<String>,
    },
}
