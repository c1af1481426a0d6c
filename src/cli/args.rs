//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueHint};

/// Filter mind-map documents by tags and plan hierarchical spreadsheet exports
#[derive(Parser, Debug)]
#[command(name = "mindtab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity: -v info, -vv debug, -vvv trace
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (default: ./.mindtab.toml if present)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the tag vocabulary
    Tags {
        /// Also show accepted aliases
        #[arg(long)]
        all: bool,
    },

    /// Count tagged nodes per tag
    Analyze {
        /// Document (extracted content JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        document: PathBuf,

        /// Print the analysis as JSON
        #[arg(long)]
        json: bool,
    },

    /// Prune a document to the selected tags and print the result
    Filter {
        /// Document (extracted content JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        document: PathBuf,

        /// Tags to keep (repeatable or comma-separated)
        #[arg(short, long = "tag", required = true, value_delimiter = ',')]
        tags: Vec<String>,

        /// Keep sheets whose root carries a selected tag
        #[arg(long)]
        retain_tagged_root: bool,
    },

    /// Build the sheet plan (rows, merge regions) as JSON
    Export {
        /// Document (extracted content JSON)
        #[arg(value_hint = ValueHint::FilePath, required_unless_present = "cases", conflicts_with = "cases")]
        document: Option<PathBuf>,

        /// Flat case list with joined paths instead of a document
        #[arg(long, value_hint = ValueHint::FilePath)]
        cases: Option<PathBuf>,

        /// Tags to keep (repeatable or comma-separated)
        #[arg(short, long = "tag", required = true, value_delimiter = ',')]
        tags: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,

        /// Export only leaf nodes
        #[arg(long)]
        leaves: bool,

        /// Keep sheets whose root carries a selected tag
        #[arg(long)]
        retain_tagged_root: bool,

        /// Exit with an error when nothing matches
        #[arg(long)]
        fail_on_empty: bool,

        /// Print the grouping tree to stderr
        #[arg(long)]
        preview: bool,
    },

    /// Build a smoke-test case list (JSON) from the tagged nodes of a document
    Cases {
        /// Document (extracted content JSON)
        #[arg(value_hint = ValueHint::FilePath)]
        document: PathBuf,

        /// Tags to select (repeatable or comma-separated)
        #[arg(short, long = "tag", required = true, value_delimiter = ',')]
        tags: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,

        /// Keep sheets whose root carries a selected tag
        #[arg(long)]
        retain_tagged_root: bool,

        /// Exit with an error when no case is produced
        #[arg(long)]
        fail_on_empty: bool,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,

    /// Create a config template
    Init {
        /// Write the global config instead of ./.mindtab.toml
        #[arg(short, long)]
        global: bool,
    },

    /// Show config file locations
    Path,
}
