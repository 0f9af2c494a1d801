//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};

use crate::domain::{IdFilter, ProviderKind};

/// Edit report and test-guide structures: move, nest, promote and delete nodes
#[derive(Parser, Debug)]
#[command(name = "gtree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug level: -d info, -dd debug, -ddd trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Structure file (default: `default_file` from config)
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,

    /// Node vocabulary of the structure file
    #[arg(long, value_enum, global = true)]
    pub provider: Option<ProviderArg>,

    /// Language key for titles
    #[arg(long, global = true)]
    pub language: Option<String>,

    /// Print author and version
    #[arg(long)]
    pub info: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render the structure as a tree
    Show,

    /// List node ids in pre-order
    Ids {
        #[arg(long, value_enum, default_value_t = IdsFilter::All)]
        filter: IdsFilter,
    },

    /// Show type, name, ancestors and URL of a node
    Find {
        /// Node id
        id: String,
    },

    /// Swap a node with its previous sibling
    MoveUp(NodeArgs),

    /// Swap a node with its next sibling
    MoveDown(NodeArgs),

    /// Nest a container into the preceding container sibling
    MakeChild(NodeArgs),

    /// Promote a container one level up
    MakeParent(NodeArgs),

    /// Delete a node with its subtree
    Delete(NodeArgs),

    /// Create a node and link it into the structure
    Add {
        /// Node type, e.g. "container" or "procedure"
        #[arg(long = "type")]
        node_type: String,
        /// Parent container id (default: append as last root)
        #[arg(long)]
        parent: Option<String>,
        /// Display title
        #[arg(long)]
        name: Option<String>,
        /// Node id (default: random UUID)
        #[arg(long)]
        id: Option<String>,
        /// Print the result instead of writing the file
        #[arg(long)]
        dry_run: bool,
    },

    /// Parse the structure and verify its links
    Check,

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

/// Arguments of the node mutations
#[derive(Args, Debug)]
pub struct NodeArgs {
    /// Node id
    pub id: String,

    /// Print the result instead of writing the file
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,
    /// Print a template config file
    Template,
    /// Show config file locations
    Path,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderArg {
    Report,
    TestGuide,
    Generic,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Report => ProviderKind::Report,
            ProviderArg::TestGuide => ProviderKind::TestGuide,
            ProviderArg::Generic => ProviderKind::Generic,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdsFilter {
    All,
    Containers,
    Procedures,
}

impl From<IdsFilter> for IdFilter {
    fn from(filter: IdsFilter) -> Self {
        match filter {
            IdsFilter::All => IdFilter::All,
            IdsFilter::Containers => IdFilter::ContainersOnly,
            IdsFilter::Procedures => IdFilter::LeafType("procedure"),
        }
    }
}
