//! CLI command implementations.

pub mod config;
pub mod fetch;
pub mod search;

use clap::{Args, Subcommand, ValueEnum};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Write a config file with default values.
    Init {
        /// Overwrite an existing file without asking.
        #[arg(short, long)]
        force: bool,
    },
    /// Show the effective configuration.
    Show,
    /// Print which config file is in use.
    Path,
}

/// A data binding the fetch command can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Resource {
    Properties,
    FeaturedProperties,
    Property,
    PropertyReviews,
    Packages,
    FeaturedPackages,
    Package,
    Experiences,
    Reviews,
    PropertyTypes,
    Amenities,
    Locations,
    Destinations,
    Homepage,
    Search,
}

/// Arguments for the fetch command.
#[derive(Args)]
pub struct FetchArgs {
    /// What to fetch.
    #[arg(value_enum)]
    pub resource: Resource,

    /// Record id, for single-record resources.
    #[arg(long)]
    pub id: Option<u64>,

    /// Search term, for `search`.
    #[arg(long)]
    pub term: Option<String>,

    /// Only approved reviews / featured destinations.
    #[arg(long)]
    pub featured: bool,

    /// Serve responses from a JSON fixture file instead of the API.
    #[arg(long)]
    pub fixtures: Option<String>,
}

/// Arguments for the search command.
#[derive(Args)]
pub struct SearchArgs {
    /// Successive contents of the search box.
    #[arg(required = true)]
    pub keystrokes: Vec<String>,

    /// Pause between keystrokes, in milliseconds.
    #[arg(long, default_value = "100")]
    pub gap_ms: u64,

    /// Restrict results to a location.
    #[arg(long)]
    pub location: Option<String>,

    /// Serve responses from a JSON fixture file instead of the API.
    #[arg(long)]
    pub fixtures: Option<String>,
}
