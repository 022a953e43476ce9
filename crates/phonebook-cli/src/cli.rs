use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use phonebook_core::models::{SortField, SortOrder};
use phonebook_core::Transport;

#[derive(Parser)]
#[command(name = "phonebook")]
#[command(about = "Offline-first phonebook from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local store file
    #[arg(long, global = true, value_name = "PATH")]
    pub store_path: Option<PathBuf>,

    /// CLI profile name
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List contacts using the saved search and sort
    #[command(alias = "ls")]
    List {
        /// Load pages up to this one
        #[arg(short, long, default_value = "1")]
        page: u32,
        /// Contacts per page (overrides the profile)
        #[arg(short, long)]
        limit: Option<u32>,
        /// Load every page
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the saved search term and list matching contacts
    Search {
        /// Search term; omit to clear the search
        term: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the saved sort and list contacts
    Sort {
        /// Field to sort by
        #[arg(value_enum)]
        field: SortFieldArg,
        /// Sort direction
        #[arg(long, value_enum, default_value_t = SortOrderArg::Asc)]
        order: SortOrderArg,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a contact
    #[command(alias = "new")]
    Add {
        /// Contact name
        name: String,
        /// Contact phone number
        phone: String,
        /// Avatar image to upload after creating
        #[arg(long, value_name = "PATH")]
        avatar: Option<PathBuf>,
    },
    /// Edit an existing contact
    Edit {
        /// Contact ID (server id or pending_ id)
        id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New phone number
        #[arg(long)]
        phone: Option<String>,
        /// New avatar image
        #[arg(long, value_name = "PATH")]
        avatar: Option<PathBuf>,
        /// Remove the current photo
        #[arg(long, conflicts_with = "avatar")]
        clear_photo: bool,
    },
    /// Delete a contact
    #[command(alias = "rm")]
    Delete {
        /// Contact ID (server id or pending_ id)
        id: String,
    },
    /// Upload a new avatar image
    Avatar {
        /// Contact ID (server id or pending_ id)
        id: String,
        /// Image file
        file: PathBuf,
    },
    /// Retry one pending change
    Resend {
        /// Pending contact ID
        id: String,
    },
    /// Retry every pending change
    Sync {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show changes waiting for the backend
    Pending {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one contact
    Show {
        /// Contact ID (server id or pending_ id)
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SortFieldArg {
    Name,
    Phone,
    CreatedAt,
    UpdatedAt,
}

impl From<SortFieldArg> for SortField {
    fn from(value: SortFieldArg) -> Self {
        match value {
            SortFieldArg::Name => Self::Name,
            SortFieldArg::Phone => Self::Phone,
            SortFieldArg::CreatedAt => Self::CreatedAt,
            SortFieldArg::UpdatedAt => Self::UpdatedAt,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SortOrderArg {
    Asc,
    Desc,
}

impl From<SortOrderArg> for SortOrder {
    fn from(value: SortOrderArg) -> Self {
        match value {
            SortOrderArg::Asc => Self::Asc,
            SortOrderArg::Desc => Self::Desc,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum TransportArg {
    Rest,
    Graphql,
}

impl From<TransportArg> for Transport {
    fn from(value: TransportArg) -> Self {
        match value {
            TransportArg::Rest => Self::Rest,
            TransportArg::Graphql => Self::Graphql,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Contacts API base URL (e.g. <http://localhost:3000/api>)
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,
        /// Backend protocol
        #[arg(long, value_enum)]
        transport: Option<TransportArg>,
        /// GraphQL endpoint path under the API base URL
        #[arg(long, value_name = "PATH")]
        graphql_path: Option<String>,
        /// Request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Contacts per page
        #[arg(long)]
        page_size: Option<u32>,
        /// Local store file for this profile
        #[arg(long = "store", value_name = "PATH")]
        store: Option<PathBuf>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
    /// Print the resolved configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
