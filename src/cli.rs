use clap::{Parser, Subcommand};

use crate::app::{ReadFilter, SortBy};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Act as this user instead of `default_user` from config.yaml
    #[clap(long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Save a link and fetch its metadata
    Save {
        url: String,

        #[clap(short, long)]
        title: Option<String>,

        #[clap(short, long)]
        description: Option<String>,

        /// Comma or space separated
        #[clap(long)]
        tags: Option<String>,

        /// App the link came from
        #[clap(long)]
        app: Option<String>,

        /// Don't fetch the page, only infer what the url tells
        #[clap(long, default_value = "false")]
        no_meta: bool,
    },

    /// Save whatever a share sheet handed over
    Share {
        #[clap(long)]
        web_url: Option<String>,

        #[clap(long)]
        text: Option<String>,
    },

    /// List saved links
    List {
        #[clap(long, value_enum, default_value_t = ReadFilter::All)]
        read: ReadFilter,

        /// Links with any of these tags
        #[clap(long)]
        tags: Option<String>,

        /// Search title, description and url
        #[clap(short, long)]
        query: Option<String>,

        #[clap(long, value_enum, default_value_t = SortBy::Newest)]
        sort: SortBy,

        #[clap(long)]
        limit: Option<usize>,

        /// Print counts only
        #[clap(short, long, default_value = "false")]
        count: bool,
    },

    Get {
        id: String,
    },

    ToggleRead {
        id: String,
    },

    MarkRead {
        id: String,
    },

    Delete {
        id: String,

        /// Auto confirm
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },

    /// Mark every link unread
    ResetUnread {
        /// Auto confirm
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },

    /// Fill missing domain, reading time and share source of every link
    Migrate {
        /// Only this link
        #[clap(long)]
        id: Option<String>,
    },

    /// List all tags
    Tags {},

    /// Resolve metadata for a url without saving it
    Preview {
        url: String,
    },

    /// Fetch metadata for a saved link and fill its empty fields
    Resolve {
        id: String,
    },

    /// Guess source, title and domain from the url alone
    Info {
        url: String,
    },

    /// Start the http api
    Daemon {
        /// Overrides `listen_addr` from config.yaml
        #[clap(long)]
        addr: Option<String>,
    },
}

/// Split a user-provided tag list on commas and whitespace
pub fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|value| !value.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}
