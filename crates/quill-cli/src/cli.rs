use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use quill_core::search::Truncation;

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Read, write and search Quill blog posts from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    #[command(flatten)]
    pub author: AuthorArgs,
}

/// Identity used for posts and comments written from the CLI
#[derive(Args, Debug, Clone, Default)]
pub struct AuthorArgs {
    /// Author user id
    #[arg(long, global = true, env = "QUILL_AUTHOR_ID", value_name = "ID")]
    pub author_id: Option<String>,

    /// Author display name (defaults to the author id)
    #[arg(long, global = true, env = "QUILL_AUTHOR_NAME", value_name = "NAME")]
    pub author_name: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List posts, newest first
    List {
        /// Number of posts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a single post
    Show {
        /// Post ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search post titles, then contents
    Search {
        /// Search query
        query: String,
        /// Maximum number of posts to return
        #[arg(short, long, default_value = "5")]
        limit: usize,
        /// How strictly the limit is enforced
        #[arg(long, value_enum, default_value_t = TruncationArg::Exact)]
        truncation: TruncationArg,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List comments on a post, newest first
    Comments {
        /// Post ID
        post_id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Publish a new post
    #[command(alias = "new")]
    Post {
        /// Post title
        #[arg(short, long)]
        title: String,
        /// Storage id of an already uploaded cover image
        #[arg(long, value_name = "STORAGE_ID")]
        image: Option<String>,
        /// Post content (read from stdin or $EDITOR when omitted)
        content: Vec<String>,
    },
    /// Comment on a post
    Comment {
        /// Post ID
        post_id: String,
        /// Comment body (read from stdin or $EDITOR when omitted)
        body: Vec<String>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum TruncationArg {
    /// Never return more than the limit
    Exact,
    /// Allow one extra result past the limit
    Lenient,
}

impl From<TruncationArg> for Truncation {
    fn from(value: TruncationArg) -> Self {
        match value {
            TruncationArg::Exact => Self::Exact,
            TruncationArg::Lenient => Self::Lenient,
        }
    }
}
