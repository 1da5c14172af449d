use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Segmented focus timers and notes from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage timers
    Timer {
        #[command(subcommand)]
        command: TimerCommands,
    },
    /// Manage notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Show timer statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Merge local timers and notes with the remote collection
    Sync,
    /// Sign in or out of the remote collection
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Configure the remote endpoint
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
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

#[derive(Subcommand)]
pub enum TimerCommands {
    /// Create a timer from segments or a preset
    #[command(alias = "new")]
    Add {
        /// Timer name (defaults to the preset name)
        #[arg(long)]
        name: Option<String>,
        /// Optional description
        #[arg(long)]
        description: Option<String>,
        /// Segment as KIND:DURATION[:LABEL], e.g. focus:25m (repeatable)
        #[arg(long = "segment", short = 's', value_name = "SPEC")]
        segments: Vec<String>,
        /// Number of passes through the segments
        #[arg(long, short = 'r')]
        repeat: Option<u32>,
        /// Start from a built-in preset (see `cadence timer presets`)
        #[arg(long)]
        preset: Option<String>,
    },
    /// List timers
    List {
        /// Include archived timers
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one timer
    Show {
        /// Timer ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a timer's definition
    Edit {
        /// Timer ID or unique ID prefix
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Replacement segment list as KIND:DURATION[:LABEL] (repeatable)
        #[arg(long = "segment", short = 's', value_name = "SPEC")]
        segments: Vec<String>,
        #[arg(long, short = 'r')]
        repeat: Option<u32>,
    },
    /// Start or resume a timer
    Start {
        /// Timer ID or unique ID prefix
        id: String,
    },
    /// Pause a running timer
    Pause {
        /// Timer ID or unique ID prefix
        id: String,
    },
    /// Reset a timer to its first segment
    Reset {
        /// Timer ID or unique ID prefix
        id: String,
    },
    /// Archive a timer
    Archive {
        /// Timer ID or unique ID prefix
        id: String,
    },
    /// Delete a timer
    Delete {
        /// Timer ID or unique ID prefix
        id: String,
    },
    /// Start a timer and follow it in the foreground until it completes
    Run {
        /// Timer ID or unique ID prefix
        id: String,
        /// Do not ring the terminal bell on segment changes
        #[arg(long)]
        quiet: bool,
    },
    /// List built-in presets
    Presets,
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// Create a note
    #[command(alias = "new")]
    Add {
        /// Optional title
        #[arg(long)]
        title: Option<String>,
        /// Note content (read from stdin when omitted)
        content: Vec<String>,
    },
    /// List recent notes
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search notes by title or content
    Search {
        /// Search query
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a note
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    /// Flip a note's completed flag
    Toggle {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Delete a note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Remember the signed-in user
    Login {
        /// Remote user id
        #[arg(long, value_name = "ID")]
        user: String,
        /// Account email
        #[arg(long, value_name = "EMAIL")]
        email: Option<String>,
    },
    /// Show the signed-in user
    Status,
    /// Forget the user and clear local timers and notes
    Logout,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update the CLI config
    Init {
        /// Remote collection API base URL
        #[arg(long, value_name = "URL")]
        api_url: Option<String>,
        /// Bearer token for the remote API
        #[arg(long, value_name = "TOKEN")]
        token: Option<String>,
    },
    /// Print the effective config
    Show,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
