use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "wordsmaker")]
#[command(about = "Manage writing projects, their document trees and backups", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Application data directory (projects and settings)
    #[arg(long, global = true, env = "WORDSMAKER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory that holds project backups
    #[arg(long, global = true, env = "WORDSMAKER_BACKUP_DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    File,
    Folder,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List projects
    #[command(alias = "ls")]
    Projects,

    /// Create a new, empty project
    #[command(alias = "n")]
    New {
        /// Project name (may be percent-encoded; other commands take the
        /// name as `projects` lists it)
        name: String,

        /// novel, collection, serial or novella
        #[arg(short = 't', long = "type")]
        project_type: Option<String>,
    },

    /// Delete a project and all its documents (backups are kept)
    Remove { project: String },

    /// Show a project's tree
    Tree { project: String },

    /// Add a file or folder
    #[command(alias = "a")]
    Add {
        project: String,

        #[arg(value_enum)]
        kind: KindArg,

        name: String,

        /// Parent folder id (0 = top level)
        #[arg(short, long, default_value_t = 0)]
        parent: u64,
    },

    /// Rename a file or folder
    Rename {
        project: String,
        id: u64,
        name: String,
    },

    /// Delete a file or folder (folders with everything in them)
    Rm { project: String, id: u64 },

    /// Move a file or folder
    Mv {
        project: String,
        id: u64,

        /// New parent folder id (0 = top level)
        parent: u64,

        /// Position in the project's ordered node list (default: end)
        #[arg(short, long)]
        index: Option<usize>,
    },

    /// Print a document
    Cat { project: String, id: u64 },

    /// Replace a document's text (reads stdin when no text is given)
    Write {
        project: String,
        id: u64,
        text: Option<String>,
    },

    /// Back up a project now
    Backup {
        project: String,

        /// Only back up when the backup interval has elapsed
        #[arg(long)]
        if_due: bool,
    },

    /// List a project's backups, newest first
    Backups { project: String },

    /// Replace a project with one of its backups
    Restore { project: String, entry: String },

    /// Export a project as a .tar.gz archive
    Export {
        project: String,

        /// Output file (default: <project>.tar.gz)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Get or set user settings
    Settings {
        /// Setting key (e.g., theme)
        key: Option<String>,

        /// Value to set (if omitted, prints current value)
        value: Option<String>,
    },
}
