use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "annotrack")]
#[command(about = "Annotation completions, label usage and reports")]
#[command(version)]
pub struct Cli {
    /// Directory holding the database and config file
    #[arg(long, global = true, env = "ANNOTRACK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Acting username; overrides the config file
    #[arg(short, long, global = true, env = "ANNOTRACK_USER")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a project from a label config XML file
    InitProject {
        #[arg(long)]
        name: String,
        #[arg(long)]
        config: PathBuf,
        /// Create without a version stamp so label usage is never tracked
        #[arg(long)]
        legacy: bool,
    },
    /// Replace a project's label config
    SetConfig {
        #[arg(long)]
        project: String,
        #[arg(long)]
        config: PathBuf,
    },
    /// Import tasks from a JSON array file
    ImportTasks {
        #[arg(long)]
        project: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Attach tags to a task
    TagTask {
        #[command(flatten)]
        target: TaskTarget,
        #[arg(long, value_delimiter = ',', required = true)]
        tags: Vec<String>,
    },
    /// Save a new completion from a JSON body file
    Create {
        #[command(flatten)]
        target: TaskTarget,
        #[arg(long)]
        file: PathBuf,
        /// Store an already submitted completion without validation
        #[arg(long)]
        direct: bool,
    },
    /// Merge a JSON body file into an existing completion
    Patch {
        #[command(flatten)]
        target: CompletionTarget,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        current_page: i64,
    },
    /// Soft-delete a completion
    Delete {
        #[command(flatten)]
        target: CompletionTarget,
    },
    /// Record a review decision from a JSON body file
    Review {
        #[command(flatten)]
        target: CompletionTarget,
        #[arg(long)]
        file: PathBuf,
    },
    /// Check a completion body against the project's label config
    Validate {
        #[arg(long)]
        project: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Print the project's label usage counters
    Usage {
        #[arg(long)]
        project: String,
    },
    /// Flattened label reports
    Report {
        #[arg(value_enum)]
        kind: ReportKind,
        #[arg(long)]
        project: String,
        /// Only rows annotated by this user
        #[arg(long)]
        username: Option<String>,
        #[arg(long, value_delimiter = ',')]
        task_ids: Option<Vec<i64>>,
        /// Keep only assertion labels (true) or drop them (false)
        #[arg(long)]
        assertion: Option<bool>,
    },
    /// Export tasks with their completions
    Export {
        #[arg(long)]
        project: String,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Keep ground-truth completions only
        #[arg(long)]
        ground_truth: bool,
        /// Skip tasks without any completion
        #[arg(long)]
        exclude_empty: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    Annotator,
    Predictions,
    Chunks,
}

#[derive(Debug, Args)]
pub struct TaskTarget {
    #[arg(long)]
    pub project: String,
    #[arg(long)]
    pub task: i64,
}

#[derive(Debug, Args)]
pub struct CompletionTarget {
    #[arg(long)]
    pub project: String,
    #[arg(long)]
    pub task: i64,
    #[arg(long)]
    pub completion: i64,
}
