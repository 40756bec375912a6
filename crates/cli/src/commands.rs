use clap::Subcommand;
use model::{files::status::FileStatus, transformation::status::TransformationStatus};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the files of a transformation
    Files {
        #[arg(long)]
        transformation: u64,

        #[arg(long = "status", help = "Only files in this status (repeatable)")]
        statuses: Vec<FileStatus>,

        #[arg(long, default_value_t = 0, help = "Skip this many matching files")]
        offset: usize,

        #[arg(long, help = "Return at most this many files")]
        max: Option<usize>,
    },
    /// List the tasks of a transformation
    Tasks {
        #[arg(long)]
        transformation: u64,

        #[arg(long = "status", help = "Only tasks in this status (repeatable)")]
        statuses: Vec<String>,
    },
    Transformations {
        #[arg(long = "status", help = "Only transformations in this status (repeatable)")]
        statuses: Vec<TransformationStatus>,

        #[arg(long = "type")]
        kind: Option<String>,
    },
    /// Register a new transformation
    Create {
        #[arg(long)]
        name: String,

        #[arg(long = "type", default_value = "Processing")]
        kind: String,
    },
    /// Register a transformation derived from `parent`, inheriting its files
    Derive {
        #[arg(long)]
        parent: u64,

        #[arg(long)]
        name: String,

        #[arg(long = "type", help = "Defaults to the parent's type")]
        kind: Option<String>,
    },
    AddFiles {
        #[arg(long)]
        transformation: u64,

        #[arg(required = true)]
        lfns: Vec<String>,
    },
    SetFileStatus {
        #[arg(long)]
        transformation: u64,

        #[arg(long)]
        status: FileStatus,

        #[arg(long, help = "Skip the file state machine")]
        force: bool,

        #[arg(required = true)]
        lfns: Vec<String>,
    },
    SetParam {
        #[arg(long)]
        transformation: u64,

        #[arg(long)]
        name: String,

        #[arg(long, help = "JSON value; anything that is not valid JSON is taken as a string")]
        value: String,

        #[arg(long, help = "Passed to the status policy when setting Status")]
        force: bool,
    },
    /// Move pending parent files to a derived transformation
    Migrate {
        #[arg(long)]
        transformation: u64,

        #[arg(long, help = "Keep parent MaxReset files parked instead of resetting them")]
        keep_max_reset: bool,
    },
    Clean {
        #[arg(long)]
        transformation: u64,
    },
    /// Mark files Deleted in every transformation
    RemoveFiles {
        #[arg(required = true)]
        lfns: Vec<String>,
    },
}

impl Commands {
    /// Whether the command changes service state, so the snapshot must be
    /// written back.
    pub fn mutates(&self) -> bool {
        !matches!(
            self,
            Commands::Files { .. } | Commands::Tasks { .. } | Commands::Transformations { .. }
        )
    }
}
