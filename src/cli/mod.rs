use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    Index {
        path: String,

        #[arg(short, long)]
        name: Option<String>,

        /// Force full re-index, ignoring cached file hashes
        #[arg(short, long)]
        force: bool,
    },

    Search {
        query: String,

        #[arg(long, default_value = "10")]
        num: usize,

        #[arg(short, long)]
        min_score: Option<f32>,

        #[arg(short = 'L', long)]
        language: Option<Vec<String>>,

        #[arg(short, long)]
        repository: Option<Vec<String>>,

        /// Fuse semantic and keyword rankings (RRF) instead of semantic-only
        #[arg(long)]
        hybrid: bool,
    },

    List,

    Delete {
        id_or_path: String,
    },

    Stats,

    /// Force a reindex of a repository, bypassing the debounced change pipeline
    Reindex {
        /// Repository ID or path to reindex
        id_or_path: String,

        /// Force full re-index, ignoring cached file hashes
        #[arg(short, long)]
        force: bool,
    },

    /// Show indexing status for one repository, or every registered repository
    Status {
        /// Repository ID; every registered repository when omitted
        repository: Option<String>,
    },
}
