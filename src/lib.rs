pub mod cache;
pub mod cli;
pub mod config;
pub mod decision;
pub mod digest;
pub mod duplicates;
pub mod error;
pub mod phash;
pub mod preview;
pub mod resolver;
pub mod scanner;
pub mod selection;

pub use cache::HashCache;
pub use cli::Cli;
pub use config::Config;
pub use decision::{Action, Clarity, Evaluation, KeepPolicy, NamePolicy, Ranking, plan_actions};
pub use digest::{ContentId, content_id};
pub use duplicates::{DuplicateGroup, FileRecord, find_duplicates, group_by_hash};
pub use error::{Error, Result};
pub use phash::{AverageHasher, ImageHasher, PerceptualHash};
pub use preview::write_preview_dir;
pub use resolver::{Resolution, resolve};
pub use scanner::{find_image_paths, is_image};
pub use selection::{DedupSummary, RankedGroup, Selection, categorize, dedup};
