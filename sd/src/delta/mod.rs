//! Story delta planning engine
//!
//! Turns narrative markdown plus the current wiki pages into a deterministic
//! set of page creations and updates. Model output is validated before it
//! touches any page, and re-running a plan against its own output yields no
//! changes.

pub mod chunker;
pub mod diff;
mod error;
pub mod markdown;
pub mod merge;
pub mod parser;
mod planner;
pub mod render;
pub mod store;
mod types;

pub use chunker::chunk_story;
pub use diff::build_diff_preview;
pub use error::{OperationParseError, PlanError};
pub use markdown::compute_tags;
pub use merge::merge_operation;
pub use parser::parse_operations;
pub use planner::{DEFAULT_MAX_TOKENS, StoryDeltaPlanner};
pub use render::render_page;
pub use store::{PageIdentityStore, PageSnapshot, hydrate_page, validate_target_folder};
pub use types::{
    Chunk, ChunkDiagnostic, DiffPreview, ExistingPage, PageAction, PageState, ParsedOperation, PlanOptions,
    PlanRequest, PlannedChange, PlannedPage, StoryDeltaPlan, TagOptions, UpdatePolicy,
};
