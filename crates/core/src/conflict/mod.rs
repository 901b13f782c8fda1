//! Conflict detection and resolution

pub mod detector;
pub mod resolver;
pub mod suggestions;

pub use detector::{find_conflicts, severity};
pub use resolver::{merge, ConflictService, Resolution};
pub use suggestions::{is_mergeable, suggest, title_similarity};
