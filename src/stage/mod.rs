//! Stage navigation and stage availability.

mod walker;

pub use walker::{StageStatus, StageWalker};
