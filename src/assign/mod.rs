//! Viewport assignment.
//!
//! [`ViewportAssigner`] places display sets into the slots of one stage.
//! The result, a [`ViewportAssignment`], is a plain value: it is recomputed
//! from the study, the stage and the URL parameters, and replaced wholesale.
//!
//! By default a display set may fill several slots of the same stage
//! ([`AssignmentPolicy::Reusable`]). [`AssignmentPolicy::Exclusive`], or a
//! viewport's own `exclusive` flag, makes later slots skip display sets an
//! earlier slot already shows.

mod assigner;
mod types;

pub use assigner::ViewportAssigner;
pub use types::{AssignmentPolicy, ViewportAssignment, ViewportSlot};
