//! Study metadata consumed by matching.
//!
//! The engine works on a complete, immutable snapshot: callers must finish
//! loading series and instance metadata before handing a [`Study`] over.

mod types;

pub use types::{is_image_sop_class, DisplaySet, Instance, Series, Study};
