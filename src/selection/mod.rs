//! Protocol selection for a study.
//!
//! [`ProtocolSelector::select`] never fails: when no protocol in the library
//! qualifies, the caller-supplied fallback is returned.

mod selector;

pub use selector::{ProtocolMatch, ProtocolSelector};
