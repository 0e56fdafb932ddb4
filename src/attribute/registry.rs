//! Name to extractor mapping used by rule evaluation.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::builtins;
use super::types::{AttributeValue, MatchContext, Target, TargetKind};
use crate::error::MatchError;

/// Reads one named attribute from a matching target.
///
/// Extractors must be pure: no I/O, no blocking, no interior mutation.
/// Anything that would need a fetch has to be precomputed into the study
/// snapshot before matching starts.
///
/// # Examples
///
/// ```ignore
/// struct SliceCount;
///
/// impl AttributeExtractor for SliceCount {
///     fn name(&self) -> &str { "sliceCount" }
///     fn accepts(&self, kind: TargetKind) -> bool { kind == TargetKind::Series }
///     fn extract(&self, target: &Target<'_>, _ctx: &MatchContext<'_>)
///         -> Result<AttributeValue, MatchError>
///     {
///         match target {
///             Target::Series(s) => Ok(s.instances().count().into()),
///             _ => unreachable!(),
///         }
///     }
/// }
/// ```
pub trait AttributeExtractor: Send + Sync {
    /// The attribute name rules refer to.
    fn name(&self) -> &str;

    /// Whether this extractor can read the given kind of target.
    fn accepts(&self, _kind: TargetKind) -> bool {
        true
    }

    /// Computes the attribute value for `target`.
    fn extract(&self, target: &Target<'_>, ctx: &MatchContext<'_>)
        -> Result<AttributeValue, MatchError>;
}

/// Adapter turning a closure into an [`AttributeExtractor`].
pub struct FnExtractor<F> {
    name: String,
    kinds: Option<Vec<TargetKind>>,
    f: F,
}

impl<F> FnExtractor<F>
where
    F: Fn(&Target<'_>, &MatchContext<'_>) -> Result<AttributeValue, MatchError> + Send + Sync,
{
    /// An extractor accepting every target kind.
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            kinds: None,
            f,
        }
    }

    /// Restricts the extractor to the listed target kinds.
    pub fn for_kinds(mut self, kinds: &[TargetKind]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }
}

impl<F> AttributeExtractor for FnExtractor<F>
where
    F: Fn(&Target<'_>, &MatchContext<'_>) -> Result<AttributeValue, MatchError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, kind: TargetKind) -> bool {
        self.kinds.as_ref().is_none_or(|kinds| kinds.contains(&kind))
    }

    fn extract(
        &self,
        target: &Target<'_>,
        ctx: &MatchContext<'_>,
    ) -> Result<AttributeValue, MatchError> {
        (self.f)(target, ctx)
    }
}

/// Registry of attribute extractors.
///
/// Names not registered here fall back to a DICOM keyword lookup on the
/// target, so rules can reference raw tags such as `SeriesDescription`
/// directly. Only names that are neither registered nor present on the
/// target fail with [`MatchError::AttributeNotFound`].
///
/// Registered keyword aliases such as `seriesDescription` resolve a missing
/// tag to [`AttributeValue::Null`], so negative constraints like
/// `doesNotContain` pass. The raw keyword `SeriesDescription` on the same
/// target fails with `AttributeNotFound`, and the rule fails with it.
#[derive(Clone, Default)]
pub struct AttributeRegistry {
    extractors: BTreeMap<String, Arc<dyn AttributeExtractor>>,
}

impl AttributeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with the built-in attributes.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::register_all(&mut registry);
        registry
    }

    /// Registers an extractor under its own name, replacing any previous one.
    pub fn register<E: AttributeExtractor + 'static>(&mut self, extractor: E) {
        let name = extractor.name().to_string();
        if self
            .extractors
            .insert(name.clone(), Arc::new(extractor))
            .is_some()
        {
            log::debug!("AttributeRegistry::register replaced extractor `{name}`");
        }
    }

    /// Registers a closure as an extractor accepting every target kind.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&Target<'_>, &MatchContext<'_>) -> Result<AttributeValue, MatchError>
            + Send
            + Sync
            + 'static,
    {
        self.register(FnExtractor::new(name, f));
    }

    /// Returns the extractor registered under `name`.
    pub fn get(&self, name: &str) -> Option<&dyn AttributeExtractor> {
        self.extractors.get(name).map(|e| e.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.extractors.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.extractors.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Resolves `name` against `target`.
    pub fn resolve(
        &self,
        name: &str,
        target: &Target<'_>,
        ctx: &MatchContext<'_>,
    ) -> Result<AttributeValue, MatchError> {
        if let Some(extractor) = self.extractors.get(name) {
            let kind = target.kind();
            if !extractor.accepts(kind) {
                return Err(MatchError::UnsupportedTarget {
                    name: name.to_string(),
                    kind,
                });
            }
            return extractor.extract(target, ctx);
        }

        target
            .tag(name)
            .cloned()
            .ok_or_else(|| MatchError::AttributeNotFound {
                name: name.to_string(),
            })
    }
}

impl fmt::Debug for AttributeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeRegistry")
            .field("names", &self.names())
            .finish()
    }
}
