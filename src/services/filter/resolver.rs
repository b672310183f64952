//! Identifier resolution for filter expressions.
//!
//! The grammar itself never hard-codes friendly field names; everything
//! goes through [`NameResolver`] so the expression language stays
//! swappable without touching session or query logic.

/// Resolves friendly aliases to the engine's built-in short field names.
pub trait NameResolver: Send + Sync {
    /// Resolve an alias (e.g. `Level`) to a built-in short name (`l`).
    /// Returns `None` when the alias is not a built-in.
    fn resolve_builtin_alias(&self, alias: &str) -> Option<&'static str>;
}

/// Alias table: friendly name -> reified short name.
pub(crate) static PROPERTY_MAP: &[(&str, &str)] = &[
    ("Exception", "x"),
    ("Level", "l"),
    ("Message", "m"),
    ("MessageTemplate", "mt"),
    ("Properties", "p"),
    ("Timestamp", "t"),
];

/// Default resolver backed by [`PROPERTY_MAP`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltInNameResolver;

impl NameResolver for BuiltInNameResolver {
    fn resolve_builtin_alias(&self, alias: &str) -> Option<&'static str> {
        PROPERTY_MAP
            .iter()
            .find(|(name, _)| *name == alias)
            .map(|(_, target)| *target)
    }
}
