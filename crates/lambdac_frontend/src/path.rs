//! Absolute/instance/implementation path identities (spec §3, component C1).
//!
//! Paths are the identity system threaded through every IR tier: surface
//! relative paths get absolutized by the resolver (C3), and the absolute
//! form is what definitions, instances, and implementations key off of for
//! the rest of the pipeline.

use std::fmt;

/// An immutable ordered tuple of identifier components.
///
/// The first component is always a crate name; later components are module
/// or definition names. Equality and ordering are structural (componentwise
/// lexicographic).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    components: Vec<String>,
}

impl Path {
    pub fn new(components: Vec<String>) -> Self {
        assert!(!components.is_empty(), "a path must have at least one component");
        Self { components }
    }

    pub fn single(component: impl Into<String>) -> Self {
        Self { components: vec![component.into()] }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// The crate name this path belongs to (its first component).
    pub fn crate_name(&self) -> &str {
        &self.components[0]
    }

    /// `true` if `self` is `other` or a descendant of `other`.
    pub fn is_inside(&self, other: &Path) -> bool {
        if self.components.len() < other.components.len() {
            return false;
        }
        self.components[..other.components.len()] == other.components[..]
    }

    /// Append one more component, returning a new path.
    pub fn join(&self, component: impl Into<String>) -> Path {
        let mut components = self.components.clone();
        components.push(component.into());
        Path { components }
    }

    /// Append another path's components, returning a new path.
    pub fn join_path(&self, other: &Path) -> Path {
        let mut components = self.components.clone();
        components.extend(other.components.iter().cloned());
        Path { components }
    }

    /// Parse the `a::b::c` textual form used in source and in MLIR text.
    pub fn parse(s: &str) -> Option<Path> {
        if s.is_empty() {
            return None;
        }
        let components: Vec<String> = s.split("::").map(str::to_string).collect();
        if components.iter().any(|c| c.is_empty()) {
            return None;
        }
        Some(Path { components })
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.components.join("::"))
    }
}

/// Identifies a materialized closure instance produced at a definition site:
/// `(path, id)`, where `id` is a small per-path non-negative integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstancePath {
    pub path: Path,
    pub id: u32,
}

impl fmt::Display for InstancePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%{}", self.path, self.id)
    }
}

/// Identifies a single flat function body: `(path, lambda_id, continuation_id)`.
///
/// `(lambda_id = 0, continuation_id = 0)` denotes the definition's entry point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImplementationPath {
    pub path: Path,
    pub lambda_id: u32,
    pub continuation_id: u32,
}

impl ImplementationPath {
    pub fn is_entry(&self) -> bool {
        self.lambda_id == 0 && self.continuation_id == 0
    }
}

impl fmt::Display for ImplementationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}!{}", self.path, self.lambda_id, self.continuation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_inside_prefix() {
        let a = Path::parse("foo::bar::baz").unwrap();
        let b = Path::parse("foo::bar").unwrap();
        assert!(a.is_inside(&b));
        assert!(!b.is_inside(&a));
        assert!(a.is_inside(&a));
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = Path::parse("a::b").unwrap();
        let b = Path::parse("a::c").unwrap();
        assert!(a < b);
    }

    #[test]
    fn display_round_trips_through_parse() {
        let p = Path::parse("crate_name::module::item").unwrap();
        assert_eq!(p.to_string(), "crate_name::module::item");
    }

    #[test]
    fn parse_rejects_empty_components() {
        assert!(Path::parse("a::::b").is_none());
        assert!(Path::parse("").is_none());
    }

    #[test]
    fn instance_and_impl_path_display() {
        let p = Path::parse("std::ident").unwrap();
        let ip = InstancePath { path: p.clone(), id: 3 };
        assert_eq!(ip.to_string(), "std::ident%3");
        let impl_path = ImplementationPath { path: p, lambda_id: 1, continuation_id: 2 };
        assert_eq!(impl_path.to_string(), "std::ident!1!2");
        assert!(!impl_path.is_entry());
    }
}
