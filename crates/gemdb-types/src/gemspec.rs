//! Gemspec capability contract and dependency normalization.
//!
//! Index data reaches the reconciler as gemspecs whose dependency lists come
//! in two surface shapes: structured `{name, requirement, scope}` objects and
//! positional `[name, requirement]` pairs. Both are folded into a single
//! [`CanonicalDependency`] before any store access so the two shapes can never
//! diverge in behavior.

use serde::{Deserialize, Serialize};

use crate::coordinates::RUBY_PLATFORM;
use crate::error::TypeError;
use crate::scope::DependencyScope;

/// What the reconciler needs from a gemspec.
pub trait Gemspec {
    fn name(&self) -> &str;

    /// The version number, e.g. `1.0.2`.
    fn version(&self) -> &str;

    /// The platform embedded in the gemspec itself. Callers holding an index
    /// entry may override it.
    fn platform(&self) -> &str;

    fn dependencies(&self) -> &[DependencyEntry];
}

/// One dependency as listed by a gemspec, in either accepted shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyEntry {
    /// `["bar", "~> 1.0"]`, always runtime.
    ///
    /// Must stay ahead of `Structured`: untagged matching is first-fit and a
    /// derived struct variant also accepts a sequence.
    Pair(String, String),
    /// `{"name": "bar", "requirement": "~> 1.0", "scope": "runtime"}`
    Structured {
        name: String,
        requirement: String,
        #[serde(default)]
        scope: DependencyScope,
    },
}

impl DependencyEntry {
    pub fn structured(
        name: impl Into<String>,
        requirement: impl Into<String>,
        scope: DependencyScope,
    ) -> Self {
        Self::Structured {
            name: name.into(),
            requirement: requirement.into(),
            scope,
        }
    }

    pub fn pair(name: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self::Pair(name.into(), requirement.into())
    }

    /// Fold this entry into its canonical record.
    ///
    /// `index` is the entry's position in the gemspec and only feeds the
    /// error message.
    pub fn canonicalize(&self, index: usize) -> Result<CanonicalDependency, TypeError> {
        let (name, requirement, scope) = match self {
            Self::Structured {
                name,
                requirement,
                scope,
            } => (name, requirement, *scope),
            Self::Pair(name, requirement) => (name, requirement, DependencyScope::Runtime),
        };

        if name.trim().is_empty() {
            return Err(TypeError::EmptyDependencyField {
                index,
                field: "name",
            });
        }
        if requirement.trim().is_empty() {
            return Err(TypeError::EmptyDependencyField {
                index,
                field: "requirement",
            });
        }

        Ok(CanonicalDependency {
            name: name.clone(),
            requirement: requirement.clone(),
            scope,
        })
    }
}

/// Shape-independent dependency record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalDependency {
    pub name: String,
    pub requirement: String,
    pub scope: DependencyScope,
}

/// Canonicalize every entry, failing on the first malformed one.
pub fn normalize_dependencies(
    entries: &[DependencyEntry],
) -> Result<Vec<CanonicalDependency>, TypeError> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| entry.canonicalize(index))
        .collect()
}

fn default_platform() -> String {
    RUBY_PLATFORM.to_string()
}

/// Owned gemspec value, as read from JSON index dumps.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemSpec {
    pub name: String,
    pub version: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,
}

impl GemSpec {
    /// A ruby-platform gemspec with no dependencies.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            platform: default_platform(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_dependency(mut self, entry: DependencyEntry) -> Self {
        self.dependencies.push(entry);
        self
    }
}

impl Gemspec for GemSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn platform(&self) -> &str {
        &self.platform
    }

    fn dependencies(&self) -> &[DependencyEntry] {
        &self.dependencies
    }
}

/// Parse gemspecs from either a JSON array or newline-delimited JSON objects.
pub fn parse_gemspecs(input: &str) -> Result<Vec<GemSpec>, TypeError> {
    let trimmed = input.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| TypeError::Serialization(e.to_string()));
    }

    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(lineno, line)| {
            serde_json::from_str(line)
                .map_err(|e| TypeError::Serialization(format!("line {}: {e}", lineno + 1)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pair_defaults_to_runtime() {
        let dep = DependencyEntry::pair("bar", "~> 1.0").canonicalize(0).unwrap();
        assert_eq!(dep.scope, DependencyScope::Runtime);
        assert_eq!(dep.name, "bar");
        assert_eq!(dep.requirement, "~> 1.0");
    }

    #[test]
    fn structured_keeps_development_scope() {
        let dep = DependencyEntry::structured("rspec", ">= 0", DependencyScope::Development)
            .canonicalize(0)
            .unwrap();
        assert_eq!(dep.scope, DependencyScope::Development);
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = DependencyEntry::pair("  ", "~> 1.0").canonicalize(3).unwrap_err();
        assert_eq!(
            err,
            TypeError::EmptyDependencyField {
                index: 3,
                field: "name"
            }
        );
    }

    #[test]
    fn empty_requirement_is_rejected() {
        let err = normalize_dependencies(&[
            DependencyEntry::pair("bar", "~> 1.0"),
            DependencyEntry::structured("baz", "", DependencyScope::Runtime),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            TypeError::EmptyDependencyField {
                index: 1,
                field: "requirement"
            }
        );
    }

    #[test]
    fn both_json_shapes_deserialize() {
        let json = r#"[["bar", "~> 1.0"], {"name": "baz", "requirement": ">= 2", "scope": "development"}]"#;
        let entries: Vec<DependencyEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries[0], DependencyEntry::pair("bar", "~> 1.0"));
        assert_eq!(
            entries[1],
            DependencyEntry::structured("baz", ">= 2", DependencyScope::Development)
        );
    }

    #[test]
    fn structured_json_without_scope_is_runtime() {
        let entry: DependencyEntry =
            serde_json::from_str(r#"{"name": "bar", "requirement": "~> 1.0"}"#).unwrap();
        assert_eq!(entry, DependencyEntry::structured("bar", "~> 1.0", DependencyScope::Runtime));
    }

    #[test]
    fn gemspec_defaults_platform_to_ruby() {
        let spec: GemSpec = serde_json::from_str(r#"{"name": "foo", "version": "1.0"}"#).unwrap();
        assert_eq!(spec.platform(), "ruby");
        assert!(spec.dependencies().is_empty());
    }

    #[test]
    fn parse_json_array() {
        let specs = parse_gemspecs(
            r#"[{"name": "foo", "version": "1.0"}, {"name": "bar", "version": "2.0", "platform": "java"}]"#,
        )
        .unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].platform, "java");
    }

    #[test]
    fn parse_json_lines_skips_blank_lines() {
        let input = "{\"name\": \"foo\", \"version\": \"1.0\"}\n\n{\"name\": \"bar\", \"version\": \"2.0\", \"dependencies\": [[\"foo\", \">= 1\"]]}\n";
        let specs = parse_gemspecs(input).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[1].dependencies, vec![DependencyEntry::pair("foo", ">= 1")]);
    }

    #[test]
    fn parse_reports_bad_line() {
        let err = parse_gemspecs("{\"name\": \"foo\", \"version\": \"1.0\"}\nnot json\n").unwrap_err();
        match err {
            TypeError::Serialization(msg) => assert!(msg.starts_with("line 2:"), "{msg}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    proptest! {
        #[test]
        fn pair_and_runtime_struct_converge(
            name in "[a-z][a-z0-9_-]{0,15}",
            requirement in "(~>|>=|=|<) [0-9]{1,2}\\.[0-9]{1,2}",
        ) {
            let pair = DependencyEntry::pair(name.clone(), requirement.clone()).canonicalize(0).unwrap();
            let structured = DependencyEntry::structured(name, requirement, DependencyScope::Runtime)
                .canonicalize(0)
                .unwrap();
            prop_assert_eq!(pair, structured);
        }
    }
}
