use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Kind of a dependency edge.
///
/// Positional `[name, requirement]` dependency entries carry no scope and
/// default to [`DependencyScope::Runtime`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyScope {
    #[default]
    Runtime,
    Development,
}

impl DependencyScope {
    /// The string persisted in the `scope` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::Development => "development",
        }
    }
}

impl fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyScope {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "runtime" => Ok(Self::Runtime),
            "development" => Ok(Self::Development),
            other => Err(TypeError::UnknownScope(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_persisted_names() {
        assert_eq!("runtime".parse::<DependencyScope>().unwrap(), DependencyScope::Runtime);
        assert_eq!(
            "development".parse::<DependencyScope>().unwrap(),
            DependencyScope::Development
        );
    }

    #[test]
    fn rejects_unknown_scope() {
        let err = "optional".parse::<DependencyScope>().unwrap_err();
        assert_eq!(err, TypeError::UnknownScope("optional".into()));
    }

    #[test]
    fn default_is_runtime() {
        assert_eq!(DependencyScope::default(), DependencyScope::Runtime);
    }

    #[test]
    fn serde_uses_lowercase() {
        let json = serde_json::to_string(&DependencyScope::Development).unwrap();
        assert_eq!(json, "\"development\"");
    }
}
