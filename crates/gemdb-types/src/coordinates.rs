use serde::{Deserialize, Serialize};

/// The platform string of pure-Ruby releases. Used when neither the caller
/// nor the gemspec names a platform.
pub const RUBY_PLATFORM: &str = "ruby";

/// A version number is a prerelease when any segment contains a letter,
/// e.g. `1.0.pre` or `2.0.0.rc1`.
pub fn is_prerelease(number: &str) -> bool {
    number.chars().any(|c| c.is_ascii_alphabetic())
}

/// Release file name: `name-number`, with a `-platform` suffix for anything
/// other than the plain ruby platform.
pub fn full_name(name: &str, number: &str, platform: &str) -> String {
    if platform.is_empty() || platform == RUBY_PLATFORM {
        format!("{name}-{number}")
    } else {
        format!("{name}-{number}-{platform}")
    }
}

/// Identifies one release as listed by an index.
///
/// This is the payload used for side-effect-free presence checks against the
/// store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GemCoordinates {
    pub name: String,
    pub number: String,
    pub platform: String,
    pub prerelease: bool,
}

impl GemCoordinates {
    /// Build coordinates, deriving `prerelease` from the number.
    pub fn new(name: impl Into<String>, number: impl Into<String>, platform: impl Into<String>) -> Self {
        let number = number.into();
        Self {
            name: name.into(),
            prerelease: is_prerelease(&number),
            number,
            platform: platform.into(),
        }
    }

    pub fn full_name(&self) -> String {
        full_name(&self.name, &self.number, &self.platform)
    }
}
