//! Schema versioning utilities

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::compatibility::EvolutionAnalysis;
use crate::error::Result;

/// Semantic version of a schema document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion {
    /// Semantic version (e.g., "1.2.3")
    pub version: Version,
}

impl SchemaVersion {
    pub fn new(version: Version) -> Self {
        Self { version }
    }

    /// Create from a version string, with or without a leading 'v'
    pub fn parse(version_str: &str) -> Result<Self> {
        let version_str = version_str.strip_prefix('v').unwrap_or(version_str);
        Ok(Self::new(Version::parse(version_str)?))
    }

    /// Get the version string (e.g., "1.2.3")
    pub fn version_string(&self) -> String {
        self.version.to_string()
    }

    /// Get the tag string (e.g., "v1.2.3")
    pub fn tag_string(&self) -> String {
        format!("v{}", self.version)
    }

    /// Next version for the given bump
    pub fn bump(&self, bump: VersionBump) -> Self {
        let v = &self.version;
        let version = match bump {
            VersionBump::None => v.clone(),
            VersionBump::Patch => Version::new(v.major, v.minor, v.patch + 1),
            VersionBump::Minor => Version::new(v.major, v.minor + 1, 0),
            VersionBump::Major => Version::new(v.major + 1, 0, 0),
        };
        Self::new(version)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.version)
    }
}

/// Size of a version increment, smallest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionBump {
    None,
    /// Metadata-only releases; never recommended from a diff
    Patch,
    Minor,
    Major,
}

impl VersionBump {
    /// Smallest bump that honestly describes an analysis
    pub fn recommend(analysis: &EvolutionAnalysis) -> Self {
        if !analysis.is_compatible {
            VersionBump::Major
        } else if analysis.has_changes() {
            VersionBump::Minor
        } else {
            VersionBump::None
        }
    }

    /// Bump actually taken between two versions
    pub fn between(from: &SchemaVersion, to: &SchemaVersion) -> Self {
        let (a, b) = (&from.version, &to.version);
        if b.major > a.major {
            VersionBump::Major
        } else if b.major == a.major && b.minor > a.minor {
            VersionBump::Minor
        } else if b.major == a.major && b.minor == a.minor && b.patch > a.patch {
            VersionBump::Patch
        } else {
            VersionBump::None
        }
    }
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VersionBump::None => "none",
            VersionBump::Patch => "patch",
            VersionBump::Minor => "minor",
            VersionBump::Major => "major",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::CompatibilityMode;
    use crate::compatibility::analyze;
    use serde_json::json;

    #[test]
    fn test_version_parsing() {
        let v = SchemaVersion::parse("1.2.3").unwrap();
        assert_eq!(v.version_string(), "1.2.3");
        assert_eq!(v.tag_string(), "v1.2.3");
        assert_eq!(SchemaVersion::parse("v1.2.3").unwrap(), v);
        assert!(SchemaVersion::parse("one.two").is_err());
    }

    #[test]
    fn test_version_bumps() {
        let v = SchemaVersion::parse("1.2.3").unwrap();
        assert_eq!(v.bump(VersionBump::Major).version_string(), "2.0.0");
        assert_eq!(v.bump(VersionBump::Minor).version_string(), "1.3.0");
        assert_eq!(v.bump(VersionBump::Patch).version_string(), "1.2.4");
        assert_eq!(v.bump(VersionBump::None), v);
    }

    #[test]
    fn test_bump_between() {
        let v = |s| SchemaVersion::parse(s).unwrap();
        assert_eq!(VersionBump::between(&v("1.2.3"), &v("2.0.0")), VersionBump::Major);
        assert_eq!(VersionBump::between(&v("1.2.3"), &v("1.4.0")), VersionBump::Minor);
        assert_eq!(VersionBump::between(&v("1.2.3"), &v("1.2.9")), VersionBump::Patch);
        assert_eq!(VersionBump::between(&v("1.2.3"), &v("1.2.3")), VersionBump::None);
    }

    #[test]
    fn test_recommendation_follows_analysis() {
        let base = json!({ "type": "object", "properties": { "a": { "type": "string" } } });
        let same = analyze(&base, &base, CompatibilityMode::Backward).unwrap();
        assert_eq!(VersionBump::recommend(&same), VersionBump::None);

        let added = json!({
            "type": "object",
            "properties": { "a": { "type": "string" }, "b": { "type": "string" } }
        });
        let additive = analyze(&base, &added, CompatibilityMode::Backward).unwrap();
        assert_eq!(VersionBump::recommend(&additive), VersionBump::Minor);

        let retyped = json!({ "type": "object", "properties": { "a": { "type": "integer" } } });
        let breaking = analyze(&base, &retyped, CompatibilityMode::Backward).unwrap();
        assert_eq!(VersionBump::recommend(&breaking), VersionBump::Major);
    }
}
