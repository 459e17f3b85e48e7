//! Capability taxonomy
//!
//! The fixed, centrally-extensible set of privileged capability classes a
//! dependency may exercise, with per-capability weights, taint roles and
//! the shared risk thresholds.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A named class of privileged operation.
///
/// Variants are declared in alphabetical order of their canonical names so
/// that the derived `Ord` matches the output sort contract (capability name
/// ascending).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    /// Cryptographic primitives (also the taint sanitizer class)
    Crypto,
    /// Environment variable access
    Env,
    /// Subprocess / command execution
    Exec,
    /// Filesystem reads
    FsRead,
    /// Filesystem writes
    FsWrite,
    /// Network access
    Network,
    /// Dynamic code loading
    Plugin,
    /// Runtime reflection
    Reflect,
    /// Unsafe memory operations
    Unsafe,
}

impl Capability {
    /// All capabilities, in canonical (name) order.
    pub const ALL: [Capability; 9] = [
        Capability::Crypto,
        Capability::Env,
        Capability::Exec,
        Capability::FsRead,
        Capability::FsWrite,
        Capability::Network,
        Capability::Plugin,
        Capability::Reflect,
        Capability::Unsafe,
    ];

    /// Canonical name used in reports, policies and pattern tables.
    pub fn name(self) -> &'static str {
        match self {
            Capability::Crypto => "crypto",
            Capability::Env => "env",
            Capability::Exec => "exec",
            Capability::FsRead => "fs:read",
            Capability::FsWrite => "fs:write",
            Capability::Network => "network",
            Capability::Plugin => "plugin",
            Capability::Reflect => "reflect",
            Capability::Unsafe => "unsafe",
        }
    }

    /// Parse a canonical name.
    pub fn parse(name: &str) -> Option<Capability> {
        Capability::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Integer weight contributed to a capability score.
    pub fn weight(self) -> u32 {
        match self {
            Capability::FsRead => 5,
            Capability::FsWrite => 10,
            Capability::Network => 15,
            Capability::Exec => 20,
            Capability::Env => 5,
            Capability::Unsafe => 25,
            Capability::Crypto => 5,
            Capability::Reflect => 5,
            Capability::Plugin => 20,
        }
    }

    /// Taint source class: data enters the program from here.
    pub fn is_source(self) -> bool {
        matches!(
            self,
            Capability::Env | Capability::Network | Capability::FsRead
        )
    }

    /// Taint sink class: attacker-influenced data is dangerous here.
    pub fn is_sink(self) -> bool {
        matches!(self, Capability::Exec | Capability::Unsafe)
    }

    /// Taint sanitizer class.
    pub fn is_sanitizer(self) -> bool {
        matches!(self, Capability::Crypto)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Capability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Capability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Capability::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown capability: {s}")))
    }
}

/// Risk classification shared by every scorer in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Threshold a score: HIGH at 30, MEDIUM at 10.
    pub fn from_score(score: u32) -> RiskLevel {
        if score >= 30 {
            RiskLevel::High
        } else if score >= 10 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Same thresholds for fractional composite scores.
    pub fn from_composite(score: f64) -> RiskLevel {
        if score >= 30.0 {
            RiskLevel::High
        } else if score >= 10.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Ordinal used for sorting and policy comparison (LOW=1 .. HIGH=3).
    pub fn risk_value(self) -> u8 {
        match self {
            RiskLevel::Low => 1,
            RiskLevel::Medium => 2,
            RiskLevel::High => 3,
        }
    }

    pub fn parse(s: &str) -> Option<RiskLevel> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}
