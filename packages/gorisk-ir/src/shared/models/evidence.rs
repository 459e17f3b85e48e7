//! Evidence records
//!
//! A piece of evidence is the machine-readable justification for
//! attributing a capability to a file, function or package. Records are
//! immutable once emitted; the propagator always creates new records
//! rather than patching confidence in place.

use serde::{Deserialize, Serialize};

/// The uniform confidence scale, applied identically across languages.
pub mod confidence {
    /// Import of a pattern-table module.
    pub const IMPORT: f64 = 0.90;
    /// Call through a definitively resolved import alias.
    pub const RESOLVED_CALL: f64 = 0.75;
    /// Call through a destructured binding (`const {exec} = require(..)`).
    pub const DESTRUCTURED_CALL: f64 = 0.85;
    /// Chained call on a require expression (`require("m").f()`).
    pub const CHAINED_CALL: f64 = 0.80;
    /// Regex fallback when no syntax tree is available.
    pub const REGEX_FALLBACK: f64 = 0.60;
    /// Shell-exec pattern inside an install script.
    pub const INSTALL_SCRIPT: f64 = 0.85;
}

/// How a piece of evidence was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EvidenceVia {
    #[serde(rename = "import")]
    Import,
    #[serde(rename = "callSite")]
    CallSite,
    #[serde(rename = "installScript")]
    InstallScript,
    #[serde(rename = "transitive")]
    Transitive,
}

impl EvidenceVia {
    pub fn as_str(self) -> &'static str {
        match self {
            EvidenceVia::Import => "import",
            EvidenceVia::CallSite => "callSite",
            EvidenceVia::InstallScript => "installScript",
            EvidenceVia::Transitive => "transitive",
        }
    }
}

/// One immutable justification for a capability claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    /// Source file the observation was made in.
    pub file: String,

    /// 1-based line number.
    pub line: u32,

    /// Human-readable context (the import path, the call text, ...).
    pub context: String,

    /// How the observation was obtained.
    pub via: EvidenceVia,

    /// Confidence in [0, 1]. For transitive evidence this is the origin
    /// confidence multiplied by the hop-decay factor.
    pub confidence: f64,

    /// Confidence before hop decay. Equals `confidence` for everything
    /// except transitive records; lets a later hop decay from the origin
    /// value instead of compounding multipliers.
    #[serde(skip)]
    pub(crate) origin_confidence: f64,
}

impl Evidence {
    pub fn new(
        file: impl Into<String>,
        line: u32,
        context: impl Into<String>,
        via: EvidenceVia,
        confidence: f64,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            context: context.into(),
            via,
            confidence,
            origin_confidence: confidence,
        }
    }

    /// Derive a transitive record from this one, decayed for a hop toward
    /// a caller. `via_symbol` is the canonical string of the callee the
    /// capability flowed through.
    pub fn transitive_via(&self, via_symbol: &str, multiplier: f64) -> Evidence {
        Evidence {
            file: self.file.clone(),
            line: self.line,
            context: format!("{} (transitive via {})", self.context, via_symbol),
            via: EvidenceVia::Transitive,
            confidence: self.origin_confidence * multiplier,
            origin_confidence: self.origin_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitive_decays_from_origin() {
        let direct = Evidence::new("a.go", 10, "exec.Command", EvidenceVia::CallSite, 0.75);
        let hop1 = direct.transitive_via("pkg.b", 0.70);
        assert!((hop1.confidence - 0.525).abs() < 1e-9);
        assert_eq!(hop1.via, EvidenceVia::Transitive);
        assert!(hop1.context.contains("(transitive via pkg.b)"));

        // A second hop multiplies the origin, not the already-decayed value.
        let hop2 = hop1.transitive_via("pkg.a", 0.55);
        assert!((hop2.confidence - 0.75 * 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_source_record_untouched() {
        let direct = Evidence::new("a.go", 10, "exec.Command", EvidenceVia::CallSite, 0.75);
        let _ = direct.transitive_via("pkg.b", 0.70);
        assert_eq!(direct.confidence, 0.75);
        assert_eq!(direct.context, "exec.Command");
    }

    #[test]
    fn test_via_serde_names() {
        let ev = Evidence::new("f.js", 1, "child_process", EvidenceVia::Import, 0.90);
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["via"], "import");
        assert_eq!(json["file"], "f.js");
    }
}
