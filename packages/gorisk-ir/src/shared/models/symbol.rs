//! Symbols, call edges and per-function capability state
//!
//! The language-agnostic skeleton the propagator runs on: functions are
//! `Symbol`s, calls are `CallEdge`s, and each function carries independent
//! direct and transitive capability sets.

use super::capset::CapabilitySet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbol kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Func,
    Method,
    Package,
}

/// A function, method or package-level symbol. Value-equal on all fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    /// Owning package import path (may be empty for unresolved symbols).
    pub package: String,
    /// Unqualified name.
    pub name: String,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn func(package: impl Into<String>, name: impl Into<String>) -> Symbol {
        Symbol {
            package: package.into(),
            name: name.into(),
            kind: SymbolKind::Func,
        }
    }

    pub fn method(package: impl Into<String>, name: impl Into<String>) -> Symbol {
        Symbol {
            package: package.into(),
            name: name.into(),
            kind: SymbolKind::Method,
        }
    }

    pub fn package_sym(package: impl Into<String>) -> Symbol {
        let package = package.into();
        Symbol {
            name: package.clone(),
            package,
            kind: SymbolKind::Package,
        }
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Symbol {
            package: String::new(),
            name: String::new(),
            kind: SymbolKind::Func,
        }
    }
}

/// Canonical form is `package.name`, with a leading `.` when the package
/// is empty.
impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.package, self.name)
    }
}

/// A call edge observed (or synthesized) between two symbols.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEdge {
    pub caller: Symbol,
    pub callee: Symbol,
    pub file: String,
    pub line: u32,
    /// True when the callee is external to the IR (stdlib, unresolved).
    pub synthetic: bool,
}

impl CallEdge {
    pub fn new(caller: Symbol, callee: Symbol, file: impl Into<String>, line: u32) -> CallEdge {
        CallEdge {
            caller,
            callee,
            file: file.into(),
            line,
            synthetic: false,
        }
    }

    pub fn synthetic(mut self) -> CallEdge {
        self.synthetic = true;
        self
    }
}

/// Per-function capability state.
///
/// `direct` accumulates from the scanner and is never touched afterwards;
/// `transitive` accumulates from the propagator. The two are independent
/// by contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCaps {
    pub symbol: Symbol,
    #[serde(rename = "directCaps")]
    pub direct: CapabilitySet,
    #[serde(rename = "transitiveCaps")]
    pub transitive: CapabilitySet,
    pub depth: u32,
}

impl FunctionCaps {
    pub fn new(symbol: Symbol) -> FunctionCaps {
        FunctionCaps {
            symbol,
            direct: CapabilitySet::new(),
            transitive: CapabilitySet::new(),
            depth: 0,
        }
    }

    /// Union of direct and transitive capabilities (new value).
    pub fn effective(&self) -> CapabilitySet {
        self.direct.merged_with(&self.transitive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_string() {
        let s = Symbol::func("github.com/acme/tool", "Run");
        assert_eq!(s.to_string(), "github.com/acme/tool.Run");

        let anon = Symbol::func("", "helper");
        assert_eq!(anon.to_string(), ".helper");
    }

    #[test]
    fn test_value_equality() {
        let a = Symbol::func("p", "f");
        let b = Symbol::func("p", "f");
        let c = Symbol::method("p", "f");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_direct_and_transitive_are_independent() {
        use crate::shared::models::evidence::{Evidence, EvidenceVia};
        use crate::shared::models::Capability;

        let mut fc = FunctionCaps::new(Symbol::func("p", "f"));
        fc.direct.add(
            Capability::Exec,
            Evidence::new("f.go", 1, "c", EvidenceVia::CallSite, 0.75),
        );
        assert!(fc.direct.contains(Capability::Exec));
        assert!(fc.transitive.is_empty());
        assert_eq!(fc.effective().score(), 20);
    }
}
