//! Call contexts (k-CFA)
//!
//! A `Context` records the last `k` callers on the path to a function;
//! `k = 0` collapses every call site (context-insensitive), `k = 1`
//! distinguishes each direct caller.

use crate::shared::models::Symbol;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The last `k` callers, outermost first.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Context(Vec<Symbol>);

impl Context {
    pub fn empty() -> Context {
        Context(Vec::new())
    }

    pub fn of_caller(caller: Symbol) -> Context {
        Context(vec![caller])
    }

    /// Extend with a caller, keeping at most `k` entries.
    pub fn pushed(&self, caller: Symbol, k: usize) -> Context {
        if k == 0 {
            return Context::empty();
        }
        let mut callers = self.0.clone();
        callers.push(caller);
        let overflow = callers.len().saturating_sub(k);
        Context(callers.split_off(overflow))
    }

    pub fn callers(&self) -> &[Symbol] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Empty context renders as the empty string, so an insensitive node
/// canonicalizes to `pkg.fn@`.
impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, caller) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "|")?;
            }
            write!(f, "{caller}")?;
        }
        Ok(())
    }
}

/// A function paired with its calling context.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ContextNode {
    pub function: Symbol,
    pub context: Context,
}

impl ContextNode {
    pub fn insensitive(function: Symbol) -> ContextNode {
        ContextNode {
            function,
            context: Context::empty(),
        }
    }

    pub fn with_caller(function: Symbol, caller: Symbol) -> ContextNode {
        ContextNode {
            function,
            context: Context::of_caller(caller),
        }
    }
}

impl fmt::Display for ContextNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.function, self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_form() {
        let f = Symbol::func("p", "f");
        let g = Symbol::func("p", "g");

        let insensitive = ContextNode::insensitive(f.clone());
        assert_eq!(insensitive.to_string(), "p.f@");

        let sensitive = ContextNode::with_caller(f, g);
        assert_eq!(sensitive.to_string(), "p.f@p.g");
    }

    #[test]
    fn test_pushed_keeps_last_k() {
        let a = Symbol::func("p", "a");
        let b = Symbol::func("p", "b");

        let ctx = Context::empty().pushed(a.clone(), 1);
        assert_eq!(ctx.callers(), &[a.clone()]);

        let ctx = ctx.pushed(b.clone(), 1);
        assert_eq!(ctx.callers(), &[b]);

        let ctx = Context::empty().pushed(a, 0);
        assert!(ctx.is_empty());
    }
}
