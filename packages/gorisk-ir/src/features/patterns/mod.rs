//! Pattern registry
//!
//! Declarative per-language capability tables, loaded once at startup and
//! immutable thereafter. Two maps per language:
//!
//! - `imports`: import path → capabilities implied by the import
//! - `call_sites`: `"pkg.func"` or bare `"func"` → capabilities implied
//!   by observing such a call
//!
//! Tables are validated against the taxonomy at load time; an unknown
//! capability name is a fatal init error. Adding a language means adding
//! one table module here plus a loader and scanner satisfying the adapter
//! traits — nothing in the scanners enumerates languages.

mod go;
mod javascript;

use crate::errors::{GoriskError, Result};
use crate::shared::models::{Capability, Language};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Raw declarative table for one language.
pub struct LanguageTable {
    pub language: Language,
    /// import path → capability names
    pub imports: &'static [(&'static str, &'static [&'static str])],
    /// `"pkg.func"` / `"func"` → capability names
    pub call_sites: &'static [(&'static str, &'static [&'static str])],
}

/// Validated, immutable pattern rules for one language.
pub struct LanguageRules {
    imports: FxHashMap<&'static str, Vec<Capability>>,
    call_sites: FxHashMap<&'static str, Vec<Capability>>,
}

impl LanguageRules {
    fn from_table(table: &LanguageTable) -> Result<LanguageRules> {
        Ok(LanguageRules {
            imports: parse_entries(table, table.imports)?,
            call_sites: parse_entries(table, table.call_sites)?,
        })
    }

    pub fn import_caps(&self, import_path: &str) -> Option<&[Capability]> {
        self.imports.get(import_path).map(Vec::as_slice)
    }

    pub fn call_caps(&self, key: &str) -> Option<&[Capability]> {
        self.call_sites.get(key).map(Vec::as_slice)
    }

    /// All import paths carrying patterns (used by the regex fallback).
    pub fn import_paths(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.imports.keys().copied()
    }

    /// All call-site keys (used by the regex fallback).
    pub fn call_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.call_sites.keys().copied()
    }
}

fn parse_entries(
    table: &LanguageTable,
    entries: &'static [(&'static str, &'static [&'static str])],
) -> Result<FxHashMap<&'static str, Vec<Capability>>> {
    let mut map = FxHashMap::default();
    for (key, names) in entries {
        let mut caps = Vec::with_capacity(names.len());
        for name in *names {
            let cap = Capability::parse(name).ok_or_else(|| {
                GoriskError::config(format!(
                    "pattern table for {}: unknown capability '{}' under '{}'",
                    table.language, name, key
                ))
            })?;
            caps.push(cap);
        }
        map.insert(*key, caps);
    }
    Ok(map)
}

/// Process-wide registry of language rules.
pub struct PatternRegistry {
    languages: FxHashMap<Language, LanguageRules>,
}

impl PatternRegistry {
    /// Load and validate every built-in table.
    pub fn builtin() -> Result<PatternRegistry> {
        let mut languages = FxHashMap::default();
        for table in [&go::TABLE, &javascript::TABLE] {
            languages.insert(table.language, LanguageRules::from_table(table)?);
        }
        Ok(PatternRegistry { languages })
    }

    pub fn rules(&self, language: Language) -> Option<&LanguageRules> {
        self.languages.get(&language)
    }
}

static REGISTRY: Lazy<PatternRegistry> = Lazy::new(|| {
    // Tables are compiled in; a failure here is a build defect, surfaced
    // at first use rather than silently degrading every scan.
    PatternRegistry::builtin().expect("built-in pattern tables failed validation")
});

/// The process-wide registry, loaded once.
pub fn registry() -> &'static PatternRegistry {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_validate() {
        let reg = PatternRegistry::builtin().unwrap();
        assert!(reg.rules(Language::Go).is_some());
        assert!(reg.rules(Language::JavaScript).is_some());
    }

    #[test]
    fn test_go_exec_patterns() {
        let reg = registry();
        let rules = reg.rules(Language::Go).unwrap();
        assert_eq!(
            rules.import_caps("os/exec"),
            Some(&[Capability::Exec][..])
        );
        assert_eq!(
            rules.call_caps("exec.Command"),
            Some(&[Capability::Exec][..])
        );
    }

    #[test]
    fn test_js_child_process_patterns() {
        let reg = registry();
        let rules = reg.rules(Language::JavaScript).unwrap();
        assert_eq!(
            rules.import_caps("child_process"),
            Some(&[Capability::Exec][..])
        );
        assert!(rules.call_caps("child_process.exec").is_some());
    }

    #[test]
    fn test_unknown_capability_is_fatal() {
        static BAD: LanguageTable = LanguageTable {
            language: Language::Go,
            imports: &[("x", &["time-travel"])],
            call_sites: &[],
        };
        assert!(LanguageRules::from_table(&BAD).is_err());
    }
}
