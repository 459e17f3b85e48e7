//! Go source scanner
//!
//! Tree-sitter walk over one Go file:
//! 1. imports → import evidence + alias table (alias → import path)
//! 2. `alias.Func()` calls → call-site evidence keyed `short.Func` plus a
//!    cross-package call edge
//! 3. bare `ident()` calls → unresolved intra-package edges
//!
//! Files that fail to produce a syntax tree drop to the regex fallback.

use super::fallback;
use super::{display_path, FileScan, SourceScanner};
use crate::errors::{GoriskError, Result};
use crate::features::patterns::LanguageRules;
use crate::shared::models::{
    confidence, CallEdge, CapabilitySet, Evidence, EvidenceVia, Language, Package, Symbol,
};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::path::Path;
use tree_sitter::{Node, Parser};

/// Go predeclared functions that never resolve to a user symbol.
const GO_PREDECLARED: &[&str] = &[
    "append", "cap", "clear", "copy", "delete", "len", "make", "max", "min", "new", "panic",
    "print", "println", "recover",
];

pub struct GoScanner;

impl GoScanner {
    pub fn new() -> GoScanner {
        GoScanner
    }
}

impl Default for GoScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceScanner for GoScanner {
    fn language(&self) -> Language {
        Language::Go
    }

    fn scan_file(&self, pkg: &Package, path: &Path, rules: &LanguageRules) -> Result<FileScan> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GoriskError::parse(format!("{}: {e}", path.display())))?;
        let file = display_path(pkg, path);

        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::language())
            .map_err(|e| GoriskError::parse(format!("go grammar: {e}")))?;

        let Some(tree) = parser.parse(&content, None) else {
            return Ok(fallback::regex_scan(pkg, &file, &content, rules));
        };

        let mut walk = GoWalk {
            pkg,
            rules,
            src: content.as_bytes(),
            file,
            aliases: FxHashMap::default(),
            file_caps: CapabilitySet::new(),
            functions: BTreeMap::new(),
            calls: Vec::new(),
        };
        walk.collect_imports(tree.root_node());
        walk.visit(tree.root_node(), None);
        Ok(walk.finish())
    }
}

struct GoWalk<'a> {
    pkg: &'a Package,
    rules: &'a LanguageRules,
    src: &'a [u8],
    file: String,
    /// local alias → full import path
    aliases: FxHashMap<String, String>,
    file_caps: CapabilitySet,
    functions: BTreeMap<Symbol, CapabilitySet>,
    calls: Vec<CallEdge>,
}

impl<'a> GoWalk<'a> {
    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.src).unwrap_or("")
    }

    fn line(&self, node: Node) -> u32 {
        node.start_position().row as u32 + 1
    }

    fn collect_imports(&mut self, root: Node) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.kind() == "import_spec" {
                self.record_import(node);
                continue;
            }
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i) {
                    // Imports only occur near the top of the tree.
                    if matches!(
                        child.kind(),
                        "source_file" | "import_declaration" | "import_spec_list" | "import_spec"
                    ) {
                        stack.push(child);
                    }
                }
            }
        }
    }

    fn record_import(&mut self, spec: Node) {
        let Some(path_node) = spec.child_by_field_name("path") else {
            return;
        };
        let import_path = self.text(path_node).trim_matches(['"', '`']).to_string();

        let alias = match spec.child_by_field_name("name") {
            Some(name) if name.kind() == "package_identifier" => {
                Some(self.text(name).to_string())
            }
            // dot and blank imports bind no usable alias
            Some(_) => None,
            None => Some(short_segment(&import_path).to_string()),
        };
        if let Some(alias) = alias {
            self.aliases.insert(alias, import_path.clone());
        }

        if let Some(caps) = self.rules.import_caps(&import_path) {
            for cap in caps {
                self.file_caps.add(
                    *cap,
                    Evidence::new(
                        self.file.as_str(),
                        self.line(spec),
                        format!("import \"{import_path}\""),
                        EvidenceVia::Import,
                        confidence::IMPORT,
                    ),
                );
            }
        }
    }

    fn visit(&mut self, node: Node, current: Option<&Symbol>) {
        let owned;
        let current = match node.kind() {
            "function_declaration" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_else(|| "<anon>".into());
                owned = Symbol::func(&self.pkg.import_path, name);
                self.functions.entry(owned.clone()).or_default();
                Some(&owned)
            }
            "method_declaration" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_else(|| "<anon>".into());
                owned = Symbol::method(&self.pkg.import_path, name);
                self.functions.entry(owned.clone()).or_default();
                Some(&owned)
            }
            "call_expression" => {
                self.record_call(node, current);
                current
            }
            _ => current,
        };

        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                self.visit(child, current);
            }
        }
    }

    fn caller_symbol(&mut self, current: Option<&Symbol>) -> Symbol {
        match current {
            Some(sym) => sym.clone(),
            None => {
                // Package-level initializer expressions.
                let sym = Symbol::func(&self.pkg.import_path, "<toplevel>");
                self.functions.entry(sym.clone()).or_default();
                sym
            }
        }
    }

    fn record_call(&mut self, call: Node, current: Option<&Symbol>) {
        let Some(function) = call.child_by_field_name("function") else {
            return;
        };
        let line = self.line(call);

        match function.kind() {
            "selector_expression" => {
                let (Some(operand), Some(field)) = (
                    function.child_by_field_name("operand"),
                    function.child_by_field_name("field"),
                ) else {
                    return;
                };
                if operand.kind() != "identifier" {
                    return;
                }
                let alias = self.text(operand);
                let func = self.text(field).to_string();
                let Some(import_path) = self.aliases.get(alias).cloned() else {
                    return;
                };

                let caller = self.caller_symbol(current);
                let callee = Symbol::func(&import_path, func.clone());
                self.calls
                    .push(CallEdge::new(caller.clone(), callee, self.file.as_str(), line));

                let key = format!("{}.{}", short_segment(&import_path), func);
                if let Some(caps) = self.rules.call_caps(&key) {
                    let context = self.text(function).to_string();
                    let entry = self.functions.entry(caller).or_default();
                    for cap in caps {
                        entry.add(
                            *cap,
                            Evidence::new(
                                self.file.as_str(),
                                line,
                                context.clone(),
                                EvidenceVia::CallSite,
                                confidence::RESOLVED_CALL,
                            ),
                        );
                    }
                }
            }
            "identifier" => {
                let name = self.text(function);
                if GO_PREDECLARED.contains(&name) {
                    return;
                }
                let caller = self.caller_symbol(current);
                let callee = Symbol::func(&self.pkg.import_path, name);
                // Unresolved until the IR builder checks the symbol table.
                self.calls
                    .push(CallEdge::new(caller, callee, self.file.as_str(), line));
            }
            _ => {}
        }
    }

    fn finish(self) -> FileScan {
        FileScan {
            file: self.file,
            file_caps: self.file_caps,
            functions: self.functions.into_iter().collect(),
            calls: self.calls,
        }
    }
}

fn short_segment(import_path: &str) -> &str {
    import_path.rsplit('/').next().unwrap_or(import_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::patterns::registry;
    use crate::shared::models::Capability;

    fn scan(src: &str) -> FileScan {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("main.go");
        std::fs::write(&path, src).unwrap();
        let pkg = Package {
            import_path: "example.com/app".into(),
            name: "main".into(),
            dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        let rules = registry().rules(Language::Go).unwrap();
        GoScanner::new().scan_file(&pkg, &path, rules).unwrap()
    }

    #[test]
    fn test_exec_via_import_and_call() {
        let scan = scan(
            r#"package main

import "os/exec"

func main() {
	exec.Command("ls").Run()
}
"#,
        );
        // import evidence at 0.90
        let import_ev = scan.file_caps.evidence(Capability::Exec);
        assert_eq!(import_ev.len(), 1);
        assert_eq!(import_ev[0].via, EvidenceVia::Import);
        assert!((import_ev[0].confidence - 0.90).abs() < 1e-9);

        // call-site evidence at 0.75 on main()
        let main_sym = Symbol::func("example.com/app", "main");
        let caps = scan
            .functions
            .iter()
            .find(|(s, _)| *s == main_sym)
            .map(|(_, c)| c)
            .unwrap();
        let call_ev = caps.evidence(Capability::Exec);
        assert_eq!(call_ev.len(), 1);
        assert_eq!(call_ev[0].via, EvidenceVia::CallSite);
        assert!((call_ev[0].confidence - 0.75).abs() < 1e-9);
        assert_eq!(call_ev[0].context, "exec.Command");
    }

    #[test]
    fn test_aliased_import_resolves() {
        let scan = scan(
            r#"package main

import run "os/exec"

func helper() {
	run.Command("id")
}
"#,
        );
        let sym = Symbol::func("example.com/app", "helper");
        let caps = scan
            .functions
            .iter()
            .find(|(s, _)| *s == sym)
            .map(|(_, c)| c)
            .unwrap();
        assert!(caps.contains(Capability::Exec));
    }

    #[test]
    fn test_bare_call_records_unresolved_edge() {
        let scan = scan(
            r#"package main

func a() {
	b()
}

func b() {}
"#,
        );
        let edge = scan
            .calls
            .iter()
            .find(|e| e.caller.name == "a")
            .unwrap();
        assert_eq!(edge.callee, Symbol::func("example.com/app", "b"));
    }

    #[test]
    fn test_predeclared_calls_ignored() {
        let scan = scan(
            r#"package main

func a() {
	x := make([]int, 0)
	_ = append(x, len(x))
}
"#,
        );
        assert!(scan.calls.is_empty());
    }

    #[test]
    fn test_all_functions_surface_even_without_caps() {
        let scan = scan("package main\n\nfunc quiet() {}\n");
        assert!(scan
            .functions
            .iter()
            .any(|(s, c)| s.name == "quiet" && c.is_empty()));
    }
}
