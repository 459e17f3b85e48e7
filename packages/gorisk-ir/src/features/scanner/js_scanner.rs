//! JavaScript source scanner
//!
//! Handles the four import shapes npm code actually uses:
//!
//! - `import cp from "child_process"` / `import * as cp from ...`  (namespace)
//! - `import {exec} from "child_process"`                          (named)
//! - `const cp = require("child_process")`                         (namespace)
//! - `const {exec} = require("child_process")`                     (destructured)
//!
//! plus chained `require("m").f()` calls and the bare globals in the
//! pattern table (`eval`). Confidence follows the uniform scale:
//! resolved alias 0.75, destructured binding 0.85, chained require 0.80.

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

/// How a local name binds to a module.
#[derive(Debug, Clone)]
enum Binding {
    /// Whole-module binding (`cp` from namespace/default import).
    Namespace(String),
    /// One export bound directly (`exec` from a destructured require /
    /// named import): `(module, export_name)`.
    Export(String, String),
}

pub struct JsScanner;

impl JsScanner {
    pub fn new() -> JsScanner {
        JsScanner
    }
}

impl Default for JsScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceScanner for JsScanner {
    fn language(&self) -> Language {
        Language::JavaScript
    }

    fn scan_file(&self, pkg: &Package, path: &Path, rules: &LanguageRules) -> Result<FileScan> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| GoriskError::parse(format!("{}: {e}", path.display())))?;
        let file = display_path(pkg, path);

        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::language())
            .map_err(|e| GoriskError::parse(format!("javascript grammar: {e}")))?;

        let Some(tree) = parser.parse(&content, None) else {
            return Ok(fallback::regex_scan(pkg, &file, &content, rules));
        };

        let mut walk = JsWalk {
            pkg,
            rules,
            src: content.as_bytes(),
            file,
            bindings: FxHashMap::default(),
            file_caps: CapabilitySet::new(),
            functions: BTreeMap::new(),
            calls: Vec::new(),
        };
        walk.collect_bindings(tree.root_node());
        walk.visit(tree.root_node(), None);
        Ok(walk.finish())
    }
}

struct JsWalk<'a> {
    pkg: &'a Package,
    rules: &'a LanguageRules,
    src: &'a [u8],
    file: String,
    bindings: FxHashMap<String, Binding>,
    file_caps: CapabilitySet,
    functions: BTreeMap<Symbol, CapabilitySet>,
    calls: Vec<CallEdge>,
}

impl<'a> JsWalk<'a> {
    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.src).unwrap_or("")
    }

    fn line(&self, node: Node) -> u32 {
        node.start_position().row as u32 + 1
    }

    fn string_value(&self, node: Node) -> Option<String> {
        (node.kind() == "string").then(|| self.text(node).trim_matches(['"', '\'', '`']).to_string())
    }

    /// The module specifier when `node` is a `require("m")` call.
    fn require_target(&self, node: Node) -> Option<String> {
        if node.kind() != "call_expression" {
            return None;
        }
        let function = node.child_by_field_name("function")?;
        if function.kind() != "identifier" || self.text(function) != "require" {
            return None;
        }
        let args = node.child_by_field_name("arguments")?;
        for i in 0..args.named_child_count() {
            if let Some(arg) = args.named_child(i) {
                return self.string_value(arg);
            }
        }
        None
    }

    fn emit_import_evidence(&mut self, module: &str, line: u32, context: String, conf: f64) {
        if let Some(caps) = self.rules.import_caps(module) {
            for cap in caps {
                self.file_caps.add(
                    *cap,
                    Evidence::new(self.file.as_str(), line, context.clone(), EvidenceVia::Import, conf),
                );
            }
        }
    }

    /// First pass: imports and require bindings anywhere in the file.
    fn collect_bindings(&mut self, root: Node) {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "import_statement" => self.record_import_statement(node),
                "variable_declarator" => self.record_require_declarator(node),
                "call_expression" => {
                    // bare require("m"); declarator-bound requires emit
                    // their evidence in record_require_declarator
                    let bound = node
                        .parent()
                        .map(|p| p.kind() == "variable_declarator")
                        .unwrap_or(false);
                    if !bound {
                        if let Some(module) = self.require_target(node) {
                            let line = self.line(node);
                            self.emit_import_evidence(
                                &module,
                                line,
                                format!("require(\"{module}\")"),
                                confidence::IMPORT,
                            );
                        }
                    }
                }
                _ => {}
            }
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i) {
                    stack.push(child);
                }
            }
        }
    }

    fn record_import_statement(&mut self, stmt: Node) {
        let Some(source) = stmt.child_by_field_name("source") else {
            return;
        };
        let Some(module) = self.string_value(source) else {
            return;
        };
        let line = self.line(stmt);
        self.emit_import_evidence(
            &module,
            line,
            format!("import \"{module}\""),
            confidence::IMPORT,
        );

        // import clause shapes
        let mut stack = vec![stmt];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "namespace_import" => {
                    // * as ns
                    if let Some(ident) = last_identifier(node) {
                        self.bindings.insert(
                            self.text(ident).to_string(),
                            Binding::Namespace(module.clone()),
                        );
                    }
                }
                "import_specifier" => {
                    let name = node.child_by_field_name("name");
                    let alias = node.child_by_field_name("alias").or(name);
                    if let (Some(name), Some(alias)) = (name, alias) {
                        self.bindings.insert(
                            self.text(alias).to_string(),
                            Binding::Export(module.clone(), self.text(name).to_string()),
                        );
                    }
                }
                "identifier" => {
                    // default import: `import cp from "m"`
                    if node
                        .parent()
                        .map(|p| p.kind() == "import_clause")
                        .unwrap_or(false)
                    {
                        self.bindings.insert(
                            self.text(node).to_string(),
                            Binding::Namespace(module.clone()),
                        );
                    }
                }
                _ => {}
            }
            for i in (0..node.child_count()).rev() {
                if let Some(child) = node.child(i) {
                    stack.push(child);
                }
            }
        }
    }

    fn record_require_declarator(&mut self, decl: Node) {
        let (Some(name), Some(value)) = (
            decl.child_by_field_name("name"),
            decl.child_by_field_name("value"),
        ) else {
            return;
        };
        let Some(module) = self.require_target(value) else {
            return;
        };
        let line = self.line(decl);

        match name.kind() {
            "identifier" => {
                self.bindings.insert(
                    self.text(name).to_string(),
                    Binding::Namespace(module.clone()),
                );
                self.emit_import_evidence(
                    &module,
                    line,
                    format!("require(\"{module}\")"),
                    confidence::IMPORT,
                );
            }
            "object_pattern" => {
                // const {exec: run, spawn} = require("child_process")
                let mut stack = vec![name];
                while let Some(node) = stack.pop() {
                    match node.kind() {
                        "shorthand_property_identifier_pattern" => {
                            self.bindings.insert(
                                self.text(node).to_string(),
                                Binding::Export(module.clone(), self.text(node).to_string()),
                            );
                        }
                        "pair_pattern" => {
                            if let (Some(key), Some(val)) = (
                                node.child_by_field_name("key"),
                                node.child_by_field_name("value"),
                            ) {
                                self.bindings.insert(
                                    self.text(val).to_string(),
                                    Binding::Export(module.clone(), self.text(key).to_string()),
                                );
                            }
                        }
                        _ => {}
                    }
                    for i in (0..node.child_count()).rev() {
                        if let Some(child) = node.child(i) {
                            stack.push(child);
                        }
                    }
                }
                // Destructuring names the export directly: higher confidence.
                self.emit_import_evidence(
                    &module,
                    line,
                    format!("destructured require(\"{module}\")"),
                    confidence::DESTRUCTURED_CALL,
                );
            }
            _ => {}
        }
    }

    /// Second pass: call sites and member accesses, tracking the
    /// enclosing function.
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
            "method_definition" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.text(n).to_string())
                    .unwrap_or_else(|| "<anon>".into());
                owned = Symbol::method(&self.pkg.import_path, name);
                self.functions.entry(owned.clone()).or_default();
                Some(&owned)
            }
            "variable_declarator" => {
                // const f = () => {...} / const f = function() {...}
                match (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("value"),
                ) {
                    (Some(name), Some(value))
                        if name.kind() == "identifier"
                            && matches!(
                                value.kind(),
                                "arrow_function" | "function_expression" | "function"
                            ) =>
                    {
                        owned = Symbol::func(&self.pkg.import_path, self.text(name));
                        self.functions.entry(owned.clone()).or_default();
                        Some(&owned)
                    }
                    _ => current,
                }
            }
            "call_expression" => {
                self.record_call(node, current);
                current
            }
            "member_expression" => {
                self.record_member(node, current);
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
                // Module bodies execute on import.
                let sym = Symbol::func(&self.pkg.import_path, "<toplevel>");
                self.functions.entry(sym.clone()).or_default();
                sym
            }
        }
    }

    fn add_call_evidence(
        &mut self,
        caller: Symbol,
        key: &str,
        context: String,
        line: u32,
        conf: f64,
    ) {
        if let Some(caps) = self.rules.call_caps(key) {
            let entry = self.functions.entry(caller).or_default();
            for cap in caps {
                entry.add(
                    *cap,
                    Evidence::new(self.file.as_str(), line, context.clone(), EvidenceVia::CallSite, conf),
                );
            }
        }
    }

    fn record_call(&mut self, call: Node, current: Option<&Symbol>) {
        let Some(function) = call.child_by_field_name("function") else {
            return;
        };
        let line = self.line(call);

        match function.kind() {
            "member_expression" => {
                let (Some(object), Some(property)) = (
                    function.child_by_field_name("object"),
                    function.child_by_field_name("property"),
                ) else {
                    return;
                };
                let prop = self.text(property).to_string();

                if object.kind() == "identifier" {
                    let obj_name = self.text(object);
                    if let Some(Binding::Namespace(module)) = self.bindings.get(obj_name).cloned() {
                        let caller = self.caller_symbol(current);
                        let callee = Symbol::func(&module, prop.clone());
                        self.calls
                            .push(CallEdge::new(caller.clone(), callee, self.file.as_str(), line));
                        self.add_call_evidence(
                            caller,
                            &format!("{module}.{prop}"),
                            self.text(function).to_string(),
                            line,
                            confidence::RESOLVED_CALL,
                        );
                    }
                } else if let Some(module) = self.require_target(object) {
                    // require("m").f()
                    let caller = self.caller_symbol(current);
                    let callee = Symbol::func(&module, prop.clone());
                    self.calls
                        .push(CallEdge::new(caller.clone(), callee, self.file.as_str(), line));
                    self.add_call_evidence(
                        caller,
                        &format!("{module}.{prop}"),
                        self.text(function).to_string(),
                        line,
                        confidence::CHAINED_CALL,
                    );
                }
            }
            "identifier" => {
                let name = self.text(function).to_string();
                if name == "require" {
                    return; // handled in the binding pass
                }
                match self.bindings.get(&name).cloned() {
                    Some(Binding::Export(module, export)) => {
                        let caller = self.caller_symbol(current);
                        let callee = Symbol::func(&module, export.clone());
                        self.calls
                            .push(CallEdge::new(caller.clone(), callee, self.file.as_str(), line));
                        self.add_call_evidence(
                            caller,
                            &format!("{module}.{export}"),
                            format!("{name}()"),
                            line,
                            confidence::DESTRUCTURED_CALL,
                        );
                    }
                    Some(Binding::Namespace(_)) => {}
                    None => {
                        // Bare global patterns (eval), then unresolved
                        // intra-package edge.
                        let caller = self.caller_symbol(current);
                        if self.rules.call_caps(&name).is_some() {
                            self.add_call_evidence(
                                caller.clone(),
                                &name,
                                format!("{name}()"),
                                line,
                                confidence::RESOLVED_CALL,
                            );
                            return;
                        }
                        let callee = Symbol::func(&self.pkg.import_path, name);
                        self.calls
                            .push(CallEdge::new(caller, callee, self.file.as_str(), line));
                    }
                }
            }
            _ => {}
        }
    }

    /// Non-call member patterns such as `process.env.PATH`.
    fn record_member(&mut self, member: Node, current: Option<&Symbol>) {
        let (Some(object), Some(property)) = (
            member.child_by_field_name("object"),
            member.child_by_field_name("property"),
        ) else {
            return;
        };
        if object.kind() != "identifier" {
            return;
        }
        let key = format!("{}.{}", self.text(object), self.text(property));
        // Only globals unmediated by an import (process.env); anything
        // bound through the alias table is handled at the call site.
        if self.bindings.contains_key(self.text(object)) {
            return;
        }
        if self.rules.call_caps(&key).is_some() {
            let line = self.line(member);
            let caller = self.caller_symbol(current);
            self.add_call_evidence(caller, &key, key.clone(), line, confidence::RESOLVED_CALL);
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

fn last_identifier(node: Node) -> Option<Node> {
    for i in (0..node.child_count()).rev() {
        if let Some(child) = node.child(i) {
            if child.kind() == "identifier" {
                return Some(child);
            }
        }
    }
    None
}
