//! Client script generation.
//!
//! Every file becomes a factory, dependencies first:
//!
//! ```text
//! var $f0 = function () {
//!   var $components = {};
//!   ... assignments, tag definitions, exports, script blocks ...
//!   var $render = function () { ... structural nodes ... };
//!   return { components: $components, render: $render };
//! }();
//! ```
//!
//! The resync entry point renders the root factory into `document.body`
//! through the reconciliation runtime.

use super::js::{print, print_expr, JsExpr, JsStmt};
use super::output::ScriptChunk;
use super::RUNTIME;
use crate::ast::{
    BinaryOp, CustomNode, EachNode, Expr, FileId, FileNode, Node, Pos, StringPart, TagNode,
    UnaryOp,
};
use crate::error::{Error, ErrorKind, Result};
use crate::html;
use crate::pipes;
use indexmap::IndexSet;
use std::collections::{HashMap, HashSet};

/// Names the generated code binds itself
const RESERVED: &[&str] = &["data", "props", "_a", "_b"];

/// Generate the client script for `root`. `actions` are server function
/// names exposed as `$name`.
pub fn generate(root: &FileNode, actions: &[String]) -> Result<Vec<ScriptChunk>> {
    let mut generator = ClientGenerator::new(actions);
    generator.collect(root)?;
    let program = generator.program(root)?;
    Ok(print(&program))
}

/// What a file can call as a custom tag
struct FileInfo<'a> {
    node: &'a FileNode,
    exports: Vec<String>,
    tags: HashSet<String>,
    namespaces: HashMap<String, HashSet<String>>,
}

struct ClientGenerator<'a> {
    actions: &'a [String],
    /// Dependency order, root last
    files: Vec<FileInfo<'a>>,
    index: HashMap<FileId, usize>,
    globals: IndexSet<String>,
    current: usize,
    tag_id: usize,
    loops: usize,
    in_custom: bool,
}

impl<'a> ClientGenerator<'a> {
    fn new(actions: &'a [String]) -> Self {
        Self {
            actions,
            files: Vec::new(),
            index: HashMap::new(),
            globals: IndexSet::new(),
            current: 0,
            tag_id: 0,
            loops: 0,
            in_custom: false,
        }
    }

    /// Number the files and work out which tags each one can see
    fn collect(&mut self, file: &'a FileNode) -> Result<()> {
        for child in &file.children {
            if let Node::File(dependency) = child {
                self.collect(dependency)?;
            }
        }
        if self.index.contains_key(&file.file) {
            return Ok(());
        }

        let mut declared = HashSet::new();
        self.collect_globals(&file.children, &mut declared)?;

        let mut info = FileInfo {
            node: file,
            exports: Vec::new(),
            tags: HashSet::new(),
            namespaces: HashMap::new(),
        };
        for child in &file.children {
            match child {
                Node::Export(export) => info.exports.push(export.name.clone()),
                Node::Custom(custom) => {
                    info.tags.insert(custom.name.clone());
                }
                Node::File(dependency) => {
                    let exports = self.exports_of(dependency);
                    match &dependency.namespace {
                        Some(ns) => {
                            info.namespaces.entry(ns.clone()).or_default().extend(exports);
                        }
                        None => info.tags.extend(exports),
                    }
                }
                _ => {}
            }
        }
        self.index.insert(file.file, self.files.len());
        self.files.push(info);
        Ok(())
    }

    fn exports_of(&self, file: &FileNode) -> Vec<String> {
        self.index
            .get(&file.file)
            .map(|&i| self.files[i].exports.clone())
            .unwrap_or_default()
    }

    fn collect_globals(&mut self, nodes: &[Node], declared: &mut HashSet<String>) -> Result<()> {
        for node in nodes {
            match node {
                Node::Set(set) if set.global => {
                    if !declared.insert(set.name.clone()) {
                        return Err(Error::generate(
                            ErrorKind::DuplicateGlobal,
                            format!("Global already declared: {}", set.name),
                            set.pos,
                        ));
                    }
                    self.globals.insert(set.name.clone());
                }
                Node::Tag(tag) => self.collect_globals(&tag.children, declared)?,
                Node::Custom(custom) => self.collect_globals(&custom.children, declared)?,
                Node::Each(each) => self.collect_globals(&each.children, declared)?,
                Node::If(node) => {
                    self.collect_globals(&node.then_branch, declared)?;
                    if let Some(otherwise) = &node.else_branch {
                        self.collect_globals(otherwise, declared)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn program(&mut self, root: &'a FileNode) -> Result<Vec<JsStmt>> {
        let mut body = vec![
            JsStmt::Raw(RUNTIME.to_string()),
            JsStmt::Var("$sync".into(), Some(JsExpr::function(&[], vec![]))),
        ];
        for global in &self.globals {
            body.push(JsStmt::Var(mangle(global), None));
        }
        for name in free_identifiers(root) {
            if self.globals.contains(&name) {
                continue;
            }
            body.push(JsStmt::Var(
                mangle(&name),
                Some(JsExpr::ident("data").index(JsExpr::str(name.as_str()))),
            ));
        }
        for action in self.actions {
            let bound = JsExpr::Call(
                Box::new(JsExpr::ident("$call").member("bind")),
                vec![JsExpr::Raw("undefined".into()), JsExpr::str(action.as_str())],
            );
            body.push(JsStmt::Var(format!("${}", mangle(action)), Some(bound)));
        }

        for i in 0..self.files.len() {
            self.current = i;
            let factory = self.factory(self.files[i].node)?;
            body.push(JsStmt::Var(
                format!("$f{}", i),
                Some(JsExpr::Call(Box::new(JsExpr::function(&[], factory)), vec![])),
            ));
        }

        let root_render = JsExpr::ident(format!("$f{}", self.file_index(root))).member("render");
        body.push(JsStmt::Assign(
            JsExpr::ident("$sync"),
            JsExpr::function(
                &[],
                vec![JsStmt::Expr(JsExpr::call("$$sync", vec![root_render]))],
            ),
        ));
        body.push(JsStmt::Expr(JsExpr::call("$sync", vec![])));

        Ok(vec![JsStmt::Expr(JsExpr::Call(
            Box::new(JsExpr::ident("document").member("addEventListener")),
            vec![
                JsExpr::str("DOMContentLoaded"),
                JsExpr::function(&[], body),
            ],
        ))])
    }

    /// Script name for a `let`/`const` or loop binding. Globals and `data`
    /// win every lookup, so a local reusing one of their names is bound
    /// under a name nothing reads.
    fn local(&self, name: &str) -> String {
        if name == "data" || self.globals.contains(name) {
            format!("$$l_{}", mangle(name))
        } else {
            mangle(name)
        }
    }

    fn file_index(&self, file: &FileNode) -> usize {
        self.index.get(&file.file).copied().unwrap_or_default()
    }

    fn factory(&mut self, file: &'a FileNode) -> Result<Vec<JsStmt>> {
        let mut once = vec![JsStmt::Var(
            "$components".into(),
            Some(JsExpr::Object(vec![])),
        )];
        let mut render = Vec::new();

        for child in &file.children {
            match child {
                Node::Set(_) | Node::Js(_) => self.walk(child, &mut once)?,
                Node::Custom(custom) => once.push(self.custom(custom)?),
                Node::Export(export) => once.push(JsStmt::Assign(
                    JsExpr::ident("$components").member(mangle(&export.name)),
                    JsExpr::ident(format!("${}", mangle(&export.name))),
                )),
                Node::File(dependency) => {
                    let components = JsExpr::ident(format!("$f{}", self.file_index(dependency)))
                        .member("components");
                    match &dependency.namespace {
                        Some(ns) => once.push(JsStmt::Var(format!("${}", mangle(ns)), Some(components))),
                        None => {
                            for name in self.exports_of(dependency) {
                                once.push(JsStmt::Var(
                                    format!("${}", mangle(&name)),
                                    Some(components.clone().member(mangle(&name))),
                                ));
                            }
                        }
                    }
                    self.walk(child, &mut render)?;
                }
                _ => self.walk(child, &mut render)?,
            }
        }

        once.push(JsStmt::Var("$render".into(), Some(JsExpr::function(&[], render))));
        once.push(JsStmt::Return(Some(JsExpr::Object(vec![
            ("components".into(), JsExpr::ident("$components")),
            ("render".into(), JsExpr::ident("$render")),
        ]))));
        Ok(once)
    }

    /// `var $Name = $$c(function (props, $emit, $on) { init; return body; })`
    fn custom(&mut self, custom: &'a CustomNode) -> Result<JsStmt> {
        let was_custom = std::mem::replace(&mut self.in_custom, true);
        let mut init = Vec::new();
        let mut body = Vec::new();
        let mut started = false;
        for child in &custom.children {
            if !started && matches!(child, Node::Set(_) | Node::Js(_)) {
                self.walk(child, &mut init)?;
            } else {
                started = true;
                self.walk(child, &mut body)?;
            }
        }
        self.in_custom = was_custom;

        init.push(JsStmt::Return(Some(JsExpr::function(
            &["$$id", "props", "$$yield"],
            body,
        ))));
        Ok(JsStmt::Var(
            format!("${}", mangle(&custom.name)),
            Some(JsExpr::call(
                "$$c",
                vec![JsExpr::function(&["props", "$emit", "$on"], init)],
            )),
        ))
    }

    fn walk_all(&mut self, nodes: &'a [Node]) -> Result<Vec<JsStmt>> {
        let mut out = Vec::new();
        for node in nodes {
            self.walk(node, &mut out)?;
        }
        Ok(out)
    }

    fn walk(&mut self, node: &'a Node, out: &mut Vec<JsStmt>) -> Result<()> {
        match node {
            Node::Tag(tag) => self.tag(tag, out)?,
            Node::If(node) => {
                let condition = self.expr(&node.condition)?;
                let then = self.walk_all(&node.then_branch)?;
                let otherwise = match &node.else_branch {
                    Some(nodes) => Some(self.walk_all(nodes)?),
                    None => None,
                };
                out.push(JsStmt::If(condition, then, otherwise));
            }
            Node::Each(each) => out.push(self.each(each)?),
            Node::Yield(_) => out.push(JsStmt::Expr(JsExpr::call("$$yield", vec![]))),
            Node::Set(set) => {
                let value = self.expr(&set.value)?;
                if set.global {
                    out.push(JsStmt::Assign(JsExpr::ident(mangle(&set.name)), value));
                } else {
                    out.push(JsStmt::Var(self.local(&set.name), Some(value)));
                }
            }
            Node::TextNode(text) => {
                let key = self.key();
                let value = self.text(&text.value)?;
                out.push(JsStmt::Expr(JsExpr::call(
                    "$$e",
                    vec![JsExpr::str("text"), key, value, JsExpr::Object(vec![])],
                )));
            }
            Node::Js(js) => out.push(JsStmt::Embedded(js.code.clone(), js.pos)),
            Node::File(file) => {
                let render = JsExpr::ident(format!("$f{}", self.file_index(file))).member("render");
                out.push(JsStmt::Expr(JsExpr::Call(Box::new(render), vec![])));
            }
            Node::Custom(custom) => out.push(self.custom(custom)?),
            // handled by the enclosing factory
            Node::Export(_) => {}
        }
        Ok(())
    }

    fn each(&mut self, each: &'a EachNode) -> Result<JsStmt> {
        let list = self.expr(&each.list)?;
        let depth = self.loops;
        let params = vec![
            self.local(&each.item),
            each.index
                .as_deref()
                .map(|index| self.local(index))
                .unwrap_or_else(|| format!("$$i{}", depth)),
            format!("__index{}", depth),
        ];
        self.loops += 1;
        let body = self.walk_all(&each.children);
        self.loops -= 1;
        Ok(JsStmt::Expr(JsExpr::call(
            "$$each",
            vec![list, JsExpr::Function(params, body?)],
        )))
    }

    /// Stable reconciliation key: `[$$id-]a-N[-__index0...]`
    fn key(&mut self) -> JsExpr {
        let id = self.tag_id;
        self.tag_id += 1;
        let mut parts = Vec::new();
        if self.in_custom {
            parts.push(JsExpr::ident("$$id"));
        }
        parts.push(JsExpr::str(format!("a-{}", id)));
        for depth in 0..self.loops {
            parts.push(JsExpr::ident(format!("__index{}", depth)));
        }
        if parts.len() == 1 {
            return parts.remove(0);
        }
        let mut joined = Vec::with_capacity(parts.len() * 2);
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                joined.push(JsExpr::str("-"));
            }
            joined.push(part);
        }
        JsExpr::Concat(joined)
    }

    fn tag(&mut self, tag: &'a TagNode, out: &mut Vec<JsStmt>) -> Result<()> {
        let info = &self.files[self.current];
        let callee = match &tag.namespace {
            Some(ns) => {
                let Some(names) = info.namespaces.get(ns) else {
                    return Err(Error::generate(
                        ErrorKind::InvalidNamespace,
                        format!("Invalid namespace: {}", ns),
                        tag.pos,
                    ));
                };
                if !names.contains(&tag.name) {
                    return Err(Error::generate(
                        ErrorKind::InvalidTag,
                        format!("Invalid tag: {}::{}", ns, tag.name),
                        tag.pos,
                    ));
                }
                Some(JsExpr::ident(format!("${}", mangle(ns))).member(mangle(&tag.name)))
            }
            None if info.tags.contains(&tag.name) => {
                Some(JsExpr::ident(format!("${}", mangle(&tag.name))))
            }
            None => None,
        };

        if let Some(callee) = callee {
            let key = self.key();
            let props = self.attributes(tag)?;
            let events = self.events(tag)?;
            let children = self.walk_all(&tag.children)?;
            out.push(JsStmt::Expr(JsExpr::Call(
                Box::new(callee),
                vec![key, props, events, JsExpr::function(&[], children)],
            )));
            return Ok(());
        }

        match tag.name.as_str() {
            "head" => return Ok(()),
            "html" | "body" => {
                out.extend(self.walk_all(&tag.children)?);
                return Ok(());
            }
            name if !html::is_legal_element(name) => {
                return Err(Error::generate(
                    ErrorKind::InvalidTag,
                    format!("Invalid tag: {}", name),
                    tag.pos,
                ));
            }
            _ => {}
        }

        let key = self.key();
        let attributes = self.attributes(tag)?;
        let events = self.events(tag)?;
        let mut args = vec![JsExpr::str(tag.name.as_str()), key, attributes, events];
        if !tag.children.is_empty() {
            args.push(JsExpr::function(&[], self.walk_all(&tag.children)?));
        }
        out.push(JsStmt::Expr(JsExpr::call("$$e", args)));
        Ok(())
    }

    fn attributes(&self, tag: &TagNode) -> Result<JsExpr> {
        let mut entries = Vec::with_capacity(tag.attributes.len());
        for attr in &tag.attributes {
            let name = attr.name.strip_prefix("bind:").unwrap_or(&attr.name);
            entries.push((name.to_string(), self.expr(&attr.value)?));
        }
        Ok(JsExpr::Object(entries))
    }

    fn events(&self, tag: &TagNode) -> Result<JsExpr> {
        let mut entries = Vec::new();
        if let Some(bound) = tag.attribute("bind:value") {
            if !matches!(bound, Expr::Ident { .. } | Expr::Accumulator { .. }) {
                return Err(Error::generate(
                    ErrorKind::InvalidBinding,
                    "bind:value needs a variable or property to assign to",
                    bound.pos(),
                ));
            }
            let target = print_expr(&self.expr(bound)?);
            entries.push((
                "input".to_string(),
                handler(format!("{} = $e.target.value;", target), true),
            ));
        }
        for event in &tag.events {
            let code = event.handler.trim().trim_end_matches(';');
            entries.push((event.event.clone(), handler(format!("{};", code), event.sync)));
        }
        Ok(JsExpr::Object(entries))
    }

    /// Text node content, always a string
    fn text(&self, expr: &Expr) -> Result<JsExpr> {
        match self.expr(expr)? {
            s @ JsExpr::Str(_) => Ok(s),
            JsExpr::Concat(parts) => Ok(JsExpr::Concat(parts)),
            other => Ok(JsExpr::Concat(vec![other])),
        }
    }

    fn string(&self, parts: &[StringPart]) -> Result<JsExpr> {
        let mut out = Vec::with_capacity(parts.len() + 1);
        for part in parts {
            out.push(match part {
                StringPart::Chunk(text) => JsExpr::str(text.as_str()),
                StringPart::Expr(e) => self.expr(e)?,
            });
        }
        Ok(match out.len() {
            0 => JsExpr::str(""),
            1 if matches!(out[0], JsExpr::Str(_)) => out.remove(0),
            _ => {
                if !matches!(parts.first(), Some(StringPart::Chunk(_))) && out.len() > 1 {
                    out.insert(0, JsExpr::str(""));
                }
                JsExpr::Concat(out)
            }
        })
    }

    fn expr(&self, expr: &Expr) -> Result<JsExpr> {
        Ok(match expr {
            Expr::Null { .. } => JsExpr::Null,
            Expr::Bool { value, .. } => JsExpr::Bool(*value),
            Expr::Number { value, .. } => JsExpr::Num(*value),
            Expr::String { parts, .. } => self.string(parts)?,
            Expr::Ident { name, .. } => JsExpr::ident(mangle(name)),
            Expr::Accumulator { base, path, .. } => {
                let mut current = self.expr(base)?;
                for segment in path {
                    current = current.index(self.expr(segment)?);
                }
                current
            }
            Expr::Object { entries, .. } => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    out.push((key.clone(), self.expr(value)?));
                }
                JsExpr::Object(out)
            }
            Expr::Array { items, .. } => JsExpr::Array(
                items
                    .iter()
                    .map(|item| self.expr(item))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Expr::Ternary {
                condition,
                then,
                otherwise,
                ..
            } => JsExpr::Ternary(
                Box::new(self.expr(condition)?),
                Box::new(self.expr(then)?),
                Box::new(self.expr(otherwise)?),
            ),
            Expr::Unop { op, operand, .. } => {
                let symbol = match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                };
                JsExpr::Unary(symbol, Box::new(self.expr(operand)?))
            }
            Expr::Binop { op, lhs, rhs, .. } => {
                let (l, r) = (self.expr(lhs)?, self.expr(rhs)?);
                match op {
                    BinaryOp::Eq => JsExpr::call("$$eq", vec![l, r]),
                    BinaryOp::NotEq => JsExpr::Unary("!", Box::new(JsExpr::call("$$eq", vec![l, r]))),
                    other => JsExpr::binary(other.as_str(), l, r),
                }
            }
            Expr::Parenthetical { inner, .. } => JsExpr::Paren(Box::new(self.expr(inner)?)),
            Expr::Pipe {
                name,
                target,
                args,
                pos,
            } => {
                let pipe = pipes::lookup(name).ok_or_else(|| undeclared_pipe(name, *pos))?;
                let target = self.expr(target)?;
                let args = args
                    .iter()
                    .map(|arg| self.expr(arg))
                    .collect::<Result<Vec<_>>>()?;
                pipe.emit(target, args)
            }
        })
    }
}

fn undeclared_pipe(name: &str, pos: Pos) -> Error {
    Error::generate(ErrorKind::UndeclaredPipe, format!("Cannot pipe into: {}", name), pos)
}

/// `function ($e) { code $sync(); }`
fn handler(code: String, sync: bool) -> JsExpr {
    let mut body = vec![JsStmt::Raw(code)];
    if sync {
        body.push(JsStmt::Expr(JsExpr::call("$sync", vec![])));
    }
    JsExpr::function(&["$e"], body)
}

/// Words a script cannot bind with `var` or a parameter
const JS_RESERVED: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let",
    "new", "null", "package", "private", "protected", "public", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Identifiers may contain `-` or be script keywords, script names may not
fn mangle(name: &str) -> String {
    if JS_RESERVED.contains(&name) {
        return format!("$$r_{}", name);
    }
    name.replace('-', "$")
}

/// Every identifier read anywhere in the tree, first use first
fn free_identifiers(root: &FileNode) -> IndexSet<String> {
    let mut names = IndexSet::new();
    let mut record = |expr: &Expr| {
        if let Expr::Ident { name, .. } = expr {
            if !RESERVED.contains(&name.as_str()) {
                names.insert(name.clone());
            }
        }
    };
    visit_nodes(&root.children, &mut record);
    names
}

fn visit_nodes(nodes: &[Node], f: &mut dyn FnMut(&Expr)) {
    for node in nodes {
        match node {
            Node::File(file) => visit_nodes(&file.children, f),
            Node::Tag(tag) => {
                tag.attributes.iter().for_each(|a| a.value.visit(f));
                visit_nodes(&tag.children, f);
            }
            Node::Custom(custom) => visit_nodes(&custom.children, f),
            Node::If(node) => {
                node.condition.visit(f);
                visit_nodes(&node.then_branch, f);
                if let Some(otherwise) = &node.else_branch {
                    visit_nodes(otherwise, f);
                }
            }
            Node::Each(each) => {
                each.list.visit(f);
                visit_nodes(&each.children, f);
            }
            Node::Set(set) => set.value.visit(f),
            Node::TextNode(text) => text.value.visit(f),
            Node::Export(_) | Node::Yield(_) | Node::Js(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_file, parse_source, MemoryFs};
    use std::path::Path;

    fn script(source: &str) -> String {
        let (root, _) = parse_source(source).unwrap();
        generate(&root, &[])
            .unwrap()
            .into_iter()
            .map(|c| c.code)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn error(source: &str) -> Error {
        let (root, _) = parse_source(source).unwrap();
        generate(&root, &[]).unwrap_err()
    }

    #[test]
    fn test_program_shape() {
        let js = script("div.box [ span | {{ 1 + 2 }} | ]");
        assert!(js.starts_with("document.addEventListener(\"DOMContentLoaded\", function () {"));
        assert!(js.contains("function $$e (type, id, attrs, events, children)"));
        assert!(js.contains("var $f0 = function () {"));
        assert!(js.contains(r#"$$e("div", "a-0", { "class": ["box"] }, {}, function () {"#));
        assert!(js.contains(r#"$$e("text", "a-2", ("" + (1 + 2)), {});"#));
        assert!(js.contains("return { \"components\": $components, \"render\": $render };"));
        assert!(js.contains("$$sync($f0.render);"));
        assert!(js.ends_with("});"));
    }

    #[test]
    fn test_loop_keys_and_free_identifiers() {
        let js = script("ul [ each (x in items) li '{{ x }}' ]");
        assert!(js.contains(r#"var items = data["items"];"#));
        assert!(js.contains("$$each(items, function (x, $$i0, __index0) {"));
        assert!(js.contains(r#"$$e("li", ("a-1" + "-" + __index0), {}, {}, function () {"#));
    }

    #[test]
    fn test_custom_tag() {
        let js = script("tag Card [ let n = 1 div [ yield ] ]\nCard title=\"x\" [ p [] ]");
        assert!(js.contains("var $Card = $$c(function (props, $emit, $on) {"));
        assert!(js.contains("var n = 1;"));
        assert!(js.contains("return function ($$id, props, $$yield) {"));
        assert!(js.contains(r#"$$e("div", ($$id + "-" + "a-0"), {}, {}, function () {"#));
        assert!(js.contains("$$yield();"));
        assert!(js.contains(r#"$Card("a-1", { "title": "x" }, {}, function () {"#));
    }

    #[test]
    fn test_bindings_and_events() {
        let js = script(r#"input bind:value={name} [] button on:click="count += 1" nosync [ 'go' ]"#);
        assert!(js.contains(r#"{ "value": name }"#));
        assert!(js.contains("\"input\": function ($e) {"));
        assert!(js.contains("name = $e.target.value;"));
        assert!(js.contains("count += 1;"));
        assert_eq!(js.matches("$sync();").count(), 2, "{}", js);
    }

    #[test]
    fn test_keyword_names_are_renamed() {
        let js = script("let new = 1\np class={class} '{{ new + default }}'");
        assert!(js.contains(r#"var $$r_class = data["class"];"#), "{}", js);
        assert!(js.contains(r#"var $$r_default = data["default"];"#), "{}", js);
        assert!(js.contains("var $$r_new = 1;"), "{}", js);
        assert!(js.contains(r#"{ "class": $$r_class }"#), "{}", js);
        assert!(js.contains("($$r_new + $$r_default)"), "{}", js);
        assert_eq!(mangle("my-list"), "my$list");
    }

    #[test]
    fn test_invalid_binding() {
        assert_eq!(error("input bind:value={1 + 2} []").kind, ErrorKind::InvalidBinding);
    }

    #[test]
    fn test_operators_and_pipes() {
        let js = script("if (a == b && c != 1) p '{{ items | map _a * 2 }}'");
        assert!(js.contains("if (($$eq(a, b) && !($$eq(c, 1)))) {"));
        assert!(js.contains("$$pipes.map(items, function (_a, _b) {"));
        assert!(js.contains("return (_a * 2);"));
    }

    #[test]
    fn test_document_tags() {
        let js = script("html [ head [ title 'x' ] body [ p 'y' ] ]");
        assert!(!js.contains(r#"$$e("title""#));
        assert!(!js.contains(r#"$$e("html""#));
        assert!(!js.contains(r#"$$e("body""#));
        assert!(js.contains(r#"$$e("p", "a-0", {}, {}, function () {"#));
    }

    #[test]
    fn test_globals_and_actions() {
        let (root, _) = parse_source("global total = 1\np '{{ total }}'").unwrap();
        let js: String = generate(&root, &["save".to_string()])
            .unwrap()
            .into_iter()
            .map(|c| c.code)
            .collect();
        assert!(js.contains("var total;"));
        assert!(js.contains("total = 1;"));
        assert!(!js.contains(r#"var total = data["total"];"#));
        assert!(js.contains(r#"var $save = $call.bind(undefined, "save");"#));

        let err = error("global x = 1\nglobal x = 2");
        assert_eq!(err.kind, ErrorKind::DuplicateGlobal);
        assert_eq!(err.message, "Global already declared: x");
    }

    #[test]
    fn test_globals_win_over_locals() {
        let js = script("let x = 1\nglobal x = 2\neach (x in items) p '{{ x }}'\nlet data = 3");
        assert!(js.contains("var $$l_x = 1;"), "{}", js);
        assert!(js.contains("x = 2;"), "{}", js);
        assert!(js.contains("$$each(items, function ($$l_x, $$i0, __index0) {"), "{}", js);
        assert!(js.contains(r#"("" + x)"#), "{}", js);
        assert!(js.contains("var $$l_data = 3;"), "{}", js);
        assert!(!js.contains("var data"), "{}", js);
    }

    #[test]
    fn test_imports() {
        let fs = MemoryFs::new()
            .with_file("lib.adom", "tag Btn [ button [] ]\nexport Btn\np 'from lib'")
            .with_file("main.adom", "import \"./lib.adom\" as ui\nui::Btn []");
        let (root, _) = parse_file(&fs, Path::new("main.adom")).unwrap();
        let js = generate(&root, &[])
            .unwrap()
            .into_iter()
            .map(|c| c.code)
            .collect::<Vec<_>>()
            .join("\n");
        assert!(js.contains("$components.Btn = $Btn;"));
        assert!(js.contains("var $ui = $f0.components;"));
        assert!(js.contains("$f0.render();"));
        assert!(js.contains("$ui.Btn(\"a-3\", {}, {}, function () {});"));
        assert!(js.contains("$$sync($f1.render);"));
    }

    #[test]
    fn test_invalid_names() {
        assert_eq!(error("ui::Btn []").kind, ErrorKind::InvalidNamespace);
        let err = error("blink2 []");
        assert_eq!(err.kind, ErrorKind::InvalidTag);
        assert_eq!(err.origin, crate::error::Origin::Generator);
    }

    #[test]
    fn test_embedded_script_chunk() {
        let (root, _) = parse_source("tag T [ --- let a = 1; --- p [] ]\nT []").unwrap();
        let chunks = generate(&root, &[]).unwrap();
        let embedded: Vec<_> = chunks.iter().filter(|c| c.is_embedded()).collect();
        assert_eq!(embedded.len(), 1);
        assert_eq!(embedded[0].code.trim(), "let a = 1;");
    }
}
