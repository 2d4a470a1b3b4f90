//! Server-side renderer: walks the AST against input data and writes HTML.
//!
//! A [`Session`] owns all mutable state of one render (globals, contexts,
//! the value stack and the output buffer) and is dropped afterwards, so one
//! parsed tree can be rendered any number of times.

mod context;
mod expression;
mod output;

pub use output::HtmlOutput;

use crate::ast::{CustomNode, EachNode, FileNode, IfNode, Node, Pos, SetNode, TagNode};
use crate::error::{Error, ErrorKind, Result};
use crate::html;
use crate::value::Value;
use context::{new_frame, Context, ScopeId, TagDef, TagScope};
use indexmap::IndexMap;

/// Render state for one document
pub struct Session<'a, 'o> {
    input: &'a Value,
    /// Embedded in the head bootstrap
    script: &'a str,
    globals: IndexMap<String, Value>,
    contexts: Vec<Context<'a>>,
    scopes: Vec<TagScope<'a>>,
    stack: Vec<Value>,
    out: HtmlOutput<'o>,
    document: DocumentState,
    /// Depth of open `script`/`style` elements
    raw_text: usize,
    /// Depth of open elements
    depth: usize,
}

#[derive(Default)]
struct DocumentState {
    html: bool,
    html_open: bool,
    head: bool,
    body: bool,
    printed: bool,
}

impl<'a, 'o> Session<'a, 'o> {
    pub fn new(input: &'a Value, script: &'a str, out: HtmlOutput<'o>) -> Self {
        let mut globals = IndexMap::new();
        globals.insert("data".to_string(), input.clone());
        Self {
            input,
            script,
            globals,
            contexts: Vec::new(),
            scopes: Vec::new(),
            stack: Vec::new(),
            out,
            document: DocumentState::default(),
            raw_text: 0,
            depth: 0,
        }
    }

    /// Render the root file, returning the buffered HTML (empty when a
    /// flush callback received it)
    pub fn run(mut self, root: &'a FileNode) -> Result<String> {
        self.walk_file(root)?;
        tracing::debug!(bytes = self.out.len(), "rendered document");
        Ok(self.out.finish())
    }

    fn context(&self) -> Result<&Context<'a>> {
        self.contexts
            .last()
            .ok_or_else(|| Error::eval(ErrorKind::EmptyStack, "no active context", Pos::default()))
    }

    fn context_mut(&mut self) -> Result<&mut Context<'a>> {
        self.contexts
            .last_mut()
            .ok_or_else(|| Error::eval(ErrorKind::EmptyStack, "no active context", Pos::default()))
    }

    /// Globals, then local frames, then top-level input keys
    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.globals.get(name) {
            return Some(value.clone());
        }
        if let Some(value) = self.contexts.last().and_then(|c| c.lookup(name)) {
            return Some(value);
        }
        self.input.as_object().and_then(|map| map.get(name).cloned())
    }

    fn emit(&mut self, text: &str) {
        self.out.emit(text);
    }

    fn walk_nodes(&mut self, nodes: &'a [Node]) -> Result<()> {
        for node in nodes {
            self.walk(node)?;
        }
        Ok(())
    }

    fn walk(&mut self, node: &'a Node) -> Result<()> {
        match node {
            Node::File(file) => self.walk_file(file),
            Node::Tag(tag) => self.walk_tag(tag),
            // registered when the enclosing file starts
            Node::Custom(_) => Ok(()),
            Node::Export(export) => {
                let scope = self.context()?.scope;
                if !self.scopes[scope].tags.contains_key(&export.name) {
                    return Err(Error::eval(
                        ErrorKind::UndefinedTag,
                        format!("Undefined tag: {}", export.name),
                        export.pos,
                    ));
                }
                self.context_mut()?.exports.push(export.name.clone());
                Ok(())
            }
            Node::If(node) => self.walk_if(node),
            Node::Each(node) => self.walk_each(node),
            Node::Yield(node) => self.walk_yield(node.pos),
            Node::Set(node) => self.walk_set(node),
            Node::TextNode(text) => {
                let value = self.evaluate(&text.value)?.to_string();
                if self.raw_text > 0 {
                    self.emit(&value);
                } else {
                    self.emit(&html::escape_text(&value));
                }
                Ok(())
            }
            // client-side only
            Node::Js(_) => Ok(()),
        }
    }

    fn walk_file(&mut self, file: &'a FileNode) -> Result<()> {
        let scope = self.scopes.len();
        self.scopes.push(TagScope::default());
        let ctx = Context::file(scope);
        let frame = ctx.frames[0].clone();
        self.contexts.push(ctx);
        for child in &file.children {
            if let Node::Custom(custom) = child {
                self.define(scope, custom, frame.clone());
            }
        }

        let result = self.walk_nodes(&file.children);
        let ctx = self.contexts.pop();
        result?;

        // the root file's exports have nowhere to go
        let (Some(ctx), Some(parent)) = (ctx, self.contexts.last()) else {
            return Ok(());
        };
        let parent_scope = parent.scope;
        let exported: Vec<(String, TagDef<'a>)> = ctx
            .exports
            .iter()
            .filter_map(|name| {
                self.scopes[scope]
                    .tags
                    .get(name)
                    .map(|def| (name.clone(), def.clone()))
            })
            .collect();
        let target = &mut self.scopes[parent_scope];
        match &file.namespace {
            Some(namespace) => {
                target
                    .namespaces
                    .entry(namespace.clone())
                    .or_default()
                    .extend(exported);
            }
            None => target.tags.extend(exported),
        }
        Ok(())
    }

    fn define(&mut self, scope: ScopeId, custom: &'a CustomNode, frame: context::Frame) {
        self.scopes[scope].tags.insert(
            custom.name.clone(),
            TagDef {
                children: &custom.children,
                frame,
                scope,
            },
        );
    }

    /// Custom definition visible from the current context, if any
    fn resolve_custom(&self, tag: &TagNode) -> Result<Option<TagDef<'a>>> {
        let scope = &self.scopes[self.context()?.scope];
        match &tag.namespace {
            Some(namespace) => {
                let Some(ns) = scope.namespaces.get(namespace) else {
                    return Err(Error::eval(
                        ErrorKind::InvalidNamespace,
                        format!("Invalid namespace: {}", namespace),
                        tag.pos,
                    ));
                };
                match ns.get(&tag.name) {
                    Some(def) => Ok(Some(def.clone())),
                    None => Err(Error::eval(
                        ErrorKind::UndefinedTag,
                        format!("Undefined tag: {}::{}", namespace, tag.name),
                        tag.pos,
                    )),
                }
            }
            None => Ok(scope.tags.get(&tag.name).cloned()),
        }
    }

    fn walk_tag(&mut self, tag: &'a TagNode) -> Result<()> {
        if let Some(def) = self.resolve_custom(tag)? {
            return self.walk_custom(tag, &def);
        }
        if !html::is_legal_element(&tag.name) {
            return Err(Error::eval(
                ErrorKind::InvalidTag,
                format!("Invalid tag: {}", tag.name),
                tag.pos,
            ));
        }
        self.check_document(tag)?;

        if tag.name == "html" {
            self.emit("<!DOCTYPE html>");
        }
        self.emit("<");
        self.emit(&tag.name);
        let mut inner_html = None;
        for attr in &tag.attributes {
            let value = self.evaluate(&attr.value)?;
            let name = attr.name.strip_prefix("bind:").unwrap_or(&attr.name);
            if name == "innerHTML" {
                // null or false leaves the children in charge
                if !matches!(value, Value::Null | Value::Bool(false)) {
                    inner_html = Some(attribute_text(&value));
                }
                continue;
            }
            match value {
                Value::Bool(false) | Value::Null => {}
                Value::Bool(true) => {
                    self.emit(" ");
                    self.emit(name);
                }
                other => {
                    let text = html::escape_attribute(&attribute_text(&other));
                    self.emit(" ");
                    self.emit(name);
                    self.emit("=\"");
                    self.emit(&text);
                    self.emit("\"");
                }
            }
        }
        self.emit(">");

        if html::is_void_element(&tag.name) {
            return Ok(());
        }

        let raw = html::is_raw_text_element(&tag.name);
        if raw {
            self.raw_text += 1;
        }
        if tag.name == "html" {
            self.document.html_open = true;
        }
        self.depth += 1;
        let result = match inner_html {
            Some(content) => {
                self.emit(&content);
                Ok(())
            }
            None => self.walk_nodes(&tag.children),
        };
        self.depth -= 1;
        if raw {
            self.raw_text -= 1;
        }
        if tag.name == "html" {
            self.document.html_open = false;
        }
        result?;

        if tag.name == "head" {
            self.emit_bootstrap();
        }
        self.emit("</");
        self.emit(&tag.name);
        self.emit(">");
        Ok(())
    }

    /// One `html` root, printed first; `head` then `body` inside it
    fn check_document(&mut self, tag: &TagNode) -> Result<()> {
        let fail = |message: &str| {
            Err(Error::eval(ErrorKind::DocumentStructure, message, tag.pos))
        };
        let doc = &mut self.document;
        match tag.name.as_str() {
            "html" => {
                if doc.html {
                    return fail("html tag may only be used once");
                }
                if doc.printed {
                    return fail("html tag must be the first tag printed");
                }
                doc.html = true;
            }
            "head" => {
                if !doc.html_open {
                    return fail("head tag must be inside html");
                }
                if doc.head {
                    return fail("head tag may only be used once");
                }
                doc.head = true;
            }
            "body" => {
                if !doc.html_open {
                    return fail("body tag must be inside html");
                }
                if !doc.head {
                    return fail("Expected head tag");
                }
                if doc.body {
                    return fail("body tag may only be used once");
                }
                doc.body = true;
            }
            _ => {
                if doc.html && self.depth == 0 {
                    return fail("html tag must be the only root element");
                }
            }
        }
        self.document.printed = true;
        Ok(())
    }

    /// `<script>` that boots the client runtime with the input state
    fn emit_bootstrap(&mut self) {
        let script = self.script.replace("</script", "<\\/script");
        let state = self.input.to_json().replace("</", "<\\/");
        self.emit("<script>(function (data) {");
        self.emit(&script);
        self.emit("})(");
        self.emit(&state);
        self.emit(");</script>");
    }

    fn walk_custom(&mut self, tag: &'a TagNode, def: &TagDef<'a>) -> Result<()> {
        let mut props = IndexMap::with_capacity(tag.attributes.len());
        for attr in &tag.attributes {
            let value = self.evaluate(&attr.value)?;
            props.insert(attr.name.clone(), value);
        }
        self.contexts
            .push(Context::custom(def, Value::Object(props), &tag.children));
        let result = self.walk_nodes(def.children);
        self.contexts.pop();
        result
    }

    /// Render the call-site children in the caller's context
    fn walk_yield(&mut self, pos: Pos) -> Result<()> {
        let Some(children) = self.context()?.yield_to else {
            return Err(Error::eval(
                ErrorKind::YieldOutsideTag,
                "Cannot yield outside of a custom tag",
                pos,
            ));
        };
        let Some(ctx) = self.contexts.pop() else {
            return Ok(());
        };
        let result = self.walk_nodes(children);
        self.contexts.push(ctx);
        result
    }

    fn walk_if(&mut self, node: &'a IfNode) -> Result<()> {
        if self.evaluate(&node.condition)?.is_truthy() {
            self.walk_nodes(&node.then_branch)
        } else if let Some(otherwise) = &node.else_branch {
            self.walk_nodes(otherwise)
        } else {
            Ok(())
        }
    }

    fn walk_each(&mut self, node: &'a EachNode) -> Result<()> {
        let list = self.evaluate(&node.list)?;
        let bindings: Vec<(Value, Value)> = match list {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (v, Value::Number(i as f64)))
                .collect(),
            // UTF-16 units, as the client runtime indexes strings
            Value::String(s) => {
                let units: Vec<u16> = s.encode_utf16().collect();
                (0..units.len())
                    .map(|i| {
                        let unit = String::from_utf16_lossy(&units[i..=i]);
                        (Value::String(unit), Value::Number(i as f64))
                    })
                    .collect()
            }
            Value::Object(map) => map.into_iter().map(|(k, v)| (Value::String(k), v)).collect(),
            _ => {
                return Err(Error::eval(
                    ErrorKind::NotIterable,
                    "Value is not iterable",
                    node.list.pos(),
                ));
            }
        };

        let frame = new_frame();
        self.context_mut()?.frames.push(frame.clone());
        let mut result = Ok(());
        for (item, index) in bindings {
            {
                let mut frame = frame.borrow_mut();
                frame.insert(node.item.clone(), item);
                if let Some(name) = &node.index {
                    frame.insert(name.clone(), index);
                }
            }
            result = self.walk_nodes(&node.children);
            if result.is_err() {
                break;
            }
        }
        self.context_mut()?.frames.pop();
        result
    }

    fn walk_set(&mut self, node: &'a SetNode) -> Result<()> {
        let value = self.evaluate(&node.value)?;
        if node.global {
            self.globals.insert(node.name.clone(), value);
        } else {
            self.context()?.set(&node.name, value);
        }
        Ok(())
    }
}

/// Attribute text: arrays flatten (dropping `false`, `null` and empty
/// entries), mappings give their truthy keys, everything space-joined
pub fn attribute_text(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .filter(|v| !matches!(v, Value::Null | Value::Bool(false)))
            .map(attribute_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => map
            .iter()
            .filter(|(_, v)| v.is_truthy())
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

/// Render `root` to a string
pub fn render(root: &FileNode, input: &Value, script: &str) -> Result<String> {
    Session::new(input, script, HtmlOutput::new()).run(root)
}

/// Render `root`, handing output to `flush` in pieces of roughly
/// `threshold` bytes
pub fn render_with_flush(
    root: &FileNode,
    input: &Value,
    script: &str,
    threshold: usize,
    flush: &mut dyn FnMut(&str),
) -> Result<()> {
    Session::new(input, script, HtmlOutput::flushing(threshold, flush)).run(root)?;
    Ok(())
}
