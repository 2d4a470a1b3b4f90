use super::expression::Tokens;
use super::resolver;
use super::tokenizer::{Keyword, Tok, Token};
use super::Loader;
use crate::ast::*;
use crate::error::{Error, ErrorKind, Result};
use crate::html;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Builds the children of one file node from its token stream
pub struct TreeBuilder<'l, 'f> {
    tokens: Tokens,
    path: PathBuf,
    loader: &'l mut Loader<'f>,
    /// Inside a `tag Name [ ... ]` body
    in_tag: bool,
    /// Custom tags visible without a namespace, local or imported
    custom_names: HashSet<String>,
}

impl<'l, 'f> TreeBuilder<'l, 'f> {
    pub fn new(tokens: Vec<Token>, path: &Path, loader: &'l mut Loader<'f>) -> Self {
        Self {
            tokens: Tokens::new(tokens),
            path: path.to_path_buf(),
            loader,
            in_tag: false,
            custom_names: HashSet::new(),
        }
    }

    pub fn build(&mut self) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        while !self.tokens.at_eof() {
            self.parse_top_level(&mut nodes)?;
        }
        Ok(nodes)
    }

    fn parse_top_level(&mut self, nodes: &mut Vec<Node>) -> Result<()> {
        let token = self.tokens.peek().clone();
        match token.tok {
            Tok::Keyword(Keyword::Import) => {
                let node = self.parse_import()?;
                nodes.push(node);
            }
            Tok::Keyword(Keyword::Export) => {
                self.tokens.advance();
                let pos = self.tokens.pos();
                let name = if self.tokens.is_keyword(Keyword::Tag) {
                    let custom = self.parse_custom_tag()?;
                    let name = custom.name.clone();
                    nodes.push(Node::Custom(custom));
                    name
                } else {
                    self.tokens.expect_ident()?.0
                };
                nodes.push(Node::Export(ExportNode { name, pos }));
            }
            Tok::Keyword(Keyword::Tag) => {
                let custom = self.parse_custom_tag()?;
                nodes.push(Node::Custom(custom));
            }
            Tok::Script(code) => {
                self.tokens.advance();
                nodes.push(Node::Js(JsNode {
                    code,
                    pos: token.pos,
                }));
            }
            _ => {
                if !self.parse_list_item(nodes)? {
                    return Err(self.tokens.unexpected("tag, statement or string"));
                }
            }
        }
        Ok(())
    }

    /// `import "path" [as ns]`
    fn parse_import(&mut self) -> Result<Node> {
        let pos = self.tokens.expect_keyword(Keyword::Import)?;
        let (spec, _) = self.tokens.parse_strict_string()?;
        let namespace = if self.tokens.accept_keyword(Keyword::As) {
            Some(self.tokens.expect_ident()?.0)
        } else {
            None
        };

        let resolved = resolver::resolve_import(self.loader.fs(), &self.path, &spec);
        let mut file = self.loader.load(&resolved, Some(pos))?;
        if namespace.is_none() {
            for child in &file.children {
                if let Node::Export(export) = child {
                    self.custom_names.insert(export.name.clone());
                }
            }
        }
        file.namespace = namespace;
        file.pos = pos;
        Ok(Node::File(file))
    }

    /// `tag Name [ ... ]`
    fn parse_custom_tag(&mut self) -> Result<CustomNode> {
        self.tokens.expect_keyword(Keyword::Tag)?;
        let (name, pos) = self.tokens.expect_ident()?;
        self.custom_names.insert(name.clone());
        self.tokens.expect_punct("[")?;
        let outer = self.in_tag;
        self.in_tag = true;
        let children = self.parse_tag_list();
        self.in_tag = outer;
        let children = children?;
        self.tokens.expect_punct("]")?;
        Ok(CustomNode {
            name,
            children,
            pos,
        })
    }

    /// Items up to (not including) the closing `]`
    fn parse_tag_list(&mut self) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        while self.parse_list_item(&mut nodes)? {}
        Ok(nodes)
    }

    /// Parse one tag-list item into `nodes`; false when the next token
    /// cannot start one
    fn parse_list_item(&mut self, nodes: &mut Vec<Node>) -> Result<bool> {
        let token = self.tokens.peek().clone();
        match token.tok {
            Tok::Keyword(Keyword::If) => nodes.push(self.parse_if()?),
            Tok::Keyword(Keyword::Each) => nodes.push(self.parse_each()?),
            Tok::Keyword(Keyword::Let | Keyword::Const | Keyword::Global) => {
                nodes.push(self.parse_assignment()?)
            }
            Tok::Keyword(Keyword::Yield) => {
                if !self.in_tag {
                    return Err(Error::parse(
                        ErrorKind::YieldOutsideTag,
                        "yield is only allowed inside a tag definition",
                        token.pos,
                    ));
                }
                self.tokens.advance();
                nodes.push(Node::Yield(YieldNode { pos: token.pos }));
            }
            Tok::Script(code) if self.in_tag => {
                self.tokens.advance();
                nodes.push(Node::Js(JsNode {
                    code,
                    pos: token.pos,
                }));
            }
            Tok::Ident(_) => nodes.push(self.parse_tag()?),
            Tok::StringStart => {
                let value = self.tokens.parse_string()?;
                nodes.push(Node::TextNode(TextNode {
                    value,
                    pos: token.pos,
                }));
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// `[ list ]` or a single tag
    fn parse_body(&mut self) -> Result<Vec<Node>> {
        if self.tokens.accept_punct("[") {
            let children = self.parse_tag_list()?;
            self.tokens.expect_punct("]")?;
            Ok(children)
        } else if matches!(self.tokens.peek().tok, Tok::Ident(_)) {
            Ok(vec![self.parse_tag()?])
        } else {
            Err(self.tokens.unexpected("'[' or tag"))
        }
    }

    fn parse_if(&mut self) -> Result<Node> {
        let pos = self.tokens.expect_keyword(Keyword::If)?;
        self.tokens.expect_punct("(")?;
        let condition = self.tokens.parse_expr()?;
        self.tokens.expect_punct(")")?;
        let then_branch = self.parse_body()?;
        let else_branch = if self.tokens.accept_keyword(Keyword::Else) {
            if self.tokens.is_keyword(Keyword::If) {
                Some(vec![self.parse_if()?])
            } else {
                Some(self.parse_body()?)
            }
        } else {
            None
        };
        Ok(Node::If(IfNode {
            condition,
            then_branch,
            else_branch,
            pos,
        }))
    }

    /// `each (item[, index] in list) body`
    fn parse_each(&mut self) -> Result<Node> {
        let pos = self.tokens.expect_keyword(Keyword::Each)?;
        self.tokens.expect_punct("(")?;
        let (item, _) = self.tokens.expect_ident()?;
        let index = if self.tokens.accept_punct(",") {
            Some(self.tokens.expect_ident()?.0)
        } else {
            None
        };
        self.tokens.expect_keyword(Keyword::In)?;
        let list = self.tokens.parse_expr()?;
        self.tokens.expect_punct(")")?;
        let children = self.parse_body()?;
        Ok(Node::Each(EachNode {
            item,
            index,
            list,
            children,
            pos,
        }))
    }

    /// `let|const|global name [=] (expr | file "path")`
    fn parse_assignment(&mut self) -> Result<Node> {
        let token = self.tokens.advance();
        let global = token.tok == Tok::Keyword(Keyword::Global);
        let (name, _) = self.tokens.expect_ident()?;
        self.tokens.accept_punct("=");

        let value = if self.tokens.is_keyword(Keyword::File) {
            let file_pos = self.tokens.advance().pos;
            let (spec, string_pos) = self.tokens.parse_strict_string()?;
            let path = resolver::resolve_relative(&self.path, &spec);
            let text = self.loader.read_asset(&path, file_pos)?;
            Expr::literal(text, string_pos)
        } else {
            self.tokens.parse_expr()?
        };

        Ok(Node::Set(SetNode {
            global,
            name,
            value,
            pos: token.pos,
        }))
    }

    /// `[ns::]name [.class]* [attr[=value]]* [on:event="..." [nosync]]* body`
    fn parse_tag(&mut self) -> Result<Node> {
        let (first, pos) = self.tokens.expect_ident()?;
        let (namespace, name) = if self.tokens.accept_punct("::") {
            (Some(first), self.tokens.expect_ident()?.0)
        } else {
            (None, first)
        };

        let classes = self.parse_class_list()?;
        let (mut attributes, events) = self.parse_attributes()?;
        merge_classes(&mut attributes, classes, pos);

        let children = if self.tokens.accept_punct("[") {
            let children = self.parse_tag_list()?;
            self.tokens.expect_punct("]")?;
            children
        } else if matches!(self.tokens.peek().tok, Tok::StringStart) {
            let text_pos = self.tokens.pos();
            let value = self.tokens.parse_string()?;
            vec![Node::TextNode(TextNode {
                value,
                pos: text_pos,
            })]
        } else {
            return Err(self.tokens.unexpected("'[' or string"));
        };

        if namespace.is_none()
            && html::is_void_element(&name)
            && !self.custom_names.contains(&name)
            && !children.is_empty()
        {
            return Err(Error::parse(
                ErrorKind::VoidElementWithContent,
                format!("{} is a void element and cannot have content", name),
                pos,
            )
            .with_help(format!("Give it an empty body: {} []", name)));
        }

        Ok(Node::Tag(TagNode {
            name,
            namespace,
            attributes,
            events,
            children,
            pos,
        }))
    }

    fn parse_class_list(&mut self) -> Result<Vec<Expr>> {
        let mut classes = Vec::new();
        while self.tokens.accept_punct(".") {
            let (class, pos) = self.tokens.expect_ident()?;
            classes.push(Expr::literal(class, pos));
        }
        Ok(classes)
    }

    fn parse_attributes(&mut self) -> Result<(Vec<Attribute>, Vec<EventHandler>)> {
        let mut attributes = Vec::new();
        let mut events = Vec::new();
        loop {
            let token = self.tokens.peek().clone();
            let mut name = match token.tok {
                Tok::Ident(name) => name,
                Tok::Keyword(Keyword::As) => "as".to_string(),
                Tok::Keyword(Keyword::On) => {
                    events.push(self.parse_event()?);
                    continue;
                }
                _ => break,
            };
            self.tokens.advance();
            while self.tokens.accept_punct(":") {
                name.push(':');
                name.push_str(&self.tokens.expect_ident()?.0);
            }

            let value = if self.tokens.accept_punct("=") {
                if self.tokens.accept_punct("{") {
                    let value = self.tokens.parse_expr()?;
                    self.tokens.expect_punct("}")?;
                    value
                } else if matches!(self.tokens.peek().tok, Tok::StringStart) {
                    self.tokens.parse_string()?
                } else {
                    return Err(self.tokens.unexpected("'{' or string"));
                }
            } else {
                Expr::Bool {
                    value: true,
                    pos: token.pos,
                }
            };

            match attributes.iter_mut().find(|a: &&mut Attribute| a.name == name) {
                Some(existing) => existing.value = value,
                None => attributes.push(Attribute { name, value }),
            }
        }
        Ok((attributes, events))
    }

    /// `on:event="handler" [nosync]`
    fn parse_event(&mut self) -> Result<EventHandler> {
        let pos = self.tokens.expect_keyword(Keyword::On)?;
        self.tokens.expect_punct(":")?;
        let (event, _) = self.tokens.expect_ident()?;
        self.tokens.expect_punct("=")?;
        let (handler, _) = self.tokens.parse_strict_string()?;
        let sync = !self.tokens.accept_keyword(Keyword::Nosync);
        Ok(EventHandler {
            event,
            handler,
            sync,
            pos,
        })
    }
}

/// Fold `.a.b` shorthand into the `class` attribute
fn merge_classes(attributes: &mut Vec<Attribute>, classes: Vec<Expr>, pos: Pos) {
    if classes.is_empty() {
        return;
    }
    match attributes.iter_mut().find(|a| a.name == "class") {
        Some(attr) => {
            let explicit = std::mem::replace(&mut attr.value, Expr::Null { pos });
            attr.value = match explicit {
                Expr::Array { mut items, pos } => {
                    let mut merged = classes;
                    merged.append(&mut items);
                    Expr::Array { items: merged, pos }
                }
                other => {
                    let mut merged = classes;
                    merged.push(other);
                    Expr::Array { items: merged, pos }
                }
            };
        }
        None => attributes.push(Attribute {
            name: "class".to_string(),
            value: Expr::Array {
                items: classes,
                pos,
            },
        }),
    }
}
