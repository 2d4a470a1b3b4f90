use serde::{Deserialize, Serialize};

/// Index of a file in the [`SourceMap`](crate::parser::positions::SourceMap).
pub type FileId = usize;

/// Byte offset into a specific source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Pos {
    pub file: FileId,
    pub offset: usize,
}

impl Pos {
    pub fn new(file: FileId, offset: usize) -> Self {
        Self { file, offset }
    }
}

/// One physical source file: the root of a compile or an imported dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    pub file: FileId,
    /// Set when imported with `import "..." as ns`
    pub namespace: Option<String>,
    /// Position of the `import` statement, or the file start for the root
    pub pos: Pos,
    pub children: Vec<Node>,
}

/// Structural AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Node {
    File(FileNode),
    Tag(TagNode),
    Custom(CustomNode),
    Export(ExportNode),
    If(IfNode),
    Each(EachNode),
    Yield(YieldNode),
    Set(SetNode),
    TextNode(TextNode),
    Js(JsNode),
}

/// Element or custom tag invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagNode {
    pub name: String,
    pub namespace: Option<String>,
    /// In source order; the `.class` shorthand is folded into `class`
    pub attributes: Vec<Attribute>,
    pub events: Vec<EventHandler>,
    pub children: Vec<Node>,
    pub pos: Pos,
}

impl TagNode {
    pub fn attribute(&self, name: &str) -> Option<&Expr> {
        self.attributes.iter().find(|a| a.name == name).map(|a| &a.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: Expr,
}

/// `on:event="handler" [nosync]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventHandler {
    pub event: String,
    /// Opaque script text
    pub handler: String,
    pub sync: bool,
    pub pos: Pos,
}

/// `tag Name [ ... ]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomNode {
    pub name: String,
    pub children: Vec<Node>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    pub name: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfNode {
    pub condition: Expr,
    pub then_branch: Vec<Node>,
    pub else_branch: Option<Vec<Node>>,
    pub pos: Pos,
}

/// `each (item[, index] in list)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EachNode {
    pub item: String,
    pub index: Option<String>,
    pub list: Expr,
    pub children: Vec<Node>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldNode {
    pub pos: Pos,
}

/// `let`/`const`/`global` assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetNode {
    pub global: bool,
    pub name: String,
    pub value: Expr,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub value: Expr,
    pub pos: Pos,
}

/// Embedded `--- ... ---` script block, passed through untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsNode {
    pub code: String,
    pub pos: Pos,
}

/// Piece of an interpolated string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum StringPart {
    Chunk(String),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "||" => BinaryOp::Or,
            "&&" => BinaryOp::And,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::NotEq,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::LtEq,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::GtEq,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }

    /// Binding power, higher binds tighter
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq | BinaryOp::NotEq => 3,
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => 4,
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => 6,
        }
    }
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Expr {
    Null {
        pos: Pos,
    },
    Bool {
        value: bool,
        pos: Pos,
    },
    Number {
        value: f64,
        pos: Pos,
    },
    String {
        parts: Vec<StringPart>,
        pos: Pos,
    },
    Ident {
        name: String,
        pos: Pos,
    },
    /// `base.a["b"][0]`; `.name` is stored as the string key `"name"`
    Accumulator {
        base: Box<Expr>,
        path: Vec<Expr>,
        pos: Pos,
    },
    Object {
        entries: Vec<(String, Expr)>,
        pos: Pos,
    },
    Array {
        items: Vec<Expr>,
        pos: Pos,
    },
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
        pos: Pos,
    },
    Unop {
        op: UnaryOp,
        operand: Box<Expr>,
        pos: Pos,
    },
    Binop {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Pos,
    },
    Parenthetical {
        inner: Box<Expr>,
        pos: Pos,
    },
    /// `target | name args...`
    Pipe {
        name: String,
        target: Box<Expr>,
        args: Vec<Expr>,
        pos: Pos,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Null { pos }
            | Expr::Bool { pos, .. }
            | Expr::Number { pos, .. }
            | Expr::String { pos, .. }
            | Expr::Ident { pos, .. }
            | Expr::Accumulator { pos, .. }
            | Expr::Object { pos, .. }
            | Expr::Array { pos, .. }
            | Expr::Ternary { pos, .. }
            | Expr::Unop { pos, .. }
            | Expr::Binop { pos, .. }
            | Expr::Parenthetical { pos, .. }
            | Expr::Pipe { pos, .. } => *pos,
        }
    }

    /// Single-chunk string literal
    pub fn literal(text: impl Into<String>, pos: Pos) -> Self {
        Expr::String {
            parts: vec![StringPart::Chunk(text.into())],
            pos,
        }
    }

    /// Human name used in error messages for the left side of an accessor
    pub fn describe(&self) -> String {
        match self {
            Expr::Ident { name, .. } => name.clone(),
            Expr::String { parts, .. } => parts
                .iter()
                .map(|p| match p {
                    StringPart::Chunk(text) => text.clone(),
                    StringPart::Expr(e) => e.describe(),
                })
                .collect(),
            Expr::Number { value, .. } => crate::value::format_number(*value),
            Expr::Accumulator { path, base, .. } => path
                .last()
                .map(|p| p.describe())
                .unwrap_or_else(|| base.describe()),
            _ => "value".to_string(),
        }
    }

    /// Visit this expression and every nested sub-expression
    pub fn visit(&self, f: &mut dyn FnMut(&Expr)) {
        f(self);
        match self {
            Expr::String { parts, .. } => {
                for part in parts {
                    if let StringPart::Expr(e) = part {
                        e.visit(f);
                    }
                }
            }
            Expr::Accumulator { base, path, .. } => {
                base.visit(f);
                path.iter().for_each(|p| p.visit(f));
            }
            Expr::Object { entries, .. } => entries.iter().for_each(|(_, e)| e.visit(f)),
            Expr::Array { items, .. } => items.iter().for_each(|e| e.visit(f)),
            Expr::Ternary {
                condition,
                then,
                otherwise,
                ..
            } => {
                condition.visit(f);
                then.visit(f);
                otherwise.visit(f);
            }
            Expr::Unop { operand, .. } => operand.visit(f),
            Expr::Binop { lhs, rhs, .. } => {
                lhs.visit(f);
                rhs.visit(f);
            }
            Expr::Parenthetical { inner, .. } => inner.visit(f),
            Expr::Pipe { target, args, .. } => {
                target.visit(f);
                args.iter().for_each(|a| a.visit(f));
            }
            Expr::Null { .. } | Expr::Bool { .. } | Expr::Number { .. } | Expr::Ident { .. } => {}
        }
    }
}
