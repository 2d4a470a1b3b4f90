//! Typed intermediate representation for the emitted script.
//!
//! The client generator builds `JsStmt`/`JsExpr` trees and only turns them
//! into text in [`print`]. Operators are always parenthesized so the printer
//! never has to reason about precedence.

use super::output::{Output, ScriptChunk};
use crate::ast::Pos;
use crate::value::format_number;

#[derive(Debug, Clone, PartialEq)]
pub enum JsExpr {
    /// Verbatim code, for handler bodies and runtime names
    Raw(String),
    Ident(String),
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Array(Vec<JsExpr>),
    Object(Vec<(String, JsExpr)>),
    Index(Box<JsExpr>, Box<JsExpr>),
    Member(Box<JsExpr>, String),
    Call(Box<JsExpr>, Vec<JsExpr>),
    Unary(&'static str, Box<JsExpr>),
    Binary(&'static str, Box<JsExpr>, Box<JsExpr>),
    Ternary(Box<JsExpr>, Box<JsExpr>, Box<JsExpr>),
    Paren(Box<JsExpr>),
    Function(Vec<String>, Vec<JsStmt>),
    /// `a + b + c`, used for keys and interpolated strings
    Concat(Vec<JsExpr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum JsStmt {
    Var(String, Option<JsExpr>),
    Assign(JsExpr, JsExpr),
    Expr(JsExpr),
    If(JsExpr, Vec<JsStmt>, Option<Vec<JsStmt>>),
    Return(Option<JsExpr>),
    /// Verbatim lines
    Raw(String),
    /// `--- ---` block, printed as its own chunk
    Embedded(String, Pos),
}

impl JsExpr {
    pub fn ident(name: impl Into<String>) -> Self {
        JsExpr::Ident(name.into())
    }

    pub fn str(text: impl Into<String>) -> Self {
        JsExpr::Str(text.into())
    }

    pub fn call(callee: impl Into<String>, args: Vec<JsExpr>) -> Self {
        JsExpr::Call(Box::new(JsExpr::Ident(callee.into())), args)
    }

    pub fn member(self, name: impl Into<String>) -> Self {
        JsExpr::Member(Box::new(self), name.into())
    }

    pub fn index(self, key: JsExpr) -> Self {
        JsExpr::Index(Box::new(self), Box::new(key))
    }

    pub fn binary(op: &'static str, lhs: JsExpr, rhs: JsExpr) -> Self {
        JsExpr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    /// `function (params) { body }`
    pub fn function(params: &[&str], body: Vec<JsStmt>) -> Self {
        JsExpr::Function(params.iter().map(|p| p.to_string()).collect(), body)
    }

    /// `$$pipes.name(args...)`
    pub fn runtime_pipe(name: &str, args: Vec<JsExpr>) -> Self {
        JsExpr::Call(Box::new(JsExpr::ident("$$pipes").member(name)), args)
    }
}

/// Quote a string as a JS literal
pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

/// Print statements into script chunks
pub fn print(stmts: &[JsStmt]) -> Vec<ScriptChunk> {
    let mut out = Output::new();
    for stmt in stmts {
        print_stmt(&mut out, stmt);
    }
    out.finish()
}

/// Print a single expression to a string (embedded blocks are inlined)
pub fn print_expr(expr: &JsExpr) -> String {
    let mut out = Output::new();
    write_expr(&mut out, expr);
    out.finish()
        .into_iter()
        .map(|c| c.code)
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_block(out: &mut Output, stmts: &[JsStmt]) {
    out.push("{");
    out.newline();
    out.indent();
    for stmt in stmts {
        print_stmt(out, stmt);
    }
    out.dedent();
    out.push("}");
}

fn print_stmt(out: &mut Output, stmt: &JsStmt) {
    match stmt {
        JsStmt::Var(name, value) => {
            out.push("var ");
            out.push(name);
            if let Some(value) = value {
                out.push(" = ");
                write_expr(out, value);
            }
            out.push(";");
        }
        JsStmt::Assign(target, value) => {
            write_expr(out, target);
            out.push(" = ");
            write_expr(out, value);
            out.push(";");
        }
        JsStmt::Expr(expr) => {
            write_expr(out, expr);
            out.push(";");
        }
        JsStmt::If(condition, then, otherwise) => {
            out.push("if (");
            write_expr(out, condition);
            out.push(") ");
            print_block(out, then);
            if let Some(otherwise) = otherwise {
                out.push(" else ");
                print_block(out, otherwise);
            }
        }
        JsStmt::Return(value) => {
            out.push("return");
            if let Some(value) = value {
                out.push(" ");
                write_expr(out, value);
            }
            out.push(";");
        }
        JsStmt::Raw(code) => {
            for (i, line) in code.lines().enumerate() {
                if i > 0 {
                    out.newline();
                }
                out.push(line);
            }
        }
        JsStmt::Embedded(code, pos) => {
            out.push_embedded(code, *pos);
            return;
        }
    }
    out.newline();
}

fn write_list(out: &mut Output, items: &[JsExpr]) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(", ");
        }
        write_expr(out, item);
    }
}

fn write_expr(out: &mut Output, expr: &JsExpr) {
    match expr {
        JsExpr::Raw(code) | JsExpr::Ident(code) => out.push(code),
        JsExpr::Str(text) => out.push(&quote(text)),
        JsExpr::Num(n) => {
            let text = format_number(*n);
            if *n < 0.0 {
                out.push("(");
                out.push(&text);
                out.push(")");
            } else {
                out.push(&text);
            }
        }
        JsExpr::Bool(b) => out.push(if *b { "true" } else { "false" }),
        JsExpr::Null => out.push("null"),
        JsExpr::Array(items) => {
            out.push("[");
            write_list(out, items);
            out.push("]");
        }
        JsExpr::Object(entries) => {
            if entries.is_empty() {
                out.push("{}");
                return;
            }
            out.push("{ ");
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(", ");
                }
                out.push(&quote(key));
                out.push(": ");
                write_expr(out, value);
            }
            out.push(" }");
        }
        JsExpr::Index(target, key) => {
            write_expr(out, target);
            out.push("[");
            write_expr(out, key);
            out.push("]");
        }
        JsExpr::Member(target, name) => {
            write_expr(out, target);
            out.push(".");
            out.push(name);
        }
        JsExpr::Call(callee, args) => {
            write_expr(out, callee);
            out.push("(");
            write_list(out, args);
            out.push(")");
        }
        JsExpr::Unary(op, operand) => {
            out.push(op);
            out.push("(");
            write_expr(out, operand);
            out.push(")");
        }
        JsExpr::Binary(op, lhs, rhs) => {
            out.push("(");
            write_expr(out, lhs);
            out.push(" ");
            out.push(op);
            out.push(" ");
            write_expr(out, rhs);
            out.push(")");
        }
        JsExpr::Ternary(condition, then, otherwise) => {
            out.push("(");
            write_expr(out, condition);
            out.push(" ? ");
            write_expr(out, then);
            out.push(" : ");
            write_expr(out, otherwise);
            out.push(")");
        }
        JsExpr::Paren(inner) => {
            out.push("(");
            write_expr(out, inner);
            out.push(")");
        }
        JsExpr::Function(params, body) => {
            out.push("function (");
            out.push(&params.join(", "));
            out.push(") ");
            if body.is_empty() {
                out.push("{}");
            } else {
                print_block(out, body);
            }
        }
        JsExpr::Concat(parts) => match parts.len() {
            0 => out.push("\"\""),
            1 => {
                out.push("(\"\" + ");
                write_expr(out, &parts[0]);
                out.push(")");
            }
            _ => {
                out.push("(");
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        out.push(" + ");
                    }
                    write_expr(out, part);
                }
                out.push(")");
            }
        },
    }
}
