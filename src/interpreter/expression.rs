//! Expression evaluation on the session's value stack.

use super::Session;
use super::context::frame_with;
use crate::ast::{BinaryOp, Expr, StringPart, UnaryOp};
use crate::error::{Error, ErrorKind, Result};
use crate::pipes::{self, PipeCall, PipeEnv};
use crate::value::{Value, ValueKind};
use indexmap::IndexMap;

impl<'a, 'o> Session<'a, 'o> {
    /// Walk an expression and pop its result
    pub(super) fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        self.walk_expr(expr)?;
        self.stack.pop().ok_or_else(|| {
            Error::eval(ErrorKind::EmptyStack, "expression produced no value", expr.pos())
        })
    }

    /// Push exactly one value for `expr`
    fn walk_expr(&mut self, expr: &Expr) -> Result<()> {
        let value = match expr {
            Expr::Null { .. } => Value::Null,
            Expr::Bool { value, .. } => Value::Bool(*value),
            Expr::Number { value, .. } => Value::Number(*value),
            Expr::String { parts, .. } => {
                let mut text = String::new();
                for part in parts {
                    match part {
                        StringPart::Chunk(chunk) => text.push_str(chunk),
                        StringPart::Expr(e) => text.push_str(&self.evaluate(e)?.to_string()),
                    }
                }
                Value::String(text)
            }
            Expr::Ident { name, pos } => self.lookup(name).ok_or_else(|| {
                Error::eval(ErrorKind::UndefinedIdentifier, format!("{} is undefined", name), *pos)
            })?,
            Expr::Accumulator { base, path, .. } => {
                let mut current = self.evaluate(base)?;
                let mut previous = base.describe();
                let mut previous_pos = base.pos();
                for segment in path {
                    let key = self.evaluate(segment)?;
                    if !matches!(key, Value::String(_) | Value::Number(_)) {
                        return Err(Error::type_mismatch(
                            &[ValueKind::String, ValueKind::Number],
                            key.kind(),
                            segment.pos(),
                        ));
                    }
                    if current == Value::Null {
                        return Err(Error::eval(
                            ErrorKind::MissingProperty,
                            format!("{} is not defined", previous),
                            previous_pos,
                        ));
                    }
                    current = current.get(&key);
                    previous = key.to_string();
                    previous_pos = segment.pos();
                }
                current
            }
            Expr::Object { entries, .. } => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let value = self.evaluate(value)?;
                    map.insert(key.clone(), value);
                }
                Value::Object(map)
            }
            Expr::Array { items, .. } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.evaluate(item)?);
                }
                Value::Array(values)
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
                ..
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then)?
                } else {
                    self.evaluate(otherwise)?
                }
            }
            Expr::Unop { op, operand, .. } => {
                let value = self.evaluate(operand)?;
                match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => match value {
                        Value::Number(n) => Value::Number(-n),
                        other => {
                            return Err(Error::type_mismatch(
                                &[ValueKind::Number],
                                other.kind(),
                                operand.pos(),
                            ));
                        }
                    },
                }
            }
            Expr::Binop { op, lhs, rhs, .. } => self.binop(*op, lhs, rhs)?,
            Expr::Parenthetical { inner, .. } => self.evaluate(inner)?,
            Expr::Pipe {
                name,
                target,
                args,
                pos,
            } => {
                let pipe = pipes::lookup(name).ok_or_else(|| {
                    Error::eval(ErrorKind::UndeclaredPipe, format!("Cannot pipe into: {}", name), *pos)
                })?;
                let call = PipeCall {
                    target: self.evaluate(target)?,
                    target_pos: target.pos(),
                    args,
                    pos: *pos,
                };
                (pipe.eval)(self, call)?
            }
        };
        self.stack.push(value);
        Ok(())
    }

    fn binop(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value> {
        match op {
            BinaryOp::And => {
                let left = self.evaluate(lhs)?;
                return if left.is_truthy() { self.evaluate(rhs) } else { Ok(left) };
            }
            BinaryOp::Or => {
                let left = self.evaluate(lhs)?;
                return if left.is_truthy() { Ok(left) } else { self.evaluate(rhs) };
            }
            _ => {}
        }

        let left = self.evaluate(lhs)?;
        let right = self.evaluate(rhs)?;
        Ok(match op {
            BinaryOp::Eq => Value::Bool(left == right),
            BinaryOp::NotEq => Value::Bool(left != right),
            BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
                let ordering = match (&left, &right) {
                    (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                    (Value::Number(_) | Value::String(_), other) => {
                        return Err(Error::type_mismatch(&[left.kind()], other.kind(), rhs.pos()));
                    }
                    (other, _) => {
                        return Err(Error::type_mismatch(
                            &[ValueKind::Number, ValueKind::String],
                            other.kind(),
                            lhs.pos(),
                        ));
                    }
                };
                Value::Bool(match (op, ordering) {
                    (_, None) => false,
                    (BinaryOp::Lt, Some(o)) => o.is_lt(),
                    (BinaryOp::LtEq, Some(o)) => o.is_le(),
                    (BinaryOp::Gt, Some(o)) => o.is_gt(),
                    (_, Some(o)) => o.is_ge(),
                })
            }
            BinaryOp::Add => {
                for (value, expr) in [(&left, lhs), (&right, rhs)] {
                    if !matches!(value, Value::Number(_) | Value::String(_)) {
                        return Err(Error::type_mismatch(
                            &[ValueKind::Number, ValueKind::String],
                            value.kind(),
                            expr.pos(),
                        ));
                    }
                }
                match (&left, &right) {
                    (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                    _ => Value::String(format!("{}{}", left, right)),
                }
            }
            _ => {
                let a = number(&left, lhs)?;
                let b = number(&right, rhs)?;
                Value::Number(match op {
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => a % b,
                })
            }
        })
    }
}

fn number(value: &Value, expr: &Expr) -> Result<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(Error::type_mismatch(&[ValueKind::Number], other.kind(), expr.pos())),
    }
}

impl PipeEnv for Session<'_, '_> {
    fn eval(&mut self, expr: &Expr) -> Result<Value> {
        self.evaluate(expr)
    }

    fn eval_with(&mut self, expr: &Expr, a: Value, b: Value) -> Result<Value> {
        let frame = frame_with("_a", a);
        frame.borrow_mut().insert("_b".to_string(), b);
        self.context_mut()?.frames.push(frame);
        let result = self.evaluate(expr);
        self.context_mut()?.frames.pop();
        result
    }

    fn random(&mut self) -> f64 {
        rand::random::<f64>()
    }
}
