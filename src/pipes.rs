//! Pipe operators (`value | name args...`).
//!
//! One table drives the parser's arity check, the interpreter and the client
//! generator. Each entry pairs an evaluator with the code it emits; the
//! emitted code calls into `$$pipes` in the runtime, which implements the
//! same rules in the browser.

use crate::ast::{Expr, Pos};
use crate::error::{Error, ErrorKind, Result};
use crate::generate::js::{JsExpr, JsStmt};
use crate::value::{Value, ValueKind};

/// What a pipe evaluator needs from the interpreter
pub trait PipeEnv {
    /// Evaluate an argument expression in the current scope
    fn eval(&mut self, expr: &Expr) -> Result<Value>;

    /// Evaluate `expr` with `_a` and `_b` bound in a transient frame
    fn eval_with(&mut self, expr: &Expr, a: Value, b: Value) -> Result<Value>;

    /// Uniform sample in `[0, 1)`
    fn random(&mut self) -> f64;
}

/// A pipe application, target already evaluated
pub struct PipeCall<'e> {
    pub target: Value,
    pub target_pos: Pos,
    pub args: &'e [Expr],
    pub pos: Pos,
}

pub type EvalFn = fn(&mut dyn PipeEnv, PipeCall<'_>) -> Result<Value>;
pub type EmitFn = fn(&str, JsExpr, Vec<JsExpr>) -> JsExpr;

pub struct PipeDef {
    pub name: &'static str,
    pub arity: usize,
    pub eval: EvalFn,
    pub emit: EmitFn,
}

pub static PIPES: &[PipeDef] = &[
    PipeDef { name: "repeat", arity: 1, eval: repeat, emit: emit_direct },
    PipeDef { name: "length", arity: 0, eval: length, emit: emit_direct },
    PipeDef { name: "map", arity: 1, eval: map, emit: emit_callback },
    PipeDef { name: "filter", arity: 1, eval: filter, emit: emit_callback },
    PipeDef { name: "toupper", arity: 0, eval: toupper, emit: emit_direct },
    PipeDef { name: "tolower", arity: 0, eval: tolower, emit: emit_direct },
    PipeDef { name: "split", arity: 1, eval: split, emit: emit_direct },
    PipeDef { name: "includes", arity: 1, eval: includes, emit: emit_direct },
    PipeDef { name: "indexof", arity: 1, eval: indexof, emit: emit_direct },
    PipeDef { name: "reverse", arity: 0, eval: reverse, emit: emit_direct },
    PipeDef { name: "todata", arity: 0, eval: todata, emit: emit_direct },
    PipeDef { name: "replace", arity: 2, eval: replace, emit: emit_direct },
    PipeDef { name: "tostring", arity: 0, eval: tostring, emit: emit_direct },
    PipeDef { name: "join", arity: 1, eval: join, emit: emit_direct },
    PipeDef { name: "keys", arity: 0, eval: keys, emit: emit_direct },
    PipeDef { name: "values", arity: 0, eval: values, emit: emit_direct },
    PipeDef { name: "trim", arity: 0, eval: trim, emit: emit_direct },
    PipeDef { name: "sin", arity: 0, eval: sin, emit: emit_direct },
    PipeDef { name: "cos", arity: 0, eval: cos, emit: emit_direct },
    PipeDef { name: "tan", arity: 0, eval: tan, emit: emit_direct },
    PipeDef { name: "sqrt", arity: 0, eval: sqrt, emit: emit_direct },
    PipeDef { name: "ceil", arity: 0, eval: ceil, emit: emit_direct },
    PipeDef { name: "floor", arity: 0, eval: floor, emit: emit_direct },
    PipeDef { name: "rand", arity: 0, eval: rand, emit: emit_direct },
    PipeDef { name: "slice", arity: 2, eval: slice, emit: emit_direct },
];

pub fn lookup(name: &str) -> Option<&'static PipeDef> {
    PIPES.iter().find(|p| p.name == name)
}

impl PipeDef {
    /// Emit `target | name args` as script
    pub fn emit(&self, target: JsExpr, args: Vec<JsExpr>) -> JsExpr {
        (self.emit)(self.name, target, args)
    }
}

/// `$$pipes.name(target, args...)`
fn emit_direct(name: &str, target: JsExpr, args: Vec<JsExpr>) -> JsExpr {
    let mut all = Vec::with_capacity(args.len() + 1);
    all.push(target);
    all.extend(args);
    JsExpr::runtime_pipe(name, all)
}

/// Like `emit_direct`, with the argument wrapped in `function (_a, _b)`
fn emit_callback(name: &str, target: JsExpr, args: Vec<JsExpr>) -> JsExpr {
    let callbacks = args
        .into_iter()
        .map(|arg| JsExpr::function(&["_a", "_b"], vec![JsStmt::Return(Some(arg))]))
        .collect();
    emit_direct(name, target, callbacks)
}

fn arg<'e>(call: &PipeCall<'e>, index: usize) -> Result<&'e Expr> {
    call.args.get(index).ok_or_else(|| {
        Error::eval(ErrorKind::PipeArity, "missing pipe argument", call.pos)
    })
}

fn eval_arg(env: &mut dyn PipeEnv, call: &PipeCall<'_>, index: usize) -> Result<(Value, Pos)> {
    let expr = arg(call, index)?;
    Ok((env.eval(expr)?, expr.pos()))
}

fn expect_string(value: Value, pos: Pos) -> Result<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(Error::type_mismatch(&[ValueKind::String], other.kind(), pos)),
    }
}

fn expect_number(value: &Value, pos: Pos) -> Result<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        other => Err(Error::type_mismatch(&[ValueKind::Number], other.kind(), pos)),
    }
}

fn expect_array(value: Value, pos: Pos) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(Error::type_mismatch(&[ValueKind::Array], other.kind(), pos)),
    }
}

fn expect_object(value: Value, pos: Pos) -> Result<indexmap::IndexMap<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::type_mismatch(&[ValueKind::Object], other.kind(), pos)),
    }
}

fn repeat(env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    let (count, pos) = eval_arg(env, &call, 0)?;
    let count = expect_number(&count, pos)?;
    let mut items = Vec::new();
    let mut i = 0.0;
    while i < count {
        items.push(call.target.clone());
        i += 1.0;
    }
    Ok(Value::Array(items))
}

fn length(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    match call.target {
        Value::String(s) => Ok(Value::Number(s.encode_utf16().count() as f64)),
        Value::Array(items) => Ok(Value::Number(items.len() as f64)),
        other => Err(Error::type_mismatch(
            &[ValueKind::String, ValueKind::Array],
            other.kind(),
            call.target_pos,
        )),
    }
}

fn map(env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    let expr = arg(&call, 0)?;
    let items = expect_array(call.target, call.target_pos)?;
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        out.push(env.eval_with(expr, item, Value::Number(i as f64))?);
    }
    Ok(Value::Array(out))
}

fn filter(env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    let expr = arg(&call, 0)?;
    let items = expect_array(call.target, call.target_pos)?;
    let mut out = Vec::new();
    for (i, item) in items.into_iter().enumerate() {
        if env.eval_with(expr, item.clone(), Value::Number(i as f64))?.is_truthy() {
            out.push(item);
        }
    }
    Ok(Value::Array(out))
}

fn toupper(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    Ok(Value::String(expect_string(call.target, call.target_pos)?.to_uppercase()))
}

fn tolower(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    Ok(Value::String(expect_string(call.target, call.target_pos)?.to_lowercase()))
}

fn trim(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    Ok(Value::String(expect_string(call.target, call.target_pos)?.trim().to_string()))
}

fn split(env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    let (delimiter, pos) = eval_arg(env, &call, 0)?;
    let delimiter = expect_string(delimiter, pos)?;
    let text = expect_string(call.target, call.target_pos)?;
    let parts: Vec<Value> = if delimiter.is_empty() {
        text.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        text.split(delimiter.as_str()).map(Value::from).collect()
    };
    Ok(Value::Array(parts))
}

fn includes(env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    let (needle, _) = eval_arg(env, &call, 0)?;
    match call.target {
        Value::String(s) => Ok(Value::Bool(s.contains(&needle.to_string()))),
        Value::Array(items) => Ok(Value::Bool(items.contains(&needle))),
        other => Err(Error::type_mismatch(
            &[ValueKind::String, ValueKind::Array],
            other.kind(),
            call.target_pos,
        )),
    }
}

fn indexof(env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    let (needle, pos) = eval_arg(env, &call, 0)?;
    if !matches!(needle, Value::String(_) | Value::Number(_)) {
        return Err(Error::type_mismatch(
            &[ValueKind::String, ValueKind::Number],
            needle.kind(),
            pos,
        ));
    }
    let index = match call.target {
        Value::String(s) => s
            .find(&needle.to_string())
            .map(|byte| s[..byte].encode_utf16().count() as f64),
        Value::Array(items) => items.iter().position(|v| *v == needle).map(|i| i as f64),
        other => {
            return Err(Error::type_mismatch(
                &[ValueKind::String, ValueKind::Array],
                other.kind(),
                call.target_pos,
            ));
        }
    };
    Ok(Value::Number(index.unwrap_or(-1.0)))
}

fn reverse(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    match call.target {
        Value::Array(mut items) => {
            items.reverse();
            Ok(Value::Array(items))
        }
        Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
        other => Err(Error::type_mismatch(
            &[ValueKind::String, ValueKind::Array],
            other.kind(),
            call.target_pos,
        )),
    }
}

fn todata(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    Ok(match call.target {
        Value::String(s) => parse_data(&s),
        other => other,
    })
}

/// Numeric text becomes a number, JSON text becomes data, anything else
/// stays a string.
pub fn parse_data(text: &str) -> Value {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        if let Ok(n) = trimmed.parse::<f64>() {
            if !trimmed.chars().any(char::is_alphabetic) {
                return Value::Number(n);
            }
        }
    }
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(json) => Value::from(json),
        Err(_) => Value::String(text.to_string()),
    }
}

fn replace(env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    let (old, old_pos) = eval_arg(env, &call, 0)?;
    let (new, new_pos) = eval_arg(env, &call, 1)?;
    let text = expect_string(call.target, call.target_pos)?;
    let old = expect_string(old, old_pos)?;
    let new = expect_string(new, new_pos)?;
    Ok(Value::String(text.replace(old.as_str(), &new)))
}

/// Clamp a slice bound the way `Array.prototype.slice` does
fn slice_bound(n: f64, len: usize) -> usize {
    let len_f = len as f64;
    let n = n.trunc();
    if n < 0.0 {
        (len_f + n).max(0.0) as usize
    } else {
        n.min(len_f) as usize
    }
}

fn slice(env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    let (start, start_pos) = eval_arg(env, &call, 0)?;
    let start = expect_number(&start, start_pos)?;
    let (end, end_pos) = eval_arg(env, &call, 1)?;
    let end = expect_number(&end, end_pos)?;
    match call.target {
        Value::Array(items) => {
            let (s, e) = (slice_bound(start, items.len()), slice_bound(end, items.len()));
            Ok(Value::Array(if s < e { items[s..e].to_vec() } else { Vec::new() }))
        }
        Value::String(text) => {
            let units: Vec<u16> = text.encode_utf16().collect();
            let (s, e) = (slice_bound(start, units.len()), slice_bound(end, units.len()));
            Ok(Value::String(if s < e {
                String::from_utf16_lossy(&units[s..e])
            } else {
                String::new()
            }))
        }
        other => Err(Error::type_mismatch(
            &[ValueKind::String, ValueKind::Array],
            other.kind(),
            call.target_pos,
        )),
    }
}

fn tostring(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    Ok(Value::String(match &call.target {
        Value::Null | Value::Array(_) | Value::Object(_) => call.target.to_json(),
        other => other.to_string(),
    }))
}

fn join(env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    let (separator, pos) = eval_arg(env, &call, 0)?;
    let items = expect_array(call.target, call.target_pos)?;
    let separator = expect_string(separator, pos)?;
    Ok(Value::String(Value::join(&items, &separator)))
}

fn keys(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    let map = expect_object(call.target, call.target_pos)?;
    Ok(Value::Array(map.into_keys().map(Value::String).collect()))
}

fn values(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    let map = expect_object(call.target, call.target_pos)?;
    Ok(Value::Array(map.into_values().collect()))
}

fn math(call: PipeCall<'_>, f: fn(f64) -> f64) -> Result<Value> {
    let n = expect_number(&call.target, call.target_pos)?;
    Ok(Value::Number(f(n)))
}

fn sin(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    math(call, f64::sin)
}

fn cos(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    math(call, f64::cos)
}

fn tan(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    math(call, f64::tan)
}

fn sqrt(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    math(call, f64::sqrt)
}

fn ceil(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    math(call, f64::ceil)
}

fn floor(_env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    math(call, f64::floor)
}

fn rand(env: &mut dyn PipeEnv, call: PipeCall<'_>) -> Result<Value> {
    let n = expect_number(&call.target, call.target_pos)?;
    Ok(Value::Number(env.random() * n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::StringPart;
    use crate::generate::js::print_expr;

    /// Evaluates literals and `_a`/`_b` only
    struct TestEnv {
        frame: Option<(Value, Value)>,
    }

    impl PipeEnv for TestEnv {
        fn eval(&mut self, expr: &Expr) -> Result<Value> {
            Ok(match expr {
                Expr::Number { value, .. } => Value::Number(*value),
                Expr::String { parts, .. } => Value::String(
                    parts
                        .iter()
                        .map(|p| match p {
                            StringPart::Chunk(c) => c.clone(),
                            StringPart::Expr(_) => String::new(),
                        })
                        .collect(),
                ),
                Expr::Ident { name, .. } if name == "_a" => {
                    self.frame.as_ref().map(|f| f.0.clone()).unwrap_or_default()
                }
                Expr::Ident { name, .. } if name == "_b" => {
                    self.frame.as_ref().map(|f| f.1.clone()).unwrap_or_default()
                }
                _ => Value::Null,
            })
        }

        fn eval_with(&mut self, expr: &Expr, a: Value, b: Value) -> Result<Value> {
            let saved = self.frame.replace((a, b));
            let result = self.eval(expr);
            self.frame = saved;
            result
        }

        fn random(&mut self) -> f64 {
            0.5
        }
    }

    fn apply(name: &str, target: Value, args: &[Expr]) -> Result<Value> {
        let pipe = lookup(name).unwrap();
        let mut env = TestEnv { frame: None };
        (pipe.eval)(
            &mut env,
            PipeCall {
                target,
                target_pos: Pos::default(),
                args,
                pos: Pos::default(),
            },
        )
    }

    fn num(n: f64) -> Expr {
        Expr::Number { value: n, pos: Pos::default() }
    }

    fn text(s: &str) -> Expr {
        Expr::literal(s, Pos::default())
    }

    fn strings(items: &[&str]) -> Value {
        Value::Array(items.iter().map(|s| Value::from(*s)).collect())
    }

    #[test]
    fn test_arity_table() {
        assert_eq!(lookup("length").unwrap().arity, 0);
        assert_eq!(lookup("map").unwrap().arity, 1);
        assert_eq!(lookup("slice").unwrap().arity, 2);
        assert!(lookup("shout").is_none());
    }

    #[test]
    fn test_string_pipes() {
        assert_eq!(apply("toupper", "abc".into(), &[]).unwrap(), Value::from("ABC"));
        assert_eq!(apply("trim", "  x ".into(), &[]).unwrap(), Value::from("x"));
        assert_eq!(apply("split", "a,b".into(), &[text(",")]).unwrap(), strings(&["a", "b"]));
        assert_eq!(apply("split", "ab".into(), &[text("")]).unwrap(), strings(&["a", "b"]));
        assert_eq!(
            apply("replace", "a-b-c".into(), &[text("-"), text("+")]).unwrap(),
            Value::from("a+b+c")
        );
        assert_eq!(apply("reverse", "abc".into(), &[]).unwrap(), Value::from("cba"));
    }

    #[test]
    fn test_map_and_filter_bind_value_and_index() {
        let items = strings(&["x", "y"]);
        let index = Expr::Ident { name: "_b".into(), pos: Pos::default() };
        assert_eq!(
            apply("map", items.clone(), &[index]).unwrap(),
            Value::Array(vec![Value::Number(0.0), Value::Number(1.0)])
        );
        let index = Expr::Ident { name: "_b".into(), pos: Pos::default() };
        assert_eq!(apply("filter", items, &[index]).unwrap(), strings(&["y"]));
    }

    #[test]
    fn test_slice_and_indexof() {
        let items = strings(&["a", "b", "c", "d"]);
        assert_eq!(apply("slice", items.clone(), &[num(1.0), num(-1.0)]).unwrap(), strings(&["b", "c"]));
        assert_eq!(apply("slice", "hello".into(), &[num(3.0), num(1.0)]).unwrap(), Value::from(""));
        assert_eq!(apply("indexof", items, &[text("c")]).unwrap(), Value::Number(2.0));
        assert_eq!(apply("indexof", "hello".into(), &[text("z")]).unwrap(), Value::Number(-1.0));
    }

    #[test]
    fn test_strings_count_utf16_units() {
        assert_eq!(apply("length", "a😀".into(), &[]).unwrap(), Value::Number(3.0));
        assert_eq!(apply("slice", "a😀b".into(), &[num(1.0), num(3.0)]).unwrap(), Value::from("😀"));
        assert_eq!(apply("indexof", "😀b".into(), &[text("b")]).unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_arguments_are_checked_before_target() {
        let err = apply("join", Value::Number(1.0), &[text("-")]).unwrap_err();
        assert_eq!(err.message, "Expected array, got number");
        let err = apply("split", "a,b".into(), &[num(1.0)]).unwrap_err();
        assert_eq!(err.message, "Expected string, got number");
    }

    #[test]
    fn test_repeat_and_rand() {
        assert_eq!(apply("repeat", "a".into(), &[num(2.0)]).unwrap(), strings(&["a", "a"]));
        assert_eq!(apply("rand", Value::Number(10.0), &[]).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn test_todata_and_tostring() {
        assert_eq!(parse_data("42"), Value::Number(42.0));
        assert_eq!(parse_data("[1]"), Value::Array(vec![Value::Number(1.0)]));
        assert_eq!(parse_data("hello"), Value::from("hello"));
        assert_eq!(parse_data("Infinity"), Value::from("Infinity"));
        assert_eq!(
            apply("tostring", Value::Array(vec![Value::Number(1.0)]), &[]).unwrap(),
            Value::from("[1]")
        );
        assert_eq!(apply("tostring", Value::Number(2.5), &[]).unwrap(), Value::from("2.5"));
    }

    #[test]
    fn test_type_errors_name_expected_kinds() {
        let err = apply("length", Value::Number(3.0), &[]).unwrap_err();
        assert_eq!(err.message, "Expected string|array, got number");
        let err = apply("sqrt", "9".into(), &[]).unwrap_err();
        assert_eq!(err.message, "Expected number, got string");
    }

    #[test]
    fn test_emit() {
        let pipe = lookup("join").unwrap();
        let js = pipe.emit(JsExpr::ident("items"), vec![JsExpr::str(", ")]);
        assert_eq!(print_expr(&js), r#"$$pipes.join(items, ", ")"#);

        let pipe = lookup("map").unwrap();
        let js = pipe.emit(JsExpr::ident("items"), vec![JsExpr::ident("_a")]);
        assert_eq!(
            print_expr(&js),
            "$$pipes.map(items, function (_a, _b) {\n  return _a;\n})"
        );
    }
}
