//! File activations, scope frames and custom tag tables.

use crate::ast::Node;
use crate::value::Value;
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One layer of variable bindings. Shared because a custom tag body reads
/// the root frame of the file that defined it.
pub type Frame = Rc<RefCell<IndexMap<String, Value>>>;

pub fn new_frame() -> Frame {
    Rc::new(RefCell::new(IndexMap::new()))
}

pub fn frame_with(name: &str, value: Value) -> Frame {
    let mut map = IndexMap::new();
    map.insert(name.to_string(), value);
    Rc::new(RefCell::new(map))
}

/// Index into the session's scope arena
pub type ScopeId = usize;

/// A custom tag definition
#[derive(Clone)]
pub struct TagDef<'a> {
    pub children: &'a [Node],
    /// Root frame of the defining file
    pub frame: Frame,
    /// Tag table the body resolves names in
    pub scope: ScopeId,
}

/// Tag names visible in one file
#[derive(Default)]
pub struct TagScope<'a> {
    pub tags: HashMap<String, TagDef<'a>>,
    pub namespaces: HashMap<String, HashMap<String, TagDef<'a>>>,
}

/// Activation of a file or of a custom tag body
pub struct Context<'a> {
    /// Innermost last
    pub frames: Vec<Frame>,
    pub scope: ScopeId,
    pub exports: Vec<String>,
    /// Call-site children rendered by `yield`, in the caller's context
    pub yield_to: Option<&'a [Node]>,
}

impl<'a> Context<'a> {
    pub fn file(scope: ScopeId) -> Self {
        Self {
            frames: vec![new_frame()],
            scope,
            exports: Vec::new(),
            yield_to: None,
        }
    }

    /// Body of a custom tag: the definition frame plus a `{props}` frame
    pub fn custom(def: &TagDef<'a>, props: Value, call_site: &'a [Node]) -> Self {
        Self {
            frames: vec![def.frame.clone(), frame_with("props", props)],
            scope: def.scope,
            exports: Vec::new(),
            yield_to: Some(call_site),
        }
    }

    /// Innermost-first lookup
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.borrow().get(name).cloned())
    }

    /// Bind in the innermost frame
    pub fn set(&self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last() {
            frame.borrow_mut().insert(name.to_string(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_innermost_first() {
        let mut ctx = Context::file(0);
        ctx.set("x", Value::from(1.0));
        ctx.frames.push(frame_with("x", Value::from(2.0)));
        assert_eq!(ctx.lookup("x"), Some(Value::from(2.0)));
        ctx.frames.pop();
        assert_eq!(ctx.lookup("x"), Some(Value::from(1.0)));
        assert_eq!(ctx.lookup("y"), None);
    }

    #[test]
    fn test_custom_context_shares_definition_frame() {
        let file = Context::file(0);
        let def = TagDef {
            children: &[],
            frame: file.frames[0].clone(),
            scope: 0,
        };
        let body = Context::custom(&def, Value::empty_object(), &[]);
        file.set("late", Value::from(true));
        assert_eq!(body.lookup("late"), Some(Value::from(true)));
        assert_eq!(body.lookup("props"), Some(Value::empty_object()));
    }
}
