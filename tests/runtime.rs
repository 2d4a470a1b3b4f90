//! Executes the reconciliation runtime and generated scripts against a
//! minimal DOM in an embedded JS engine

use adom::generate::RUNTIME;
use adom::{CompileOptions, Compiler, MemoryFs, Value};
use boa_engine::{Context, JsError, Source};

/// Just enough of the DOM for the runtime: element and text nodes with
/// child lists, attributes and listeners
const DOM: &str = r#"
function Node(type, name) {
  this.nodeType = type;
  this.tagName = name ? name.toUpperCase() : undefined;
  this.childNodes = [];
  this.attributes = {};
  this.listeners = {};
  this.nodeValue = null;
}
Node.prototype.appendChild = function (c) { this.childNodes.push(c); return c; };
Node.prototype.replaceChild = function (n, o) {
  this.childNodes[this.childNodes.indexOf(o)] = n;
  return o;
};
Node.prototype.removeChild = function (c) {
  this.childNodes.splice(this.childNodes.indexOf(c), 1);
  return c;
};
Node.prototype.setAttribute = function (k, v) { this.attributes[k] = String(v); };
Node.prototype.removeAttribute = function (k) { delete this.attributes[k]; };
Node.prototype.setAttributeNS = function (ns, k, v) { this.setAttribute(k, v); };
Node.prototype.removeAttributeNS = function (ns, k) { this.removeAttribute(k); };
Node.prototype.addEventListener = function (e, f) { this.listeners[e] = f; };
Node.prototype.removeEventListener = function (e, f) {
  if (this.listeners[e] === f) delete this.listeners[e];
};

var document = {
  body: new Node(1, 'body'),
  createElement: function (t) { return new Node(1, t); },
  createElementNS: function (ns, t) { return new Node(1, t); },
  createTextNode: function (v) { var n = new Node(3); n.nodeValue = v; return n; },
  addEventListener: function (e, f) { f(); }
};

function html(node) {
  if (node.nodeType === 3) return node.nodeValue;
  var name = node.tagName.toLowerCase();
  var out = '<' + name;
  for (var k in node.attributes) out += ' ' + k + '="' + node.attributes[k] + '"';
  return out + '>' + node.childNodes.map(html).join('') + '</' + name + '>';
}

function body() {
  if (document.body.innerHTML === '') throw new Error('sync failed');
  return document.body.childNodes.map(html).join('');
}
"#;

fn engine() -> Context {
    let mut context = Context::default();
    eval(&mut context, DOM);
    eval(&mut context, RUNTIME);
    context
}

fn eval(context: &mut Context, code: &str) -> String {
    match context.eval(Source::from_bytes(code)) {
        Ok(value) => value
            .to_string(context)
            .map(|s| s.to_std_string_escaped())
            .unwrap_or_default(),
        Err(e) => panic!("{}\n--- in ---\n{}", describe(&e, context), code),
    }
}

fn describe(error: &JsError, context: &mut Context) -> String {
    error
        .clone()
        .into_opaque(context)
        .and_then(|value| value.to_string(context))
        .map(|s| s.to_std_string_escaped())
        .unwrap_or_else(|_| "unknown error".to_string())
}

/// Compile `source`, then boot its script the way the head bootstrap does
fn boot(source: &str, input: serde_json::Value) -> Context {
    let fs = MemoryFs::new().with_file("app.adom", source);
    let artifact = match Compiler::new(fs, CompileOptions::default()).compile("app.adom") {
        Ok(artifact) => artifact,
        Err(e) => panic!("{}", e.render()),
    };
    let mut context = engine();
    let state = Value::from(input).to_json();
    eval(
        &mut context,
        &format!("(function (data) {{{}}})({});", artifact.script, state),
    );
    context
}

#[test]
fn test_component_lifecycle_order() {
    let mut context = engine();
    eval(
        &mut context,
        r#"
        var log = [];
        var Counter = $$c(function (props, $emit, $on) {
          $on('prerender', function () { log.push('prerender'); });
          $on('change', function (old) { log.push('change:' + old.n); });
          $on('mount', function () { log.push('mount'); });
          $on('render', function () { log.push('render'); });
          $on('unmount', function () { log.push('unmount'); });
          return function ($$id, props, $$yield) {
            log.push('body:' + props.n);
            $$e('p', $$id + '-a-0', {}, {}, function () {
              $$e('text', $$id + '-a-1', '' + props.n, {});
            });
          };
        });
        var show = true;
        var n = 1;
        var render = function () {
          if (show) Counter('a-0', { n: n }, {}, function () {});
        };
        "#,
    );

    eval(&mut context, "$$sync(render);");
    assert_eq!(eval(&mut context, "log.join(' ')"), "prerender body:1 mount render");
    assert_eq!(eval(&mut context, "body()"), "<p>1</p>");

    // a fresh but equal props object is not a change
    eval(&mut context, "log = []; $$sync(render);");
    assert_eq!(eval(&mut context, "log.join(' ')"), "prerender body:1 render");

    // change receives the previous props
    eval(&mut context, "log = []; n = 2; $$sync(render);");
    assert_eq!(eval(&mut context, "log.join(' ')"), "prerender change:1 body:2 render");
    assert_eq!(eval(&mut context, "body()"), "<p>2</p>");

    eval(&mut context, "log = []; show = false; $$sync(render);");
    assert_eq!(eval(&mut context, "log.join(' ')"), "unmount");
    assert_eq!(eval(&mut context, "body()"), "");
}

#[test]
fn test_nodes_are_reused_by_key() {
    let mut context = engine();
    eval(
        &mut context,
        r#"
        var label = 'a';
        var render = function () {
          $$e('div', 'a-0', { 'class': ['box', { on: label === 'b' }] }, {}, function () {
            $$e('text', 'a-1', label, {});
          });
        };
        $$sync(render);
        var first = document.body.childNodes[0];
        label = 'b';
        $$sync(render);
        "#,
    );
    assert_eq!(eval(&mut context, "document.body.childNodes[0] === first"), "true");
    assert_eq!(eval(&mut context, "body()"), r#"<div class="box on">b</div>"#);
}

#[test]
fn test_server_markup_is_adopted() {
    let mut context = engine();
    eval(
        &mut context,
        r#"
        var ssr = document.createElement('ul');
        var item = document.createElement('li');
        item.appendChild(document.createTextNode('x'));
        ssr.appendChild(item);
        document.body.appendChild(ssr);

        $$sync(function () {
          $$e('ul', 'a-0', {}, {}, function () {
            ['x', 'y'].forEach(function (v, i) {
              $$e('li', 'a-1-' + i, {}, {}, function () { $$e('text', 'a-2-' + i, v, {}); });
            });
          });
        });
        "#,
    );
    assert_eq!(eval(&mut context, "document.body.childNodes[0] === ssr"), "true");
    assert_eq!(eval(&mut context, "ssr.childNodes[0] === item"), "true");
    assert_eq!(eval(&mut context, "body()"), "<ul><li>x</li><li>y</li></ul>");
}

#[test]
fn test_missing_inner_html_renders_children() {
    let mut context = engine();
    eval(
        &mut context,
        r#"
        $$sync(function () {
          $$e('div', 'a-0', { innerHTML: null }, {}, function () { $$e('text', 'a-1', 'kids', {}); });
          $$e('p', 'a-2', { innerHTML: false }, {});
        });
        "#,
    );
    assert_eq!(eval(&mut context, "body()"), "<div>kids</div><p></p>");
}

#[test]
fn test_sync_failure_is_written_to_page() {
    let mut context = engine();
    eval(&mut context, "$$sync(function () { throw new Error('boom'); });");
    assert_eq!(eval(&mut context, "document.body.innerHTML"), "");
    assert_eq!(eval(&mut context, "document.body.childNodes[0].tagName"), "PRE");
    assert!(eval(&mut context, "document.body.childNodes[0].textContent").contains("boom"));
    assert_eq!(eval(&mut context, "$$is_syncing"), "false");
}

#[test]
fn test_sync_failure_names_the_open_element() {
    let mut context = engine();
    eval(
        &mut context,
        r#"
        $$sync(function () {
          $$e('section', 'a-0', {}, {}, function () {
            $$e('p', 'a-1', {}, {}, function () { missing.value; });
          });
        });
        "#,
    );
    let text = eval(&mut context, "document.body.childNodes[0].textContent");
    assert!(text.starts_with("Error while rendering a-1: "), "{}", text);
    assert!(text.contains("missing"), "{}", text);
}

#[test]
fn test_generated_script_renders_and_handles_events() {
    let source = "let count = 0\nul [ each (x in items) li '{{ x | toupper }}' ]\nbutton on:click=\"count++\" '{{ count }}'";
    let mut context = boot(source, serde_json::json!({"items": ["a", "b"]}));
    assert_eq!(
        eval(&mut context, "body()"),
        "<ul><li>A</li><li>B</li></ul><button>0</button>"
    );

    eval(&mut context, "document.body.childNodes[1].listeners.click({});");
    assert_eq!(
        eval(&mut context, "body()"),
        "<ul><li>A</li><li>B</li></ul><button>1</button>"
    );
}

#[test]
fn test_generated_components_and_bindings() {
    let source = r#"
        tag Greeting [
            h1 'Hi {{ props.name }}'
            yield
        ]
        input bind:value={name} []
        Greeting name={name} [ p 'inside' ]
    "#;
    let mut context = boot(source, serde_json::json!({"name": "Ada"}));
    assert_eq!(
        eval(&mut context, "body()"),
        r#"<input value="Ada"></input><h1>Hi Ada</h1><p>inside</p>"#
    );

    eval(
        &mut context,
        "document.body.childNodes[0].listeners.input({ target: { value: 'Grace' } });",
    );
    assert!(eval(&mut context, "body()").contains("<h1>Hi Grace</h1>"));
}

#[test]
fn test_reserved_word_inputs_do_not_break_the_script() {
    let mut context = boot(
        "p class={class} '{{ default }}'",
        serde_json::json!({"class": "note", "default": "x"}),
    );
    assert_eq!(eval(&mut context, "body()"), r#"<p class="note">x</p>"#);
}
