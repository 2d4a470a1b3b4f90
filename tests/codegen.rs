//! Client script generation through the public API

use adom::generate::RUNTIME;
use adom::{CompileOptions, Compiler, ErrorKind, MemoryFs, Origin, ScriptChunk};

fn script(source: &str, actions: &[&str]) -> String {
    let fs = MemoryFs::new().with_file("app.adom", source);
    let options = CompileOptions {
        actions: actions.iter().map(|a| a.to_string()).collect(),
        ..CompileOptions::default()
    };
    match Compiler::new(fs, options).compile("app.adom") {
        Ok(artifact) => artifact.script,
        Err(e) => panic!("{}", e.render()),
    }
}

#[test]
fn test_script_embeds_runtime_and_resyncs() {
    let js = script("p 'hi'", &[]);
    assert!(js.starts_with("document.addEventListener(\"DOMContentLoaded\", function () {"));
    assert!(js.contains("function $$sync (render) {"));
    assert!(js.contains("function $$c (init) {"));
    assert!(js.contains("$$sync($f0.render);"));
    assert!(js.ends_with("$sync();\n});"), "{}", js);
}

#[test]
fn test_counter_component() {
    let source = r#"
        let count = 0
        div.counter [
            span '{{ count }}'
            button on:click="count++" [ '+' ]
        ]
    "#;
    let js = script(source, &[]);
    assert!(js.contains("var count = 0;"), "{}", js);
    assert!(js.contains(r#""click": function ($e) {"#), "{}", js);
    assert!(js.contains("count++;"), "{}", js);
    assert!(js.contains(r#"$$e("div", "a-0", { "class": ["counter"] }, {}, function () {"#), "{}", js);
}

#[test]
fn test_actions_are_bound_to_server_calls() {
    let js = script("button on:click=\"$save(form)\" [ 'Save' ]", &["save", "remove"]);
    assert!(js.contains(r#"var $save = $call.bind(undefined, "save");"#));
    assert!(js.contains(r#"var $remove = $call.bind(undefined, "remove");"#));
    assert!(js.contains("$save(form);"));
}

#[test]
fn test_nested_loops_have_distinct_keys() {
    let js = script("each (row in rows) [ each (cell in row) td '{{ cell }}' ]", &[]);
    assert!(js.contains("__index0"));
    assert!(js.contains("__index1"));
    assert!(js.contains(r#"$$e("td", ("a-0" + "-" + __index0 + "-" + __index1), {}, {}, function () {"#), "{}", js);
}

#[test]
fn test_generator_rejects_unknown_namespace() {
    let fs = MemoryFs::new().with_file("app.adom", "icons::Star []");
    let err = Compiler::new(fs, CompileOptions::default())
        .compile("app.adom")
        .unwrap_err();
    assert_eq!(err.error.kind, ErrorKind::InvalidNamespace);
    assert_eq!(err.error.origin, Origin::Generator);
    assert!(err.render().contains("app.adom:1:1"));
}

#[test]
fn test_script_transform_only_sees_embedded_blocks() {
    let fs = MemoryFs::new().with_file(
        "app.adom",
        "tag Clock [ --- const now: number = Date.now(); --- p [] ]\nClock []",
    );
    let options = CompileOptions {
        script_transform: Some(Box::new(
            |chunk: &ScriptChunk| -> Result<String, String> {
                assert!(chunk.is_embedded());
                Ok(chunk.code.replace(": number", ""))
            },
        )),
        ..CompileOptions::default()
    };
    let artifact = Compiler::new(fs, options).compile("app.adom").unwrap();
    assert!(artifact.script.contains("const now = Date.now();"));
    assert!(!artifact.script.contains(": number"));
}

#[test]
fn test_runtime_compares_props_by_snapshot() {
    // structurally equal props must not fire "change"
    assert!(RUNTIME.contains("var snapshot = JSON.stringify(props);"));
    assert!(RUNTIME.contains("if (snapshot !== $state.props) {"));
    assert!(RUNTIME.contains("$$emit.call($state, 'change', JSON.parse($state.props));"));
}

#[test]
fn test_runtime_reports_sync_errors_in_page() {
    assert!(RUNTIME.contains("document.body.appendChild(pre);"));
    assert!(RUNTIME.contains("$$is_syncing = false;"));
    assert!(RUNTIME.contains("'ADOM_SERVER_FUNCTION'"));
}
