//! End-to-end renders through the public API

use adom::{
    Artifact, CompileOptions, Compiler, ErrorKind, MemoryFs, Origin, RenderOptions, Value,
};
use serde_json::json;

fn compile(source: &str) -> Artifact {
    let fs = MemoryFs::new().with_file("page.adom", source);
    match Compiler::new(fs, CompileOptions::default()).compile("page.adom") {
        Ok(artifact) => artifact,
        Err(e) => panic!("{}", e.render()),
    }
}

fn render(source: &str, input: serde_json::Value) -> Result<String, adom::Error> {
    let options = RenderOptions {
        script: Some(String::new()),
        ..RenderOptions::default()
    };
    adom::render(&compile(source), &Value::from(input), &options)
}

#[test]
fn test_text_block_interpolation() {
    assert_eq!(
        render("div.box [ span | {{ 1 + 2 }} | ]", json!({})).unwrap(),
        r#"<div class="box"><span>3</span></div>"#
    );
}

#[test]
fn test_each_renders_in_order() {
    assert_eq!(
        render("each (x in items) [ li | {{x}} | ]", json!({"items": ["a", "b"]})).unwrap(),
        "<li>a</li><li>b</li>"
    );
}

#[test]
fn test_if_renders_only_else_branch() {
    let source = "if (count > 0) [ p 'some' span 'more' ] else [ p 'none' em 'at all' ]";
    assert_eq!(
        render(source, json!({"count": 0})).unwrap(),
        "<p>none</p><em>at all</em>"
    );
}

#[test]
fn test_undefined_identifier_names_it_and_its_line() {
    let source = "div [\n  p 'ok'\n  p '{{ ghost }}'\n]";
    let artifact = compile(source);
    let err = adom::render(&artifact, &Value::empty_object(), &RenderOptions::default()).unwrap_err();
    assert_eq!(err.origin, Origin::Interpreter);
    assert_eq!(err.kind, ErrorKind::UndefinedIdentifier);
    assert!(err.message.contains("ghost"));

    let diagnostic = err.render(&artifact.sources);
    assert!(diagnostic.contains("page.adom:3:9"), "{}", diagnostic);
    assert!(diagnostic.contains(" 3 |   p '{{ ghost }}'"), "{}", diagnostic);
}

#[test]
fn test_void_elements_never_close() {
    let html = render("div [ br [] img src=\"a.png\" [] hr [] ]", json!({})).unwrap();
    assert_eq!(html, r#"<div><br><img src="a.png"><hr></div>"#);
    assert!(!html.contains("</br>"));

    let fs = MemoryFs::new().with_file("page.adom", "br [ 'x' ]");
    let err = Compiler::new(fs, CompileOptions::default())
        .compile("page.adom")
        .unwrap_err();
    assert_eq!(err.error.kind, ErrorKind::VoidElementWithContent);
    assert_eq!(err.error.origin, Origin::Parser);
}

#[test]
fn test_empty_each_leaves_scope_alone() {
    let source = "let item = 'outer'\neach (item, i in list) p '{{ i }}'\np '{{ item }}'";
    assert_eq!(render(source, json!({"list": []})).unwrap(), "<p>outer</p>");
    assert_eq!(render(source, json!({"list": {}})).unwrap(), "<p>outer</p>");
}

#[test]
fn test_pipe_arity_is_a_parse_error() {
    for (source, name) in [
        ("p '{{ s | length 1 }}'", "length"),
        ("p '{{ s | map }}'", "map"),
    ] {
        let fs = MemoryFs::new().with_file("page.adom", source);
        let err = Compiler::new(fs, CompileOptions::default())
            .compile("page.adom")
            .unwrap_err();
        assert_eq!(err.error.origin, Origin::Parser, "{}", source);
        assert!(err.error.message.contains(name), "{}", err.error.message);
    }
}

#[test]
fn test_full_document_with_generated_script() {
    let source = "html [ head [ title 'T' ] body [ button on:click=\"n += 1\" '{{ n }}' ] ]";
    let artifact = compile(source);
    let html = adom::render(&artifact, &Value::from(json!({"n": 1})), &RenderOptions::default()).unwrap();
    assert!(html.starts_with("<!DOCTYPE html><html><head><title>T</title><script>(function (data) {"));
    assert!(html.contains(&artifact.script));
    assert!(html.contains(r#"})({"n":1});</script></head>"#));
    assert!(html.ends_with("<body><button>1</button></body></html>"));
}

#[test]
fn test_body_before_head_is_rejected() {
    let err = render("html [ body [] head [] ]", json!({})).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DocumentStructure);
    assert_eq!(err.message, "Expected head tag");
}

#[test]
fn test_namespaced_import_with_yield() {
    let fs = MemoryFs::new()
        .with_file(
            "components/layout.adom",
            "export tag Frame [ main.frame [ h1 '{{ props.heading }}' yield ] ]",
        )
        .with_file(
            "pages/home.adom",
            "import \"../components/layout.adom\" as layout\nlayout::Frame heading=\"Home\" [ p '{{ user }}' ]",
        );
    let artifact = Compiler::new(fs, CompileOptions::default())
        .compile("pages/home.adom")
        .unwrap();
    let html = adom::render(&artifact, &Value::from(json!({"user": "ada"})), &RenderOptions::default()).unwrap();
    assert_eq!(html, r#"<main class="frame"><h1>Home</h1><p>ada</p></main>"#);
}

#[test]
fn test_package_import() {
    let fs = MemoryFs::new()
        .with_file("node_modules/widgets/package.json", r#"{"main": "src/all.adom"}"#)
        .with_file("node_modules/widgets/src/all.adom", "export tag Badge [ span.badge [ yield ] ]")
        .with_file("app/page.adom", "import \"widgets\"\nBadge [ 'new' ]");
    let artifact = Compiler::new(fs, CompileOptions::default())
        .compile("app/page.adom")
        .unwrap();
    let html = adom::render(&artifact, &Value::empty_object(), &RenderOptions::default()).unwrap();
    assert_eq!(html, r#"<span class="badge">new</span>"#);
}

#[test]
fn test_file_assignment_reads_text() {
    let fs = MemoryFs::new()
        .with_file("notes.txt", "a < b")
        .with_file("page.adom", "const notes = file \"./notes.txt\"\npre '{{ notes }}'");
    let artifact = Compiler::new(fs, CompileOptions::default())
        .compile("page.adom")
        .unwrap();
    let html = adom::render(&artifact, &Value::empty_object(), &RenderOptions::default()).unwrap();
    assert_eq!(html, "<pre>a &lt; b</pre>");

    let fs = MemoryFs::new().with_file("page.adom", "const notes = file \"./missing.txt\"");
    let err = Compiler::new(fs, CompileOptions::default())
        .compile("page.adom")
        .unwrap_err();
    assert_eq!(err.error.kind, ErrorKind::Io);
    assert!(err.render().contains("page.adom:1:15"), "{}", err.render());
}

#[test]
fn test_render_page_recovers() {
    let artifact = compile("p '{{ 1 - \"x\" }}'");
    let page = adom::render_page(&artifact, &Value::empty_object(), &RenderOptions::default());
    assert!(page.starts_with("<pre>"));
    assert!(page.contains("Expected number, got string"));
    assert!(!page.contains("\x1b["));
}

#[test]
fn test_flushed_render_matches_buffered() {
    let artifact = compile("ol [ each (n in nums) li '{{ n * n }}' ]");
    let nums: Vec<u32> = (1..=40).collect();
    let input = Value::from(json!({ "nums": nums }));
    let options = RenderOptions {
        flush_threshold: 32,
        ..RenderOptions::default()
    };

    let mut pieces: Vec<String> = Vec::new();
    adom::render_with_flush(&artifact, &input, &options, &mut |chunk: &str| {
        pieces.push(chunk.to_string())
    })
    .unwrap();

    assert!(pieces.len() > 1);
    assert_eq!(pieces.concat(), adom::render(&artifact, &input, &options).unwrap());
}
