//! adom: a template language that renders HTML on the server and ships a
//! small reactive runtime to the browser.
//!
//! ```text
//! source ──► tokenizer ──► tree builder ──► FileNode ─┬─► interpreter ──► HTML
//!                                                     └─► generate    ──► script
//! ```
//!
//! [`Compiler::compile`] produces an [`Artifact`] (the tree plus its client
//! script). Artifacts are plain data: cache them with [`Artifact::to_cache`]
//! and render them against any input with [`render`].

pub mod ast;
pub mod error;
pub mod generate;
pub mod html;
pub mod interpreter;
pub mod parser;
pub mod pipes;
pub mod value;

pub use ast::{FileNode, Pos};
pub use error::{CompileError, Error, ErrorKind, Origin, Result};
pub use generate::ScriptChunk;
pub use parser::{DiskFs, FileSystem, MemoryFs, SourceMap};
pub use value::Value;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Rewrites one embedded script chunk, e.g. to transpile it
pub type ScriptHook = Box<dyn Fn(&ScriptChunk) -> std::result::Result<String, String>>;

/// Rewrites the whole generated script, e.g. to minify it
pub type PostProcessHook = Box<dyn Fn(&str) -> std::result::Result<String, String>>;

/// Compile configuration
#[derive(Default)]
pub struct CompileOptions {
    /// Server functions callable from handlers as `$name(...)`
    pub actions: Vec<String>,
    pub script_transform: Option<ScriptHook>,
    pub post_process: Option<PostProcessHook>,
}

/// Render configuration
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Script for the head bootstrap, instead of the artifact's own
    pub script: Option<String>,
    /// Buffered bytes before a flush callback is invoked
    pub flush_threshold: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            script: None,
            flush_threshold: 100,
        }
    }
}

/// Compiled template: the tree, the client script and the sources needed to
/// report errors against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub ast: FileNode,
    pub script: String,
    pub sources: SourceMap,
}

impl Artifact {
    /// Portable JSON form
    pub fn to_cache(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| cache_error(&e))
    }

    pub fn from_cache(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| cache_error(&e))
    }
}

fn cache_error(err: &serde_json::Error) -> Error {
    Error::new(
        Origin::Io,
        ErrorKind::Io,
        format!("invalid artifact cache: {}", err),
        Pos::default(),
    )
}

pub struct Compiler<F: FileSystem> {
    fs: F,
    options: CompileOptions,
}

impl<F: FileSystem> Compiler<F> {
    pub fn new(fs: F, options: CompileOptions) -> Self {
        Self { fs, options }
    }

    /// Parse `path` and its imports, then generate the client script
    pub fn compile(&self, path: impl AsRef<Path>) -> std::result::Result<Artifact, CompileError> {
        let path = path.as_ref();
        let (ast, sources) = parser::parse_file(&self.fs, path)?;
        tracing::debug!(file = %path.display(), files = sources.len(), "parsed");

        match self.script(&ast) {
            Ok(script) => {
                tracing::debug!(file = %path.display(), bytes = script.len(), "generated script");
                Ok(Artifact {
                    ast,
                    script,
                    sources,
                })
            }
            Err(error) => Err(CompileError { error, sources }),
        }
    }

    fn script(&self, ast: &FileNode) -> Result<String> {
        let mut chunks = generate::generate(ast, &self.options.actions)?;
        if let Some(transform) = &self.options.script_transform {
            for chunk in chunks.iter_mut() {
                let Some(pos) = chunk.embedded else {
                    continue;
                };
                chunk.code = transform(chunk).map_err(|message| hook_error(message, pos))?;
            }
        }
        let script = generate::join_chunks(&chunks);
        match &self.options.post_process {
            Some(post) => post(&script).map_err(|message| hook_error(message, ast.pos)),
            None => Ok(script),
        }
    }
}

fn hook_error(message: String, pos: Pos) -> Error {
    Error::generate(ErrorKind::Hook, message, pos)
}

/// Render an artifact to a string
pub fn render(artifact: &Artifact, input: &Value, options: &RenderOptions) -> Result<String> {
    let script = options.script.as_deref().unwrap_or(&artifact.script);
    interpreter::render(&artifact.ast, input, script)
}

/// Render an artifact, handing HTML to `flush` as it is produced
pub fn render_with_flush(
    artifact: &Artifact,
    input: &Value,
    options: &RenderOptions,
    flush: &mut dyn FnMut(&str),
) -> Result<()> {
    let script = options.script.as_deref().unwrap_or(&artifact.script);
    interpreter::render_with_flush(
        &artifact.ast,
        input,
        script,
        options.flush_threshold,
        flush,
    )
}

/// Render an artifact, or a `<pre>` diagnostic when rendering fails
pub fn render_page(artifact: &Artifact, input: &Value, options: &RenderOptions) -> String {
    match render(artifact, input, options) {
        Ok(html) => html,
        Err(e) => {
            tracing::warn!(kind = e.kind.as_str(), "render failed");
            let text = e.render(&artifact.sources).replace('&', "&amp;");
            format!("<pre>{}</pre>", html::escape_text(&text))
        }
    }
}
