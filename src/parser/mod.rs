pub mod expression;
pub mod positions;
pub mod resolver;
pub mod tokenizer;
mod tree_builder;

pub use positions::{LineCol, SourceMap};
pub use resolver::{DiskFs, FileSystem, MemoryFs};
pub use tokenizer::{tokenize, Tok, Token};
use tree_builder::TreeBuilder;

use crate::ast::{FileNode, Pos};
use crate::error::{CompileError, Error, ErrorKind, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Reads, tokenizes and parses files, following imports.
///
/// Each physical file is parsed once; later imports of the same path get a
/// copy of the cached tree.
pub struct Loader<'f> {
    fs: &'f dyn FileSystem,
    sources: SourceMap,
    /// Files currently being parsed, innermost last
    loading: Vec<PathBuf>,
    cache: HashMap<PathBuf, FileNode>,
    /// `file "path"` contents, by normalized path
    assets: HashMap<PathBuf, String>,
}

impl<'f> Loader<'f> {
    pub fn new(fs: &'f dyn FileSystem) -> Self {
        Self {
            fs,
            sources: SourceMap::new(),
            loading: Vec::new(),
            cache: HashMap::new(),
            assets: HashMap::new(),
        }
    }

    pub fn fs(&self) -> &'f dyn FileSystem {
        self.fs
    }

    pub fn sources(&self) -> &SourceMap {
        &self.sources
    }

    pub fn into_sources(self) -> SourceMap {
        self.sources
    }

    /// Parse `path`. `import_pos` is the statement that asked for it, used
    /// for I/O and cycle errors.
    pub fn load(&mut self, path: &Path, import_pos: Option<Pos>) -> Result<FileNode> {
        let path = resolver::normalize(path);
        let at = import_pos.unwrap_or_default();

        if self.loading.contains(&path) {
            return Err(Error::parse(
                ErrorKind::CircularImport,
                format!("circular import of {}", path.display()),
                at,
            ));
        }
        if let Some(cached) = self.cache.get(&path) {
            tracing::trace!(path = %path.display(), "import cache hit");
            return Ok(cached.clone());
        }

        let text = self.read_text(&path, at)?;
        let file = self.sources.add(path.display().to_string(), text.as_str());
        let tokens = tokenize(&text, file)?;
        tracing::debug!(path = %path.display(), tokens = tokens.len(), "parsing file");

        self.loading.push(path.clone());
        let children = TreeBuilder::new(tokens, &path, self).build();
        self.loading.pop();

        let node = FileNode {
            file,
            namespace: None,
            pos: Pos::new(file, 0),
            children: children?,
        };
        self.cache.insert(path, node.clone());
        Ok(node)
    }

    /// Contents of a `file "path"` read. Recorded in the source map once,
    /// however many assignments read it.
    pub fn read_asset(&mut self, path: &Path, at: Pos) -> Result<String> {
        let path = resolver::normalize(path);
        if let Some(text) = self.assets.get(&path) {
            return Ok(text.clone());
        }
        let text = self.read_text(&path, at)?;
        self.sources.add(path.display().to_string(), text.as_str());
        tracing::debug!(path = %path.display(), bytes = text.len(), "read file asset");
        self.assets.insert(path, text.clone());
        Ok(text)
    }

    /// Read a file through the file system, rewrapping I/O failures at `at`
    pub fn read_text(&self, path: &Path, at: Pos) -> Result<String> {
        self.fs
            .read(path)
            .map_err(|e| Error::io(&e, &path.display().to_string(), at))
    }
}

/// Parse an entry file and everything it imports
pub fn parse_file(
    fs: &dyn FileSystem,
    path: &Path,
) -> std::result::Result<(FileNode, SourceMap), CompileError> {
    let mut loader = Loader::new(fs);
    match loader.load(path, None) {
        Ok(file) => Ok((file, loader.into_sources())),
        Err(error) => Err(CompileError {
            error,
            sources: loader.into_sources(),
        }),
    }
}

/// Parse source text as a standalone `main.adom` with no imports available
pub fn parse_source(source: &str) -> std::result::Result<(FileNode, SourceMap), CompileError> {
    let fs = MemoryFs::new().with_file("main.adom", source);
    parse_file(&fs, Path::new("main.adom"))
}
