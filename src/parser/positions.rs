//! Retained source text and offset conversion.
//!
//! Every file read during a compile is kept here so a byte offset carried by a
//! token, AST node or error can be turned back into a line and column long
//! after lexing, including after the artifact went through the cache.

use crate::ast::{FileId, Pos};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub text: String,
}

/// Line and column of a byte offset (both 1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCol {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMap {
    files: Vec<SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<String>, text: impl Into<String>) -> FileId {
        self.files.push(SourceFile {
            path: path.into(),
            text: text.into(),
        });
        self.files.len() - 1
    }

    pub fn get(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id)
    }

    pub fn path(&self, id: FileId) -> &str {
        self.files.get(id).map(|f| f.path.as_str()).unwrap_or("<unknown>")
    }

    pub fn find(&self, path: &str) -> Option<FileId> {
        self.files.iter().position(|f| f.path == path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn line_col(&self, pos: Pos) -> Option<LineCol> {
        self.get(pos.file).map(|f| line_col(&f.text, pos.offset))
    }

    /// Text of a 1-indexed line, without its terminator
    pub fn line_text(&self, file: FileId, line: usize) -> Option<&str> {
        let text = &self.get(file)?.text;
        text.split('\n')
            .nth(line.checked_sub(1)?)
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
    }
}

/// Convert a byte offset to a line and a character column.
pub fn line_col(source: &str, byte_offset: usize) -> LineCol {
    let mut offset = byte_offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &source[..offset];
    let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    LineCol {
        line: before.matches('\n').count() + 1,
        col: source[line_start..offset].chars().count() + 1,
    }
}
