use crate::ast::Pos;
use serde::{Deserialize, Serialize};

/// Piece of generated script. Embedded `--- ---` blocks get a chunk of their
/// own so a transform hook can rewrite them without touching generated code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptChunk {
    pub code: String,
    /// Source position when the chunk is an embedded script block
    pub embedded: Option<Pos>,
}

impl ScriptChunk {
    pub fn is_embedded(&self) -> bool {
        self.embedded.is_some()
    }
}

/// Output buffer that accumulates generated code in chunks
pub struct Output {
    chunks: Vec<ScriptChunk>,
    current: String,
    indent: usize,
    at_line_start: bool,
}

impl Output {
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            current: String::new(),
            indent: 0,
            at_line_start: true,
        }
    }

    /// Add text, indenting it when it starts a line
    pub fn push(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.at_line_start {
            for _ in 0..self.indent {
                self.current.push_str("  ");
            }
            self.at_line_start = false;
        }
        self.current.push_str(text);
    }

    /// Add a newline
    pub fn newline(&mut self) {
        self.current.push('\n');
        self.at_line_start = true;
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Close the current chunk and add an embedded script block as its own
    pub fn push_embedded(&mut self, code: &str, pos: Pos) {
        self.flush_chunk();
        self.chunks.push(ScriptChunk {
            code: code.to_string(),
            embedded: Some(pos),
        });
        self.at_line_start = true;
    }

    fn flush_chunk(&mut self) {
        let code = std::mem::take(&mut self.current);
        let code = code.trim_end_matches('\n');
        if !code.is_empty() {
            self.chunks.push(ScriptChunk {
                code: code.to_string(),
                embedded: None,
            });
        }
    }

    /// Finish and return the generated chunks
    pub fn finish(mut self) -> Vec<ScriptChunk> {
        self.flush_chunk();
        self.chunks
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
