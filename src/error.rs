use crate::ast::Pos;
use crate::parser::positions::SourceMap;
use crate::value::ValueKind;
use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Subsystem an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Lexer,
    Parser,
    Interpreter,
    Generator,
    Io,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Lexer => "LexError",
            Origin::Parser => "ParseError",
            Origin::Interpreter => "EvalError",
            Origin::Generator => "GenerateError",
            Origin::Io => "IOError",
        }
    }
}

/// Kind of compile or render error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    // lexer
    UnterminatedString,
    UnterminatedLongString,
    UnterminatedRawString,
    UnterminatedText,
    UnterminatedInterpolation,
    UnterminatedScript,
    // parser
    UnexpectedToken,
    UndeclaredPipe,
    PipeArity,
    VoidElementWithContent,
    YieldOutsideTag,
    ForbiddenInterpolation,
    CircularImport,
    // interpreter
    UndefinedIdentifier,
    TypeMismatch,
    NotIterable,
    MissingProperty,
    UndefinedTag,
    DocumentStructure,
    EmptyStack,
    // shared by both backends
    InvalidTag,
    InvalidNamespace,
    // generator
    DuplicateGlobal,
    InvalidBinding,
    Hook,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnterminatedString => "Unterminated string",
            ErrorKind::UnterminatedLongString => "Unterminated long string",
            ErrorKind::UnterminatedRawString => "Unterminated raw string",
            ErrorKind::UnterminatedText => "Unterminated text block",
            ErrorKind::UnterminatedInterpolation => "Unterminated interpolation",
            ErrorKind::UnterminatedScript => "Unterminated script block",
            ErrorKind::UnexpectedToken => "Unexpected token",
            ErrorKind::UndeclaredPipe => "Undeclared pipe",
            ErrorKind::PipeArity => "Pipe arity",
            ErrorKind::VoidElementWithContent => "Void element with content",
            ErrorKind::YieldOutsideTag => "Yield outside tag",
            ErrorKind::ForbiddenInterpolation => "Forbidden interpolation",
            ErrorKind::CircularImport => "Circular import",
            ErrorKind::UndefinedIdentifier => "Undefined identifier",
            ErrorKind::TypeMismatch => "Type mismatch",
            ErrorKind::NotIterable => "Not iterable",
            ErrorKind::MissingProperty => "Missing property",
            ErrorKind::UndefinedTag => "Undefined tag",
            ErrorKind::DocumentStructure => "Document structure",
            ErrorKind::EmptyStack => "Empty stack",
            ErrorKind::InvalidTag => "Invalid tag",
            ErrorKind::InvalidNamespace => "Invalid namespace",
            ErrorKind::DuplicateGlobal => "Duplicate global",
            ErrorKind::InvalidBinding => "Invalid binding",
            ErrorKind::Hook => "Hook failure",
            ErrorKind::Io => "I/O error",
        }
    }
}

/// Error raised anywhere between reading source and printing HTML.
///
/// Carries the offset and file it was raised at; nothing is recovered
/// locally, so the first error aborts the compile or render.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub origin: Origin,
    pub kind: ErrorKind,
    pub message: String,
    pub pos: Pos,
    pub help: Option<String>,
}

impl Error {
    pub fn new(origin: Origin, kind: ErrorKind, message: impl Into<String>, pos: Pos) -> Self {
        Self {
            origin,
            kind,
            message: message.into(),
            pos,
            help: None,
        }
    }

    pub fn lex(kind: ErrorKind, message: impl Into<String>, pos: Pos) -> Self {
        Self::new(Origin::Lexer, kind, message, pos)
    }

    pub fn parse(kind: ErrorKind, message: impl Into<String>, pos: Pos) -> Self {
        Self::new(Origin::Parser, kind, message, pos)
    }

    pub fn eval(kind: ErrorKind, message: impl Into<String>, pos: Pos) -> Self {
        Self::new(Origin::Interpreter, kind, message, pos)
    }

    pub fn generate(kind: ErrorKind, message: impl Into<String>, pos: Pos) -> Self {
        Self::new(Origin::Generator, kind, message, pos)
    }

    /// Rewrap a reader failure at the statement that triggered the read
    pub fn io(err: &std::io::Error, path: &str, pos: Pos) -> Self {
        Self::new(Origin::Io, ErrorKind::Io, format!("{}: {}", path, err), pos)
    }

    /// `Expected a|b, got c`
    pub fn type_mismatch(expected: &[ValueKind], got: ValueKind, pos: Pos) -> Self {
        let expected: Vec<&str> = expected.iter().map(ValueKind::as_str).collect();
        Self::eval(
            ErrorKind::TypeMismatch,
            format!("Expected {}, got {}", expected.join("|"), got),
            pos,
        )
    }

    /// Add help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render the error with source context
    pub fn render(&self, sources: &SourceMap) -> String {
        self.render_inner(sources, false)
    }

    /// Render the error with ANSI color codes
    pub fn render_color(&self, sources: &SourceMap) -> String {
        self.render_inner(sources, true)
    }

    fn render_inner(&self, sources: &SourceMap, color: bool) -> String {
        let red = if color { "\x1b[1;31m" } else { "" };
        let dim = if color { "\x1b[2m" } else { "" };
        let underline = if color { "\x1b[4m" } else { "" };
        let cyan = if color { "\x1b[1;38;5;73m" } else { "" };
        let reset = if color { "\x1b[0m" } else { "" };

        let mut output = String::new();
        output.push('\n');

        let filename = sources.path(self.pos.file);
        let lc = sources.line_col(self.pos);
        match lc {
            Some(lc) => output.push_str(&format!(
                " {}file:{} {}{}:{}:{}{}\n",
                dim, reset, underline, filename, lc.line, lc.col, reset
            )),
            None => output.push_str(&format!(" {}file:{} {}\n", dim, reset, filename)),
        }

        output.push_str(&format!("{}error:{} {}\n", red, reset, self.message));

        if let Some(lc) = lc {
            let width = format!("{}", lc.line).len().max(2);
            output.push_str(&format!("{}{:>width$} |{}\n", dim, "", reset, width = width));
            if lc.line > 1 {
                if let Some(previous) = sources.line_text(self.pos.file, lc.line - 1) {
                    output.push_str(&format!(
                        "{}{:>width$} | {}{}\n",
                        dim,
                        lc.line - 1,
                        previous,
                        reset,
                        width = width
                    ));
                }
            }
            if let Some(line) = sources.line_text(self.pos.file, lc.line) {
                output.push_str(&format!(
                    "{}{:>width$} |{} {}\n",
                    dim,
                    lc.line,
                    reset,
                    line,
                    width = width
                ));
                output.push_str(&format!(
                    "{}{:>width$} |{} {}{}^{}\n",
                    dim,
                    "",
                    reset,
                    " ".repeat(lc.col - 1),
                    red,
                    reset,
                    width = width
                ));
            }
        }

        if let Some(ref help) = self.help {
            output.push('\n');
            for (i, help_line) in help.lines().enumerate() {
                if i == 0 {
                    output.push_str(&format!(" {}help:{} {}\n", cyan, reset, help_line));
                } else {
                    output.push_str(&format!("       {}\n", help_line));
                }
            }
        }

        output.push('\n');
        output
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

/// Compile failure together with the sources read before it happened, so the
/// diagnostic can still point into the right line.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub error: Error,
    pub sources: SourceMap,
}

impl CompileError {
    /// Render the error with source context (no color)
    pub fn render(&self) -> String {
        self.error.render(&self.sources)
    }

    /// Render the error with ANSI color codes
    pub fn render_color(&self) -> String {
        self.error.render_color(&self.sources)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error.origin.as_str(), self.error)
    }
}

impl std::error::Error for CompileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
