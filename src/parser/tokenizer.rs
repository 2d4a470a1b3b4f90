use crate::ast::{FileId, Pos};
use crate::error::{Error, ErrorKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Tag,
    Each,
    If,
    In,
    Else,
    Import,
    Yield,
    On,
    Export,
    File,
    Const,
    Let,
    Nosync,
    As,
    Global,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "tag" => Keyword::Tag,
            "each" => Keyword::Each,
            "if" => Keyword::If,
            "in" => Keyword::In,
            "else" => Keyword::Else,
            "import" => Keyword::Import,
            "yield" => Keyword::Yield,
            "on" => Keyword::On,
            "export" => Keyword::Export,
            "file" => Keyword::File,
            "const" => Keyword::Const,
            "let" => Keyword::Let,
            "nosync" => Keyword::Nosync,
            "as" => Keyword::As,
            "global" => Keyword::Global,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Tag => "tag",
            Keyword::Each => "each",
            Keyword::If => "if",
            Keyword::In => "in",
            Keyword::Else => "else",
            Keyword::Import => "import",
            Keyword::Yield => "yield",
            Keyword::On => "on",
            Keyword::Export => "export",
            Keyword::File => "file",
            Keyword::Const => "const",
            Keyword::Let => "let",
            Keyword::Nosync => "nosync",
            Keyword::As => "as",
            Keyword::Global => "global",
        }
    }
}

/// Tokens produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Ident(String),
    Keyword(Keyword),
    Number(f64),
    Bool(bool),
    Null,
    /// Opens a string literal; its content follows as `Chunk` and
    /// `InterpStart ... InterpEnd` tokens
    StringStart,
    Chunk(String),
    /// `{{` inside a string, followed by the re-lexed expression tokens
    InterpStart,
    /// `}}`
    InterpEnd,
    /// `--- ... ---` block, kept verbatim
    Script(String),
    Punct(&'static str),
    Other(char),
    Eof,
}

impl Tok {
    /// Short description for "expected X, found Y" messages
    pub fn describe(&self) -> String {
        match self {
            Tok::Ident(name) => format!("identifier '{}'", name),
            Tok::Keyword(k) => format!("keyword '{}'", k.as_str()),
            Tok::Number(_) => "number".to_string(),
            Tok::Bool(_) => "boolean".to_string(),
            Tok::Null => "null".to_string(),
            Tok::StringStart | Tok::Chunk(_) => "string".to_string(),
            Tok::InterpStart => "'{{'".to_string(),
            Tok::InterpEnd => "'}}'".to_string(),
            Tok::Script(_) => "script block".to_string(),
            Tok::Punct(p) => format!("'{}'", p),
            Tok::Other(c) => format!("'{}'", c),
            Tok::Eof => "end of file".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub pos: Pos,
}

const MULTI_SYMBOLS: &[&str] = &["<=>", "::", "<=", ">=", "==", "!=", "&&", "||"];

const SYMBOLS: &[&str] = &[
    ".", "#", "=", "[", "]", ";", "{", "}", "(", ")", ":", "$", ",", ">", "<", "?", "|", "+",
    "/", "-", "*", "%", "!", "@",
];

/// Tokenize one source file. The stream always ends with `Tok::Eof`.
pub fn tokenize(source: &str, file: FileId) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(source, file, 0, Mode::Template);
    lexer.run()?;
    Ok(lexer.tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Source file level: `| text |` blocks are recognized
    Template,
    /// Inside `{{ }}`: `|` is always the pipe operator
    Expression,
}

/// Literal or interpolated piece of a string being scanned
enum Part {
    Text(String, usize),
    Interp(Vec<Token>, usize, usize),
}

struct Lexer<'s> {
    src: &'s str,
    cursor: usize,
    /// Absolute offset of `src` in the file, non-zero for interpolations
    base: usize,
    file: FileId,
    mode: Mode,
    tokens: Vec<Token>,
    brackets: Vec<char>,
    /// Bracket depth at which the current `let`/`const`/`global` line began
    assignment: Option<usize>,
}

impl<'s> Lexer<'s> {
    fn new(src: &'s str, file: FileId, base: usize, mode: Mode) -> Self {
        Self {
            src,
            cursor: 0,
            base,
            file,
            mode,
            tokens: Vec::new(),
            brackets: Vec::new(),
            assignment: None,
        }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.cursor..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.src.get(offset..).and_then(|s| s.chars().next())
    }

    fn pos(&self, offset: usize) -> Pos {
        Pos::new(self.file, self.base + offset)
    }

    fn push(&mut self, tok: Tok, offset: usize) {
        let pos = self.pos(offset);
        self.tokens.push(Token { tok, pos });
    }

    fn run(&mut self) -> Result<()> {
        loop {
            self.skip_trivia();
            let Some(c) = self.peek_char() else {
                break;
            };
            let start = self.cursor;
            let next = self.char_at(start + 1);

            if c.is_ascii_digit() {
                self.lex_number(start, false);
            } else if c == '-' && next.is_some_and(|n| n.is_ascii_digit()) && self.can_fold_negative() {
                self.cursor += 1;
                self.lex_number(start, true);
            } else if self.starts_word() {
                self.lex_word(start);
            } else if self.rest().starts_with("\"\"\"") {
                self.cursor += 3;
                let parts = self.scan_parts(start, "\"\"\"", false, ErrorKind::UnterminatedLongString)?;
                self.push_string(start, parts, false);
            } else if c == '"' || c == '\'' {
                self.cursor += 1;
                let delimiter = if c == '"' { "\"" } else { "'" };
                let parts = self.scan_parts(start, delimiter, true, ErrorKind::UnterminatedString)?;
                self.push_string(start, parts, false);
            } else if c == '`' {
                self.lex_raw(start)?;
            } else if self.rest().starts_with("---") {
                self.lex_script(start)?;
            } else if c == '|' && self.text_block_allowed() {
                self.cursor += 1;
                let parts = self.scan_parts(start, "|", false, ErrorKind::UnterminatedText)?;
                self.push_string(start, parts, true);
            } else if let Some(sym) = MULTI_SYMBOLS.iter().find(|s| self.rest().starts_with(**s)) {
                self.cursor += sym.len();
                self.push(Tok::Punct(*sym), start);
            } else if let Some(sym) = SYMBOLS.iter().find(|s| self.rest().starts_with(**s)) {
                self.cursor += sym.len();
                self.track_bracket(sym);
                self.push(Tok::Punct(*sym), start);
            } else {
                self.cursor += c.len_utf8();
                self.push(Tok::Other(c), start);
            }
        }
        self.push(Tok::Eof, self.cursor);
        Ok(())
    }

    /// Whitespace and both comment forms
    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            if rest.starts_with("//") {
                self.cursor += rest.find('\n').unwrap_or(rest.len());
            } else if rest.starts_with("/*") {
                self.cursor += rest[2..].find("*/").map(|i| i + 4).unwrap_or(rest.len());
            } else if let Some(c) = self.peek_char().filter(|c| c.is_whitespace()) {
                if c == '\n' {
                    self.end_assignment_line();
                }
                self.cursor += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn end_assignment_line(&mut self) {
        if let Some(depth) = self.assignment {
            if self.brackets.len() <= depth {
                self.assignment = None;
            }
        }
    }

    fn track_bracket(&mut self, sym: &str) {
        match sym {
            "(" => self.brackets.push('('),
            "[" => self.brackets.push('['),
            "{" => self.brackets.push('{'),
            ")" | "]" | "}" => {
                self.brackets.pop();
                if self.assignment.is_some_and(|depth| self.brackets.len() < depth) {
                    self.assignment = None;
                }
            }
            _ => {}
        }
    }

    /// `|` starts a text block in tag position, and is the pipe operator
    /// inside parentheses, braces, interpolations and assignment lines.
    fn text_block_allowed(&self) -> bool {
        self.mode == Mode::Template
            && self.assignment.is_none()
            && !self.brackets.iter().any(|b| *b == '(' || *b == '{')
    }

    /// A `-` directly before a number is part of the literal unless the
    /// previous token ends an operand (then it is a subtraction).
    fn can_fold_negative(&self) -> bool {
        match self.tokens.last().map(|t| &t.tok) {
            None => true,
            Some(
                Tok::Ident(_)
                | Tok::Number(_)
                | Tok::Bool(_)
                | Tok::Null
                | Tok::Chunk(_)
                | Tok::InterpEnd
                | Tok::Script(_),
            ) => false,
            Some(Tok::Punct(")" | "]" | "}")) => false,
            Some(_) => true,
        }
    }

    fn lex_number(&mut self, start: usize, negative: bool) {
        let digits_start = self.cursor;
        let mut dot = false;
        while let Some(c) = self.peek_char() {
            if c == '.' {
                if dot || !self.char_at(self.cursor + 1).is_some_and(|n| n.is_ascii_digit()) {
                    break;
                }
                dot = true;
            } else if !c.is_ascii_digit() {
                break;
            }
            self.cursor += 1;
        }
        let value: f64 = self.src[digits_start..self.cursor].parse().unwrap_or(0.0);
        self.push(Tok::Number(if negative { -value } else { value }), start);
    }

    fn starts_word(&self) -> bool {
        let rest = self.rest();
        let mut chars = rest.chars();
        match chars.next() {
            Some(c) if c.is_alphabetic() || c == '_' => true,
            Some('-') => chars.next() == Some('-') && chars.next().is_some_and(|c| c.is_alphabetic()),
            _ => false,
        }
    }

    fn lex_word(&mut self, start: usize) {
        while let Some(c) = self.peek_char() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                self.cursor += c.len_utf8();
            } else {
                break;
            }
        }
        let word = &self.src[start..self.cursor];
        let tok = match word {
            "true" => Tok::Bool(true),
            "false" => Tok::Bool(false),
            "null" => Tok::Null,
            _ => match Keyword::from_word(word) {
                Some(k @ (Keyword::Let | Keyword::Const | Keyword::Global)) => {
                    if self.mode == Mode::Template {
                        self.assignment = Some(self.brackets.len());
                    }
                    Tok::Keyword(k)
                }
                Some(k) => Tok::Keyword(k),
                None => Tok::Ident(word.to_string()),
            },
        };
        self.push(tok, start);
    }

    /// Scan string content up to `terminator`, splitting out `{{ }}` spans.
    /// The cursor must already be past the opening delimiter.
    fn scan_parts(
        &mut self,
        start: usize,
        terminator: &str,
        single_line: bool,
        unterminated: ErrorKind,
    ) -> Result<Vec<Part>> {
        let mut parts = Vec::new();
        let mut text = String::new();
        let mut text_start = self.cursor;
        let escaped = terminator.chars().next().unwrap_or('"');

        loop {
            let rest = self.rest();
            let Some(c) = rest.chars().next() else {
                return Err(Error::lex(unterminated, unterminated_message(unterminated), self.pos(start)));
            };
            if single_line && (c == '\n' || c == '\r') {
                return Err(Error::lex(unterminated, unterminated_message(unterminated), self.pos(start)));
            }
            if c == '\\' && rest[1..].starts_with(escaped) {
                text.push(escaped);
                self.cursor += 1 + escaped.len_utf8();
            } else if rest.starts_with("\\\\") {
                text.push('\\');
                self.cursor += 2;
            } else if rest.starts_with("{{") {
                let open = self.cursor;
                let close = self.find_interpolation_end(open)?;
                if !text.is_empty() {
                    parts.push(Part::Text(std::mem::take(&mut text), text_start));
                }
                let mut inner = Lexer::new(&self.src[open + 2..close], self.file, self.base + open + 2, Mode::Expression);
                inner.run()?;
                inner.tokens.pop();
                parts.push(Part::Interp(inner.tokens, open, close));
                self.cursor = close + 2;
                text_start = self.cursor;
            } else if rest.starts_with(terminator) {
                self.cursor += terminator.len();
                break;
            } else {
                text.push(c);
                self.cursor += c.len_utf8();
            }
        }
        if !text.is_empty() {
            parts.push(Part::Text(text, text_start));
        }
        Ok(parts)
    }

    /// Offset of the `}}` closing the interpolation opened at `open`,
    /// skipping nested braces and quoted strings.
    fn find_interpolation_end(&self, open: usize) -> Result<usize> {
        let mut depth = 0usize;
        let mut i = open + 2;
        while let Some(c) = self.char_at(i) {
            if depth == 0 && self.src[i..].starts_with("}}") {
                return Ok(i);
            }
            match c {
                '{' => depth += 1,
                '}' => depth = depth.saturating_sub(1),
                '"' | '\'' | '`' => {
                    i += 1;
                    while let Some(q) = self.char_at(i) {
                        if q == '\\' {
                            i += 1;
                        } else if q == c {
                            break;
                        }
                        i += self.char_at(i).map(char::len_utf8).unwrap_or(1);
                    }
                }
                _ => {}
            }
            i += self.char_at(i).map(char::len_utf8).unwrap_or(1);
        }
        Err(Error::lex(
            ErrorKind::UnterminatedInterpolation,
            "expected closing }}",
            self.pos(open),
        ))
    }

    fn push_string(&mut self, start: usize, mut parts: Vec<Part>, trim: bool) {
        if trim {
            if let Some(Part::Text(text, at)) = parts.first_mut() {
                let trimmed = text.trim_start();
                *at += text.len() - trimmed.len();
                *text = trimmed.to_string();
            }
            if let Some(Part::Text(text, _)) = parts.last_mut() {
                text.truncate(text.trim_end().len());
            }
        }

        self.push(Tok::StringStart, start);
        let mut emitted = false;
        for part in parts {
            match part {
                Part::Text(text, _) if text.is_empty() => {}
                Part::Text(text, at) => {
                    self.push(Tok::Chunk(text), at);
                    emitted = true;
                }
                Part::Interp(tokens, open, close) => {
                    self.push(Tok::InterpStart, open);
                    self.tokens.extend(tokens);
                    self.push(Tok::InterpEnd, close);
                    emitted = true;
                }
            }
        }
        if !emitted {
            self.push(Tok::Chunk(String::new()), start);
        }
    }

    /// Backtick block: no interpolation, dedented by its closing line
    fn lex_raw(&mut self, start: usize) -> Result<()> {
        self.cursor += 1;
        let mut text = String::new();
        loop {
            let rest = self.rest();
            let Some(c) = rest.chars().next() else {
                return Err(Error::lex(
                    ErrorKind::UnterminatedRawString,
                    "unterminated string",
                    self.pos(start),
                ));
            };
            if c == '`' {
                self.cursor += 1;
                break;
            }
            if rest.starts_with("\\`") {
                text.push('`');
                self.cursor += 2;
                continue;
            }
            text.push(c);
            self.cursor += c.len_utf8();
        }

        self.push(Tok::StringStart, start);
        self.push(Tok::Chunk(dedent(&text)), start);
        Ok(())
    }

    fn lex_script(&mut self, start: usize) -> Result<()> {
        let body_start = start + 3;
        match self.src[body_start..].find("---") {
            Some(len) => {
                let code = self.src[body_start..body_start + len].to_string();
                self.cursor = body_start + len + 3;
                self.push(Tok::Script(code), start);
                Ok(())
            }
            None => Err(Error::lex(
                ErrorKind::UnterminatedScript,
                "expected closing ---",
                self.pos(start),
            )),
        }
    }
}

fn unterminated_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::UnterminatedLongString => "unterminated long string",
        ErrorKind::UnterminatedText => "unterminated text block, expected closing |",
        _ => "unterminated string",
    }
}

/// Drop an empty first line; when the last line is only indentation, strip
/// that much indentation from every line and drop it.
fn dedent(text: &str) -> String {
    let mut lines: Vec<&str> = text.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l)).collect();
    if lines.len() > 1 && lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    if lines.len() > 1 {
        if let Some(last) = lines.last().filter(|l| l.trim().is_empty()) {
            let width = last.chars().count();
            lines.pop();
            let stripped: Vec<String> = lines
                .iter()
                .map(|line| {
                    let indent = line
                        .char_indices()
                        .take(width)
                        .take_while(|(_, c)| c.is_whitespace())
                        .map(|(i, c)| i + c.len_utf8())
                        .last()
                        .unwrap_or(0);
                    line[indent..].to_string()
                })
                .collect();
            return stripped.join("\n");
        }
    }
    lines.join("\n")
}
