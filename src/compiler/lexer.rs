//! Mustache tokenizer.
//!
//! A single-pass character scanner implemented as an explicit state machine.
//! The scanner copies literal text in `Outside`, matches the open delimiter
//! through `MaybeOpen`, decides the tag sigil in `Start`, accumulates the
//! dotted name through `BeforeIdentifier`/`Identifier`, and matches the close
//! delimiter through `End`/`MaybeClose` (with `TripleOpen`/`TripleClose` for
//! the `{{{ ... }}}` form). Comments and `{{= =}}` delimiter changes are
//! consumed in dedicated states; delimiter changes take effect immediately in
//! the lexer, so every later stage sees delimiter-independent tokens.
//!
//! Standalone-line whitespace handling ([`apply_standalone`]) runs as a
//! separate pass over the token stream.

use crate::compiler::ast::{Token, TokenKind};
use crate::compiler::diagnostics::{CompileError, Span};

const DEFAULT_OPEN: &str = "{{";
const DEFAULT_CLOSE: &str = "}}";

/// Tag kind selected by the sigil character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sigil {
    Escaped,
    Unescaped,
    SectionOpen,
    InvertedOpen,
    SectionClose,
    Partial,
    ParentOpen,
    BlockOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Copying literal text.
    Outside,
    /// Matched `matched` characters of the open delimiter.
    MaybeOpen { matched: usize },
    /// Inside the open delimiter, deciding the sigil.
    Start,
    /// After the sigil, skipping whitespace before the name.
    BeforeIdentifier,
    /// Accumulating the dotted name.
    Identifier,
    /// After the name, awaiting the close delimiter.
    End,
    /// Matched `matched` characters of the close delimiter.
    MaybeClose { matched: usize },
    /// Saw `{{{`; like `BeforeIdentifier` with the triple flag set.
    TripleOpen,
    /// Matched the close delimiter of a triple tag, awaiting the third `}`.
    TripleClose,
    /// Inside `{{! ... }}`, matching the close delimiter.
    Comment { matched: usize },
    /// Inside `{{= ... =}}`, before the terminating `=`.
    DelimBody,
    /// After the terminating `=`, matching the close delimiter.
    DelimEnd { matched: usize },
}

pub struct Lexer<'src> {
    source: &'src str,
    open_delim: String,
    close_delim: String,
    state: State,
    tokens: Vec<Token>,
    text: String,
    text_span: Span,
    text_start: usize,
    tag_span: Span,
    tag_start: usize,
    sigil: Sigil,
    name: String,
    triple: bool,
    body: String,
    line: u32,
    column: u32,
    offset: usize,
    /// Byte offset just past the character being processed.
    next_offset: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source,
            open_delim: DEFAULT_OPEN.to_string(),
            close_delim: DEFAULT_CLOSE.to_string(),
            state: State::Outside,
            tokens: Vec::new(),
            text: String::new(),
            text_span: Span::new(1, 1),
            text_start: 0,
            tag_span: Span::new(1, 1),
            tag_start: 0,
            sigil: Sigil::Escaped,
            name: String::new(),
            triple: false,
            body: String::new(),
            line: 1,
            column: 1,
            offset: 0,
            next_offset: 0,
        }
    }

    fn default_delims(&self) -> bool {
        self.open_delim == DEFAULT_OPEN && self.close_delim == DEFAULT_CLOSE
    }

    /// Tokenizes the whole source, including the trailing `Eof` token, and
    /// applies the standalone-line pass.
    pub fn tokenize(mut self) -> Result<Vec<Token>, CompileError> {
        for (offset, c) in self.source.char_indices() {
            self.offset = offset;
            self.next_offset = offset + c.len_utf8();
            self.step(c)?;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset = self.source.len();
        self.finish()?;
        Ok(apply_standalone(self.tokens))
    }

    fn finish(&mut self) -> Result<(), CompileError> {
        match self.state {
            State::Outside => {}
            State::MaybeOpen { matched } => {
                // A partial delimiter match at EOF is literal text.
                let delim = self.open_delim.clone();
                let len = Self::prefix_len(&delim, matched);
                self.push_text_str(&delim[..len]);
            }
            _ => {
                return Err(CompileError::syntax(self.tag_span, "unclosed tag at end of file"));
            }
        }
        self.flush_text();
        let span = Span::new(self.line, self.column);
        self.tokens.push(Token::new(TokenKind::Eof, span, self.source.len(), self.source.len()));
        Ok(())
    }

    fn step(&mut self, c: char) -> Result<(), CompileError> {
        match self.state {
            State::Outside => self.outside(c),
            State::MaybeOpen { matched } => self.maybe_open(matched, c),
            State::Start => self.start(c),
            State::BeforeIdentifier | State::TripleOpen => self.before_identifier(c),
            State::Identifier => self.identifier(c),
            State::End => self.end(c),
            State::MaybeClose { matched } => self.maybe_close(matched, c),
            State::TripleClose => self.triple_close(c),
            State::Comment { matched } => self.comment(matched, c),
            State::DelimBody => self.delim_body(c),
            State::DelimEnd { matched } => self.delim_end(matched, c),
        }
    }

    // --- states --------------------------------------------------------------

    fn outside(&mut self, c: char) -> Result<(), CompileError> {
        if self.open_delim.chars().next() == Some(c) {
            self.tag_span = Span::new(self.line, self.column);
            self.tag_start = self.offset;
            if self.open_delim.chars().count() == 1 {
                self.enter_tag();
            } else {
                self.state = State::MaybeOpen { matched: 1 };
            }
        } else {
            self.push_text(c);
        }
        Ok(())
    }

    fn maybe_open(&mut self, matched: usize, c: char) -> Result<(), CompileError> {
        if self.open_delim.chars().nth(matched) == Some(c) {
            if matched + 1 == self.open_delim.chars().count() {
                self.enter_tag();
            } else {
                self.state = State::MaybeOpen { matched: matched + 1 };
            }
            Ok(())
        } else {
            // The partial match was literal text after all.
            let delim = self.open_delim.clone();
            let len = Self::prefix_len(&delim, matched);
            self.push_text_str(&delim[..len]);
            self.state = State::Outside;
            self.step(c)
        }
    }

    fn enter_tag(&mut self) {
        self.flush_text();
        self.state = State::Start;
        self.sigil = Sigil::Escaped;
        self.triple = false;
        self.name.clear();
        self.body.clear();
    }

    fn start(&mut self, c: char) -> Result<(), CompileError> {
        match c {
            '{' if self.default_delims() => {
                self.sigil = Sigil::Unescaped;
                self.triple = true;
                self.state = State::TripleOpen;
            }
            '&' => {
                self.sigil = Sigil::Unescaped;
                self.state = State::BeforeIdentifier;
            }
            '#' => {
                self.sigil = Sigil::SectionOpen;
                self.state = State::BeforeIdentifier;
            }
            '^' => {
                self.sigil = Sigil::InvertedOpen;
                self.state = State::BeforeIdentifier;
            }
            '/' => {
                self.sigil = Sigil::SectionClose;
                self.state = State::BeforeIdentifier;
            }
            '>' => {
                self.sigil = Sigil::Partial;
                self.state = State::BeforeIdentifier;
            }
            '<' => {
                self.sigil = Sigil::ParentOpen;
                self.state = State::BeforeIdentifier;
            }
            '$' => {
                self.sigil = Sigil::BlockOpen;
                self.state = State::BeforeIdentifier;
            }
            '!' => {
                self.state = State::Comment { matched: 0 };
            }
            '=' => {
                self.state = State::DelimBody;
            }
            _ if c.is_whitespace() => {
                self.state = State::BeforeIdentifier;
            }
            _ if self.close_delim.starts_with(c) => {
                self.begin_close()?;
            }
            _ if is_identifier_char(c) => {
                self.name.push(c);
                self.state = State::Identifier;
            }
            _ => {
                return Err(self.error_here(format!("illegal character `{c}` in tag")));
            }
        }
        Ok(())
    }

    fn before_identifier(&mut self, c: char) -> Result<(), CompileError> {
        if c.is_whitespace() {
            return Ok(());
        }
        if self.close_delim.starts_with(c) {
            return self.begin_close();
        }
        if is_identifier_char(c) {
            self.name.push(c);
            self.state = State::Identifier;
            return Ok(());
        }
        Err(self.error_here(format!("illegal character `{c}` in identifier")))
    }

    fn identifier(&mut self, c: char) -> Result<(), CompileError> {
        if c.is_whitespace() {
            self.state = State::End;
            return Ok(());
        }
        if self.close_delim.starts_with(c) {
            return self.begin_close();
        }
        if is_identifier_char(c) {
            self.name.push(c);
            return Ok(());
        }
        Err(self.error_here(format!("illegal character `{c}` in identifier")))
    }

    fn end(&mut self, c: char) -> Result<(), CompileError> {
        if c.is_whitespace() {
            return Ok(());
        }
        if self.close_delim.starts_with(c) {
            return self.begin_close();
        }
        Err(self.error_here(format!("expected `{}` to close tag, found `{c}`", self.close_delim)))
    }

    /// Starts matching the close delimiter; completes the tag at once when
    /// the delimiter is a single character.
    fn begin_close(&mut self) -> Result<(), CompileError> {
        if self.close_delim.chars().count() > 1 {
            self.state = State::MaybeClose { matched: 1 };
        } else if self.triple {
            self.state = State::TripleClose;
        } else {
            self.emit_tag()?;
        }
        Ok(())
    }

    fn maybe_close(&mut self, matched: usize, c: char) -> Result<(), CompileError> {
        if self.close_delim.chars().nth(matched) != Some(c) {
            return Err(self.error_here("mismatched delimiters in tag"));
        }
        if matched + 1 < self.close_delim.chars().count() {
            self.state = State::MaybeClose { matched: matched + 1 };
        } else if self.triple {
            self.state = State::TripleClose;
        } else {
            self.emit_tag()?;
        }
        Ok(())
    }

    fn triple_close(&mut self, c: char) -> Result<(), CompileError> {
        if c != '}' {
            return Err(self.error_here("expected `}}}` to close unescaped tag"));
        }
        self.emit_tag()
    }

    fn comment(&mut self, matched: usize, c: char) -> Result<(), CompileError> {
        if self.close_delim.chars().nth(matched) == Some(c) {
            if matched + 1 == self.close_delim.chars().count() {
                self.push_tag_token(TokenKind::Comment);
                self.state = State::Outside;
            } else {
                self.state = State::Comment { matched: matched + 1 };
            }
        } else if self.close_delim.starts_with(c) {
            self.state = State::Comment { matched: 1 };
        } else {
            self.state = State::Comment { matched: 0 };
        }
        Ok(())
    }

    fn delim_body(&mut self, c: char) -> Result<(), CompileError> {
        if c == '=' {
            self.state = State::DelimEnd { matched: 0 };
        } else {
            self.body.push(c);
        }
        Ok(())
    }

    fn delim_end(&mut self, matched: usize, c: char) -> Result<(), CompileError> {
        if self.close_delim.chars().nth(matched) != Some(c) {
            return Err(self.error_here("malformed delimiter change"));
        }
        if matched + 1 < self.close_delim.chars().count() {
            self.state = State::DelimEnd { matched: matched + 1 };
            return Ok(());
        }
        let mut parts = self.body.split_whitespace();
        let (open, close) = match (parts.next(), parts.next(), parts.next()) {
            (Some(open), Some(close), None) => (open.to_string(), close.to_string()),
            _ => {
                return Err(CompileError::syntax(
                    self.tag_span,
                    "delimiter change requires exactly two delimiters",
                ));
            }
        };
        if open.contains('=') || close.contains('=') {
            return Err(CompileError::syntax(self.tag_span, "delimiters must not contain `=`"));
        }
        self.push_tag_token(TokenKind::DelimiterChange { open: open.clone(), close: close.clone() });
        self.open_delim = open;
        self.close_delim = close;
        self.state = State::Outside;
        Ok(())
    }

    // --- emission ------------------------------------------------------------

    fn emit_tag(&mut self) -> Result<(), CompileError> {
        if self.name.is_empty() {
            return Err(CompileError::syntax(self.tag_span, "empty identifier in tag"));
        }
        if self.name != "."
            && (self.name.starts_with('.') || self.name.ends_with('.') || self.name.contains(".."))
        {
            return Err(CompileError::syntax(
                self.tag_span,
                format!("malformed dotted name `{}`", self.name),
            ));
        }
        let name = std::mem::take(&mut self.name);
        let kind = match self.sigil {
            Sigil::Escaped => TokenKind::Interpolation { name, escaped: true },
            Sigil::Unescaped => TokenKind::Interpolation { name, escaped: false },
            Sigil::SectionOpen => TokenKind::SectionOpen(name),
            Sigil::InvertedOpen => TokenKind::InvertedOpen(name),
            Sigil::SectionClose => TokenKind::SectionClose(name),
            Sigil::Partial => TokenKind::Partial { name, indent: String::new() },
            Sigil::ParentOpen => TokenKind::ParentOpen(name),
            Sigil::BlockOpen => TokenKind::BlockOpen(name),
        };
        self.push_tag_token(kind);
        self.state = State::Outside;
        Ok(())
    }

    fn push_tag_token(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, self.tag_span, self.tag_start, self.next_offset));
    }

    fn push_text(&mut self, c: char) {
        if self.text.is_empty() {
            self.text_span = Span::new(self.line, self.column);
            self.text_start = self.offset;
        }
        self.text.push(c);
    }

    fn push_text_str(&mut self, s: &str) {
        if self.text.is_empty() && !s.is_empty() {
            self.text_span = self.tag_span;
            self.text_start = self.tag_start;
        }
        self.text.push_str(s);
    }

    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let literal = std::mem::take(&mut self.text);
        let end = self.text_start + literal.len();
        self.tokens.push(Token::new(TokenKind::Text(literal), self.text_span, self.text_start, end));
    }

    fn error_here(&self, message: impl Into<String>) -> CompileError {
        CompileError::syntax(Span::new(self.line, self.column), message)
    }

    fn prefix_len(delim: &str, chars: usize) -> usize {
        delim.char_indices().nth(chars).map_or(delim.len(), |(i, _)| i)
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '@')
}

/// Convenience entry point.
pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    Lexer::new(source).tokenize()
}

// --- standalone-line pass ----------------------------------------------------

fn is_standalone_eligible(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::SectionOpen(_)
            | TokenKind::InvertedOpen(_)
            | TokenKind::SectionClose(_)
            | TokenKind::Partial { .. }
            | TokenKind::ParentOpen(_)
            | TokenKind::BlockOpen(_)
            | TokenKind::Comment
            | TokenKind::DelimiterChange { .. }
    )
}

fn is_inline_ws(s: &str) -> bool {
    s.chars().all(|c| c == ' ' || c == '\t')
}

/// Applies the Mustache standalone-line rule: a line whose only tag is a
/// section/partial/comment-class tag surrounded by nothing but whitespace has
/// that whitespace removed. Partial includes keep the line's trailing newline
/// (the include occupies the line its content replaces) and record the
/// leading whitespace as the indentation to propagate into the partial body.
fn apply_standalone(tokens: Vec<Token>) -> Vec<Token> {
    let pieces = split_text_at_newlines(tokens);

    let mut out: Vec<Token> = Vec::with_capacity(pieces.len());
    let mut line: Vec<Token> = Vec::new();
    for token in pieces {
        let ends_line = matches!(&token.kind, TokenKind::Text(t) if t.ends_with('\n'))
            || token.kind == TokenKind::Eof;
        line.push(token);
        if ends_line {
            flush_line(&mut out, std::mem::take(&mut line));
        }
    }
    flush_line(&mut out, line);

    merge_adjacent_text(out)
}

fn flush_line(out: &mut Vec<Token>, line: Vec<Token>) {
    if line.is_empty() {
        return;
    }
    let mut tag_index = None;
    let mut tag_count = 0;
    let mut ws_only = true;
    for (i, token) in line.iter().enumerate() {
        match &token.kind {
            TokenKind::Text(t) => {
                let body = t
                    .strip_suffix('\n')
                    .map_or(t.as_str(), |b| b.strip_suffix('\r').unwrap_or(b));
                if !is_inline_ws(body) {
                    ws_only = false;
                }
            }
            TokenKind::Eof => {}
            kind => {
                tag_count += 1;
                if is_standalone_eligible(kind) {
                    tag_index = Some(i);
                }
            }
        }
    }

    let standalone = tag_count == 1 && tag_index.is_some() && ws_only;
    let Some(tag_index) = tag_index.filter(|_| standalone) else {
        out.extend(line);
        return;
    };

    let keep_newline = matches!(line[tag_index].kind, TokenKind::Partial { .. });
    let indent: String = line[..tag_index]
        .iter()
        .filter_map(|t| match &t.kind {
            TokenKind::Text(s) => Some(s.as_str()),
            _ => None,
        })
        .collect();

    for (i, mut token) in line.into_iter().enumerate() {
        match &mut token.kind {
            TokenKind::Text(t) => {
                // Whitespace on a standalone line is dropped; after a
                // partial the newline itself survives.
                if i > tag_index && keep_newline && t.ends_with('\n') {
                    *t = "\n".to_string();
                    out.push(token);
                }
            }
            TokenKind::Partial { indent: slot, .. } => {
                *slot = indent.clone();
                out.push(token);
            }
            _ => out.push(token),
        }
    }
}

/// Splits every text token at newline boundaries, keeping each `\n` at the
/// end of its piece, so lines can be examined token-wise.
fn split_text_at_newlines(tokens: Vec<Token>) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        let TokenKind::Text(text) = &token.kind else {
            out.push(token);
            continue;
        };
        if !text.contains('\n') {
            out.push(token);
            continue;
        }
        let mut span = token.span;
        let mut start = token.start;
        let mut rest = text.as_str();
        while let Some(pos) = rest.find('\n') {
            let (piece, tail) = rest.split_at(pos + 1);
            out.push(Token::new(TokenKind::Text(piece.to_string()), span, start, start + piece.len()));
            start += piece.len();
            span = Span::new(span.line + 1, 1);
            rest = tail;
        }
        if !rest.is_empty() {
            out.push(Token::new(TokenKind::Text(rest.to_string()), span, start, token.end));
        }
    }
    out
}

fn merge_adjacent_text(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if let (Some(prev), TokenKind::Text(text)) = (out.last_mut(), &token.kind)
            && let TokenKind::Text(prev_text) = &mut prev.kind
        {
            prev_text.push_str(text);
            prev.end = token.end;
            continue;
        }
        out.push(token);
    }
    out
}
