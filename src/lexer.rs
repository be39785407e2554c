//! Lexical analysis of a shell input line.
//!
//! Tokens are whitespace-delimited, except inside matching single or double
//! quote pairs. Quotes may appear anywhere inside a token (`name="my disk"`)
//! and are removed from the token text. Every token remembers where it starts
//! in the line, in characters, so later stages can report exact positions.

use crate::error::{Result, ShellError};

/// A word of the input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Token text with quotes removed.
    pub text: String,
    /// 0-based character offset of the first character of the token.
    pub offset: usize,
    /// Byte offset of the first character of the token.
    pub byte_offset: usize,
    /// Character index inside `text` of the first `=` that was not quoted.
    pub eq: Option<usize>,
    /// Whether any part of the token was quoted.
    pub quoted: bool,
}

impl Token {
    /// Split an unquoted `key=value` form. The key is everything before the
    /// first unquoted `=`.
    pub fn key_value(&self) -> Option<(&str, &str)> {
        let eq = self.eq?;
        let split = self.text.char_indices().nth(eq).map(|(i, _)| i)?;
        Some((&self.text[..split], &self.text[split + 1..]))
    }

    /// Text usable as a bare word (path, command name): only if nothing was quoted.
    pub fn bare(&self) -> Option<&str> {
        if self.quoted { None } else { Some(&self.text) }
    }
}

/// Result of lenient tokenization, used while the user is still typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialLine {
    pub tokens: Vec<Token>,
    /// Set when the last token has an unterminated quote.
    pub open_quote: bool,
    /// Set when the line ends with whitespace, i.e. a new token is starting.
    pub trailing_space: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    ReadingSingleQuote,
    ReadingDoubleQuote,
}

struct LexingFSM {
    input: Vec<(usize, char)>,
    pos: usize,
    state: LexingState,
    current: Option<Token>,
    chars_in_token: usize,
}

impl LexingFSM {
    fn new(line: &str) -> Self {
        LexingFSM {
            input: line.char_indices().collect(),
            pos: 0,
            state: LexingState::Start,
            current: None,
            chars_in_token: 0,
        }
    }

    /// Run the machine over the whole line.
    ///
    /// Returns the tokens and, if the line ended inside quotes, the offset of
    /// the token holding the open quote.
    fn make_tokens(&mut self) -> (Vec<Token>, Option<usize>) {
        let mut out = Vec::new();

        while let Some((byte, ch)) = self.read_char() {
            match self.state {
                LexingState::Start => self.handle_start(byte, ch),
                LexingState::ReadingWord => self.handle_word(ch, &mut out),
                LexingState::ReadingSingleQuote => self.handle_quoted(ch, '\''),
                LexingState::ReadingDoubleQuote => self.handle_quoted(ch, '"'),
            }
        }

        let open_quote = match self.state {
            LexingState::ReadingSingleQuote | LexingState::ReadingDoubleQuote => {
                self.current.as_ref().map(|t| t.offset)
            }
            _ => None,
        };

        if let Some(token) = self.current.take() {
            out.push(token);
        }
        (out, open_quote)
    }

    fn read_char(&mut self) -> Option<(usize, char)> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn begin_token(&mut self, byte: usize) {
        self.current = Some(Token {
            text: String::new(),
            offset: self.pos - 1,
            byte_offset: byte,
            eq: None,
            quoted: false,
        });
        self.chars_in_token = 0;
    }

    fn push(&mut self, ch: char) {
        if let Some(token) = self.current.as_mut() {
            token.text.push(ch);
            self.chars_in_token += 1;
        }
    }

    fn handle_start(&mut self, byte: usize, ch: char) {
        if ch.is_whitespace() {
            return;
        }
        self.begin_token(byte);
        self.state = LexingState::ReadingWord;
        self.handle_word_char(ch);
    }

    fn handle_word(&mut self, ch: char, out: &mut Vec<Token>) {
        if ch.is_whitespace() {
            if let Some(token) = self.current.take() {
                out.push(token);
            }
            self.state = LexingState::Start;
        } else {
            self.handle_word_char(ch);
        }
    }

    fn handle_word_char(&mut self, ch: char) {
        match ch {
            '\'' => self.open_quote(LexingState::ReadingSingleQuote),
            '"' => self.open_quote(LexingState::ReadingDoubleQuote),
            '=' => {
                let index = self.chars_in_token;
                if let Some(token) = self.current.as_mut() {
                    if token.eq.is_none() {
                        token.eq = Some(index);
                    }
                }
                self.push(ch);
            }
            c => self.push(c),
        }
    }

    fn open_quote(&mut self, state: LexingState) {
        if let Some(token) = self.current.as_mut() {
            token.quoted = true;
        }
        self.state = state;
    }

    fn handle_quoted(&mut self, ch: char, closing: char) {
        if ch == closing {
            self.state = LexingState::ReadingWord;
        } else {
            self.push(ch);
        }
    }
}

/// Split a complete input line into tokens.
///
/// An unterminated quote is a parse error positioned at the start of the
/// token that contains it.
pub fn split_into_tokens(line: &str) -> Result<Vec<Token>> {
    let mut lexer = LexingFSM::new(line);
    let (tokens, open_quote) = lexer.make_tokens();
    match open_quote {
        Some(offset) => Err(ShellError::parse(offset, "unterminated quote")),
        None => Ok(tokens),
    }
}

/// Tokenize a line that may still be incomplete. Never fails.
pub fn split_partial(line: &str) -> PartialLine {
    let mut lexer = LexingFSM::new(line);
    let (tokens, open_quote) = lexer.make_tokens();
    let trailing_space = open_quote.is_none() && line.chars().last().is_none_or(char::is_whitespace);
    PartialLine {
        tokens,
        open_quote: open_quote.is_some(),
        trailing_space,
    }
}
