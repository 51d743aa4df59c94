//! A small TypeScript/TSX tokenizer.
//!
//! It only needs to be good enough to find identifiers, dots and brackets
//! with their exact byte ranges. String, template, regex and comment contents
//! never produce bracket tokens, which is what keeps brace depth honest.
//! Template substitutions (`${ ... }`) are tokenized like regular code.
//!
//! Quote characters in JSX text (`<p>Don't</p>`) open a string that is cut at
//! the end of the line, so the damage stays local. Code later on that same
//! line (`<p>Don't miss {booking.court}</p>`) is hidden and left unrewritten.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    Punct,
    /// String, template chunk or regex literal.
    Literal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

impl Token<'_> {
    pub fn is_punct(&self, punct: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == punct
    }

    pub fn is_ident(&self) -> bool {
        self.kind == TokenKind::Ident
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == keyword
    }

    /// `.` or `?.`
    pub fn is_member_dot(&self) -> bool {
        self.is_punct(".") || self.is_punct("?.")
    }
}

/// Keywords after which a `/` starts a regex literal rather than a division.
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "case",
    "do",
    "else",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "instanceof",
    "yield",
    "await",
];

pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    Lexer {
        src: source,
        bytes: source.as_bytes(),
        pos: 0,
        tokens: Vec::new(),
        braces: Vec::new(),
    }
    .run()
}

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    tokens: Vec<Token<'a>>,
    /// One entry per open `{`; `true` when it was opened by a template `${`.
    braces: Vec<bool>,
}

impl<'a> Lexer<'a> {
    fn run(mut self) -> Vec<Token<'a>> {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment(),
                b'/' if self.regex_allowed() => self.regex_or_slash(),
                quote @ (b'\'' | b'"') => self.string(quote),
                b'`' => {
                    let start = self.pos;
                    self.pos += 1;
                    self.template(start);
                }
                b'{' => {
                    self.braces.push(false);
                    self.punct(1);
                }
                b'}' => {
                    if self.braces.pop() == Some(true) {
                        let start = self.pos;
                        self.pos += 1;
                        self.template(start);
                    } else {
                        self.punct(1);
                    }
                }
                b'?' if self.peek(1) == Some(b'.')
                    && !self.peek(2).is_some_and(|c| c.is_ascii_digit()) =>
                {
                    self.punct(2)
                }
                b'=' if self.peek(1) == Some(b'>') => self.punct(2),
                b'.' if self.peek(1) == Some(b'.') && self.peek(2) == Some(b'.') => self.punct(3),
                c if is_ident_start(c) => self.ident(),
                c if c.is_ascii_digit() => self.number(),
                _ => self.punct(1),
            }
        }
        self.tokens
    }

    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            text: &self.src[start..end],
            start,
            end,
        });
    }

    fn punct(&mut self, len: usize) {
        let start = self.pos;
        self.pos += len;
        self.push(TokenKind::Punct, start, self.pos);
    }

    fn ident(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos]) {
            self.pos += 1;
        }
        self.push(TokenKind::Ident, start, self.pos);
    }

    fn number(&mut self) {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.pos += 1;
        }
        self.push(TokenKind::Number, start, self.pos);
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos = self.src[self.pos + 2..]
            .find("*/")
            .map_or(self.bytes.len(), |p| self.pos + 2 + p + 2);
    }

    fn string(&mut self, quote: u8) {
        let start = self.pos;
        self.pos += 1;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => self.pos += 2,
                b'\n' => break,
                c if c == quote => {
                    self.pos += 1;
                    break;
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.pos.min(self.bytes.len());
        self.push(TokenKind::Literal, start, self.pos);
    }

    /// Scan template text from `self.pos` up to the closing backtick or the
    /// next `${`, emitting the chunk starting at `start` as one literal.
    fn template(&mut self, start: usize) {
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => self.pos += 2,
                b'`' => {
                    self.pos += 1;
                    self.push(TokenKind::Literal, start, self.pos);
                    return;
                }
                b'$' if self.peek(1) == Some(b'{') => {
                    self.pos += 2;
                    self.push(TokenKind::Literal, start, self.pos);
                    self.braces.push(true);
                    return;
                }
                _ => self.pos += 1,
            }
        }
        self.pos = self.bytes.len();
        self.push(TokenKind::Literal, start, self.pos);
    }

    fn regex_allowed(&self) -> bool {
        let Some(prev) = self.tokens.last() else {
            return true;
        };
        match prev.kind {
            TokenKind::Number | TokenKind::Literal => false,
            TokenKind::Ident => REGEX_PREFIX_KEYWORDS.contains(&prev.text),
            // `<` covers JSX closing tags like `</div>`
            TokenKind::Punct => !matches!(prev.text, ")" | "]" | "}" | "<"),
        }
    }

    /// A regex literal must close on the same line; otherwise it was a slash.
    fn regex_or_slash(&mut self) {
        let start = self.pos;
        let mut i = start + 1;
        let mut in_class = false;
        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'\n' => break,
                b'[' => {
                    in_class = true;
                    i += 1;
                }
                b']' => {
                    in_class = false;
                    i += 1;
                }
                b'/' if !in_class => {
                    i += 1;
                    while i < self.bytes.len() && self.bytes[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    self.pos = i;
                    self.push(TokenKind::Literal, start, i);
                    return;
                }
                _ => i += 1,
            }
        }
        self.punct(1);
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$' || c >= 0x80
}

fn is_ident_continue(c: u8) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

/// Maps byte offsets to 1-based lines and 0-based byte columns.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = self.starts.partition_point(|&s| s <= offset);
        (line, offset - self.starts[line - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<&str> {
        tokenize(source).into_iter().map(|t| t.text).collect()
    }

    fn idents(source: &str) -> Vec<&str> {
        tokenize(source)
            .into_iter()
            .filter(|t| t.is_ident())
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn tokenizes_member_chains() {
        assert_eq!(
            texts("booking?.court.name"),
            vec!["booking", "?.", "court", ".", "name"]
        );
        assert_eq!(texts("a ? .5 : b"), vec!["a", "?", ".", "5", ":", "b"]);
    }

    #[test]
    fn strings_and_comments_hide_braces() {
        let tokens = tokenize("const s = '{'; // }\n/* { */ x = \"}\";");
        assert!(!tokens.iter().any(|t| t.is_punct("{") || t.is_punct("}")));
        assert_eq!(idents("const s = '{'; // club\n/* court */ x"), vec!["const", "s", "x"]);
    }

    #[test]
    fn template_substitutions_are_code() {
        let source = "`Court: ${booking.court.name} {not code}`";
        assert_eq!(idents(source), vec!["booking", "court", "name"]);
        let tokens = tokenize(source);
        assert_eq!(tokens.first().unwrap().text, "`Court: ${");
        assert_eq!(tokens.last().unwrap().text, "} {not code}`");
    }

    #[test]
    fn nested_template_objects() {
        let source = "`${fn({ a: `${x}` })}` + y";
        assert_eq!(idents(source), vec!["fn", "a", "x", "y"]);
        let tokens = tokenize(source);
        assert_eq!(tokens.iter().filter(|t| t.is_punct("{")).count(), 1);
        assert_eq!(tokens.iter().filter(|t| t.is_punct("}")).count(), 1);
    }

    #[test]
    fn regex_versus_division() {
        assert_eq!(idents("const r = /club{2}/g; a / b / c"), vec!["const", "r", "a", "b", "c"]);
        let tokens = tokenize("x = a / b");
        assert!(tokens.iter().any(|t| t.is_punct("/")));
    }

    #[test]
    fn jsx_closing_tags_are_not_regex() {
        let source = "<b>{x}</b> {booking.court.name} </i>";
        assert!(idents(source).contains(&"court"));
    }

    #[test]
    fn jsx_apostrophe_is_contained_to_its_line() {
        let source = "<p>Don't</p>\n{booking.court.name}";
        assert!(idents(source).contains(&"court"));
    }

    #[test]
    fn jsx_apostrophe_hides_the_rest_of_its_line() {
        // Known false negative: `court` after the apostrophe is never a candidate.
        let source = "<p>Don't miss {booking.court.name}</p>\n<p>{booking.club.name}</p>";
        let idents = idents(source);
        assert!(!idents.contains(&"court"));
        assert!(idents.contains(&"club"));
    }

    #[test]
    fn line_index_maps_offsets() {
        let index = LineIndex::new("ab\ncd\n");
        assert_eq!(index.line_col(0), (1, 0));
        assert_eq!(index.line_col(3), (2, 0));
        assert_eq!(index.line_col(4), (2, 1));
    }
}
