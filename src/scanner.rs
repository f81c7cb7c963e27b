// A lexeme is the raw sequence of characters in the source code that represents a meaningful unit.
// A token is a categorized representation of a lexeme, pairing it with its type.

use crate::error::report;
use crate::token::{Token, TokenType, KEYWORDS};

pub struct Scanner {
    // Indexed by char, not by byte — `start`/`current` below are char
    // offsets into this, so every cursor comparison and slice stays in the
    // same unit. Mixing this with `String` byte indexing is what let
    // `is_at_end` (byte-length check) disagree with `advance` (char-nth
    // lookup) on non-ASCII source.
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: i32,
    had_error: bool,
}

impl Scanner {
    pub fn new(source: String) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            had_error: false,
        }
    }

    /// Scans the whole source, returning the token stream and whether any
    /// lexical errors were reported along the way. Lexical errors don't stop
    /// scanning (a bad character is just skipped) so a single run surfaces
    /// every problem in the source, not just the first.
    pub fn scan_tokens(mut self) -> (Vec<Token>, bool) {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }

        self.tokens.push(Token::eof(self.line));
        (self.tokens, self.had_error)
    }

    fn scan_token(&mut self) {
        let c: char = self.advance();
        match c {
            // single char
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),

            // can be double char
            '!' => {
                if self.r#match('=') {
                    self.add_token(TokenType::BangEqual);
                } else {
                    self.add_token(TokenType::Bang);
                }
            }
            '=' => {
                if self.r#match('=') {
                    self.add_token(TokenType::EqualEqual);
                } else {
                    self.add_token(TokenType::Equal);
                }
            }
            '<' => {
                if self.r#match('=') {
                    self.add_token(TokenType::LessEqual);
                } else {
                    self.add_token(TokenType::Less);
                }
            }
            '>' => {
                if self.r#match('=') {
                    self.add_token(TokenType::GreaterEqual);
                } else {
                    self.add_token(TokenType::Greater);
                }
            }

            // can be comment
            '/' => {
                if self.r#match('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }

            // ignore whitespace
            ' ' | '\t' | '\r' => (),

            // handle new line
            '\n' => {
                self.line += 1;
            }

            '"' => self.string(),

            c => {
                if c.is_ascii_digit() {
                    self.number()
                } else if c.is_alphabetic() || c == '_' {
                    self.identifier()
                } else {
                    self.error("Unexpected character.");
                }
            }
        }
    }

    // consume characters until we reach the closing "
    fn string(&mut self) {
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.error("Unterminated string.");
            return;
        }

        // the closing "
        self.advance();

        let literal = self
            .source
            .get((self.start + 1)..(self.current - 1))
            .expect("string token bounds in range")
            .iter()
            .collect();

        self.add_token(TokenType::String { literal });
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // consume the .
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let literal: f64 = self
            .source
            .get(self.start..self.current)
            .expect("number token bounds in range")
            .iter()
            .collect::<String>()
            .parse()
            .expect("scanned number matches a float literal");

        self.add_token(TokenType::Number { literal });
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text: String = self
            .source
            .get(self.start..self.current)
            .expect("identifier token bounds in range")
            .iter()
            .collect();
        let tpe = KEYWORDS
            .get(text.as_str())
            .cloned()
            .unwrap_or(TokenType::Identifier);

        self.add_token(tpe);
    }

    fn advance(&mut self) -> char {
        self.current += 1;
        self.source[self.current - 1]
    }

    // it's like advance but doesn't consume the next character
    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn add_token(&mut self, token_type: TokenType) {
        let text: String = self
            .source
            .get(self.start..self.current)
            .expect("token bounds in range")
            .iter()
            .collect();
        log::trace!("scanned {:?} {:?}", token_type, text);
        self.tokens.push(Token::new(token_type, text, self.line));
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    // we only consume the current character if that is what we are looking for
    fn r#match(&mut self, expected: char) -> bool {
        if self.peek() != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn error(&mut self, message: &str) {
        self.had_error = true;
        report(self.line, "", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenType> {
        let (tokens, had_error) = Scanner::new(source.to_string()).scan_tokens();
        assert!(!had_error, "unexpected scan error in {source:?}");
        tokens.into_iter().map(|t| t.token_type).collect()
    }

    #[test]
    fn scans_single_and_double_char_operators() {
        assert_eq!(
            kinds("!= == <= >="),
            vec![
                TokenType::BangEqual,
                TokenType::EqualEqual,
                TokenType::LessEqual,
                TokenType::GreaterEqual,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn skips_line_comments() {
        assert_eq!(
            kinds("1 // a comment\n2"),
            vec![
                TokenType::Number { literal: 1.0 },
                TokenType::Number { literal: 2.0 },
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn keywords_take_priority_over_identifiers() {
        assert_eq!(
            kinds("class orchid"),
            vec![TokenType::Class, TokenType::Identifier, TokenType::Eof]
        );
    }

    #[test]
    fn reports_unterminated_string() {
        let (_, had_error) = Scanner::new("\"abc".to_string()).scan_tokens();
        assert!(had_error);
    }

    #[test]
    fn non_ascii_string_contents_scan_without_panicking() {
        assert_eq!(
            kinds(r#"print "café";"#),
            vec![
                TokenType::Print,
                TokenType::String {
                    literal: "café".to_string()
                },
                TokenType::Semicolon,
                TokenType::Eof,
            ]
        );
    }
}
