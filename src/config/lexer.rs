#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Unquoted text: a key, a number, a boolean or a bare string
    Word(String),
    Quoted(String),
    Regex(String),
    OpenBrace,
    CloseBrace,
    Newline,
    Eof,
}

/// Splits config text into tokens, tracking the line each token starts on.
pub(crate) struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
}

fn is_word_end(c: char) -> bool {
    c.is_whitespace() || matches!(c, '{' | '}' | '"' | '#')
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Lexer {
            src,
            pos: 0,
            line: 1,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    /// Skips blanks, comments and backslash-newline continuations. Stops at a newline.
    fn skip_blank(&mut self) {
        loop {
            match self.peek_char() {
                Some(c) if c != '\n' && c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('\\') => {
                    let rest = &self.src[self.pos + 1..];
                    if rest.starts_with('\n') {
                        self.bump();
                        self.bump();
                    } else if rest.starts_with("\r\n") {
                        self.bump();
                        self.bump();
                        self.bump();
                    } else {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    /// Returns the next token and the line it starts on.
    pub(crate) fn next_token(&mut self) -> Result<(Token, u32), (u32, String)> {
        self.skip_blank();
        let line = self.line;

        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok((Token::Eof, line)),
        };

        let token = match c {
            '\n' => {
                self.bump();
                Token::Newline
            }
            '{' => {
                self.bump();
                Token::OpenBrace
            }
            '}' => {
                self.bump();
                Token::CloseBrace
            }
            '"' => {
                self.bump();
                Token::Quoted(self.quoted(line)?)
            }
            '/' => {
                self.bump();
                Token::Regex(self.regex(line)?)
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.peek_char() {
                    if is_word_end(c) {
                        break;
                    }
                    self.bump();
                }
                Token::Word(self.src[start..self.pos].to_owned())
            }
        };

        Ok((token, line))
    }

    fn quoted(&mut self, line: u32) -> Result<String, (u32, String)> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err((line, String::from("unterminated quoted string"))),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err((line, String::from("unterminated quoted string"))),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn regex(&mut self, line: u32) -> Result<String, (u32, String)> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err((line, String::from("unterminated regular expression")))
                }
                Some('/') => return Ok(out),
                Some('\\') => match self.bump() {
                    None | Some('\n') => {
                        return Err((line, String::from("unterminated regular expression")))
                    }
                    Some('/') => out.push('/'),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }
}
