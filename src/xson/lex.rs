use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexError {
    StringInvalidUtf8,
    StringInvalidEscapedChar,
    StringInvalidJsonChar,
    StringInvalidHexChar,
    InvalidChar,
    InvalidString,
    MissingIntegerAfterExponent,
    MissingIntegerAfterDecimal,
    MissingIntegerAfterMinus,
}

impl LexError {
    pub fn as_str(self) -> &'static str {
        match self {
            LexError::StringInvalidUtf8 => "invalid bytes in UTF8 string.",
            LexError::StringInvalidEscapedChar => {
                "inside a string, '\\' occurs before a character which it may not."
            }
            LexError::StringInvalidJsonChar => "invalid character inside string.",
            LexError::StringInvalidHexChar => {
                "invalid (non-hex) character occurs after '\\u' inside string."
            }
            LexError::InvalidChar => "invalid char in json text.",
            LexError::InvalidString => "invalid string in json text.",
            LexError::MissingIntegerAfterExponent => {
                "malformed number, a digit is required after the exponent."
            }
            LexError::MissingIntegerAfterDecimal => {
                "malformed number, a digit is required after the decimal point."
            }
            LexError::MissingIntegerAfterMinus => {
                "malformed number, a digit is required after the minus sign."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// The buffer ends before a token is complete
    Eof,
    Bool(bool),
    Null,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    Integer(Range<usize>),
    Double(Range<usize>),

    /// String body without the quotes. `escaped` is set when it holds a backslash sequence.
    String { body: Range<usize>, escaped: bool },
}

/// A lex failure and the buffer position where it was detected.
pub(crate) type LexFailure = (LexError, usize);

/// Reads one token from `buf` starting at `*pos`, skipping whitespace.
///
/// On `Token::Eof` the position is left at the first byte of the unfinished token so the caller
/// can carry those bytes over to the next chunk. Numbers touching the end of the buffer are
/// unfinished because more digits may follow.
pub(crate) fn lex(buf: &[u8], pos: &mut usize, validate_utf8: bool) -> Result<Token, LexFailure> {
    while *pos < buf.len() && is_whitespace(buf[*pos]) {
        *pos += 1;
    }
    let start = *pos;
    let c = match buf.get(start) {
        Some(&c) => c,
        None => return Ok(Token::Eof),
    };

    let single = match c {
        b'{' => Some(Token::LeftBrace),
        b'}' => Some(Token::RightBrace),
        b'[' => Some(Token::LeftBracket),
        b']' => Some(Token::RightBracket),
        b',' => Some(Token::Comma),
        b':' => Some(Token::Colon),
        _ => None,
    };
    if let Some(tok) = single {
        *pos += 1;
        return Ok(tok);
    }

    let result = match c {
        b't' => literal(buf, start, b"true", Token::Bool(true)),
        b'f' => literal(buf, start, b"false", Token::Bool(false)),
        b'n' => literal(buf, start, b"null", Token::Null),
        b'"' => string(buf, start, validate_utf8),
        b'-' | b'0'..=b'9' => number(buf, start),
        _ => Err((LexError::InvalidChar, start + 1)),
    };

    match result {
        Ok((Token::Eof, _)) => Ok(Token::Eof),
        Ok((tok, end)) => {
            *pos = end;
            Ok(tok)
        }
        Err(e) => Err(e),
    }
}

fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

fn literal(buf: &[u8], start: usize, word: &[u8], tok: Token) -> Result<(Token, usize), LexFailure> {
    for (i, &expected) in word.iter().enumerate() {
        match buf.get(start + i) {
            None => return Ok((Token::Eof, start)),
            Some(&c) if c == expected => {}
            Some(_) => return Err((LexError::InvalidString, start + i + 1)),
        }
    }
    Ok((tok, start + word.len()))
}

fn string(buf: &[u8], start: usize, validate_utf8: bool) -> Result<(Token, usize), LexFailure> {
    let body_start = start + 1;
    let mut i = body_start;
    let mut escaped = false;
    loop {
        let c = match buf.get(i) {
            Some(&c) => c,
            None => return Ok((Token::Eof, start)),
        };
        match c {
            b'"' => break,
            b'\\' => {
                escaped = true;
                let e = match buf.get(i + 1) {
                    Some(&e) => e,
                    None => return Ok((Token::Eof, start)),
                };
                match e {
                    b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => i += 2,
                    b'u' => {
                        for k in 0..4 {
                            match buf.get(i + 2 + k) {
                                None => return Ok((Token::Eof, start)),
                                Some(h) if h.is_ascii_hexdigit() => {}
                                Some(_) => {
                                    return Err((LexError::StringInvalidHexChar, i + 3 + k))
                                }
                            }
                        }
                        i += 6;
                    }
                    _ => return Err((LexError::StringInvalidEscapedChar, i + 2)),
                }
            }
            0x00..=0x1f => return Err((LexError::StringInvalidJsonChar, i + 1)),
            _ => i += 1,
        }
    }

    if validate_utf8 {
        if let Err(e) = std::str::from_utf8(&buf[body_start..i]) {
            return Err((LexError::StringInvalidUtf8, body_start + e.valid_up_to() + 1));
        }
    }

    Ok((
        Token::String {
            body: body_start..i,
            escaped,
        },
        i + 1,
    ))
}

fn number(buf: &[u8], start: usize) -> Result<(Token, usize), LexFailure> {
    let mut i = start;
    let at = |i: usize| buf.get(i).copied();
    let digits = |mut i: usize| {
        while matches!(buf.get(i), Some(c) if c.is_ascii_digit()) {
            i += 1;
        }
        i
    };

    if at(i) == Some(b'-') {
        i += 1;
    }
    match at(i) {
        None => return Ok((Token::Eof, start)),
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => i = digits(i + 1),
        Some(_) => return Err((LexError::MissingIntegerAfterMinus, i + 1)),
    }

    let mut double = false;
    if at(i) == Some(b'.') {
        double = true;
        match at(i + 1) {
            None => return Ok((Token::Eof, start)),
            Some(c) if c.is_ascii_digit() => i = digits(i + 1),
            Some(_) => return Err((LexError::MissingIntegerAfterDecimal, i + 2)),
        }
    }

    if matches!(at(i), Some(b'e') | Some(b'E')) {
        double = true;
        i += 1;
        if matches!(at(i), Some(b'+') | Some(b'-')) {
            i += 1;
        }
        match at(i) {
            None => return Ok((Token::Eof, start)),
            Some(c) if c.is_ascii_digit() => i = digits(i),
            Some(_) => return Err((LexError::MissingIntegerAfterExponent, i + 1)),
        }
    }

    if i == buf.len() {
        return Ok((Token::Eof, start));
    }

    let range = start..i;
    Ok((
        if double {
            Token::Double(range)
        } else {
            Token::Integer(range)
        },
        i,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<Token> {
        let mut pos = 0;
        let mut out = Vec::new();
        loop {
            match lex(text.as_bytes(), &mut pos, true).unwrap() {
                Token::Eof => return out,
                tok => out.push(tok),
            }
        }
    }

    #[test]
    fn test_structural_and_literals() {
        assert_eq!(
            tokens(" { } [ ] , : true false null\t"),
            vec![
                Token::LeftBrace,
                Token::RightBrace,
                Token::LeftBracket,
                Token::RightBracket,
                Token::Comma,
                Token::Colon,
                Token::Bool(true),
                Token::Bool(false),
                Token::Null,
            ]
        );
    }

    #[test]
    fn test_numbers_need_a_terminator() {
        assert_eq!(tokens("12"), vec![]);
        assert_eq!(tokens("12 "), vec![Token::Integer(0..2)]);
        assert_eq!(tokens("-0.5e+3,"), vec![Token::Double(0..7), Token::Comma]);
    }

    #[test]
    fn test_malformed_numbers() {
        let cases = [
            ("-x", LexError::MissingIntegerAfterMinus),
            ("1.x", LexError::MissingIntegerAfterDecimal),
            ("1ex", LexError::MissingIntegerAfterExponent),
        ];
        for &(text, expected) in cases.iter() {
            let mut pos = 0;
            let err = lex(text.as_bytes(), &mut pos, true).unwrap_err();
            assert_eq!(err.0, expected, "{}", text);
        }
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            tokens(r#""plain" "a\"b\u00e9""#),
            vec![
                Token::String {
                    body: 1..6,
                    escaped: false
                },
                Token::String {
                    body: 9..19,
                    escaped: true
                },
            ]
        );

        let mut pos = 0;
        assert_eq!(lex(b"\"unfinished", &mut pos, true).unwrap(), Token::Eof);
        assert_eq!(pos, 0);
    }

    #[test]
    fn test_string_errors() {
        let cases: [(&[u8], LexError); 4] = [
            (b"\"a\\qb\"", LexError::StringInvalidEscapedChar),
            (b"\"\\u12g4\"", LexError::StringInvalidHexChar),
            (b"\"a\nb\"", LexError::StringInvalidJsonChar),
            (b"\"\xff\"", LexError::StringInvalidUtf8),
        ];
        for &(text, expected) in cases.iter() {
            let mut pos = 0;
            assert_eq!(lex(text, &mut pos, true).unwrap_err().0, expected);
        }

        let mut pos = 0;
        assert!(lex(b"\"\xff\"", &mut pos, false).is_ok());
    }

    #[test]
    fn test_bad_literals() {
        let mut pos = 0;
        assert_eq!(
            lex(b"trux", &mut pos, true).unwrap_err().0,
            LexError::InvalidString
        );
        let mut pos = 0;
        assert_eq!(lex(b"@", &mut pos, true).unwrap_err().0, LexError::InvalidChar);
        let mut pos = 0;
        assert_eq!(lex(b"tru", &mut pos, true).unwrap(), Token::Eof);
    }
}
