use super::lexer::{Lexer, Token};
use super::{ConfigFile, ConfigItem, ConfigValue};
use crate::errors::ConfigError;
use log::error;
use std::fs;
use std::path::Path;

/// Parses config text. `file` names the source for diagnostics and is shared by every node.
///
/// ```
/// use ncollectd_core::config::{parse_str, ConfigValue};
///
/// let root = parse_str("interval 10\nplugin cpu {\n  report-by-state true\n}\n", None).unwrap();
/// assert_eq!(root.children.len(), 2);
/// assert_eq!(root.children[0].values, vec![ConfigValue::Number(10.0)]);
/// ```
pub fn parse_str(text: &str, file: Option<ConfigFile>) -> Result<ConfigItem, ConfigError> {
    Parser {
        lexer: Lexer::new(text),
        peeked: None,
        file,
    }
    .parse()
}

/// Reads and parses a config file. Failures are logged and returned; no tree is produced.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<ConfigItem, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        error!("unable to read config file {}: {}", path.display(), e);
        ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    let file = ConfigFile::new(&path.to_string_lossy());
    parse_str(&text, Some(file)).map_err(|e| {
        error!("{}", e);
        e
    })
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<(Token, u32)>,
    file: Option<ConfigFile>,
}

impl<'a> Parser<'a> {
    fn error(&self, line: u32, message: String) -> ConfigError {
        ConfigError::Parse {
            file: self.file.clone(),
            line,
            message,
        }
    }

    fn next(&mut self) -> Result<(Token, u32), ConfigError> {
        if let Some(tok) = self.peeked.take() {
            return Ok(tok);
        }
        let file = self.file.clone();
        self.lexer
            .next_token()
            .map_err(|(line, message)| ConfigError::Parse {
                file,
                line,
                message,
            })
    }

    fn push_back(&mut self, tok: (Token, u32)) {
        self.peeked = Some(tok);
    }

    /// Blocks being filled are kept on an explicit stack so nesting depth is bounded by memory,
    /// not by the call stack.
    fn parse(mut self) -> Result<ConfigItem, ConfigError> {
        let mut stack: Vec<ConfigItem> = vec![ConfigItem {
            file: self.file.clone(),
            ..Default::default()
        }];

        loop {
            let (tok, line) = self.next()?;
            match tok {
                Token::Newline => continue,
                Token::Eof => {
                    if stack.len() > 1 {
                        let open = &stack[stack.len() - 1];
                        return Err(self.error(
                            line,
                            format!(
                                "missing '}}' for the '{}' block opened at line {}",
                                open.key, open.lineno
                            ),
                        ));
                    }
                    return stack
                        .pop()
                        .ok_or_else(|| self.error(line, String::from("empty parse stack")));
                }
                Token::CloseBrace => {
                    if stack.len() == 1 {
                        return Err(self.error(line, String::from("unbalanced closing brace")));
                    }
                    close_block(&mut stack);
                }
                Token::Word(key) => {
                    if !is_key(&key) {
                        return Err(self.error(line, format!("invalid option name '{}'", key)));
                    }
                    let mut item = ConfigItem {
                        key,
                        lineno: line,
                        file: self.file.clone(),
                        ..Default::default()
                    };
                    if self.statement_values(&mut item)? {
                        stack.push(item);
                    } else if let Some(parent) = stack.last_mut() {
                        parent.children.push(item);
                    }
                }
                Token::Quoted(_) | Token::Regex(_) | Token::OpenBrace => {
                    return Err(self.error(line, String::from("expected an option name")));
                }
            }
        }
    }

    /// Reads values up to the end of the statement. Returns true when the statement opens a
    /// block.
    fn statement_values(&mut self, item: &mut ConfigItem) -> Result<bool, ConfigError> {
        loop {
            let (tok, line) = self.next()?;
            match tok {
                Token::Word(word) => item.values.push(classify(word)),
                Token::Quoted(s) => item.values.push(ConfigValue::String(s)),
                Token::Regex(r) => item.values.push(ConfigValue::Regex(r)),
                Token::OpenBrace => return Ok(true),
                Token::Newline => return Ok(false),
                Token::CloseBrace | Token::Eof => {
                    self.push_back((tok, line));
                    return Ok(false);
                }
            }
        }
    }
}

fn close_block(stack: &mut Vec<ConfigItem>) {
    if let Some(done) = stack.pop() {
        if let Some(parent) = stack.last_mut() {
            parent.children.push(done);
        }
    }
}

fn is_key(word: &str) -> bool {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Bare words become numbers or booleans when they read as one, strings otherwise.
fn classify(word: String) -> ConfigValue {
    if let Some(n) = parse_number(&word) {
        return ConfigValue::Number(n);
    }
    match word.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" => ConfigValue::Boolean(true),
        "false" | "no" | "off" => ConfigValue::Boolean(false),
        _ => ConfigValue::String(word),
    }
}

fn parse_number(word: &str) -> Option<f64> {
    let (negative, digits) = match word.as_bytes().first() {
        Some(b'-') => (true, &word[1..]),
        Some(b'+') => (false, &word[1..]),
        _ => (false, word),
    };

    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        let v = u64::from_str_radix(hex, 16).ok()? as f64;
        return Some(if negative { -v } else { v });
    }

    let bytes = digits.as_bytes();
    let mut i = 0;
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut mantissa_digits = i - int_start;
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        mantissa_digits += i - frac_start;
    }
    if mantissa_digits == 0 {
        return None;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return None;
        }
    }
    if i != bytes.len() {
        return None;
    }

    // an overflowing exponent stays a word; `inf` would not read back as a number
    word.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ConfigItem {
        parse_str(text, None).unwrap()
    }

    #[test]
    fn test_values_are_classified() {
        let root = parse("opt 1 -2.5e3 0x1F yes Off \"7\" /x/ word 1.2.3\n");
        let opt = &root.children[0];
        assert_eq!(
            opt.values,
            vec![
                ConfigValue::Number(1.0),
                ConfigValue::Number(-2500.0),
                ConfigValue::Number(31.0),
                ConfigValue::Boolean(true),
                ConfigValue::Boolean(false),
                ConfigValue::String(String::from("7")),
                ConfigValue::Regex(String::from("x")),
                ConfigValue::String(String::from("word")),
                ConfigValue::String(String::from("1.2.3")),
            ]
        );
    }

    #[test]
    fn test_nested_blocks_and_flags() {
        let root = parse("a {\n  b 1 {\n    flag\n  }\n  c {}\n}\nd\n");
        assert_eq!(root.children.len(), 2);
        let a = &root.children[0];
        assert_eq!(a.key, "a");
        assert_eq!(a.children.len(), 2);
        assert_eq!(a.children[0].children[0].key, "flag");
        assert!(a.children[0].children[0].values.is_empty());
        assert!(a.children[1].children.is_empty());
        assert_eq!(root.children[1].lineno, 7);
    }

    #[test]
    fn test_single_line_block() {
        let root = parse("a { b 1 } c 2");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].children[0].values, vec![ConfigValue::Number(1.0)]);
        assert_eq!(root.children[1].key, "c");
    }

    #[test]
    fn test_unterminated_block_is_an_error() {
        match parse_str("key { ", None) {
            Err(ConfigError::Parse { ref message, .. }) => {
                assert!(message.contains("'key'"), "{}", message)
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unbalanced_close() {
        match parse_str("a 1\n}\n", None) {
            Err(ConfigError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_bad_statement_start() {
        assert!(parse_str("\"quoted\" 1\n", None).is_err());
        assert!(parse_str("9lives 1\n", None).is_err());
    }

    #[test]
    fn test_dump_reparses_equal() {
        let text = "global 1 \"two\" /th\\/ree/ false\nplugin x {\n  nested \"q\\\"uote\" {\n   leaf\n  }\n}\n";
        let tree = parse(text);
        let again = parse(&tree.to_string());
        assert_eq!(tree, again);
    }

    #[test]
    fn test_overflowing_number_stays_a_string() {
        let tree = parse("opt 1e999 -1e999 1e308\n");
        assert_eq!(
            tree.children[0].values,
            vec![
                ConfigValue::String(String::from("1e999")),
                ConfigValue::String(String::from("-1e999")),
                ConfigValue::Number(1e308),
            ]
        );
        assert_eq!(parse(&tree.to_string()), tree);
    }

    #[test]
    fn test_file_is_shared() {
        let file = ConfigFile::new("shared.conf");
        let root = parse_str("a 1\nb 2\n", Some(file.clone())).unwrap();
        assert_eq!(root.children[1].file_name(), "shared.conf");
        assert_eq!(file.ref_count(), 4);
    }
}
