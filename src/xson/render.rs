use super::value::XsonValue;
use crate::buf::StrBuf;
use crate::errors::{BufError, XsonError};
use std::fmt;

const INDENT: usize = 4;
const ARROW: &str = "                     (right here) ------^\n";

impl XsonValue {
    /// Appends the JSON text of this value to `buf`. Beautified output puts one member per line
    /// with four spaces of indentation per level and ends with a newline.
    pub fn render(&self, buf: &mut StrBuf<'_>, beautify: bool) -> Result<(), BufError> {
        render_value(self, buf, beautify, 0)?;
        if beautify {
            buf.putchar('\n')?;
        }
        Ok(())
    }

    pub fn to_json(&self, beautify: bool) -> Result<String, BufError> {
        let mut buf = StrBuf::new();
        self.render(&mut buf, beautify)?;
        Ok(buf.take())
    }
}

impl fmt::Display for XsonValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = self.to_json(false).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

fn newline_indent(buf: &mut StrBuf<'_>, beautify: bool, depth: usize) -> Result<(), BufError> {
    if beautify {
        buf.putchar('\n')?;
        buf.putxchar(' ', INDENT * depth)?;
    }
    Ok(())
}

fn render_string(buf: &mut StrBuf<'_>, s: &str) -> Result<(), BufError> {
    buf.putchar('"')?;
    buf.putescape_json(s)?;
    buf.putchar('"')
}

fn render_value(
    value: &XsonValue,
    buf: &mut StrBuf<'_>,
    beautify: bool,
    depth: usize,
) -> Result<(), BufError> {
    match *value {
        XsonValue::Null => buf.putstr("null"),
        XsonValue::True => buf.putstr("true"),
        XsonValue::False => buf.putstr("false"),
        XsonValue::String(ref s) => render_string(buf, s),
        // JSON has no spelling for nan or infinity
        XsonValue::Number(n) if !n.is_finite() => buf.putstr("null"),
        XsonValue::Number(n) => buf.putdouble(n),
        XsonValue::Array(ref items) => {
            if items.is_empty() {
                return buf.putstr("[]");
            }
            buf.putchar('[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.putchar(',')?;
                }
                newline_indent(buf, beautify, depth + 1)?;
                render_value(item, buf, beautify, depth + 1)?;
            }
            newline_indent(buf, beautify, depth)?;
            buf.putchar(']')
        }
        XsonValue::Object(ref members) => {
            if members.is_empty() {
                return buf.putstr("{}");
            }
            buf.putchar('{')?;
            for (i, (key, item)) in members.iter().enumerate() {
                if i > 0 {
                    buf.putchar(',')?;
                }
                newline_indent(buf, beautify, depth + 1)?;
                render_string(buf, key)?;
                buf.putchar(':')?;
                if beautify {
                    buf.putchar(' ')?;
                }
                render_value(item, buf, beautify, depth + 1)?;
            }
            newline_indent(buf, beautify, depth)?;
            buf.putchar('}')
        }
    }
}

impl XsonError {
    /// Describes the error. The verbose form adds the input around the failure point with an
    /// arrow under the byte where parsing stopped.
    ///
    /// ```
    /// use ncollectd_core::xson::XsonValue;
    ///
    /// let text = r#"{"a": tru}"#;
    /// let err = XsonValue::parse(text).unwrap_err();
    /// let msg = err.render(text.as_bytes(), true);
    /// assert!(msg.starts_with("lexical error: invalid string in json text.\n"));
    /// assert!(msg.ends_with("(right here) ------^\n"));
    /// ```
    pub fn render(&self, text: &[u8], verbose: bool) -> String {
        let mut out = format!("{}\n", self);
        if !verbose {
            return out;
        }

        let offset = self.offset;
        let spaces = if offset < 30 { 40 - offset } else { 10 };
        let end = (offset + 30).min(text.len());
        let start = offset.saturating_sub(30).min(end);

        out.push_str(&" ".repeat(spaces));
        let window: Vec<u8> = text[start..end]
            .iter()
            .map(|&c| if c == b'\n' || c == b'\r' { b' ' } else { c })
            .collect();
        out.push_str(&String::from_utf8_lossy(&window));
        out.push('\n');
        out.push_str(ARROW);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> XsonValue {
        XsonValue::Object(vec![
            (String::from("a"), XsonValue::Number(1.0)),
            (
                String::from("b"),
                XsonValue::Array(vec![XsonValue::Number(0.5), XsonValue::from("q\"")]),
            ),
            (String::from("c"), XsonValue::Object(vec![])),
        ])
    }

    #[test]
    fn test_compact() {
        assert_eq!(
            sample().to_json(false).unwrap(),
            r#"{"a":1,"b":[0.5,"q\""],"c":{}}"#
        );
        assert_eq!(sample().to_string(), r#"{"a":1,"b":[0.5,"q\""],"c":{}}"#);
    }

    #[test]
    fn test_beautify() {
        let expected = "{\n    \"a\": 1,\n    \"b\": [\n        0.5,\n        \"q\\\"\"\n    ],\n    \"c\": {}\n}\n";
        assert_eq!(sample().to_json(true).unwrap(), expected);
    }

    #[test]
    fn test_rendered_text_parses_back() {
        let text = sample().to_json(true).unwrap();
        assert_eq!(XsonValue::parse(&text).unwrap(), sample());
    }

    #[test]
    fn test_non_finite_numbers() {
        let v = XsonValue::Array(vec![XsonValue::Number(f64::NAN)]);
        assert_eq!(v.to_json(false).unwrap(), "[null]");
    }

    #[test]
    fn test_error_render_window() {
        let text = r#"{"key": tru!}"#;
        let err = XsonValue::parse(text).unwrap_err();
        assert_eq!(err.offset, 12);
        let msg = err.render(text.as_bytes(), true);
        let lines: Vec<&str> = msg.lines().collect();
        assert_eq!(lines[0], "lexical error: invalid string in json text.");
        assert_eq!(lines[1], format!("{}{}", " ".repeat(28), text));
        assert_eq!(lines[2].find('^'), Some(40));

        assert_eq!(
            err.render(text.as_bytes(), false),
            "lexical error: invalid string in json text.\n"
        );
    }

    #[test]
    fn test_error_render_long_input() {
        let text = format!("[{}x]", "1,".repeat(40));
        let err = XsonValue::parse(&text).unwrap_err();
        let msg = err.render(text.as_bytes(), true);
        let lines: Vec<&str> = msg.lines().collect();
        assert!(lines[1].starts_with("          ,1,"));
        assert!(lines[1].ends_with("1,x]"));
        assert_eq!(lines[1].len(), 10 + 31);
    }
}
