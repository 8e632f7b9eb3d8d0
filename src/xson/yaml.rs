use super::value::XsonValue;
use crate::buf::StrBuf;
use crate::errors::BufError;

const INDENT: usize = 2;

impl XsonValue {
    /// Appends this value as a block style YAML document. Strings are always double quoted
    /// with JSON escapes, which YAML reads back unchanged; keys are quoted only when a plain
    /// scalar would read as something else.
    pub fn render_yaml(&self, buf: &mut StrBuf<'_>) -> Result<(), BufError> {
        match *self {
            XsonValue::Object(ref members) if !members.is_empty() => {
                render_members(members, buf, 0)
            }
            XsonValue::Array(ref items) if !items.is_empty() => render_items(items, buf, 0),
            ref scalar => {
                render_scalar(scalar, buf)?;
                buf.putchar('\n')
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String, BufError> {
        let mut buf = StrBuf::new();
        self.render_yaml(&mut buf)?;
        Ok(buf.take())
    }
}

fn is_plain_key(key: &str) -> bool {
    let mut bytes = key.bytes();
    let first_ok = bytes
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == b'_');
    let reserved = matches!(
        key.to_ascii_lowercase().as_str(),
        "true" | "false" | "null" | "yes" | "no" | "on" | "off" | "y" | "n"
    );
    first_ok
        && !reserved
        && bytes.all(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'-' || c == b'.')
}

fn render_string(buf: &mut StrBuf<'_>, s: &str) -> Result<(), BufError> {
    buf.putchar('"')?;
    buf.putescape_json(s)?;
    buf.putchar('"')
}

fn render_scalar(value: &XsonValue, buf: &mut StrBuf<'_>) -> Result<(), BufError> {
    match *value {
        XsonValue::Null => buf.putstr("null"),
        XsonValue::True => buf.putstr("true"),
        XsonValue::False => buf.putstr("false"),
        XsonValue::String(ref s) => render_string(buf, s),
        XsonValue::Number(n) if n.is_nan() => buf.putstr(".nan"),
        XsonValue::Number(n) if n.is_infinite() => {
            buf.putstr(if n > 0.0 { ".inf" } else { "-.inf" })
        }
        XsonValue::Number(n) => buf.putdouble(n),
        XsonValue::Object(_) => buf.putstr("{}"),
        XsonValue::Array(_) => buf.putstr("[]"),
    }
}

/// Writes `value` after a `key:` or `-` already on the line.
fn render_node(value: &XsonValue, buf: &mut StrBuf<'_>, indent: usize) -> Result<(), BufError> {
    match *value {
        XsonValue::Object(ref members) if !members.is_empty() => {
            buf.putchar('\n')?;
            render_members(members, buf, indent)
        }
        XsonValue::Array(ref items) if !items.is_empty() => {
            buf.putchar('\n')?;
            render_items(items, buf, indent)
        }
        ref scalar => {
            buf.putchar(' ')?;
            render_scalar(scalar, buf)?;
            buf.putchar('\n')
        }
    }
}

fn render_members(
    members: &[(String, XsonValue)],
    buf: &mut StrBuf<'_>,
    indent: usize,
) -> Result<(), BufError> {
    for (key, value) in members {
        buf.putxchar(' ', indent)?;
        if is_plain_key(key) {
            buf.putstr(key)?;
        } else {
            render_string(buf, key)?;
        }
        buf.putchar(':')?;
        render_node(value, buf, indent + INDENT)?;
    }
    Ok(())
}

fn render_items(items: &[XsonValue], buf: &mut StrBuf<'_>, indent: usize) -> Result<(), BufError> {
    for item in items {
        buf.putxchar(' ', indent)?;
        buf.putchar('-')?;
        render_node(item, buf, indent + INDENT)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_document() {
        let value = XsonValue::parse(
            r#"{"name":"node","labels":{"job":"node","true":"x"},"points":[[1,0.5],[]],
               "targets":[{"host":"a","port":9100},"b"],"empty":{},"nothing":null}"#,
        )
        .unwrap();
        let expected = "\
name: \"node\"
labels:
  job: \"node\"
  \"true\": \"x\"
points:
  -
    - 1
    - 0.5
  - []
targets:
  -
    host: \"a\"
    port: 9100
  - \"b\"
empty: {}
nothing: null
";
        assert_eq!(value.to_yaml().unwrap(), expected);
    }

    #[test]
    fn test_scalars() {
        assert_eq!(XsonValue::from("a\"b\n").to_yaml().unwrap(), "\"a\\\"b\\n\"\n");
        assert_eq!(XsonValue::Number(f64::NEG_INFINITY).to_yaml().unwrap(), "-.inf\n");
        assert_eq!(XsonValue::Array(vec![]).to_yaml().unwrap(), "[]\n");
        assert_eq!(
            XsonValue::Array(vec![XsonValue::True, XsonValue::Number(f64::NAN)])
                .to_yaml()
                .unwrap(),
            "- true\n- .nan\n"
        );
    }

    #[test]
    fn test_fixed_buffer_overflow() {
        let mut storage = [0u8; 8];
        let mut buf = StrBuf::fixed(&mut storage);
        let value = XsonValue::Object(vec![(String::from("key"), XsonValue::from("long value"))]);
        assert!(matches!(value.render_yaml(&mut buf), Err(BufError::Full { .. })));
    }
}
