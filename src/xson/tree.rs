use super::parser::{Callbacks, ParseOptions, Parser};
use super::value::XsonValue;
use crate::errors::XsonError;
use std::ops::ControlFlow;

enum Frame {
    Array(Vec<XsonValue>),
    Object(Vec<(String, XsonValue)>, Option<String>),
}

/// Assembles parse events into a value tree. Open containers live on `stack`, so building is
/// as depth bounded as the parser feeding it.
#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Frame>,
    root: Option<XsonValue>,
}

impl TreeBuilder {
    fn add(&mut self, value: XsonValue) -> ControlFlow<()> {
        match self.stack.last_mut() {
            Some(Frame::Array(items)) => items.push(value),
            Some(Frame::Object(members, key)) => match key.take() {
                Some(k) => members.push((k, value)),
                None => return ControlFlow::Break(()),
            },
            None => self.root = Some(value),
        }
        ControlFlow::Continue(())
    }
}

impl Callbacks for TreeBuilder {
    fn raw_numbers(&self) -> bool {
        true
    }

    fn null(&mut self) -> ControlFlow<()> {
        self.add(XsonValue::Null)
    }

    fn boolean(&mut self, value: bool) -> ControlFlow<()> {
        self.add(XsonValue::from(value))
    }

    fn number(&mut self, raw: &str) -> ControlFlow<()> {
        let n = raw.parse::<f64>().unwrap_or(f64::NAN);
        self.add(XsonValue::Number(n))
    }

    fn string(&mut self, value: &str) -> ControlFlow<()> {
        self.add(XsonValue::from(value))
    }

    fn start_map(&mut self) -> ControlFlow<()> {
        self.stack.push(Frame::Object(Vec::new(), None));
        ControlFlow::Continue(())
    }

    fn map_key(&mut self, key: &str) -> ControlFlow<()> {
        match self.stack.last_mut() {
            Some(Frame::Object(_, slot)) => {
                *slot = Some(key.to_owned());
                ControlFlow::Continue(())
            }
            _ => ControlFlow::Break(()),
        }
    }

    fn end_map(&mut self) -> ControlFlow<()> {
        match self.stack.pop() {
            Some(Frame::Object(members, _)) => self.add(XsonValue::Object(members)),
            _ => ControlFlow::Break(()),
        }
    }

    fn start_array(&mut self) -> ControlFlow<()> {
        self.stack.push(Frame::Array(Vec::new()));
        ControlFlow::Continue(())
    }

    fn end_array(&mut self) -> ControlFlow<()> {
        match self.stack.pop() {
            Some(Frame::Array(items)) => self.add(XsonValue::Array(items)),
            _ => ControlFlow::Break(()),
        }
    }
}

impl XsonValue {
    /// Parses a complete JSON document.
    ///
    /// ```
    /// use ncollectd_core::xson::XsonValue;
    ///
    /// let doc = XsonValue::parse(r#"{"hosts": ["a", "b"], "port": 8080}"#).unwrap();
    /// assert_eq!(doc.object_find("port").and_then(|p| p.as_number()), Some(8080.0));
    /// assert_eq!(doc.object_find("hosts").and_then(|h| h.array_size()), Some(2));
    /// ```
    pub fn parse(text: &str) -> Result<XsonValue, XsonError> {
        XsonValue::parse_with(text.as_bytes(), ParseOptions::empty())
    }

    /// Parses with explicit options. With `ALLOW_MULTIPLE_VALUES` the last top-level value is
    /// returned; an empty partial document yields `Null`.
    pub fn parse_with(text: &[u8], options: ParseOptions) -> Result<XsonValue, XsonError> {
        let mut builder = TreeBuilder::default();
        let mut parser = Parser::new(options);
        parser.parse(text, &mut builder)?;
        parser.complete(&mut builder)?;
        Ok(builder.root.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::XsonErrorKind;

    #[test]
    fn test_parse_document() {
        let doc = XsonValue::parse(r#"{"a": [1, 2.5e1, "s", null], "b": {"c": false}}"#).unwrap();
        assert_eq!(
            doc,
            XsonValue::Object(vec![
                (
                    String::from("a"),
                    XsonValue::Array(vec![
                        XsonValue::Number(1.0),
                        XsonValue::Number(25.0),
                        XsonValue::from("s"),
                        XsonValue::Null,
                    ])
                ),
                (
                    String::from("b"),
                    XsonValue::Object(vec![(String::from("c"), XsonValue::False)])
                ),
            ])
        );
    }

    #[test]
    fn test_scalar_documents() {
        assert_eq!(XsonValue::parse("true").unwrap(), XsonValue::True);
        assert_eq!(XsonValue::parse(" \"x\" ").unwrap(), XsonValue::from("x"));
        assert_eq!(
            XsonValue::parse("99999999999999999999999999").unwrap(),
            XsonValue::Number(1e26)
        );
    }

    #[test]
    fn test_errors_are_reported() {
        let err = XsonValue::parse(r#"{"a": }"#).unwrap_err();
        assert_eq!(
            err.kind,
            XsonErrorKind::Parse("unallowed token at this point in JSON text")
        );
        assert!(XsonValue::parse("[[").is_err());
    }

    #[test]
    fn test_multiple_values_keep_last() {
        let v = XsonValue::parse_with(b"1 2 3", ParseOptions::ALLOW_MULTIPLE_VALUES).unwrap();
        assert_eq!(v, XsonValue::Number(3.0));
    }

    #[test]
    fn test_deep_document_fails_cleanly() {
        let deep = "[".repeat(10_000);
        assert!(XsonValue::parse(&deep).is_err());
    }
}
