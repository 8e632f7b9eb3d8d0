use crate::buf::format_double;
use crate::errors::XsonTypeError;

/// An in-memory JSON document. Objects keep their members in document order and may hold
/// repeated keys; lookups return the first match.
#[derive(Debug, Clone, PartialEq)]
pub enum XsonValue {
    Null,
    String(String),
    Number(f64),
    Object(Vec<(String, XsonValue)>),
    Array(Vec<XsonValue>),
    True,
    False,
}

impl Default for XsonValue {
    fn default() -> Self {
        XsonValue::Null
    }
}

impl From<bool> for XsonValue {
    fn from(b: bool) -> Self {
        if b {
            XsonValue::True
        } else {
            XsonValue::False
        }
    }
}

impl From<f64> for XsonValue {
    fn from(n: f64) -> Self {
        XsonValue::Number(n)
    }
}

impl From<&str> for XsonValue {
    fn from(s: &str) -> Self {
        XsonValue::String(s.to_owned())
    }
}

impl From<String> for XsonValue {
    fn from(s: String) -> Self {
        XsonValue::String(s)
    }
}

impl XsonValue {
    pub fn type_name(&self) -> &'static str {
        match *self {
            XsonValue::Null => "null",
            XsonValue::String(_) => "string",
            XsonValue::Number(_) => "number",
            XsonValue::Object(_) => "object",
            XsonValue::Array(_) => "array",
            XsonValue::True => "true",
            XsonValue::False => "false",
        }
    }

    fn type_error(&self, expected: &'static str) -> XsonTypeError {
        XsonTypeError {
            expected,
            found: self.type_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(*self, XsonValue::Null)
    }

    pub fn is_string(&self) -> bool {
        matches!(*self, XsonValue::String(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(*self, XsonValue::Number(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(*self, XsonValue::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(*self, XsonValue::Array(_))
    }

    pub fn is_true(&self) -> bool {
        matches!(*self, XsonValue::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(*self, XsonValue::False)
    }

    pub fn is_boolean(&self) -> bool {
        self.is_true() || self.is_false()
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            XsonValue::String(ref s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match *self {
            XsonValue::Number(n) => Some(n),
            _ => None,
        }
    }

    /// First member named `key`, when this is an object.
    pub fn object_find(&self, key: &str) -> Option<&XsonValue> {
        match *self {
            XsonValue::Object(ref members) => {
                members.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    pub fn object_find_mut(&mut self, key: &str) -> Option<&mut XsonValue> {
        match *self {
            XsonValue::Object(ref mut members) => {
                members.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    pub fn object_size(&self) -> Option<usize> {
        match *self {
            XsonValue::Object(ref members) => Some(members.len()),
            _ => None,
        }
    }

    pub fn object_append(&mut self, key: &str, value: XsonValue) -> Result<(), XsonTypeError> {
        match *self {
            XsonValue::Object(ref mut members) => {
                members.push((key.to_owned(), value));
                Ok(())
            }
            _ => Err(self.type_error("object")),
        }
    }

    pub fn array_at(&self, idx: usize) -> Option<&XsonValue> {
        match *self {
            XsonValue::Array(ref items) => items.get(idx),
            _ => None,
        }
    }

    pub fn array_size(&self) -> Option<usize> {
        match *self {
            XsonValue::Array(ref items) => Some(items.len()),
            _ => None,
        }
    }

    pub fn array_append(&mut self, value: XsonValue) -> Result<(), XsonTypeError> {
        match *self {
            XsonValue::Array(ref mut items) => {
                items.push(value);
                Ok(())
            }
            _ => Err(self.type_error("array")),
        }
    }

    /// Converts a scalar to a number in place: null and false are 0, true is 1 and strings are
    /// parsed. Objects, arrays and unparsable strings are left untouched.
    pub fn to_number(&mut self) -> Result<(), XsonTypeError> {
        let n = match *self {
            XsonValue::Number(_) => return Ok(()),
            XsonValue::Null | XsonValue::False => 0.0,
            XsonValue::True => 1.0,
            XsonValue::String(ref s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| self.type_error("number"))?,
            XsonValue::Object(_) | XsonValue::Array(_) => return Err(self.type_error("scalar")),
        };
        *self = XsonValue::Number(n);
        Ok(())
    }

    /// Converts a scalar to its string form in place.
    pub fn to_string_value(&mut self) -> Result<(), XsonTypeError> {
        let s = match *self {
            XsonValue::String(_) => return Ok(()),
            XsonValue::Null => String::from("null"),
            XsonValue::True => String::from("true"),
            XsonValue::False => String::from("false"),
            XsonValue::Number(n) => format_double(n),
            XsonValue::Object(_) | XsonValue::Array(_) => return Err(self.type_error("scalar")),
        };
        *self = XsonValue::String(s);
        Ok(())
    }

    /// Converts a scalar to a boolean in place: non-empty strings and non-zero numbers are true.
    pub fn to_boolean(&mut self) -> Result<(), XsonTypeError> {
        let b = match *self {
            XsonValue::True | XsonValue::False => return Ok(()),
            XsonValue::Null => false,
            XsonValue::String(ref s) => !s.is_empty(),
            XsonValue::Number(n) => n != 0.0,
            XsonValue::Object(_) | XsonValue::Array(_) => return Err(self.type_error("scalar")),
        };
        *self = XsonValue::from(b);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let mut obj = XsonValue::Object(Vec::new());
        obj.object_append("a", XsonValue::from(1.0)).unwrap();
        obj.object_append("a", XsonValue::from(2.0)).unwrap();
        obj.object_append("list", XsonValue::Array(Vec::new())).unwrap();
        obj.object_find_mut("list")
            .unwrap()
            .array_append(XsonValue::from("x"))
            .unwrap();

        assert_eq!(obj.object_size(), Some(3));
        assert_eq!(obj.object_find("a"), Some(&XsonValue::Number(1.0)));
        assert_eq!(obj.object_find("missing"), None);
        let list = obj.object_find("list").unwrap();
        assert_eq!(list.array_size(), Some(1));
        assert_eq!(list.array_at(0).and_then(|v| v.as_str()), Some("x"));
        assert_eq!(list.array_at(1), None);
    }

    #[test]
    fn test_append_to_wrong_kind() {
        let mut v = XsonValue::Null;
        let err = v.array_append(XsonValue::True).unwrap_err();
        assert_eq!(err.to_string(), "expected json array, found null");
        assert!(XsonValue::from(1.0)
            .object_append("k", XsonValue::Null)
            .is_err());
    }

    #[test]
    fn test_to_number() {
        let cases = vec![
            (XsonValue::Null, 0.0),
            (XsonValue::True, 1.0),
            (XsonValue::False, 0.0),
            (XsonValue::from(" 2.5 "), 2.5),
            (XsonValue::from(7.0), 7.0),
        ];
        for (mut v, expected) in cases {
            v.to_number().unwrap();
            assert_eq!(v, XsonValue::Number(expected));
        }

        let mut bad = XsonValue::from("abc");
        assert!(bad.to_number().is_err());
        assert_eq!(bad, XsonValue::from("abc"));
        assert!(XsonValue::Array(vec![]).to_number().is_err());
    }

    #[test]
    fn test_to_string_and_boolean() {
        let mut v = XsonValue::from(3.0);
        v.to_string_value().unwrap();
        assert_eq!(v, XsonValue::from("3"));

        let mut v = XsonValue::False;
        v.to_string_value().unwrap();
        assert_eq!(v, XsonValue::from("false"));

        let cases = vec![
            (XsonValue::Null, false),
            (XsonValue::from(""), false),
            (XsonValue::from("no"), true),
            (XsonValue::from(0.0), false),
            (XsonValue::from(-1.0), true),
        ];
        for (mut v, expected) in cases {
            v.to_boolean().unwrap();
            assert_eq!(v, XsonValue::from(expected));
        }
        assert!(XsonValue::Object(vec![]).to_boolean().is_err());
    }
}
