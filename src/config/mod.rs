//! The configuration tree.
//!
//! A config file is a sequence of statements `key [value ...] [{ statements }]`. Parsing yields a
//! root `ConfigItem` with an empty key whose children are the file scope statements. Nodes own
//! their children; there are no parent links; code that needs the enclosing blocks gets them
//! from `ConfigItem::visit`.

mod getters;
mod lexer;
mod parser;

use crate::buf::{format_double, StrBuf};
use crate::errors::BufError;
use std::fmt;
use std::sync::Arc;

pub use self::parser::{parse_file, parse_str};

/// Name of the file a node was read from, shared by every node of that file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigFile(Arc<str>);

impl ConfigFile {
    pub fn new(name: &str) -> Self {
        ConfigFile(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Number of nodes (and other holders) sharing this name.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Number(f64),
    Boolean(bool),

    /// Source text of a `/.../` literal, compiled on demand by `ConfigItem::get_regex`
    Regex(String),
}

impl ConfigValue {
    pub fn type_name(&self) -> &'static str {
        match *self {
            ConfigValue::String(_) => "string",
            ConfigValue::Number(_) => "number",
            ConfigValue::Boolean(_) => "boolean",
            ConfigValue::Regex(_) => "regex",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            ConfigValue::String(ref s) => Some(s),
            _ => None,
        }
    }

    fn dump(&self, buf: &mut StrBuf<'_>) -> Result<(), BufError> {
        match *self {
            ConfigValue::String(ref s) => {
                buf.putchar('"')?;
                buf.putescape_label(s)?;
                buf.putchar('"')
            }
            ConfigValue::Number(n) => buf.putstr(&format_double(n)),
            ConfigValue::Boolean(b) => buf.putstr(if b { "true" } else { "false" }),
            ConfigValue::Regex(ref r) => {
                buf.putchar('/')?;
                let mut start = 0;
                for (i, c) in r.char_indices() {
                    if c == '/' {
                        buf.putstr(&r[start..i])?;
                        buf.putstr("\\/")?;
                        start = i + 1;
                    }
                }
                buf.putstr(&r[start..])?;
                buf.putchar('/')
            }
        }
    }
}

/// One statement of a config file. Equality compares keys, values and children only, so trees
/// read from different files or re-indented text compare equal.
#[derive(Debug, Clone, Default)]
pub struct ConfigItem {
    pub key: String,
    pub values: Vec<ConfigValue>,
    pub children: Vec<ConfigItem>,
    pub lineno: u32,
    pub file: Option<ConfigFile>,
}

impl PartialEq for ConfigItem {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.values == other.values && self.children == other.children
    }
}

impl ConfigItem {
    pub fn new(key: &str) -> Self {
        ConfigItem {
            key: key.to_owned(),
            ..Default::default()
        }
    }

    pub fn with_values(key: &str, values: Vec<ConfigValue>) -> Self {
        ConfigItem {
            key: key.to_owned(),
            values,
            ..Default::default()
        }
    }

    /// File name for diagnostics, `<string>` for trees parsed from memory.
    pub fn file_name(&self) -> &str {
        self.file.as_ref().map(|f| f.name()).unwrap_or("<string>")
    }

    /// First child with a key matching `key` case-insensitively.
    pub fn child(&self, key: &str) -> Option<&ConfigItem> {
        self.children
            .iter()
            .find(|c| c.key.eq_ignore_ascii_case(key))
    }

    /// Walks the subtree depth first. The callback receives each node below `self` together with
    /// the chain of its ancestors, outermost first, starting with `self`.
    pub fn visit<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a ConfigItem, &[&'a ConfigItem]),
    {
        let mut ancestors = vec![self];
        visit_children(self, &mut ancestors, f);
    }

    /// Writes the subtree as config text. The root item (empty key) writes only its children.
    pub fn dump(&self, buf: &mut StrBuf<'_>) -> Result<(), BufError> {
        if self.key.is_empty() {
            for child in self.children.iter() {
                child.dump_level(buf, 0)?;
            }
            Ok(())
        } else {
            self.dump_level(buf, 0)
        }
    }

    fn dump_level(&self, buf: &mut StrBuf<'_>, level: usize) -> Result<(), BufError> {
        buf.putxchar(' ', level * 4)?;
        buf.putstr(&self.key)?;
        for value in self.values.iter() {
            buf.putchar(' ')?;
            value.dump(buf)?;
        }

        if self.children.is_empty() {
            return buf.putchar('\n');
        }

        buf.putstr(" {\n")?;
        for child in self.children.iter() {
            child.dump_level(buf, level + 1)?;
        }
        buf.putxchar(' ', level * 4)?;
        buf.putstr("}\n")
    }
}

fn visit_children<'a, F>(item: &'a ConfigItem, ancestors: &mut Vec<&'a ConfigItem>, f: &mut F)
where
    F: FnMut(&'a ConfigItem, &[&'a ConfigItem]),
{
    for child in item.children.iter() {
        f(child, ancestors);
        if !child.children.is_empty() {
            ancestors.push(child);
            visit_children(child, ancestors, f);
            ancestors.pop();
        }
    }
}

impl fmt::Display for ConfigItem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = StrBuf::new();
        self.dump(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(buf.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> ConfigItem {
        let mut root = ConfigItem::new("");
        let mut plugin = ConfigItem::with_values(
            "plugin",
            vec![ConfigValue::String(String::from("cpu"))],
        );
        plugin.children.push(ConfigItem::with_values(
            "report-by-cpu",
            vec![ConfigValue::Boolean(true)],
        ));
        plugin.children.push(ConfigItem::with_values(
            "match",
            vec![
                ConfigValue::Regex(String::from("^cpu/[0-9]+$")),
                ConfigValue::Number(2.5),
            ],
        ));
        root.children.push(ConfigItem::with_values(
            "interval",
            vec![ConfigValue::Number(10.0)],
        ));
        root.children.push(plugin);
        root
    }

    #[test]
    fn test_dump_indents_four_spaces() {
        let text = sample_tree().to_string();
        assert_eq!(
            text,
            "interval 10\nplugin \"cpu\" {\n    report-by-cpu true\n    match /^cpu\\/[0-9]+$/ 2.5\n}\n"
        );
    }

    #[test]
    fn test_dump_escapes_strings() {
        let item = ConfigItem::with_values(
            "say",
            vec![ConfigValue::String(String::from("a \"b\"\\\n"))],
        );
        assert_eq!(item.to_string(), "say \"a \\\"b\\\"\\\\\\n\"\n");
    }

    #[test]
    fn test_equality_ignores_location() {
        let mut a = ConfigItem::new("key");
        let mut b = a.clone();
        a.lineno = 3;
        a.file = Some(ConfigFile::new("/etc/a.conf"));
        b.lineno = 9;
        assert_eq!(a, b);
        b.values.push(ConfigValue::Boolean(false));
        assert_ne!(a, b);
    }

    #[test]
    fn test_clone_shares_file_name() {
        let file = ConfigFile::new("x.conf");
        let mut item = ConfigItem::new("k");
        item.file = Some(file.clone());
        let copy = item.clone();
        assert_eq!(file.ref_count(), 3);
        drop(item);
        drop(copy);
        assert_eq!(file.ref_count(), 1);
    }

    #[test]
    fn test_visit_reports_ancestors() {
        let tree = sample_tree();
        let mut seen = Vec::new();
        tree.visit(&mut |item, ancestors| {
            let path: Vec<&str> = ancestors.iter().map(|a| a.key.as_str()).collect();
            seen.push((item.key.clone(), path.join("/")));
        });
        assert_eq!(
            seen,
            vec![
                (String::from("interval"), String::from("")),
                (String::from("plugin"), String::from("")),
                (String::from("report-by-cpu"), String::from("/plugin")),
                (String::from("match"), String::from("/plugin")),
            ]
        );
    }

    #[test]
    fn test_child_lookup_is_case_insensitive() {
        let tree = sample_tree();
        assert!(tree.child("PLUGIN").is_some());
        assert!(tree.child("missing").is_none());
    }
}
