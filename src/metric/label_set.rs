use crate::buf::StrBuf;
use crate::errors::{BufError, LabelError};
use crate::mql::util::{is_label_char, is_label_name};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A single owned `name="value"` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LabelPair {
    pub name: String,
    pub value: String,
}

/// Outcome of `LabelSet::add`. Adding never fails for an existing name, so callers that care
/// whether anything changed look here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddStatus {
    Inserted,
    Overwritten,

    /// An empty value was given for an existing label
    Removed,

    /// The label existed and overwriting was not requested, or an empty value was given for a
    /// label that does not exist
    Unchanged,
}

/// The identity of a time series: label pairs kept sorted by name with no duplicate names.
///
/// Every mutation keeps the pairs ordered (insertion is a binary search), so lookups, comparison
/// and marshalling never need an explicit sort. Values are never empty: adding an empty value
/// removes the label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LabelSet {
    pairs: Vec<LabelPair>,
}

impl LabelSet {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LabelPair> {
        self.pairs.iter()
    }

    fn search(&self, name: &str) -> Result<usize, usize> {
        self.pairs.binary_search_by(|p| p.name.as_str().cmp(name))
    }

    /// Looks up a pair by name.
    pub fn read(&self, name: &str) -> Option<&LabelPair> {
        self.search(name).ok().map(|idx| &self.pairs[idx])
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.read(name).map(|p| p.value.as_str())
    }

    /// Adds, replaces or removes a label.
    ///
    /// An empty `value` removes `name` if present. An existing name keeps its value unless
    /// `overwrite` is set. With `unescape` the value has `\\ \" \n \r \t` sequences resolved before
    /// it is stored.
    pub fn add(
        &mut self,
        name: &str,
        value: &str,
        overwrite: bool,
        unescape: bool,
    ) -> Result<AddStatus, LabelError> {
        match self.search(name) {
            Ok(idx) => {
                if value.is_empty() {
                    self.pairs.remove(idx);
                    Ok(AddStatus::Removed)
                } else if overwrite {
                    self.pairs[idx].value = copy_value(value, unescape)?;
                    Ok(AddStatus::Overwritten)
                } else {
                    Ok(AddStatus::Unchanged)
                }
            }
            Err(idx) => {
                if !is_label_name(name) {
                    return Err(LabelError::InvalidName(name.to_owned()));
                }
                if value.is_empty() {
                    return Ok(AddStatus::Unchanged);
                }
                self.pairs.try_reserve(1)?;
                let pair = LabelPair {
                    name: copy_value(name, false)?,
                    value: copy_value(value, unescape)?,
                };
                self.pairs.insert(idx, pair);
                Ok(AddStatus::Inserted)
            }
        }
    }

    /// Adds a label, replacing any previous value.
    pub fn set(&mut self, name: &str, value: &str) -> Result<AddStatus, LabelError> {
        self.add(name, value, true, false)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.search(name).ok()?;
        Some(self.pairs.remove(idx).value)
    }

    /// Unions `src` into this set, each pair following the `add` rules.
    pub fn add_set(&mut self, overwrite: bool, src: &LabelSet) -> Result<(), LabelError> {
        for pair in src.iter() {
            self.add(&pair.name, &pair.value, overwrite, false)?;
        }
        Ok(())
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), LabelError> {
        if self.search(to).is_ok() {
            return Err(LabelError::AlreadyExists(to.to_owned()));
        }
        let idx = self
            .search(from)
            .map_err(|_| LabelError::NotFound(from.to_owned()))?;
        if !is_label_name(to) {
            return Err(LabelError::InvalidName(to.to_owned()));
        }

        let mut pair = self.pairs.remove(idx);
        pair.name = to.to_owned();
        let dest = self.search(to).unwrap_or_else(|i| i);
        self.pairs.insert(dest, pair);
        Ok(())
    }

    /// Deep copy that either fully succeeds or reports `LabelError::Alloc` without producing a
    /// partial set.
    pub fn try_clone(&self) -> Result<LabelSet, LabelError> {
        let mut pairs = Vec::new();
        pairs.try_reserve_exact(self.pairs.len())?;
        for pair in self.pairs.iter() {
            if pair.name.is_empty() || pair.value.is_empty() {
                continue;
            }
            pairs.push(LabelPair {
                name: copy_value(&pair.name, false)?,
                value: copy_value(&pair.value, false)?,
            });
        }
        Ok(LabelSet { pairs })
    }

    /// Frees every pair, keeping the allocation of the set itself.
    pub fn reset(&mut self) {
        self.pairs.clear();
    }

    /// Length of the marshalled form without the enclosing braces.
    pub fn strlen(&self) -> usize {
        let pairs: usize = self
            .pairs
            .iter()
            .map(|p| {
                let escapes = p
                    .value
                    .bytes()
                    .filter(|b| matches!(b, b'"' | b'\\' | b'\n' | b'\r' | b'\t'))
                    .count();
                p.name.len() + 3 + p.value.len() + escapes
            })
            .sum();
        pairs + self.pairs.len().saturating_sub(1)
    }

    /// Writes `{name="value",...}` escaping `\ " \n \r \t` in values.
    pub fn marshal(&self, buf: &mut StrBuf<'_>) -> Result<(), BufError> {
        buf.putchar('{')?;
        for (i, pair) in self.pairs.iter().enumerate() {
            if i != 0 {
                buf.putchar(',')?;
            }
            buf.putstr(&pair.name)?;
            buf.putstr("=\"")?;
            buf.putescape_label(&pair.value)?;
            buf.putchar('"')?;
        }
        buf.putchar('}')
    }

    /// Parses the text form produced by `marshal` from the front of `input`, advancing it past
    /// the closing brace. Repeated names keep the last value.
    pub fn unmarshal(input: &mut &str) -> Result<LabelSet, LabelError> {
        let text = *input;
        let bytes = text.as_bytes();
        let err = |offset, reason| Err(LabelError::Unmarshal { offset, reason });

        if bytes.first() != Some(&b'{') {
            return err(0, "expected '{'");
        }

        let mut labels = LabelSet::new();
        let mut pos = 0;

        if bytes.get(1) == Some(&b'}') {
            *input = &text[2..];
            return Ok(labels);
        }

        let mut value = String::new();
        while pos < bytes.len() && (bytes[pos] == b'{' || bytes[pos] == b',') {
            pos += 1;

            let key_start = pos;
            while pos < bytes.len() && is_label_char(bytes[pos]) {
                pos += 1;
            }
            if pos == key_start {
                return err(pos, "expected a label name");
            }
            let key = &text[key_start..pos];

            if bytes.get(pos) != Some(&b'=') {
                return err(pos, "expected '=' after label name");
            }
            pos += 1;

            value.clear();
            pos = parse_label_value(text, pos, &mut value)?;
            labels.add(key, &value, true, false).map_err(|e| match e {
                LabelError::InvalidName(_) => LabelError::Unmarshal {
                    offset: key_start,
                    reason: "invalid label name",
                },
                e => e,
            })?;
        }

        if bytes.get(pos) != Some(&b'}') {
            return err(pos, "expected '}' or ','");
        }

        *input = &text[pos + 1..];
        Ok(labels)
    }

    /// A borrowing view over this set's strings.
    pub fn as_ref_view(&self) -> LabelSetRef<'_> {
        LabelSetRef {
            pairs: self
                .pairs
                .iter()
                .map(|p| LabelPairRef {
                    name: &p.name,
                    value: &p.value,
                })
                .collect(),
        }
    }
}

/// Reads a double quoted value starting at `pos`, returning the offset just past the closing
/// quote.
pub(crate) fn parse_label_value(
    text: &str,
    mut pos: usize,
    out: &mut String,
) -> Result<usize, LabelError> {
    let bytes = text.as_bytes();
    if bytes.get(pos) != Some(&b'"') {
        return Err(LabelError::Unmarshal {
            offset: pos,
            reason: "expected '\"' to open the label value",
        });
    }
    pos += 1;

    let mut run = pos;
    loop {
        let rel = memchr::memchr3(b'"', b'\\', b'\n', &bytes[pos..]);
        let at = match rel {
            Some(rel) => pos + rel,
            None => {
                return Err(LabelError::Unmarshal {
                    offset: bytes.len(),
                    reason: "unterminated label value",
                })
            }
        };

        match bytes[at] {
            b'"' => {
                out.push_str(&text[run..at]);
                return Ok(at + 1);
            }
            b'\n' => {
                return Err(LabelError::Unmarshal {
                    offset: at,
                    reason: "newline inside label value",
                })
            }
            _ => {
                out.push_str(&text[run..at]);
                let escaped = match text[at + 1..].chars().next() {
                    Some(c) => c,
                    None => {
                        return Err(LabelError::Unmarshal {
                            offset: bytes.len(),
                            reason: "unterminated label value",
                        })
                    }
                };
                out.push(match escaped {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    c => c,
                });
                pos = at + 1 + escaped.len_utf8();
                run = pos;
            }
        }
    }
}

fn copy_value(value: &str, unescape: bool) -> Result<String, LabelError> {
    let mut out = String::new();
    out.try_reserve_exact(value.len())?;
    if !unescape {
        out.push_str(value);
        return Ok(out);
    }

    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            None => break,
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
        }
    }
    Ok(out)
}

/// Sets order by size first, then pairwise by name and value.
impl Ord for LabelSet {
    fn cmp(&self, other: &Self) -> Ordering {
        self.pairs
            .len()
            .cmp(&other.pairs.len())
            .then_with(|| {
                for (a, b) in self.pairs.iter().zip(other.pairs.iter()) {
                    let ord = a.name.cmp(&b.name).then_with(|| a.value.cmp(&b.value));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            })
    }
}

impl PartialOrd for LabelSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LabelSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut buf = StrBuf::with_capacity(self.strlen() + 2);
        self.marshal(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(buf.as_str())
    }
}

impl FromStr for LabelSet {
    type Err = LabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s;
        let labels = LabelSet::unmarshal(&mut rest)?;
        if !rest.is_empty() {
            return Err(LabelError::Unmarshal {
                offset: s.len() - rest.len(),
                reason: "trailing characters after label set",
            });
        }
        Ok(labels)
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = &'a LabelPair;
    type IntoIter = std::slice::Iter<'a, LabelPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelPairRef<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

/// Label pairs borrowed from storage owned elsewhere. Unlike `LabelSet` the pairs stay in the
/// order they were pushed and are not validated; call `sort` before comparing or looking up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSetRef<'a> {
    pairs: Vec<LabelPairRef<'a>>,
}

impl<'a> LabelSetRef<'a> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, name: &'a str, value: &'a str) {
        self.pairs.push(LabelPairRef { name, value });
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LabelPairRef<'a>> {
        self.pairs.iter()
    }

    pub fn sort(&mut self) {
        self.pairs.sort_by(|a, b| a.name.cmp(b.name));
    }

    /// Binary search lookup, only meaningful after `sort`.
    pub fn read(&self, name: &str) -> Option<&LabelPairRef<'a>> {
        self.pairs
            .binary_search_by(|p| p.name.cmp(name))
            .ok()
            .map(|idx| &self.pairs[idx])
    }

    /// Copies the borrowed pairs into an owning set. Names are validated and later pairs win
    /// over earlier ones with the same name.
    pub fn to_owned_set(&self) -> Result<LabelSet, LabelError> {
        let mut set = LabelSet::new();
        for pair in self.pairs.iter() {
            set.add(pair.name, pair.value, true, false)?;
        }
        Ok(set)
    }

    /// Same ordering as `LabelSet`; both sides must be sorted.
    pub fn cmp_sorted(&self, other: &LabelSetRef<'_>) -> Ordering {
        self.pairs.len().cmp(&other.pairs.len()).then_with(|| {
            self.pairs
                .iter()
                .zip(other.pairs.iter())
                .map(|(a, b)| a.name.cmp(b.name).then_with(|| a.value.cmp(b.value)))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        })
    }
}

impl<'a> From<&'a LabelSet> for LabelSetRef<'a> {
    fn from(set: &'a LabelSet) -> Self {
        set.as_ref_view()
    }
}
