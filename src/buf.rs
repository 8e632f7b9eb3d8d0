use crate::errors::BufError;
use std::fmt;

const INITIAL_CAPACITY: usize = 512;
const PAGE_SIZE: usize = 4096;

enum Storage<'a> {
    Growable(String),
    Fixed { buf: &'a mut [u8], len: usize },
}

/// String builder used by every text producer in the crate (label sets, config dumps, JSON
/// rendering).
///
/// A growable buffer starts at 512 bytes and doubles until it reaches a page, after which it grows
/// a page at a time. A fixed buffer writes into caller provided storage and never allocates: a
/// write that does not fit fails with `BufError::Full` and leaves the contents untouched.
pub struct StrBuf<'a> {
    storage: Storage<'a>,
}

impl Default for StrBuf<'static> {
    fn default() -> Self {
        StrBuf::new()
    }
}

impl StrBuf<'static> {
    pub fn new() -> Self {
        StrBuf {
            storage: Storage::Growable(String::new()),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        StrBuf {
            storage: Storage::Growable(String::with_capacity(capacity)),
        }
    }
}

impl<'a> StrBuf<'a> {
    pub fn fixed(buf: &'a mut [u8]) -> StrBuf<'a> {
        StrBuf {
            storage: Storage::Fixed { buf, len: 0 },
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self.storage, Storage::Fixed { .. })
    }

    pub fn len(&self) -> usize {
        match self.storage {
            Storage::Growable(ref s) => s.len(),
            Storage::Fixed { len, .. } => len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        match self.storage {
            Storage::Growable(ref s) => s.capacity(),
            Storage::Fixed { ref buf, .. } => buf.len(),
        }
    }

    pub fn as_str(&self) -> &str {
        match self.storage {
            Storage::Growable(ref s) => s.as_str(),
            // Only whole `&str` writes ever land in the slice.
            Storage::Fixed { ref buf, len } => std::str::from_utf8(&buf[..len]).unwrap_or(""),
        }
    }

    /// Takes the contents out, leaving the buffer empty.
    pub fn take(&mut self) -> String {
        match self.storage {
            Storage::Growable(ref mut s) => std::mem::take(s),
            Storage::Fixed { .. } => {
                let s = self.as_str().to_owned();
                self.reset();
                s
            }
        }
    }

    pub fn reset(&mut self) {
        match self.storage {
            Storage::Growable(ref mut s) => s.clear(),
            Storage::Fixed { ref mut len, .. } => *len = 0,
        }
    }

    /// Makes room for `extra` more bytes.
    fn reserve(&mut self, extra: usize) -> Result<(), BufError> {
        match self.storage {
            Storage::Growable(ref mut s) => {
                let need = s.len().checked_add(extra).ok_or(BufError::Alloc)?;
                if need <= s.capacity() {
                    return Ok(());
                }
                let target = grow_to(s.capacity(), need);
                s.try_reserve_exact(target - s.len())?;
                Ok(())
            }
            Storage::Fixed { ref buf, len } => {
                if len + extra > buf.len() {
                    Err(BufError::Full {
                        capacity: buf.len(),
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn putstr(&mut self, s: &str) -> Result<(), BufError> {
        self.reserve(s.len())?;
        match self.storage {
            Storage::Growable(ref mut g) => g.push_str(s),
            Storage::Fixed {
                ref mut buf,
                ref mut len,
            } => {
                buf[*len..*len + s.len()].copy_from_slice(s.as_bytes());
                *len += s.len();
            }
        }
        Ok(())
    }

    /// Appends at most `n` bytes of `s`, backing off to a character boundary.
    pub fn putnstr(&mut self, s: &str, n: usize) -> Result<(), BufError> {
        if n >= s.len() {
            return self.putstr(s);
        }
        let mut end = n;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.putstr(&s[..end])
    }

    pub fn putchar(&mut self, c: char) -> Result<(), BufError> {
        let mut tmp = [0u8; 4];
        self.putstr(c.encode_utf8(&mut tmp))
    }

    /// Appends `c` repeated `n` times.
    pub fn putxchar(&mut self, c: char, n: usize) -> Result<(), BufError> {
        self.reserve(c.len_utf8() * n)?;
        for _ in 0..n {
            self.putchar(c)?;
        }
        Ok(())
    }

    pub fn putint(&mut self, v: i64) -> Result<(), BufError> {
        self.putstr(&v.to_string())
    }

    pub fn putuint(&mut self, v: u64) -> Result<(), BufError> {
        self.putstr(&v.to_string())
    }

    pub fn putdouble(&mut self, v: f64) -> Result<(), BufError> {
        self.putstr(&format_double(v))
    }

    /// Appends `s` escaping the characters that are special inside a quoted label value.
    pub fn putescape_label(&mut self, s: &str) -> Result<(), BufError> {
        let mut start = 0;
        for (i, b) in s.bytes().enumerate() {
            let esc = match b {
                b'\\' => "\\\\",
                b'"' => "\\\"",
                b'\n' => "\\n",
                b'\r' => "\\r",
                b'\t' => "\\t",
                _ => continue,
            };
            self.putstr(&s[start..i])?;
            self.putstr(esc)?;
            start = i + 1;
        }
        self.putstr(&s[start..])
    }

    /// Appends `s` as the body of a JSON string (without the surrounding quotes).
    pub fn putescape_json(&mut self, s: &str) -> Result<(), BufError> {
        let mut start = 0;
        for (i, b) in s.bytes().enumerate() {
            let esc = match b {
                b'\\' => "\\\\",
                b'"' => "\\\"",
                b'\n' => "\\n",
                b'\r' => "\\r",
                b'\t' => "\\t",
                0x08 => "\\b",
                0x0c => "\\f",
                0x00..=0x1f => {
                    self.putstr(&s[start..i])?;
                    self.putstr(&format!("\\u{:04x}", b))?;
                    start = i + 1;
                    continue;
                }
                _ => continue,
            };
            self.putstr(&s[start..i])?;
            self.putstr(esc)?;
            start = i + 1;
        }
        self.putstr(&s[start..])
    }
}

impl<'a> fmt::Write for StrBuf<'a> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.putstr(s).map_err(|_| fmt::Error)
    }
}

impl<'a> fmt::Debug for StrBuf<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StrBuf")
            .field("fixed", &self.is_fixed())
            .field("data", &self.as_str())
            .finish()
    }
}

fn grow_to(current: usize, need: usize) -> usize {
    let mut cap = current.max(INITIAL_CAPACITY);
    while cap < need && cap < PAGE_SIZE {
        cap *= 2;
    }
    if cap < need {
        cap = (need + PAGE_SIZE - 1) / PAGE_SIZE * PAGE_SIZE;
    }
    cap
}

/// Shortest text that reads back as the same double. Integral values print without a fraction.
pub(crate) fn format_double(v: f64) -> String {
    if v.is_nan() {
        "nan".to_owned()
    } else if v.is_infinite() {
        if v > 0.0 { "inf" } else { "-inf" }.to_owned()
    } else if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v)
    } else {
        format!("{:?}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_policy() {
        assert_eq!(grow_to(0, 1), 512);
        assert_eq!(grow_to(512, 513), 1024);
        assert_eq!(grow_to(1024, 3000), 4096);
        assert_eq!(grow_to(4096, 4097), 8192);
        assert_eq!(grow_to(4096, 10_000), 12_288);
    }

    #[test]
    fn test_growable_capacity_starts_at_initial() {
        let mut buf = StrBuf::new();
        buf.putstr("a").unwrap();
        assert_eq!(buf.capacity(), INITIAL_CAPACITY);
        assert_eq!(buf.as_str(), "a");
    }

    #[test]
    fn test_fixed_buffer_rejects_overflow() {
        let mut storage = [0u8; 8];
        let mut buf = StrBuf::fixed(&mut storage);
        buf.putstr("hello").unwrap();
        assert_eq!(buf.putstr("world"), Err(BufError::Full { capacity: 8 }));
        assert_eq!(buf.as_str(), "hello");
        buf.putstr("!!!").unwrap();
        assert_eq!(buf.as_str(), "hello!!!");
        assert_eq!(buf.putchar('x'), Err(BufError::Full { capacity: 8 }));
    }

    #[test]
    fn test_putnstr_respects_char_boundary() {
        let mut buf = StrBuf::new();
        buf.putnstr("añb", 2).unwrap();
        assert_eq!(buf.as_str(), "a");
    }

    #[test]
    fn test_putxchar_and_numbers() {
        let mut buf = StrBuf::new();
        buf.putxchar(' ', 4).unwrap();
        buf.putint(-12).unwrap();
        buf.putchar(' ').unwrap();
        buf.putuint(7).unwrap();
        buf.putchar(' ').unwrap();
        buf.putdouble(0.5).unwrap();
        assert_eq!(buf.as_str(), "    -12 7 0.5");
    }

    #[test]
    fn test_escape_label() {
        let mut buf = StrBuf::new();
        buf.putescape_label("a\"b\\c\nd\te\r").unwrap();
        assert_eq!(buf.as_str(), "a\\\"b\\\\c\\nd\\te\\r");
    }

    #[test]
    fn test_escape_json_control() {
        let mut buf = StrBuf::new();
        buf.putescape_json("x\u{1}\u{8}/").unwrap();
        assert_eq!(buf.as_str(), "x\\u0001\\b/");
    }

    #[test]
    fn test_format_double() {
        assert_eq!(format_double(3.0), "3");
        assert_eq!(format_double(-0.25), "-0.25");
        assert_eq!(format_double(1e300), "1e300");
        assert_eq!(format_double(f64::INFINITY), "inf");
        assert_eq!(format_double(f64::NAN), "nan");
    }

    #[test]
    fn test_take_resets() {
        let mut storage = [0u8; 16];
        let mut buf = StrBuf::fixed(&mut storage);
        buf.putstr("abc").unwrap();
        assert_eq!(buf.take(), "abc");
        assert!(buf.is_empty());
    }
}
