/// Decodes the body of a lexed JSON string. The lexer has already checked every escape, so
/// this never fails; an unpaired surrogate decodes to `?`.
pub(crate) fn decode_string(raw: &[u8]) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let c = raw[i];
        if c != b'\\' || i + 1 >= raw.len() {
            out.push(c);
            i += 1;
            continue;
        }

        let plain = match raw[i + 1] {
            b'r' => Some(b'\r'),
            b'n' => Some(b'\n'),
            b'\\' => Some(b'\\'),
            b'/' => Some(b'/'),
            b'"' => Some(b'"'),
            b'f' => Some(0x0c),
            b'b' => Some(0x08),
            b't' => Some(b'\t'),
            _ => None,
        };
        if let Some(b) = plain {
            out.push(b);
            i += 2;
            continue;
        }

        // \uXXXX, possibly the first half of a surrogate pair
        let unit = hex4(raw, i + 2);
        i += 6;
        let ch = match unit {
            Some(hi @ 0xD800..=0xDBFF) => {
                let lo = if raw.get(i) == Some(&b'\\') && raw.get(i + 1) == Some(&b'u') {
                    hex4(raw, i + 2)
                } else {
                    None
                };
                match lo {
                    Some(lo @ 0xDC00..=0xDFFF) => {
                        i += 6;
                        std::char::from_u32(0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00))
                    }
                    _ => None,
                }
            }
            Some(cp) => std::char::from_u32(cp),
            None => None,
        };

        let mut utf8 = [0u8; 4];
        out.extend_from_slice(ch.unwrap_or('?').encode_utf8(&mut utf8).as_bytes());
    }

    match String::from_utf8(out) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

fn hex4(raw: &[u8], at: usize) -> Option<u32> {
    let digits = raw.get(at..at + 4)?;
    let text = std::str::from_utf8(digits).ok()?;
    u32::from_str_radix(text, 16).ok()
}
