//! Character-level source cursor shared by the parser.
//!
//! There's deliberately no token stream: keywords are re-recognised by
//! prefix match at each statement boundary rather than pre-lexed into a
//! tagged enum. `Cursor` is just an offset into the source buffer threaded
//! through a set of scanning helpers, each advancing it as it reads —
//! closer to a `read` cursor over a byte slice than a conventional
//! tokeniser.
pub struct Cursor<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Cursor { src, pos: 0 }
    }

    pub fn at(src: &'a [u8], pos: usize) -> Self {
        Cursor { src, pos }
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.src.len()
    }

    #[inline]
    pub fn at_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    #[inline]
    pub fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    #[inline]
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    #[inline]
    pub fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// Does the source starting here match `word`, with no alphanumeric
    /// continuation right after it (so `whenever` doesn't get mistaken for
    /// `when`)?
    pub fn matches_keyword(&self, word: &str) -> bool {
        let bytes = word.as_bytes();
        if self.pos + bytes.len() > self.src.len() {
            return false;
        }
        if &self.src[self.pos..self.pos + bytes.len()] != bytes {
            return false;
        }
        match self.src.get(self.pos + bytes.len()) {
            Some(b) => !is_ident_byte(*b),
            None => true,
        }
    }

    /// Consume `word` after `matches_keyword` confirmed it's present.
    pub fn consume_keyword(&mut self, word: &str) {
        self.pos += word.len();
    }

    /// Skip whitespace and `#`/`//` line comments.
    pub fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => {
                    self.pos += 1;
                }
                Some(b'#') => self.skip_to_eol(),
                Some(b'/') if self.peek_at(1) == Some(b'/') => self.skip_to_eol(),
                _ => break,
            }
        }
    }

    fn skip_to_eol(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }

    /// Scan an identifier (letters, digits, `_`, `.`), e.g. `syscall.write`.
    pub fn scan_identifier(&mut self) -> Option<String> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_ident_byte(b) {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return None;
        }
        Some(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
    }

    /// Scan a number: optional leading `-`, hex (`0x…`), decimal, or a
    /// non-standard decimal point that truncates to integer.
    pub fn scan_number(&mut self) -> Option<i64> {
        let start = self.pos;
        let negative = if self.peek() == Some(b'-') {
            self.pos += 1;
            true
        } else {
            false
        };
        if self.peek() == Some(b'0') && matches!(self.peek_at(1), Some(b'x') | Some(b'X')) {
            self.pos += 2;
            let hex_start = self.pos;
            while let Some(b) = self.peek() {
                if b.is_ascii_hexdigit() {
                    self.pos += 1;
                } else {
                    break;
                }
            }
            if self.pos == hex_start {
                self.pos = start;
                return None;
            }
            let text = std::str::from_utf8(&self.src[hex_start..self.pos]).unwrap();
            let v = i64::from_str_radix(text, 16).unwrap_or(0);
            return Some(if negative { -v } else { v });
        }
        let digits_start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.pos == digits_start {
            self.pos = start;
            return None;
        }
        let int_part: i64 = std::str::from_utf8(&self.src[digits_start..self.pos])
            .unwrap()
            .parse()
            .unwrap_or(0);
        // Non-standard decimal point: truncates to integer.
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
            while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        Some(if negative { -int_part } else { int_part })
    }

    /// Scan a decimal float (`unified { … }` fields only — ordinary
    /// expression numbers go through [`scan_number`](Self::scan_number) and
    /// truncate their decimal point instead).
    pub fn scan_float(&mut self) -> Option<f64> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if self.pos == digits_start {
            self.pos = start;
            return None;
        }
        std::str::from_utf8(&self.src[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
    }

    /// Scan a `"…"` string literal, applying the supported escapes:
    /// `\n \t \r \0 \xHH`. Returns the decoded bytes; the caller still owns
    /// the closing quote handling (already consumed here).
    pub fn scan_string(&mut self) -> Option<Vec<u8>> {
        if self.peek() != Some(b'"') {
            return None;
        }
        self.pos += 1;
        let mut out = Vec::new();
        loop {
            match self.advance() {
                None => break,
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(b'n') => out.push(b'\n'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'r') => out.push(b'\r'),
                    Some(b'0') => out.push(0),
                    Some(b'x') => {
                        let hi = self.advance().and_then(hex_val);
                        let lo = self.advance().and_then(hex_val);
                        if let (Some(hi), Some(lo)) = (hi, lo) {
                            out.push((hi << 4) | lo);
                        }
                    }
                    Some(other) => out.push(other),
                    None => break,
                },
                Some(b) => out.push(b),
            }
        }
        Some(out)
    }

    /// Skip a `{ … }` block, tracking brace depth while respecting string
    /// literals (so a `"}"` inside a string doesn't close the block) and
    /// `#`/`//` comments. The cursor must be positioned at the opening `{`.
    /// Returns `(open_brace_pos, close_brace_pos)` — `close_brace_pos` is
    /// the index *of* the matching `}` itself, so the span callers pass
    /// around is `[open_brace_pos + 1, close_brace_pos)`, which includes
    /// the last statement's final byte.
    pub fn skip_balanced_braces(&mut self) -> Option<(usize, usize)> {
        if self.peek() != Some(b'{') {
            return None;
        }
        let open = self.pos;
        self.pos += 1;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                None => return Some((open, self.pos)),
                Some(b'"') => {
                    self.scan_string();
                    continue;
                }
                Some(b'#') => {
                    self.skip_to_eol();
                    continue;
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    self.skip_to_eol();
                    continue;
                }
                Some(b'{') => depth += 1,
                Some(b'}') => depth -= 1,
                _ => {}
            }
            if depth == 0 {
                break;
            }
            self.pos += 1;
        }
        let close = self.pos;
        self.pos += 1; // consume the matching '}'
        Some((open, close))
    }
}

#[inline]
fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.'
}

#[inline]
fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_hash_and_slash_comments() {
        let mut c = Cursor::new(b"  # comment\n// more\n x");
        c.skip_trivia();
        assert_eq!(c.peek(), Some(b'x'));
    }

    #[test]
    fn scans_dotted_identifier() {
        let mut c = Cursor::new(b"syscall.write(1)");
        assert_eq!(c.scan_identifier().as_deref(), Some("syscall.write"));
        assert_eq!(c.peek(), Some(b'('));
    }

    #[test]
    fn scans_hex_and_decimal_numbers() {
        let mut c = Cursor::new(b"0x2A");
        assert_eq!(c.scan_number(), Some(42));
        let mut c = Cursor::new(b"-5");
        assert_eq!(c.scan_number(), Some(-5));
        let mut c = Cursor::new(b"3.9");
        assert_eq!(c.scan_number(), Some(3));
    }

    #[test]
    fn scans_string_escapes() {
        let mut c = Cursor::new(br#""Hi\n\x41""#);
        assert_eq!(c.scan_string(), Some(b"Hi\nA".to_vec()));
    }

    #[test]
    fn skip_balanced_braces_ignores_brace_in_string() {
        let mut c = Cursor::new(b"{ out \"}\" x = 1 }");
        let (open, close) = c.skip_balanced_braces().unwrap();
        assert_eq!(open, 0);
        assert_eq!(close, 16);
    }

    #[test]
    fn scans_float_without_truncating() {
        let mut c = Cursor::new(b"0.9 0.1");
        assert_eq!(c.scan_float(), Some(0.9));
        c.skip_trivia();
        assert_eq!(c.scan_float(), Some(0.1));
    }

    #[test]
    fn matches_keyword_requires_word_boundary() {
        let c = Cursor::new(b"whenever");
        assert!(!c.matches_keyword("when"));
        let c = Cursor::new(b"when x");
        assert!(c.matches_keyword("when"));
    }
}
