//! Minimal ToUnicode CMap parser (`bfchar` / `bfrange`).

use std::collections::HashMap;

/// Ranges larger than this are ignored as malformed.
const MAX_RANGE_LEN: u32 = 0x1_0000;

/// Glyph code to Unicode mapping parsed from a font's ToUnicode stream.
#[derive(Debug, Clone, Default)]
pub struct ToUnicodeMap {
    map: HashMap<u32, String>,
}

#[derive(Debug, Clone, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Keyword(String),
}

impl ToUnicodeMap {
    /// Parse the decompressed content of a ToUnicode stream.
    pub fn parse(data: &[u8]) -> Self {
        let text = String::from_utf8_lossy(data);
        let tokens = tokenize(&text);

        let mut map = HashMap::new();
        let mut i = 0;

        while i < tokens.len() {
            match &tokens[i] {
                CMapToken::Keyword(k) if k == "beginbfchar" => {
                    i += 1;
                    while i + 1 < tokens.len() && !is_keyword(&tokens[i], "endbfchar") {
                        if let (CMapToken::Hex(src), CMapToken::Hex(dst)) = (&tokens[i], &tokens[i + 1]) {
                            map.insert(be_value(src), utf16_be(dst));
                        }
                        i += 2;
                    }
                }
                CMapToken::Keyword(k) if k == "beginbfrange" => {
                    i += 1;
                    while i + 2 < tokens.len() && !is_keyword(&tokens[i], "endbfrange") {
                        let (lo, hi) = match (&tokens[i], &tokens[i + 1]) {
                            (CMapToken::Hex(lo), CMapToken::Hex(hi)) => (lo.clone(), hi.clone()),
                            _ => {
                                i += 1;
                                continue;
                            }
                        };
                        let (start, end) = (be_value(&lo), be_value(&hi));
                        if end < start || end - start >= MAX_RANGE_LEN {
                            i += 3;
                            continue;
                        }
                        match &tokens[i + 2] {
                            CMapToken::Hex(dst) => {
                                for (offset, code) in (start..=end).enumerate() {
                                    map.insert(code, utf16_be(&increment(dst, offset as u32)));
                                }
                                i += 3;
                            }
                            CMapToken::ArrayStart => {
                                let mut j = i + 3;
                                // None once the range runs past u32::MAX.
                                let mut code = Some(start);
                                while j < tokens.len() && tokens[j] != CMapToken::ArrayEnd {
                                    if let CMapToken::Hex(dst) = &tokens[j] {
                                        if let Some(c) = code.filter(|&c| c <= end) {
                                            map.insert(c, utf16_be(dst));
                                        }
                                        code = code.and_then(|c| c.checked_add(1));
                                    }
                                    j += 1;
                                }
                                i = j + 1;
                            }
                            _ => i += 3,
                        }
                    }
                }
                _ => {}
            }
            i += 1;
        }

        Self { map }
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

fn is_keyword(token: &CMapToken, keyword: &str) -> bool {
    matches!(token, CMapToken::Keyword(k) if k == keyword)
}

fn tokenize(text: &str) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '%' => {
                for n in chars.by_ref() {
                    if n == '\n' || n == '\r' {
                        break;
                    }
                }
            }
            '<' => {
                if chars.peek() == Some(&'<') {
                    chars.next();
                    continue;
                }
                let mut hex = String::new();
                for n in chars.by_ref() {
                    if n == '>' {
                        break;
                    }
                    if n.is_ascii_hexdigit() {
                        hex.push(n);
                    }
                }
                tokens.push(CMapToken::Hex(decode_hex(&hex)));
            }
            '>' => {
                // Closing `>>` of a dictionary.
                if chars.peek() == Some(&'>') {
                    chars.next();
                }
            }
            '[' => tokens.push(CMapToken::ArrayStart),
            ']' => tokens.push(CMapToken::ArrayEnd),
            c if c.is_whitespace() => {}
            c => {
                let mut word = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_whitespace() || matches!(n, '<' | '>' | '[' | ']' | '%' | '/') {
                        break;
                    }
                    word.push(n);
                    chars.next();
                }
                tokens.push(CMapToken::Keyword(word));
            }
        }
    }

    tokens
}

fn decode_hex(hex: &str) -> Vec<u8> {
    let mut padded = hex.to_string();
    if padded.len() % 2 == 1 {
        padded.push('0');
    }
    hex::decode(&padded).unwrap_or_default()
}

fn be_value(bytes: &[u8]) -> u32 {
    bytes.iter().take(4).fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

/// Add `offset` to a big-endian byte string, keeping its length.
fn increment(bytes: &[u8], offset: u32) -> Vec<u8> {
    let mut out = bytes.to_vec();
    let mut carry = offset;
    for b in out.iter_mut().rev() {
        if carry == 0 {
            break;
        }
        let sum = *b as u32 + (carry & 0xFF);
        *b = (sum & 0xFF) as u8;
        carry = (carry >> 8) + (sum >> 8);
    }
    out
}

fn utf16_be(bytes: &[u8]) -> String {
    if bytes.len() == 1 {
        return (bytes[0] as char).to_string();
    }
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => *single as u16,
            _ => 0,
        })
        .collect();
    String::from_utf16_lossy(&units)
}
