//! Permissive JSON parser for damaged model output

use crate::error::{Error, Result};
use serde_json::{Map, Number, Value};

const MAX_DEPTH: usize = 256;

/// Recover a JSON value from text that strict parsing rejected.
///
/// Accepts trailing and missing commas, single quotes, unquoted keys, bare
/// words, Python literals, comments and raw newlines inside strings. Input cut
/// off mid-value is closed where it ends and a key without a value gets `""`.
/// Anything after the first complete value is ignored.
pub fn repair_json(text: &str) -> Result<Value> {
    let start = text
        .find(|c: char| c == '{' || c == '[')
        .ok_or_else(|| Error::JsonRepair {
            reason: "no object or array to recover".to_string(),
        })?;

    let mut parser = Repairer::new(&text[start..]);
    parser.parse_value(0)?.ok_or_else(|| Error::JsonRepair {
        reason: "no value could be recovered".to_string(),
    })
}

struct Repairer {
    chars: Vec<char>,
    pos: usize,
}

impl Repairer {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => self.pos += 1,
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.pos += 2;
                    loop {
                        match self.bump() {
                            None => break,
                            Some('*') if self.peek() == Some('/') => {
                                self.pos += 1;
                                break;
                            }
                            Some(_) => {}
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// `None` when no value starts here (end of input or a closer/separator).
    fn parse_value(&mut self, depth: usize) -> Result<Option<Value>> {
        if depth > MAX_DEPTH {
            return Err(Error::JsonRepair {
                reason: format!("nesting deeper than {MAX_DEPTH} levels"),
            });
        }

        self.skip_trivia();
        match self.peek() {
            None | Some('}') | Some(']') | Some(',') => Ok(None),
            Some('{') => self.parse_object(depth).map(Some),
            Some('[') => self.parse_array(depth).map(Some),
            Some(quote @ ('"' | '\'')) => Ok(Some(Value::String(self.parse_string(quote)))),
            Some(_) => Ok(Some(classify_bare(&self.read_bare(&[',', '}', ']', '"', '\n'])))),
        }
    }

    fn parse_object(&mut self, depth: usize) -> Result<Value> {
        self.pos += 1;
        let mut map = Map::new();

        loop {
            self.skip_trivia();
            match self.peek() {
                None => break,
                Some('}') => {
                    self.pos += 1;
                    break;
                }
                Some(']') => break,
                Some(',') | Some(':') => {
                    self.pos += 1;
                    continue;
                }
                Some(_) => {}
            }

            let key = self.parse_key();
            self.skip_trivia();

            let value = if self.peek() == Some(':') {
                while self.peek() == Some(':') {
                    self.pos += 1;
                    self.skip_trivia();
                }
                self.parse_value(depth + 1)?
            } else {
                None
            };
            map.insert(key, value.unwrap_or_else(|| Value::String(String::new())));

            self.skip_trivia();
            if self.peek() == Some(',') {
                self.pos += 1;
            }
        }

        Ok(Value::Object(map))
    }

    fn parse_array(&mut self, depth: usize) -> Result<Value> {
        self.pos += 1;
        let mut items = Vec::new();

        loop {
            self.skip_trivia();
            match self.peek() {
                None => break,
                Some(']') => {
                    self.pos += 1;
                    break;
                }
                Some('}') => break,
                Some(',') | Some(':') => {
                    self.pos += 1;
                    continue;
                }
                Some(_) => {}
            }

            match self.parse_value(depth + 1)? {
                Some(value) => items.push(value),
                None => break,
            }
        }

        Ok(Value::Array(items))
    }

    fn parse_key(&mut self) -> String {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => self.parse_string(quote),
            _ => self.read_bare(&[':', ',', '}', ']', '\n']),
        }
    }

    fn parse_string(&mut self, quote: char) -> String {
        self.pos += 1;
        let mut out = String::new();

        while let Some(c) = self.bump() {
            match c {
                '\\' => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('b') => out.push('\u{8}'),
                    Some('f') => out.push('\u{c}'),
                    Some('u') => self.push_unicode_escape(&mut out),
                    Some(other) => out.push(other),
                    None => break,
                },
                c if c == quote => {
                    if self.quote_closes_string() {
                        return out;
                    }
                    out.push(c);
                }
                c => out.push(c),
            }
        }

        out
    }

    /// A quote only closes a string when a separator, closer, another quote,
    /// a line break or the end of input follows it. Otherwise it is text.
    fn quote_closes_string(&self) -> bool {
        let mut i = self.pos;
        while let Some(&c) = self.chars.get(i) {
            if c == '\n' {
                return true;
            }
            if c.is_whitespace() {
                i += 1;
                continue;
            }
            return matches!(c, ',' | '}' | ']' | ':' | '"' | '\'' | '/');
        }
        true
    }

    fn push_unicode_escape(&mut self, out: &mut String) {
        let Some(high) = self.read_hex4() else {
            out.push_str("\\u");
            return;
        };

        if (0xD800..0xDC00).contains(&high) {
            if self.peek() == Some('\\') && self.peek_at(1) == Some('u') {
                let save = self.pos;
                self.pos += 2;
                if let Some(low) = self.read_hex4().filter(|l| (0xDC00..0xE000).contains(l)) {
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    if let Some(c) = char::from_u32(code) {
                        out.push(c);
                        return;
                    }
                }
                self.pos = save;
            }
            out.push(char::REPLACEMENT_CHARACTER);
            return;
        }

        out.push(char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER));
    }

    fn read_hex4(&mut self) -> Option<u32> {
        let digits = self.chars.get(self.pos..self.pos + 4)?;
        if !digits.iter().all(char::is_ascii_hexdigit) {
            return None;
        }
        let digits: String = digits.iter().collect();
        let value = u32::from_str_radix(&digits, 16).ok()?;
        self.pos += 4;
        Some(value)
    }

    fn read_bare(&mut self, stops: &[char]) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                break;
            }
            self.pos += 1;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .trim()
            .to_string()
    }
}

fn classify_bare(token: &str) -> Value {
    match token {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        "null" | "None" | "NULL" | "Null" | "undefined" => Value::Null,
        _ => serde_json::from_str::<Number>(token)
            .map(Value::Number)
            .unwrap_or_else(|_| Value::String(token.to_string())),
    }
}
