//! The MI value tree and the low-level parser shared by record parsing.

use crate::error::MiError;

/// A value in an MI result: a C-string constant, a tuple of named
/// results, or a list.
///
/// Lists of named results (`[frame={..},frame={..}]`) are kept as lists
/// of single-entry tuples so the names survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiValue {
    Const(String),
    Tuple(Vec<(String, MiValue)>),
    List(Vec<MiValue>),
}

impl MiValue {
    /// An empty tuple, the payload of a bare `^done`.
    pub fn empty() -> Self {
        MiValue::Tuple(Vec::new())
    }

    /// First child named `name`, looking through tuples only.
    pub fn find_child(&self, name: &str) -> Option<&MiValue> {
        match self {
            MiValue::Tuple(entries) => entries.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Follow a dotted path of child names, e.g. `"frame.line"`.
    pub fn find_path(&self, path: &str) -> Option<&MiValue> {
        path.split('.')
            .try_fold(self, |value, name| value.find_child(name))
    }

    /// The constant's text, or `""` for tuples and lists.
    pub fn data(&self) -> &str {
        match self {
            MiValue::Const(s) => s,
            _ => "",
        }
    }

    /// Shorthand for `find_child(name).map(data)`.
    pub fn child_data(&self, name: &str) -> Option<&str> {
        self.find_child(name).map(MiValue::data)
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        match self {
            MiValue::Const(_) => 0,
            MiValue::Tuple(entries) => entries.len(),
            MiValue::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert into JSON for logs and machine-readable output.
    ///
    /// Duplicate tuple keys keep the last value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MiValue::Const(s) => serde_json::Value::String(s.clone()),
            MiValue::Tuple(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            MiValue::List(items) => {
                serde_json::Value::Array(items.iter().map(MiValue::to_json).collect())
            }
        }
    }
}

impl std::fmt::Display for MiValue {
    /// Renders back into MI syntax.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MiValue::Const(s) => write!(f, "{}", crate::command::quote(s)),
            MiValue::Tuple(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                f.write_str("}")
            }
            MiValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    match item {
                        MiValue::Tuple(entries) if entries.len() == 1 => {
                            write!(f, "{}={}", entries[0].0, entries[0].1)?
                        }
                        other => write!(f, "{other}")?,
                    }
                }
                f.write_str("]")
            }
        }
    }
}

/// Cursor over one line of MI output.
pub(crate) struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    pub(crate) fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> MiError {
        MiError::Syntax {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), MiError> {
        match self.bump() {
            Some(b) if b == byte => Ok(()),
            Some(b) => {
                self.pos -= 1;
                Err(self.error(format!(
                    "expected '{}', found '{}'",
                    byte as char, b as char
                )))
            }
            None => Err(self.error(format!("expected '{}', found end of line", byte as char))),
        }
    }

    /// Optional run of ASCII digits in front of a record.
    pub(crate) fn token(&mut self) -> Option<u64> {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }

    /// A result/async class or variable name: everything up to the next
    /// delimiter or the end of the line.
    pub(crate) fn word(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b',' | b'=' | b'"' | b'{' | b'}' | b'[' | b']') {
                break;
            }
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// `( "," result )*` up to the end of the line, as a tuple.
    pub(crate) fn results(&mut self) -> Result<MiValue, MiError> {
        let mut entries = Vec::new();
        while !self.at_end() {
            self.expect(b',')?;
            entries.push(self.result()?);
        }
        Ok(MiValue::Tuple(entries))
    }

    fn result(&mut self) -> Result<(String, MiValue), MiError> {
        let name = self.word();
        if name.is_empty() {
            return Err(self.error("expected variable name"));
        }
        self.expect(b'=')?;
        Ok((name, self.value()?))
    }

    fn value(&mut self) -> Result<MiValue, MiError> {
        match self.peek() {
            Some(b'"') => Ok(MiValue::Const(self.c_string()?)),
            Some(b'{') => self.tuple(),
            Some(b'[') => self.list(),
            Some(b) => Err(self.error(format!("expected value, found '{}'", b as char))),
            None => Err(self.error("expected value, found end of line")),
        }
    }

    fn tuple(&mut self) -> Result<MiValue, MiError> {
        self.expect(b'{')?;
        let mut entries = Vec::new();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(MiValue::Tuple(entries));
        }
        loop {
            entries.push(self.result()?);
            match self.bump() {
                Some(b',') => continue,
                Some(b'}') => return Ok(MiValue::Tuple(entries)),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error("expected ',' or '}' in tuple"));
                }
            }
        }
    }

    fn list(&mut self) -> Result<MiValue, MiError> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(MiValue::List(items));
        }
        loop {
            let item = match self.peek() {
                Some(b'"') | Some(b'{') | Some(b'[') => self.value()?,
                _ => {
                    let (name, value) = self.result()?;
                    MiValue::Tuple(vec![(name, value)])
                }
            };
            items.push(item);
            match self.bump() {
                Some(b',') => continue,
                Some(b']') => return Ok(MiValue::List(items)),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error("expected ',' or ']' in list"));
                }
            }
        }
    }

    /// A double-quoted C string. Octal escapes produce raw bytes, which are
    /// decoded as UTF-8 (lossily) once the string is complete.
    pub(crate) fn c_string(&mut self) -> Result<String, MiError> {
        self.expect(b'"')?;
        let mut out = Vec::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(b'"') => break,
                Some(b'\\') => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| self.error("unterminated escape"))?;
                    match escaped {
                        b'n' => out.push(b'\n'),
                        b't' => out.push(b'\t'),
                        b'r' => out.push(b'\r'),
                        b'a' => out.push(0x07),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'v' => out.push(0x0b),
                        b'e' => out.push(0x1b),
                        b'0'..=b'7' => {
                            let mut code = u32::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        code = code * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push((code & 0xff) as u8);
                        }
                        other => out.push(other),
                    }
                }
                Some(b) => out.push(b),
            }
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}
