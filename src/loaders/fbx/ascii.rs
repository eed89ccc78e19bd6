//! ASCII FBX reader.
//!
//! Lines look like `Name: value, value {` with `;` comments. Arrays are
//! either `*N { a: v, v, ... }` (7.x) or bare comma lists that may wrap
//! across lines (6.x). Both forms end up as one array property.

use anyhow::{bail, ensure, Context, Result};
use log::debug;

use super::{Node, Property, MAX_DEPTH};

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

/// One parsed value; `Count` is the `*N` marker of a 7.x array block
enum Value {
    Count,
    Property(Property),
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn line(&self) -> usize {
        self.bytes[..self.pos].iter().filter(|&&b| b == b'\n').count() + 1
    }

    fn skip_inline_space(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r')) {
            self.pos += 1;
        }
    }

    fn skip_space_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(b) if b.is_ascii_whitespace() => self.pos += 1,
                Some(b';') => {
                    while !matches!(self.peek(), None | Some(b'\n')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn take_while(&mut self, mut accept: impl FnMut(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(&mut accept) {
            self.pos += 1;
        }
        // Only ASCII bytes are ever accepted
        std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or_default()
    }

    /// Nodes up to the end of input, or up to and including `}` when `closed`
    fn read_nodes(&mut self, depth: usize, closed: bool) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        loop {
            self.skip_space_and_comments();
            match self.peek() {
                None if closed => bail!("FBX block is never closed"),
                None => break,
                Some(b'}') if closed => {
                    self.pos += 1;
                    break;
                }
                Some(b'}') => bail!("Unexpected '}}' on line {}", self.line()),
                Some(_) => nodes.push(self.read_node(depth)?),
            }
        }
        Ok(nodes)
    }

    fn read_node(&mut self, depth: usize) -> Result<Node> {
        ensure!(depth < MAX_DEPTH, "FBX nodes nest deeper than {}", MAX_DEPTH);

        let line = self.line();
        let name = self
            .take_while(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'|')
            .to_string();
        ensure!(!name.is_empty(), "Expected an FBX node name on line {}", line);
        self.skip_inline_space();
        ensure!(
            self.peek() == Some(b':'),
            "Expected ':' after {:?} on line {}",
            name,
            line
        );
        self.pos += 1;

        let values = self.read_values()?;
        let counted = values.iter().any(|v| matches!(v, Value::Count));
        let mut properties: Vec<Property> = values
            .into_iter()
            .filter_map(|v| match v {
                Value::Property(p) => Some(p),
                Value::Count => None,
            })
            .collect();

        self.skip_inline_space();
        let mut children = Vec::new();
        if self.peek() == Some(b'{') {
            self.pos += 1;
            children = self.read_nodes(depth + 1, true)?;
        }

        if counted {
            let items = children
                .iter()
                .find(|c| c.name == "a")
                .map(|a| a.properties.as_slice())
                .unwrap_or_default();
            properties = vec![numeric_array(items).with_context(|| format!("in FBX array {:?}", name))?];
            children.clear();
        }

        Ok(Node {
            name,
            properties,
            children,
        })
    }

    /// Comma separated values; a trailing comma continues onto the next line
    fn read_values(&mut self) -> Result<Vec<Value>> {
        let mut values = Vec::new();
        self.skip_inline_space();
        if matches!(self.peek(), None | Some(b'\n' | b'{' | b'}' | b';')) {
            return Ok(values);
        }
        loop {
            values.push(self.read_value()?);
            self.skip_inline_space();
            if self.peek() != Some(b',') {
                break;
            }
            self.pos += 1;
            self.skip_space_and_comments();
        }
        Ok(values)
    }

    fn read_value(&mut self) -> Result<Value> {
        let line = self.line();
        match self.peek() {
            Some(b'"') => {
                self.pos += 1;
                let start = self.pos;
                while !matches!(self.peek(), None | Some(b'"')) {
                    self.pos += 1;
                }
                ensure!(self.peek().is_some(), "Unterminated string on line {}", line);
                let text = String::from_utf8_lossy(&self.bytes[start..self.pos]).into_owned();
                self.pos += 1;
                Ok(Value::Property(Property::String(text)))
            }
            // `Content: ,` style empty leading value
            Some(b',') => Ok(Value::Property(Property::String(String::new()))),
            Some(b'*') => {
                self.pos += 1;
                self.take_while(|b| b.is_ascii_digit());
                Ok(Value::Count)
            }
            Some(b) if b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.') => {
                let token = self.take_while(|b| {
                    b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E')
                });
                Ok(Value::Property(parse_number(token).with_context(|| {
                    format!("on line {}", line)
                })?))
            }
            Some(b) if b.is_ascii_alphabetic() => {
                let word = self.take_while(|b| b.is_ascii_alphanumeric() || b == b'_');
                Ok(Value::Property(Property::String(word.to_string())))
            }
            Some(b) => bail!("Unexpected {:?} on line {}", b as char, line),
            None => bail!("FBX file ended inside a value"),
        }
    }
}

fn parse_number(token: &str) -> Result<Property> {
    if let Ok(i) = token.parse::<i64>() {
        return Ok(Property::I64(i));
    }
    token
        .parse::<f64>()
        .map(Property::F64)
        .with_context(|| format!("Invalid FBX number {:?}", token))
}

/// Whole numbers become an integer array so index lists keep their type
fn numeric_array(items: &[Property]) -> Result<Property> {
    if let Some(ints) = items.iter().map(Property::as_i64).collect::<Option<Vec<_>>>() {
        return Ok(Property::I64Array(ints));
    }
    items
        .iter()
        .map(Property::as_f64)
        .collect::<Option<Vec<_>>>()
        .map(Property::F64Array)
        .context("array holds non-numeric values")
}

pub(super) fn read_document(text: &str) -> Result<Vec<Node>> {
    let mut parser = Parser {
        bytes: text.as_bytes(),
        pos: 0,
    };
    let nodes = parser.read_nodes(0, false)?;
    debug!("ASCII FBX with {} top-level nodes", nodes.len());
    Ok(nodes)
}
