//! Textual projection of the mapped graph and its parser.
//!
//! The dump is a stable debug format: external tools write it out, hand-edit
//! it, and feed it back to produce a bitstream without going through JSON.
//! Emission is the `Display` impls below; [`parse_mapping_text`] reads the
//! format back. The shape of one block:
//!
//! ```text
//! Mapper_Node(id: counter (pe_idx: 0), op: ADD, initial_output_used: 1, initial_output: 0, inputs: [
//!             type: i1, src_id: counter (pe_index: 0), const_value: -1
//!             type: i2, src_id: const (pe_index: -1), const_value: 1
//!     ])
//! ```
//!
//! The parser is a token stream, not a line matcher: whitespace and newlines
//! may appear between any two tokens inside a block, and anything between
//! blocks is ignored. Opcode tokens are matched case-insensitively.

use crate::error::{MapperError, Result};
use crate::graph::{Input, InputSource, MapperDfg, MapperNode, Operand};
use doda_asm::Opcode;
use std::fmt;

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (src_id, pe_index, const_value) = match self.source() {
            InputSource::Const(value) => ("const", -1, *value),
            InputSource::Node { id, pe_index } => (
                id.as_str(),
                pe_index.map_or(-1, |pe| pe as i64),
                // -1 is the filler the format uses for non-constant inputs
                -1,
            ),
        };
        write!(
            f,
            "\t\ttype: {}, src_id: {} (pe_index: {}), const_value: {}",
            self.kind(),
            src_id,
            pe_index,
            const_value
        )
    }
}

impl fmt::Display for MapperNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\tMapper_Node(id: {} (pe_idx: {}), op: {}, initial_output_used: {}, initial_output: {}, inputs: [\n",
            self.id(),
            self.pe_index(),
            self.opcode(),
            self.initial_output_used() as u8,
            self.initial_output()
        )?;
        for input in self.inputs() {
            write!(f, "\t{input}\n")?;
        }
        write!(f, "\t])")
    }
}

impl fmt::Display for MapperDfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Mapper_DFG with {} nodes:", self.len())?;
        for node in self.iter_by_pe() {
            writeln!(f, "{node}")?;
        }
        Ok(())
    }
}

/// Parses a previously emitted dump back into a graph.
///
/// PE indices are restored exactly as written. Consumer edges are not part
/// of the format and are reconstructed from the input references.
pub fn parse_mapping_text(text: &str) -> Result<MapperDfg> {
    let mut dfg = MapperDfg::new();
    let mut cursor = Cursor::new(text);
    let mut nodes = 0usize;
    while cursor.seek_past("Mapper_Node") {
        parse_node(&mut cursor, &mut dfg)?;
        nodes += 1;
    }
    connect_outputs(&mut dfg);
    tracing::debug!(nodes, "parsed mapping text");
    Ok(dfg)
}

fn parse_node(cursor: &mut Cursor<'_>, dfg: &mut MapperDfg) -> Result<()> {
    cursor.expect("(")?;
    cursor.expect("id:")?;
    let id = cursor.ident()?.to_owned();
    cursor.expect("(pe_idx:")?;
    let pe_index = cursor.index()?;
    cursor.expect(")")?;
    cursor.expect(",")?;
    cursor.expect("op:")?;
    let op = Opcode::parse(cursor.ident()?);
    cursor.expect(",")?;
    cursor.expect("initial_output_used:")?;
    let initial_output_used = cursor.integer()? != 0;
    cursor.expect(",")?;
    cursor.expect("initial_output:")?;
    let initial_output = cursor.integer()? as i32;
    cursor.expect(",")?;
    cursor.expect("inputs:")?;
    cursor.expect("[")?;

    let node = dfg.add_node_at(id.as_str(), op, initial_output_used, initial_output, pe_index)?;
    loop {
        if cursor.peek_is("]") {
            cursor.expect("]")?;
            break;
        }
        cursor.expect("type:")?;
        let kind_token = cursor.ident()?;
        let kind: Operand = kind_token
            .parse()
            .map_err(|_| cursor.error(format!("unknown operand kind `{kind_token}`")))?;
        cursor.expect(",")?;
        cursor.expect("src_id:")?;
        let src_id = cursor.ident()?.to_owned();
        cursor.expect("(pe_index:")?;
        let src_pe = cursor.integer()?;
        cursor.expect(")")?;
        cursor.expect(",")?;
        cursor.expect("const_value:")?;
        let const_value = cursor.integer()? as i32;

        if src_id == "const" {
            node.add_input_const(kind, const_value);
        } else {
            let pe_index = usize::try_from(src_pe).ok();
            node.add_resolved_input_ref(kind, src_id, pe_index);
        }
    }
    cursor.expect(")")?;
    Ok(())
}

/// Rebuilds the producer → consumer edges the dump leaves implicit.
fn connect_outputs(dfg: &mut MapperDfg) {
    let edges: Vec<(String, usize, String)> = dfg
        .iter()
        .flat_map(|node| {
            node.inputs().iter().filter_map(|input| match input.source() {
                InputSource::Node { id, .. } => {
                    Some((id.clone(), node.pe_index(), node.id().to_owned()))
                }
                InputSource::Const(_) => None,
            })
        })
        .collect();
    for (source, consumer_pe, consumer) in edges {
        if let Some(producer) = dfg.get_mut(&source) {
            producer.add_resolved_output(consumer, Some(consumer_pe));
        }
    }
}

/// Token scanner over the dump text. All lookups skip leading whitespace, so
/// tokens may be separated by spaces, tabs, or newlines alike.
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    /// 1-based line of the current position, for diagnostics.
    fn line(&self) -> usize {
        1 + self.text[..self.pos].bytes().filter(|b| *b == b'\n').count()
    }

    fn error(&self, reason: impl Into<String>) -> MapperError {
        MapperError::MappingText {
            line: self.line(),
            reason: reason.into(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    /// Advances past the next occurrence of `token`, if any.
    fn seek_past(&mut self, token: &str) -> bool {
        match self.rest().find(token) {
            Some(offset) => {
                self.pos += offset + token.len();
                true
            }
            None => false,
        }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.text.len() - trimmed.len();
    }

    fn peek_is(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        self.rest().starts_with(token)
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        self.skip_whitespace();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else {
            Err(self.error(format!("expected `{token}`")))
        }
    }

    /// Next bare token: everything up to whitespace or punctuation.
    fn ident(&mut self) -> Result<&'a str> {
        self.skip_whitespace();
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || "(),[]".contains(c))
            .unwrap_or(rest.len());
        if end == 0 {
            return Err(self.error("expected an identifier"));
        }
        self.pos += end;
        Ok(&rest[..end])
    }

    /// Next signed decimal integer.
    fn integer(&mut self) -> Result<i64> {
        self.skip_whitespace();
        let rest = self.rest();
        let digits_start = usize::from(rest.starts_with('-'));
        let end = rest[digits_start..]
            .find(|c: char| !c.is_ascii_digit())
            .map_or(rest.len(), |offset| digits_start + offset);
        rest[..end]
            .parse()
            .map_err(|_| self.error("expected an integer"))
            .map(|value| {
                self.pos += end;
                value
            })
    }

    /// Next non-negative integer, as a PE index.
    fn index(&mut self) -> Result<usize> {
        let value = self.integer()?;
        usize::try_from(value).map_err(|_| self.error("expected a non-negative index"))
    }
}
