//! Rendering trees as YAML block text or JSON.
//!
//! Emission walks the tree twice. The measuring pass asks the sink for room
//! without writing and sums the fragment sizes; the sink is then asked once
//! for the whole total, so a fixed buffer that is too small fails before any
//! byte is written. The fill pass repeats the same walk and writes.

pub mod sink;
pub mod style;

use std::fmt;

use tracing::{debug, instrument};

use crate::config::EmitSettings;
use crate::domain::{NodeId, NodeType, Tree, ROOT};
use crate::error_channel::{self, fatal, violation};
use crate::errors::YamlResult;

pub use sink::{Sink, SliceSink, VecSink, WriterSink};

/// One traversal over a sink, either measuring or writing.
struct Pass<'k, S: Sink + ?Sized> {
    sink: &'k mut S,
    measuring: bool,
    total: usize,
}

impl<'k, S: Sink + ?Sized> Pass<'k, S> {
    fn new(sink: &'k mut S, measuring: bool) -> Self {
        Self {
            sink,
            measuring,
            total: 0,
        }
    }

    fn put(&mut self, s: &str) -> YamlResult<()> {
        if s.is_empty() {
            return Ok(());
        }
        if self.measuring {
            self.sink.request_buffer(s.len(), false)?;
        } else {
            self.sink.write(s.as_bytes())?;
        }
        self.total += s.len();
        Ok(())
    }

    fn put_char(&mut self, c: u8) -> YamlResult<()> {
        if self.measuring {
            self.sink.request_buffer(1, false)?;
        } else {
            self.sink.write_char(c)?;
        }
        self.total += 1;
        Ok(())
    }

    fn put_indent(&mut self, width: usize) -> YamlResult<()> {
        if width == 0 {
            return Ok(());
        }
        if self.measuring {
            self.sink.request_buffer(width, false)?;
        } else {
            self.sink.write_repeated(b' ', width)?;
        }
        self.total += width;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Emitter {
    indent: usize,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    pub fn new() -> Self {
        Self::with_indent(EmitSettings::default().indent)
    }

    /// Emitter using `indent` spaces per nesting level (at least one).
    pub fn with_indent(indent: usize) -> Self {
        Self {
            indent: indent.max(1),
        }
    }

    pub fn from_settings(settings: &EmitSettings) -> Self {
        Self::with_indent(settings.indent)
    }

    pub fn indent(&self) -> usize {
        self.indent
    }

    /// Render the whole tree; returns the number of bytes written.
    pub fn emit<S: Sink + ?Sized>(&self, tree: &Tree<'_>, sink: &mut S, json: bool) -> YamlResult<usize> {
        self.emit_node(tree, ROOT, sink, json)
    }

    /// Render the subtree rooted at `node`; returns the number of bytes
    /// written, which always equals the measured size.
    #[instrument(level = "debug", skip(self, tree, sink))]
    pub fn emit_node<S: Sink + ?Sized>(
        &self,
        tree: &Tree<'_>,
        node: NodeId,
        sink: &mut S,
        json: bool,
    ) -> YamlResult<usize> {
        error_channel::init_once();
        tree.get(node)?;

        let mut measure = Pass::new(&mut *sink, true);
        self.render(tree, node, json, &mut measure)?;
        let measured = measure.total;

        if measured > 0 {
            sink.reserve(measured)?;
        }

        let mut fill = Pass::new(&mut *sink, false);
        self.render(tree, node, json, &mut fill)?;
        let written = fill.total;

        if written != measured {
            return Err(fatal(format!(
                "fill pass wrote {written} bytes but the measuring pass counted {measured}"
            )));
        }
        debug!(node, json, written, "emitted");
        Ok(written)
    }

    /// Render into a fresh string.
    pub fn emit_to_string(&self, tree: &Tree<'_>, json: bool) -> YamlResult<String> {
        let mut sink = VecSink::new();
        self.emit(tree, &mut sink, json)?;
        sink.into_string()
    }

    fn render<S: Sink + ?Sized>(
        &self,
        tree: &Tree<'_>,
        node: NodeId,
        json: bool,
        out: &mut Pass<'_, S>,
    ) -> YamlResult<()> {
        let node_type = tree.node_type(node)?;
        if node_type.is_notype() {
            if tree.is_root(node)? && !tree.has_children(node)? {
                return Ok(());
            }
            return Err(violation(format!("node {node} has no type and cannot be emitted")));
        }
        if node_type.is_stream() {
            return self.render_stream(tree, node, json, out);
        }
        if json {
            if node_type.has_key() {
                out.put(&style::double_quoted(tree.key(node)?))?;
                out.put(": ")?;
            }
            return self.json_value(tree, node, out);
        }
        if node_type.has_key() {
            return self.yaml_entry(tree, node, 0, false, out);
        }
        self.yaml_top(tree, node, out)
    }

    fn render_stream<S: Sink + ?Sized>(
        &self,
        tree: &Tree<'_>,
        node: NodeId,
        json: bool,
        out: &mut Pass<'_, S>,
    ) -> YamlResult<()> {
        for doc in tree.children(node)? {
            if json {
                self.json_value(tree, doc, out)?;
                out.put_char(b'\n')?;
            } else {
                out.put("---\n")?;
                self.yaml_top(tree, doc, out)?;
            }
        }
        Ok(())
    }

    /// A document or unkeyed root written at column zero.
    fn yaml_top<S: Sink + ?Sized>(
        &self,
        tree: &Tree<'_>,
        node: NodeId,
        out: &mut Pass<'_, S>,
    ) -> YamlResult<()> {
        let node_type = tree.node_type(node)?;
        let structure = node_type.without_style() - NodeType::DOC;
        if structure == NodeType::VAL {
            let val = tree.val(node)?;
            if val.is_empty() && !node_type.is_val_quoted() {
                if node_type.is_doc() {
                    return Ok(());
                }
                return out.put("\"\"\n");
            }
            out.put(&style::yaml_scalar(val, node_type.is_val_quoted()))?;
            return out.put_char(b'\n');
        }
        if structure == NodeType::MAP || structure == NodeType::SEQ {
            if !tree.has_children(node)? {
                return out.put(if structure == NodeType::MAP { "{}\n" } else { "[]\n" });
            }
            return self.yaml_children(tree, node, 0, false, out);
        }
        Err(violation(format!(
            "node {node} of type {} cannot be emitted here",
            node_type.type_str()
        )))
    }

    /// Children of a map or sequence, one per line at `indent`. With
    /// `inline_first` the first child continues the current line.
    fn yaml_children<S: Sink + ?Sized>(
        &self,
        tree: &Tree<'_>,
        node: NodeId,
        indent: usize,
        inline_first: bool,
        out: &mut Pass<'_, S>,
    ) -> YamlResult<()> {
        let is_map = tree.node_type(node)?.is_map();
        for (i, child) in tree.children(node)?.enumerate() {
            let inline = inline_first && i == 0;
            if is_map {
                self.yaml_entry(tree, child, indent, inline, out)?;
            } else {
                self.yaml_item(tree, child, indent, inline, out)?;
            }
        }
        Ok(())
    }

    /// `key: value` or `key:` followed by a nested block.
    fn yaml_entry<S: Sink + ?Sized>(
        &self,
        tree: &Tree<'_>,
        node: NodeId,
        indent: usize,
        inline: bool,
        out: &mut Pass<'_, S>,
    ) -> YamlResult<()> {
        let node_type = tree.node_type(node)?;
        if !inline {
            out.put_indent(indent)?;
        }
        out.put(&style::yaml_scalar(tree.key(node)?, node_type.is_key_quoted()))?;
        out.put_char(b':')?;
        match node_type.without_style() {
            t if t == NodeType::KEYVAL => {
                let val = tree.val(node)?;
                if !val.is_empty() || node_type.is_val_quoted() {
                    out.put_char(b' ')?;
                    out.put(&style::yaml_scalar(val, node_type.is_val_quoted()))?;
                }
                out.put_char(b'\n')
            }
            t if t == NodeType::KEYMAP || t == NodeType::KEYSEQ => {
                if !tree.has_children(node)? {
                    return out.put(if t == NodeType::KEYMAP { " {}\n" } else { " []\n" });
                }
                out.put_char(b'\n')?;
                self.yaml_children(tree, node, indent + self.indent, false, out)
            }
            _ => Err(violation(format!(
                "node {node} of type {} cannot be a map entry",
                node_type.type_str()
            ))),
        }
    }

    /// `- value`, with nested collections continuing on the dash line.
    fn yaml_item<S: Sink + ?Sized>(
        &self,
        tree: &Tree<'_>,
        node: NodeId,
        indent: usize,
        inline: bool,
        out: &mut Pass<'_, S>,
    ) -> YamlResult<()> {
        let node_type = tree.node_type(node)?;
        if !inline {
            out.put_indent(indent)?;
        }
        out.put_char(b'-')?;
        match node_type.without_style() {
            t if t == NodeType::VAL => {
                let val = tree.val(node)?;
                if !val.is_empty() || node_type.is_val_quoted() {
                    out.put_char(b' ')?;
                    out.put(&style::yaml_scalar(val, node_type.is_val_quoted()))?;
                }
                out.put_char(b'\n')
            }
            t if t == NodeType::MAP || t == NodeType::SEQ => {
                if !tree.has_children(node)? {
                    return out.put(if t == NodeType::MAP { " {}\n" } else { " []\n" });
                }
                out.put_char(b' ')?;
                self.yaml_children(tree, node, indent + 2, true, out)
            }
            _ => Err(violation(format!(
                "node {node} of type {} cannot be a sequence item",
                node_type.type_str()
            ))),
        }
    }

    fn json_value<S: Sink + ?Sized>(
        &self,
        tree: &Tree<'_>,
        node: NodeId,
        out: &mut Pass<'_, S>,
    ) -> YamlResult<()> {
        let node_type = tree.node_type(node)?;
        if node_type.has_val() {
            let val = tree.val(node)?;
            return out.put(&style::json_scalar(val, node_type.is_val_quoted())?);
        }
        let (open, close) = if node_type.is_map() {
            (b'{', b'}')
        } else if node_type.is_seq() && !node_type.is_stream() {
            (b'[', b']')
        } else if node_type.without_style() == NodeType::DOC {
            return out.put("null");
        } else {
            return Err(violation(format!(
                "node {node} of type {} cannot be emitted as JSON",
                node_type.type_str()
            )));
        };
        out.put_char(open)?;
        for (i, child) in tree.children(node)?.enumerate() {
            if i > 0 {
                out.put_char(b',')?;
            }
            if node_type.is_map() {
                out.put(&style::double_quoted(tree.key(child)?))?;
                out.put(": ")?;
            }
            self.json_value(tree, child, out)?;
        }
        out.put_char(close)
    }
}

/// Render `tree` with default settings; returns the bytes written.
pub fn emit<S: Sink + ?Sized>(tree: &Tree<'_>, sink: &mut S, json: bool) -> YamlResult<usize> {
    Emitter::new().emit(tree, sink, json)
}

pub fn emit_to_string(tree: &Tree<'_>, json: bool) -> YamlResult<String> {
    Emitter::new().emit_to_string(tree, json)
}

impl fmt::Display for Tree<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = emit_to_string(self, false).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tree<'static> {
        let mut tree = Tree::new();
        tree.to_map(ROOT).unwrap();
        let a = tree.append_child(ROOT).unwrap();
        tree.to_keyval(a, "a", "1").unwrap();
        let list = tree.append_child(ROOT).unwrap();
        tree.to_keyseq(list, "list").unwrap();
        for v in ["x", "y"] {
            let item = tree.append_child(list).unwrap();
            tree.to_val(item, v).unwrap();
        }
        tree
    }

    #[test]
    fn measured_size_matches_written_size() {
        let tree = sample();
        for json in [false, true] {
            let mut sink = VecSink::new();
            let written = Emitter::new().emit(&tree, &mut sink, json).unwrap();
            assert_eq!(written, sink.len());
        }
    }

    #[test]
    fn indent_width_applies_to_nested_blocks() {
        let tree = sample();
        let text = Emitter::with_indent(4).emit_to_string(&tree, false).unwrap();
        assert_eq!(text, "a: 1\nlist:\n    - x\n    - y\n");
    }
}
