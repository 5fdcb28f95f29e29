//! Minimal YAML reader producing a [`Tree`].
//!
//! Covers block mappings and sequences, one-line flow collections, plain and
//! quoted scalars, literal/folded block scalars, comments and `---` document
//! separators. Anchors, aliases and tags are kept as plain text.

use itertools::Itertools;
use tracing::{debug, instrument};

use crate::config::TreeSettings;
use crate::domain::{NodeId, NodeType, ScalarRef, Span, Tree, ROOT};
use crate::error_channel;
use crate::errors::{YamlError, YamlResult};

/// Parse `text` into a tree that owns a copy of it.
pub fn parse(text: &str) -> YamlResult<Tree<'static>> {
    parse_with(text, &TreeSettings::default())
}

#[instrument(level = "debug", skip(text, settings), fields(len = text.len()))]
pub fn parse_with(text: &str, settings: &TreeSettings) -> YamlResult<Tree<'static>> {
    error_channel::init_once();
    let mut tree = Tree::with_settings(settings);
    let base = tree.arena.append(text);
    Parser::new(&mut tree, text, Origin::Arena { base })?.run()?;
    debug!(nodes = tree.size(), arena = tree.arena_size(), "parsed into arena");
    Ok(tree)
}

/// Parse `text` in place: plain scalars reference the caller's buffer.
pub fn parse_in_place(text: &mut str) -> YamlResult<Tree<'_>> {
    parse_in_place_with(text, &TreeSettings::default())
}

#[instrument(level = "debug", skip(text, settings), fields(len = text.len()))]
pub fn parse_in_place_with<'s>(
    text: &'s mut str,
    settings: &TreeSettings,
) -> YamlResult<Tree<'s>> {
    error_channel::init_once();
    let text: &'s str = text;
    let mut tree = Tree::borrowing(text, settings);
    Parser::new(&mut tree, text, Origin::Source)?.run()?;
    debug!(nodes = tree.size(), arena = tree.arena_size(), "parsed in place");
    Ok(tree)
}

/// Where spans of the input text live once parsed.
#[derive(Debug, Clone, Copy)]
enum Origin {
    /// The input was copied into the arena starting at `base`.
    Arena { base: usize },
    /// The input is the tree's borrowed source buffer.
    Source,
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    number: usize,
    /// Byte offset of the line start in the input.
    start: usize,
    indent: usize,
    /// Indentation followed by a tab.
    tab_indent: bool,
    /// Line text without the newline.
    raw: &'a str,
    /// Text after the indentation, comment stripped, right trimmed.
    content: &'a str,
}

#[derive(Debug, Clone, Copy)]
enum Head {
    Plain,
    Doc,
    Key { key: ScalarRef, quoted: bool },
}

impl Head {
    fn flags(&self) -> NodeType {
        match self {
            Head::Plain => NodeType::NOTYPE,
            Head::Doc => NodeType::DOC,
            Head::Key { quoted: false, .. } => NodeType::KEY,
            Head::Key { quoted: true, .. } => NodeType::KEY | NodeType::KEY_QUOTED,
        }
    }

    fn key(&self) -> ScalarRef {
        match self {
            Head::Key { key, .. } => *key,
            _ => ScalarRef::Empty,
        }
    }
}

struct Parser<'a, 't, 's> {
    tree: &'t mut Tree<'s>,
    text: &'a str,
    origin: Origin,
    lines: Vec<Line<'a>>,
    pos: usize,
    end: usize,
}

fn is_seq_entry(content: &str) -> bool {
    content == "-" || content.starts_with("- ")
}

fn is_doc_start(content: &str) -> bool {
    content == "---" || content.starts_with("--- ")
}

/// Cut a trailing `# comment` that is not inside quotes.
fn strip_comment(s: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev = ' ';
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '#' if prev == ' ' || prev == '\t' => return &s[..i],
                '"' | '\'' if " \t[{,:-".contains(prev) => quote = Some(c),
                _ => {}
            },
        }
        prev = c;
    }
    s
}

/// Byte index just past the closing quote of the quoted scalar `s` starts
/// with, and whether its body needs unescaping.
fn scan_quoted(s: &str) -> Option<(usize, bool)> {
    let bytes = s.as_bytes();
    let quote = bytes[0];
    let mut i = 1;
    let mut escapes = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote == b'"' => {
                escapes = true;
                i += 2;
                continue;
            }
            b'\'' if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') => {
                escapes = true;
                i += 2;
                continue;
            }
            b if b == quote => return Some((i + 1, escapes)),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Byte index of the `:` that ends a mapping key at the start of `content`.
fn key_colon(content: &str) -> Option<usize> {
    if content.starts_with(['"', '\'']) {
        let (close, _) = scan_quoted(content)?;
        let after = content[close..].trim_start();
        let rest = after.strip_prefix(':')?;
        return (rest.is_empty() || rest.starts_with(' ')).then(|| content.len() - after.len());
    }
    if content.starts_with(['[', '{']) || is_seq_entry(content) {
        return None;
    }
    let colon = match content.find(": ") {
        Some(c) => c,
        None if content.ends_with(':') => content.len() - 1,
        None => return None,
    };
    (!content[..colon].trim_end().is_empty()).then_some(colon)
}

/// Whether `key` is a complete quoted scalar, and if so whether its body
/// needs unescaping.
fn scan_quoted_key(key: &str) -> Option<bool> {
    if !key.starts_with(['"', '\'']) {
        return None;
    }
    scan_quoted(key)
        .filter(|(close, _)| *close == key.len())
        .map(|(_, escapes)| escapes)
}

fn unescape_double(body: &str) -> Result<String, String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = chars.next().ok_or("dangling escape")?;
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '0' => out.push('\0'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'e' => out.push('\x1b'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            ' ' | '"' | '\\' | '/' => out.push(escaped),
            'x' | 'u' | 'U' => {
                let width = match escaped {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex: String = chars.by_ref().take(width).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == width)
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("invalid escape \\{escaped}{hex}"))?;
                out.push(decoded);
            }
            other => return Err(format!("unknown escape \\{other}")),
        }
    }
    Ok(out)
}

impl<'a, 't, 's> Parser<'a, 't, 's> {
    fn new(tree: &'t mut Tree<'s>, text: &'a str, origin: Origin) -> YamlResult<Self> {
        let mut lines = Vec::new();
        let mut start = 0;
        for (i, raw) in text.split_inclusive('\n').enumerate() {
            let line_start = start;
            start += raw.len();
            let raw = raw.trim_end_matches(['\n', '\r']);
            let indent = raw.len() - raw.trim_start_matches(' ').len();
            let rest = &raw[indent..];
            let tab_indent = rest.starts_with('\t') && !rest.trim().is_empty();
            let content = strip_comment(rest).trim_end();
            lines.push(Line {
                number: i + 1,
                start: line_start,
                indent,
                tab_indent,
                raw,
                content,
            });
        }
        let end = lines.len();
        Ok(Self {
            tree,
            text,
            origin,
            lines,
            pos: 0,
            end,
        })
    }

    fn run(mut self) -> YamlResult<()> {
        let markers: Vec<usize> = (0..self.lines.len())
            .filter(|&i| self.lines[i].indent == 0 && is_doc_start(self.lines[i].content))
            .collect();
        if markers.is_empty() {
            self.end = self.lines.len();
            return self.document(ROOT, Head::Plain);
        }

        self.tree.init_node(ROOT, NodeType::STREAM, ScalarRef::Empty, ScalarRef::Empty);
        let mut bounds = Vec::new();
        let leading = (0..markers[0]).any(|i| self.is_content(i));
        if leading {
            bounds.push((0, markers[0]));
        }
        for (k, &m) in markers.iter().enumerate() {
            let stop = markers.get(k + 1).copied().unwrap_or(self.lines.len());
            bounds.push((m, stop));
        }
        for (from, to) in bounds {
            self.pos = from;
            self.end = to;
            if is_doc_start(self.lines[from].content) {
                self.open_doc_line(from);
            }
            let doc = self.tree.push_child(ROOT);
            self.document(doc, Head::Doc)?;
        }
        debug!(documents = self.tree.num_children(ROOT)?, "parsed stream");
        Ok(())
    }

    /// Turn `--- rest` into a content line holding `rest`, or skip a bare
    /// marker.
    fn open_doc_line(&mut self, i: usize) {
        let line = self.lines[i];
        let rest = line.content[3..].trim_start();
        if rest.is_empty() {
            self.pos = i + 1;
        } else {
            let indent = self.offset_of(rest) - line.start;
            self.lines[i] = Line {
                indent,
                content: rest,
                ..line
            };
        }
    }

    fn is_content(&self, i: usize) -> bool {
        let content = self.lines[i].content;
        !content.is_empty() && content != "..."
    }

    fn offset_of(&self, fragment: &str) -> usize {
        fragment.as_ptr() as usize - self.text.as_ptr() as usize
    }

    fn span(&self, fragment: &str) -> ScalarRef {
        if fragment.is_empty() {
            return ScalarRef::Empty;
        }
        let start = self.offset_of(fragment);
        match self.origin {
            Origin::Arena { base } => ScalarRef::Arena(Span::new(base + start, fragment.len())),
            Origin::Source => ScalarRef::Source(Span::new(start, fragment.len())),
        }
    }

    fn error(&self, line: usize, fragment: &str, message: impl Into<String>) -> YamlError {
        let l = &self.lines[line];
        let column = self.offset_of(fragment).saturating_sub(l.start) + 1;
        error_channel::raise(YamlError::parse(l.number, column, message))
    }

    /// Index of the next content line in the current document, if any.
    fn peek(&self) -> YamlResult<Option<usize>> {
        for i in self.pos..self.end {
            if self.is_content(i) {
                if self.lines[i].tab_indent {
                    return Err(self.error(
                        i,
                        &self.lines[i].raw[self.lines[i].indent..],
                        "tab characters are not allowed for indentation",
                    ));
                }
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    fn set(&mut self, node: NodeId, base: NodeType, head: Head, val: ScalarRef, val_quoted: bool) {
        let mut node_type = base | head.flags();
        if val_quoted {
            node_type |= NodeType::VAL_QUOTED;
        }
        self.tree.init_node(node, node_type, head.key(), val);
    }

    fn document(&mut self, node: NodeId, head: Head) -> YamlResult<()> {
        let Some(first) = self.peek()? else {
            if matches!(head, Head::Doc) {
                self.set(node, NodeType::VAL, head, ScalarRef::Empty, false);
            }
            return Ok(());
        };
        let indent = self.lines[first].indent;
        self.block(node, indent, head, None)?;
        if let Some(extra) = self.peek()? {
            return Err(self.error(extra, self.lines[extra].content, "unexpected content"));
        }
        Ok(())
    }

    /// Parse the block whose first content line sits at `indent`.
    fn block(
        &mut self,
        node: NodeId,
        indent: usize,
        head: Head,
        owner: Option<usize>,
    ) -> YamlResult<()> {
        let Some(i) = self.peek()? else {
            self.set(node, NodeType::VAL, head, ScalarRef::Empty, false);
            return Ok(());
        };
        let content = self.lines[i].content;
        if is_seq_entry(content) {
            return self.sequence(node, indent, head);
        }
        if key_colon(content).is_some() {
            return self.mapping(node, indent, head);
        }
        self.pos = i + 1;
        self.value(node, i, content, head, owner)
    }

    fn sequence(&mut self, node: NodeId, indent: usize, head: Head) -> YamlResult<()> {
        self.set(node, NodeType::SEQ, head, ScalarRef::Empty, false);
        while let Some(i) = self.peek()? {
            let line = self.lines[i];
            if line.indent < indent || !is_seq_entry(line.content) {
                if line.indent > indent {
                    return Err(self.error(i, line.content, "unexpected indentation"));
                }
                break;
            }
            if line.indent > indent {
                return Err(self.error(i, line.content, "unexpected indentation"));
            }
            let child = self.tree.push_child(node);
            let rest = line.content[1..].trim_start();
            if rest.is_empty() {
                self.pos = i + 1;
                match self.peek()? {
                    Some(next) if self.lines[next].indent > indent => {
                        let child_indent = self.lines[next].indent;
                        self.block(child, child_indent, Head::Plain, Some(indent))?;
                    }
                    _ => self.set(child, NodeType::VAL, Head::Plain, ScalarRef::Empty, false),
                }
            } else if is_seq_entry(rest) || key_colon(rest).is_some() {
                let child_indent = self.offset_of(rest) - line.start;
                self.lines[i] = Line {
                    indent: child_indent,
                    content: rest,
                    ..line
                };
                self.block(child, child_indent, Head::Plain, Some(indent))?;
            } else {
                self.pos = i + 1;
                self.value(child, i, rest, Head::Plain, Some(indent))?;
            }
        }
        Ok(())
    }

    fn mapping(&mut self, node: NodeId, indent: usize, head: Head) -> YamlResult<()> {
        self.set(node, NodeType::MAP, head, ScalarRef::Empty, false);
        while let Some(i) = self.peek()? {
            let line = self.lines[i];
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(self.error(i, line.content, "unexpected indentation"));
            }
            if is_seq_entry(line.content) {
                break;
            }
            let Some((key, rest)) = self.split_key(i, line.content)? else {
                return Err(self.error(i, line.content, "expected a mapping entry"));
            };
            self.pos = i + 1;
            let child = self.tree.push_child(node);
            if !rest.is_empty() {
                self.value(child, i, rest, key, Some(indent))?;
                continue;
            }
            match self.peek()? {
                Some(next) if self.lines[next].indent > indent => {
                    let child_indent = self.lines[next].indent;
                    self.block(child, child_indent, key, Some(indent))?;
                }
                Some(next)
                    if self.lines[next].indent == indent
                        && is_seq_entry(self.lines[next].content) =>
                {
                    self.sequence(child, indent, key)?;
                }
                _ => self.set(child, NodeType::VAL, key, ScalarRef::Empty, false),
            }
        }
        Ok(())
    }

    /// Split `key: rest` into the key head and the value text.
    fn split_key(&mut self, line: usize, content: &'a str) -> YamlResult<Option<(Head, &'a str)>> {
        let Some(colon) = key_colon(content) else {
            return Ok(None);
        };
        let key = content[..colon].trim_end();
        let rest = content[colon + 1..].trim_start();
        let head = match scan_quoted_key(key) {
            Some(escapes) => Head::Key {
                key: self.quoted(line, key, escapes)?,
                quoted: true,
            },
            None => Head::Key {
                key: self.span(key),
                quoted: false,
            },
        };
        Ok(Some((head, rest)))
    }

    /// Reference to the body of a quoted scalar (quotes included in `quoted`).
    fn quoted(&mut self, line: usize, quoted: &'a str, escapes: bool) -> YamlResult<ScalarRef> {
        let body = &quoted[1..quoted.len() - 1];
        if !escapes {
            return Ok(self.span(body));
        }
        let owned = if quoted.starts_with('"') {
            unescape_double(body).map_err(|m| self.error(line, quoted, m))?
        } else {
            body.replace("''", "'")
        };
        Ok(self.tree.arena.copy(&owned))
    }

    /// Parse the scalar or flow value `text` found on `line`.
    fn value(
        &mut self,
        node: NodeId,
        line: usize,
        text: &'a str,
        head: Head,
        owner: Option<usize>,
    ) -> YamlResult<()> {
        match text.as_bytes()[0] {
            b'[' | b'{' => {
                let mut pos = 0;
                self.flow(node, line, text, &mut pos, head)?;
                let trailing = text[pos..].trim_start();
                if !trailing.is_empty() {
                    return Err(self.error(line, trailing, "unexpected text after flow collection"));
                }
                Ok(())
            }
            b'"' | b'\'' => {
                let Some((close, escapes)) = scan_quoted(text) else {
                    return Err(self.error(line, text, "unterminated quoted scalar"));
                };
                let trailing = text[close..].trim_start();
                if !trailing.is_empty() {
                    return Err(self.error(line, trailing, "unexpected text after quoted scalar"));
                }
                let val = self.quoted(line, &text[..close], escapes)?;
                self.set(node, NodeType::VAL, head, val, true);
                Ok(())
            }
            b'|' | b'>' => self.block_scalar(node, line, text, head, owner),
            _ => {
                let val = self.span(text);
                self.set(node, NodeType::VAL, head, val, false);
                Ok(())
            }
        }
    }

    fn block_scalar(
        &mut self,
        node: NodeId,
        line: usize,
        header: &'a str,
        head: Head,
        owner: Option<usize>,
    ) -> YamlResult<()> {
        let folded = header.starts_with('>');
        let chomp = match &header[1..] {
            "" => None,
            "-" => Some('-'),
            "+" => Some('+'),
            _ => return Err(self.error(line, header, "unsupported block scalar header")),
        };

        let mut body: Vec<&str> = Vec::new();
        let mut block_indent = None;
        while self.pos < self.end {
            let l = self.lines[self.pos];
            if l.raw.trim().is_empty() {
                body.push("");
                self.pos += 1;
                continue;
            }
            if owner.is_some_and(|o| l.indent <= o) {
                break;
            }
            let indent = *block_indent.get_or_insert(l.indent);
            if l.indent < indent {
                return Err(self.error(self.pos, l.raw.trim_start(), "inconsistent block scalar indentation"));
            }
            body.push(&l.raw[indent..]);
            self.pos += 1;
        }

        let trailing_blank = body.iter().rev().take_while(|l| l.is_empty()).count();
        let lines = &body[..body.len() - trailing_blank];
        let mut text = if folded {
            let mut out = String::new();
            let mut prev_text = false;
            for l in lines {
                if l.is_empty() {
                    out.push('\n');
                    prev_text = false;
                } else {
                    if prev_text {
                        out.push(' ');
                    }
                    out.push_str(l);
                    prev_text = true;
                }
            }
            out
        } else {
            lines.iter().join("\n")
        };
        match chomp {
            Some('-') => {}
            Some(_) => {
                text.push('\n');
                text.push_str(&"\n".repeat(trailing_blank));
            }
            None if !text.is_empty() => text.push('\n'),
            None => {}
        }
        let val = self.tree.arena.copy(&text);
        self.set(node, NodeType::VAL, head, val, true);
        Ok(())
    }

    /// Parse a flow collection starting at `text[*pos]`.
    fn flow(
        &mut self,
        node: NodeId,
        line: usize,
        text: &'a str,
        pos: &mut usize,
        head: Head,
    ) -> YamlResult<()> {
        let is_map = text.as_bytes()[*pos] == b'{';
        let close = if is_map { b'}' } else { b']' };
        let base = if is_map { NodeType::MAP } else { NodeType::SEQ };
        self.set(node, base, head, ScalarRef::Empty, false);
        *pos += 1;
        loop {
            skip_ws(text, pos);
            match text.as_bytes().get(*pos) {
                None => {
                    let what = if is_map { "mapping" } else { "sequence" };
                    return Err(self.error(line, &text[..1], format!("unterminated flow {what}")));
                }
                Some(&b) if b == close => {
                    *pos += 1;
                    return Ok(());
                }
                _ => {}
            }
            let child = self.tree.push_child(node);
            let child_head = if is_map {
                self.flow_key(line, text, pos)?
            } else {
                Head::Plain
            };
            self.flow_value(child, line, text, pos, child_head, close)?;
            skip_ws(text, pos);
            match text.as_bytes().get(*pos) {
                Some(b',') => *pos += 1,
                Some(&b) if b == close => {}
                Some(_) => {
                    return Err(self.error(
                        line,
                        &text[*pos..],
                        format!("expected ',' or '{}'", close as char),
                    ))
                }
                None => {}
            }
        }
    }

    fn flow_key(&mut self, line: usize, text: &'a str, pos: &mut usize) -> YamlResult<Head> {
        let rest = &text[*pos..];
        let (key, quoted, used) = if rest.starts_with(['"', '\'']) {
            let Some((close, escapes)) = scan_quoted(rest) else {
                return Err(self.error(line, rest, "unterminated quoted scalar"));
            };
            (self.quoted(line, &rest[..close], escapes)?, true, close)
        } else {
            let len = rest.find([':', ',', '}']).unwrap_or(rest.len());
            (self.span(rest[..len].trim_end()), false, len)
        };
        *pos += used;
        skip_ws(text, pos);
        if text.as_bytes().get(*pos) == Some(&b':') {
            *pos += 1;
        } else {
            return Err(self.error(line, &text[(*pos).min(text.len())..], "expected ':' in flow mapping"));
        }
        Ok(Head::Key { key, quoted })
    }

    fn flow_value(
        &mut self,
        node: NodeId,
        line: usize,
        text: &'a str,
        pos: &mut usize,
        head: Head,
        close: u8,
    ) -> YamlResult<()> {
        skip_ws(text, pos);
        let rest = &text[*pos..];
        match rest.as_bytes().first() {
            Some(b'[') | Some(b'{') => self.flow(node, line, text, pos, head),
            Some(b'"') | Some(b'\'') => {
                let Some((end, escapes)) = scan_quoted(rest) else {
                    return Err(self.error(line, rest, "unterminated quoted scalar"));
                };
                let val = self.quoted(line, &rest[..end], escapes)?;
                *pos += end;
                self.set(node, NodeType::VAL, head, val, true);
                Ok(())
            }
            _ => {
                let len = rest
                    .find(|c: char| c == ',' || c == close as char)
                    .unwrap_or(rest.len());
                let val = self.span(rest[..len].trim_end());
                *pos += len;
                self.set(node, NodeType::VAL, head, val, false);
                Ok(())
            }
        }
    }
}

fn skip_ws(text: &str, pos: &mut usize) {
    while text.as_bytes().get(*pos) == Some(&b' ') {
        *pos += 1;
    }
}
