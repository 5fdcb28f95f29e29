use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// A bitmask describing what a node holds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NodeType: u64 {
        /// a leaf node, has a (possibly empty) value
        const VAL = 1 << 0;
        /// member of a map, has a key
        const KEY = 1 << 1;
        /// a map: a parent of keyed nodes
        const MAP = 1 << 2;
        /// a seq: a parent of unkeyed nodes
        const SEQ = 1 << 3;
        /// a document
        const DOC = 1 << 4;
        /// a stream: a seq of docs
        const STREAM = 1 << 5 | Self::SEQ.bits();
        /// the key was quoted in the source
        const KEY_QUOTED = 1 << 6;
        /// the value was quoted (or was a block scalar) in the source
        const VAL_QUOTED = 1 << 7;

        const KEYVAL = Self::KEY.bits() | Self::VAL.bits();
        const KEYMAP = Self::KEY.bits() | Self::MAP.bits();
        const KEYSEQ = Self::KEY.bits() | Self::SEQ.bits();
        const DOCMAP = Self::DOC.bits() | Self::MAP.bits();
        const DOCSEQ = Self::DOC.bits() | Self::SEQ.bits();
        const DOCVAL = Self::DOC.bits() | Self::VAL.bits();
    }
}

impl NodeType {
    pub const NOTYPE: NodeType = NodeType::empty();

    const STYLE_BITS: NodeType = NodeType::KEY_QUOTED.union(NodeType::VAL_QUOTED);

    pub fn is_stream(self) -> bool {
        self.contains(NodeType::STREAM)
    }

    pub fn is_doc(self) -> bool {
        self.contains(NodeType::DOC)
    }

    pub fn is_container(self) -> bool {
        self.intersects(NodeType::MAP | NodeType::SEQ)
    }

    pub fn is_map(self) -> bool {
        self.contains(NodeType::MAP)
    }

    pub fn is_seq(self) -> bool {
        self.contains(NodeType::SEQ)
    }

    pub fn has_key(self) -> bool {
        self.contains(NodeType::KEY)
    }

    pub fn has_val(self) -> bool {
        self.contains(NodeType::VAL)
    }

    pub fn is_val(self) -> bool {
        self.without_style() == NodeType::VAL
    }

    pub fn is_keyval(self) -> bool {
        self.without_style() == NodeType::KEYVAL
    }

    pub fn is_key_quoted(self) -> bool {
        self.contains(NodeType::KEY_QUOTED)
    }

    pub fn is_val_quoted(self) -> bool {
        self.contains(NodeType::VAL_QUOTED)
    }

    pub fn is_quoted(self) -> bool {
        self.intersects(Self::STYLE_BITS)
    }

    pub fn is_notype(self) -> bool {
        self.is_empty()
    }

    /// The structural part of the type, ignoring scalar style bits.
    pub fn without_style(self) -> NodeType {
        self.difference(Self::STYLE_BITS)
    }

    /// Canonical name of the structural type.
    pub fn type_str(self) -> &'static str {
        let t = self.without_style();
        if t.is_stream() {
            return "STREAM";
        }
        match t {
            t if t == NodeType::NOTYPE => "NOTYPE",
            t if t == NodeType::VAL => "VAL",
            t if t == NodeType::KEYVAL => "KEYVAL",
            t if t == NodeType::MAP => "MAP",
            t if t == NodeType::SEQ => "SEQ",
            t if t == NodeType::KEYMAP => "KEYMAP",
            t if t == NodeType::KEYSEQ => "KEYSEQ",
            t if t == NodeType::DOC => "DOC",
            t if t == NodeType::DOCMAP => "DOCMAP",
            t if t == NodeType::DOCSEQ => "DOCSEQ",
            t if t == NodeType::DOCVAL => "DOCVAL",
            _ => "(unk)",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_str())
    }
}
