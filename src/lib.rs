//! yamltree: an index-based YAML document tree with subtree relocation and a
//! two-pass emitter.
//!
//! ```
//! let tree = yamltree::parse("a: 1\nb: 2\n")?;
//! assert_eq!(yamltree::emit_to_string(&tree, true)?, r#"{"a": 1,"b": 2}"#);
//! # Ok::<(), yamltree::YamlError>(())
//! ```

pub mod config;
pub mod domain;
pub mod emitter;
pub mod error_channel;
pub mod errors;
pub mod parser;
pub mod tree_traits;
pub mod util;

pub use config::{EmitSettings, Settings, TreeSettings};
pub use domain::{NodeData, NodeId, NodeType, ScalarRef, Tree, ROOT};
pub use emitter::{emit, emit_to_string, Emitter, Sink, SliceSink, VecSink, WriterSink};
pub use errors::{ErrorKind, SourceLocation, YamlError, YamlResult};
pub use parser::{parse, parse_in_place, parse_in_place_with, parse_with};
pub use tree_traits::TreeNodeConvert;
