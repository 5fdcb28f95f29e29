//! Domain layer: the node graph, its scalar storage and relocation rules
//!
//! This layer is independent of external concerns (no text format, no I/O).

pub mod node_type;
pub mod relocate;
pub mod scalar;
pub mod tree;

pub use node_type::NodeType;
pub use scalar::{Arena, ScalarRef, Span};
pub use tree::{Children, NodeData, NodeId, Tree, ROOT};
