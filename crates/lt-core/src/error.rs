//! Error types for the layer-tree codec.
//!
//! Only decoding can fail structurally. Normalization and assembly never
//! raise; they report repairs through `normalize::Reconciled` instead.

use crate::id::LayerId;
use thiserror::Error;

/// A compact or canonical document could not be turned into a valid `Document`.
///
/// Every variant names the first offending layer so callers can point the
/// user at the broken node.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unrecognized document shape: {0}")]
    Unrecognized(&'static str),

    #[error("layer `{id}` is not an object")]
    NotAnObject { id: LayerId },

    #[error("layer `{id}` is malformed: {message}")]
    MalformedLayer { id: LayerId, message: String },

    #[error("document has no root layer `{root}`")]
    MissingRoot { root: LayerId },

    #[error("root layer `{root}` has parent `{parent}`")]
    RootHasParent { root: LayerId, parent: LayerId },

    #[error("layer `{id}` has no parent but `{root}` is the root")]
    MultipleRoots { id: LayerId, root: LayerId },

    #[error("layer `{id}` references missing parent `{parent}`")]
    DanglingParent { id: LayerId, parent: LayerId },

    #[error("layer `{id}` lists missing child `{child}`")]
    DanglingChild { id: LayerId, child: LayerId },

    #[error("layer `{id}` and parent `{parent}` disagree about their link")]
    ParentMismatch { id: LayerId, parent: LayerId },

    #[error("layer `{id}` appears in more than one child list")]
    DuplicateChild { id: LayerId },

    #[error("parent chain of layer `{id}` is cyclic")]
    Cycle { id: LayerId },
}

/// Failure to turn one wire-level layer object into a typed `LayerNode`.
#[derive(Debug, Error)]
pub enum LayerError {
    #[error("missing layer type")]
    MissingType,

    #[error("unknown layer type `{0}`")]
    UnknownType(String),

    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl LayerError {
    /// Attach the layer id this error belongs to.
    pub fn at(self, id: LayerId) -> DecodeError {
        DecodeError::MalformedLayer {
            id,
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_layer() {
        let err = DecodeError::DanglingParent {
            id: LayerId::intern("logo"),
            parent: LayerId::intern("ghost"),
        };
        assert_eq!(
            err.to_string(),
            "layer `logo` references missing parent `ghost`"
        );
    }

    #[test]
    fn layer_error_carries_id() {
        let err = LayerError::UnknownType("SparkleLayer".into()).at(LayerId::intern("s1"));
        assert_eq!(
            err,
            DecodeError::MalformedLayer {
                id: LayerId::intern("s1"),
                message: "unknown layer type `SparkleLayer`".into(),
            }
        );
    }
}
