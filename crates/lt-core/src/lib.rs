pub mod alias;
pub mod assemble;
pub mod error;
pub mod id;
pub mod model;
pub mod normalize;
pub mod pack;
pub mod sniff;
pub mod unpack;
pub mod viewbox;

pub use alias::AliasTable;
pub use assemble::{AssembleConfig, assemble, assemble_str, assemble_with};
pub use error::{DecodeError, LayerError};
pub use id::LayerId;
pub use model::*;
pub use normalize::{
    FallbackReason, NormalizeConfig, Outcome, Reconciled, Repair, normalize, normalize_with,
};
pub use pack::{CompactDocument, pack, pack_with};
pub use sniff::{Classification, Evidence, Format, classify, classify_with};
pub use unpack::{ExpandMode, Expander, unpack, unpack_with};
