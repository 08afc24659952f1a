//! Core layer-tree data model.
//!
//! A `Document` is a flat map of layers addressed by id. Containment is
//! stored twice: every layer names its `parent`, and every container lists
//! its children in `child` (z-order, back to front). The two directions must
//! agree; `Document::validate` checks that.
//!
//! Props are a closed union keyed by `LayerType`. The wire shape of a layer is
//! `{ type: { resolvedName }, props, locked, child, parent }`.

use crate::error::{DecodeError, LayerError};
use crate::id::LayerId;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Ordered child id list. Most containers hold a handful of layers.
pub type ChildList = SmallVec<[LayerId; 4]>;

// ─── Geometry ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Position, size and rotation shared by every layer variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub position: Point,
    pub box_size: Size,
    /// Degrees, clockwise.
    #[serde(default)]
    pub rotate: f64,
}

// ─── Nested descriptors ──────────────────────────────────────────────────

/// Image payload of image layers and image-filled frames/backgrounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    pub url: String,
    #[serde(default)]
    pub thumb: String,
    pub box_size: Size,
    #[serde(default)]
    pub position: Point,
    #[serde(default)]
    pub rotate: f64,
}

/// One style (regular, bold, ...) of a font family and the files serving it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// A font family used by a text layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontDescriptor {
    pub name: String,
    #[serde(default)]
    pub fonts: Vec<FontStyle>,
}

/// Text/shape effect such as shadow, echo or outline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub name: String,
    #[serde(default)]
    pub settings: EffectSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blur: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transparency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thickness: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

// ─── Layer types ─────────────────────────────────────────────────────────

/// The layer variant, persisted as `type.resolvedName`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerType {
    Root,
    Text,
    Shape,
    Image,
    Frame,
    Group,
    Effect,
}

impl LayerType {
    pub const ALL: [LayerType; 7] = [
        LayerType::Root,
        LayerType::Text,
        LayerType::Shape,
        LayerType::Image,
        LayerType::Frame,
        LayerType::Group,
        LayerType::Effect,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LayerType::Root => "RootLayer",
            LayerType::Text => "TextLayer",
            LayerType::Shape => "ShapeLayer",
            LayerType::Image => "ImageLayer",
            LayerType::Frame => "FrameLayer",
            LayerType::Group => "GroupLayer",
            LayerType::Effect => "EffectLayer",
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayerType {
    type Err = LayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayerType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| LayerError::UnknownType(s.to_string()))
    }
}

// ─── Props ───────────────────────────────────────────────────────────────

fn unit_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootProps {
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient_background: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextProps {
    #[serde(flatten)]
    pub placement: Placement,
    /// Rich-text HTML.
    pub text: String,
    #[serde(default = "unit_scale")]
    pub scale: f64,
    #[serde(default)]
    pub fonts: Vec<FontDescriptor>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub font_sizes: Vec<f64>,
    #[serde(default)]
    pub effect: Option<Effect>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeProps {
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(default)]
    pub clip_path: String,
    /// Intrinsic size of the clip path. Older templates omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_size: Option<Size>,
    /// SVG `viewBox` the clip path was authored in, e.g. `"0 0 256 256"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_box: Option<String>,
    #[serde(default)]
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageProps {
    #[serde(flatten)]
    pub placement: Placement,
    pub image: ImageDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameProps {
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(default)]
    pub clip_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProps {
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectProps {
    #[serde(flatten)]
    pub placement: Placement,
    #[serde(default)]
    pub effect: Option<Effect>,
}

/// Props of a layer, one variant per `LayerType`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LayerProps {
    Root(RootProps),
    Text(TextProps),
    Shape(ShapeProps),
    Image(ImageProps),
    Frame(FrameProps),
    Group(GroupProps),
    Effect(EffectProps),
}

impl LayerProps {
    pub fn kind(&self) -> LayerType {
        match self {
            LayerProps::Root(_) => LayerType::Root,
            LayerProps::Text(_) => LayerType::Text,
            LayerProps::Shape(_) => LayerType::Shape,
            LayerProps::Image(_) => LayerType::Image,
            LayerProps::Frame(_) => LayerType::Frame,
            LayerProps::Group(_) => LayerType::Group,
            LayerProps::Effect(_) => LayerType::Effect,
        }
    }

    pub fn placement(&self) -> &Placement {
        match self {
            LayerProps::Root(p) => &p.placement,
            LayerProps::Text(p) => &p.placement,
            LayerProps::Shape(p) => &p.placement,
            LayerProps::Image(p) => &p.placement,
            LayerProps::Frame(p) => &p.placement,
            LayerProps::Group(p) => &p.placement,
            LayerProps::Effect(p) => &p.placement,
        }
    }

    pub fn placement_mut(&mut self) -> &mut Placement {
        match self {
            LayerProps::Root(p) => &mut p.placement,
            LayerProps::Text(p) => &mut p.placement,
            LayerProps::Shape(p) => &mut p.placement,
            LayerProps::Image(p) => &mut p.placement,
            LayerProps::Frame(p) => &mut p.placement,
            LayerProps::Group(p) => &mut p.placement,
            LayerProps::Effect(p) => &mut p.placement,
        }
    }

    /// Decode a canonical props object for a layer of the given type.
    ///
    /// Unknown fields are dropped. A root layer may omit its geometry
    /// entirely; it is filled with zeros.
    pub fn decode(kind: LayerType, value: Value) -> Result<Self, LayerError> {
        let mut value = match value {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        if kind == LayerType::Root
            && let Value::Object(map) = &mut value
        {
            map.entry("position")
                .or_insert_with(|| json!({ "x": 0.0, "y": 0.0 }));
            map.entry("boxSize")
                .or_insert_with(|| json!({ "width": 0.0, "height": 0.0 }));
        }

        Ok(match kind {
            LayerType::Root => LayerProps::Root(serde_json::from_value(value)?),
            LayerType::Text => LayerProps::Text(serde_json::from_value(value)?),
            LayerType::Shape => LayerProps::Shape(serde_json::from_value(value)?),
            LayerType::Image => LayerProps::Image(serde_json::from_value(value)?),
            LayerType::Frame => LayerProps::Frame(serde_json::from_value(value)?),
            LayerType::Group => LayerProps::Group(serde_json::from_value(value)?),
            LayerType::Effect => LayerProps::Effect(serde_json::from_value(value)?),
        })
    }
}

// ─── Layer ───────────────────────────────────────────────────────────────

/// One visual element of a design page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "WireLayer")]
pub struct LayerNode {
    pub props: LayerProps,
    /// Informational; this crate never enforces it.
    pub locked: bool,
    /// Children in z-order, back to front.
    pub child: ChildList,
    /// `None` only for the document root.
    pub parent: Option<LayerId>,
}

impl LayerNode {
    pub fn new(props: LayerProps, parent: Option<LayerId>) -> Self {
        Self {
            props,
            locked: false,
            child: SmallVec::new(),
            parent,
        }
    }

    /// A bare root container.
    pub fn root() -> Self {
        Self::new(LayerProps::Root(RootProps::default()), None)
    }

    pub fn kind(&self) -> LayerType {
        self.props.kind()
    }

    /// Decode one canonical layer object, coercing the loose wire shape.
    pub fn from_value(value: Value) -> Result<Self, LayerError> {
        let wire: WireLayer = serde_json::from_value(value)?;
        Self::try_from(wire)
    }
}

/// `type` field as written.
#[derive(Serialize)]
struct TypeTag<'a> {
    #[serde(rename = "resolvedName")]
    resolved_name: &'a str,
}

/// `type` field as read.
#[derive(Deserialize)]
struct WireType {
    #[serde(rename = "resolvedName")]
    resolved_name: String,
}

/// Loosely-typed layer object, as producers actually write it.
#[derive(Deserialize)]
struct WireLayer {
    #[serde(rename = "type", default)]
    kind: Option<WireType>,
    #[serde(default)]
    props: Value,
    #[serde(default)]
    locked: Option<bool>,
    #[serde(default)]
    child: Option<ChildList>,
    #[serde(default)]
    parent: Option<LayerId>,
}

impl TryFrom<WireLayer> for LayerNode {
    type Error = LayerError;

    fn try_from(wire: WireLayer) -> Result<Self, Self::Error> {
        // Empty-string parents were written by producers that meant "none".
        let parent = wire.parent.filter(|p| !p.as_str().is_empty());
        let kind = match wire.kind {
            Some(tag) => tag.resolved_name.parse()?,
            None if parent.is_none() => LayerType::Root,
            None => return Err(LayerError::MissingType),
        };
        Ok(LayerNode {
            props: LayerProps::decode(kind, wire.props)?,
            locked: wire.locked.unwrap_or(false),
            child: wire.child.unwrap_or_default(),
            parent,
        })
    }
}

impl Serialize for LayerNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("LayerNode", 5)?;
        state.serialize_field(
            "type",
            &TypeTag {
                resolved_name: self.kind().as_str(),
            },
        )?;
        state.serialize_field("props", &self.props)?;
        state.serialize_field("locked", &self.locked)?;
        state.serialize_field("child", &self.child)?;
        state.serialize_field("parent", &self.parent)?;
        state.end()
    }
}

// ─── Document ────────────────────────────────────────────────────────────

/// A full layer tree for one page: `{ rootId, layers }`.
///
/// Normalized template fragments reuse this type with `root_id` naming the
/// hosting canvas root, which is then absent from `layers`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub root_id: LayerId,
    pub layers: BTreeMap<LayerId, LayerNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Document {
    /// Create a document holding only a bare root container.
    #[must_use]
    pub fn new(root_id: LayerId) -> Self {
        let mut layers = BTreeMap::new();
        layers.insert(root_id, LayerNode::root());
        Self {
            root_id,
            layers,
            title: None,
            description: None,
        }
    }

    /// Create an empty fragment addressed to `root_id` (no root layer stored).
    #[must_use]
    pub fn fragment(root_id: LayerId) -> Self {
        Self {
            root_id,
            layers: BTreeMap::new(),
            title: None,
            description: None,
        }
    }

    /// Append `node` as the last child of `parent`, fixing both link directions.
    pub fn add_layer(&mut self, parent: LayerId, id: LayerId, mut node: LayerNode) {
        node.parent = Some(parent);
        if let Some(p) = self.layers.get_mut(&parent) {
            p.child.push(id);
        }
        self.layers.insert(id, node);
    }

    pub fn get(&self, id: LayerId) -> Option<&LayerNode> {
        self.layers.get(&id)
    }

    pub fn get_mut(&mut self, id: LayerId) -> Option<&mut LayerNode> {
        self.layers.get_mut(&id)
    }

    pub fn root(&self) -> Option<&LayerNode> {
        self.layers.get(&self.root_id)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Check every structural invariant of a self-contained document.
    ///
    /// # Errors
    /// The first violation found, naming the offending layer.
    pub fn validate(&self) -> Result<(), DecodeError> {
        let root = self.root().ok_or(DecodeError::MissingRoot {
            root: self.root_id,
        })?;
        if let Some(parent) = root.parent {
            return Err(DecodeError::RootHasParent {
                root: self.root_id,
                parent,
            });
        }

        for (&id, node) in &self.layers {
            match node.parent {
                None if id != self.root_id => {
                    return Err(DecodeError::MultipleRoots {
                        id,
                        root: self.root_id,
                    });
                }
                None => {}
                Some(parent) => {
                    let owner = self
                        .layers
                        .get(&parent)
                        .ok_or(DecodeError::DanglingParent { id, parent })?;
                    if !owner.child.contains(&id) {
                        return Err(DecodeError::ParentMismatch { id, parent });
                    }
                }
            }
        }

        let mut listed = HashSet::new();
        for (&id, node) in &self.layers {
            for &child in &node.child {
                let c = self
                    .layers
                    .get(&child)
                    .ok_or(DecodeError::DanglingChild { id, child })?;
                if c.parent != Some(id) {
                    return Err(DecodeError::ParentMismatch {
                        id: child,
                        parent: id,
                    });
                }
                if !listed.insert(child) {
                    return Err(DecodeError::DuplicateChild { id: child });
                }
            }
        }

        toposort(&self.parent_graph(), None)
            .map(|_| ())
            .map_err(|cycle| DecodeError::Cycle {
                id: cycle.node_id(),
            })
    }

    /// Whether every layer's parent chain ends at `host` without cycles and
    /// every parent/child link is mirrored. Used for normalized fragments,
    /// whose hosting root lives outside `layers`.
    pub fn is_attached_to(&self, host: LayerId) -> bool {
        if self.layers.contains_key(&host) {
            return false;
        }
        for (&id, node) in &self.layers {
            let Some(parent) = node.parent else {
                return false;
            };
            if parent != host {
                match self.layers.get(&parent) {
                    Some(owner) if owner.child.contains(&id) => {}
                    _ => return false,
                }
            }
            if node.child.iter().any(|c| {
                self.layers
                    .get(c)
                    .is_none_or(|child| child.parent != Some(id))
            }) {
                return false;
            }
        }
        toposort(&self.parent_graph(), None).is_ok()
    }

    /// Parent → child edges derived from `parent` pointers.
    fn parent_graph(&self) -> DiGraphMap<LayerId, ()> {
        let mut graph = DiGraphMap::new();
        for (&id, node) in &self.layers {
            graph.add_node(id);
            if let Some(parent) = node.parent {
                graph.add_edge(parent, id, ());
            }
        }
        graph
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
