//! Expander: any recognized wire shape → `Document`.
//!
//! Canonical payloads are decoded as-is; compact and legacy-root payloads
//! are reverse-aliased first. Expansion is scoped: a key that already names a
//! field of its enclosing object is kept, and keys missing from the alias
//! table pass through, so partially compacted documents decode too.

use crate::alias::AliasTable;
use crate::error::DecodeError;
use crate::id::{LayerId, ROOT_ID};
use crate::model::{Document, LayerNode, LayerType};
use crate::normalize::Repair;
use crate::sniff::{Classification, Format, classify_with};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// How to treat layers that cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpandMode {
    /// First bad layer or invariant violation is an error.
    #[default]
    Strict,
    /// Missing placement and inferable types are filled in; layers that
    /// still cannot be decoded are dropped with a warning. Invariants are left
    /// for the normalizer to repair.
    Lenient,
}

/// Unpack with the legacy alias table.
///
/// Safe to call on canonical input: it decodes unchanged.
///
/// # Errors
/// `DecodeError` naming the first structurally invalid node.
pub fn unpack(raw: &Value) -> Result<Document, DecodeError> {
    unpack_with(raw, AliasTable::legacy())
}

/// Unpack with an explicit alias table.
///
/// # Errors
/// See [`unpack`].
pub fn unpack_with(raw: &Value, table: &AliasTable) -> Result<Document, DecodeError> {
    Expander::new(table, ExpandMode::Strict).expand(raw)
}

/// Configured expander. Cheap to construct; holds only references.
#[derive(Debug, Clone, Copy)]
pub struct Expander<'t> {
    table: &'t AliasTable,
    mode: ExpandMode,
}

impl<'t> Expander<'t> {
    pub fn new(table: &'t AliasTable, mode: ExpandMode) -> Self {
        Self { table, mode }
    }

    /// Classify and decode `raw`.
    ///
    /// # Errors
    /// Unrecognized shapes always fail; in strict mode also malformed layers
    /// and invariant violations.
    pub fn expand(&self, raw: &Value) -> Result<Document, DecodeError> {
        let classification = classify_with(raw, self.table);
        self.expand_classified(raw, &classification)
    }

    /// Decode `raw` under an already computed classification.
    ///
    /// # Errors
    /// See [`Expander::expand`].
    pub fn expand_classified(
        &self,
        raw: &Value,
        classification: &Classification,
    ) -> Result<Document, DecodeError> {
        self.expand_with_repairs(raw, classification)
            .map(|(doc, _)| doc)
    }

    /// Like [`Expander::expand_classified`], also returning the coercions
    /// lenient mode applied to individual layers.
    ///
    /// # Errors
    /// See [`Expander::expand`].
    pub fn expand_with_repairs(
        &self,
        raw: &Value,
        classification: &Classification,
    ) -> Result<(Document, Vec<Repair>), DecodeError> {
        let body = match raw {
            Value::Array(items) if classification.is_wrapped() => items
                .first()
                .ok_or(DecodeError::Unrecognized("empty array"))?,
            other => other,
        };

        let mut repairs = Vec::new();
        let doc = match classification.base_format() {
            Format::Canonical => self.finish(self.decode(body, false, &mut repairs)?)?,
            Format::Compact if classification.is_heuristic() => {
                self.decode_ambiguous(body, &mut repairs)?
            }
            Format::Compact => self.finish(self.decode(body, true, &mut repairs)?)?,
            Format::LegacyRoot => {
                let mut doc = self.decode(body, true, &mut repairs)?;
                reattach_root_children(&mut doc);
                self.finish(doc)?
            }
            Format::ArrayWrapped(_) => return Err(DecodeError::Unrecognized("nested array")),
            Format::Unrecognized => {
                return Err(DecodeError::Unrecognized("no layer container"));
            }
        };
        Ok((doc, repairs))
    }

    /// A probe-key verdict may be a canonical document with an unlucky
    /// top-level key. Fall back to a canonical decode when the aliased one
    /// fails or yields no content layers.
    fn decode_ambiguous(
        &self,
        body: &Value,
        repairs: &mut Vec<Repair>,
    ) -> Result<Document, DecodeError> {
        let mut aliased_repairs = Vec::new();
        let aliased = self
            .decode(body, true, &mut aliased_repairs)
            .and_then(|doc| self.finish(doc));
        if matches!(&aliased, Ok(doc) if has_content(doc)) {
            repairs.extend(aliased_repairs);
            return aliased;
        }

        log::info!("aliased decode of an ambiguous payload found no layers; retrying as canonical");
        let mut plain_repairs = Vec::new();
        match self
            .decode(body, false, &mut plain_repairs)
            .and_then(|doc| self.finish(doc))
        {
            Ok(doc) if has_content(&doc) || aliased.is_err() => {
                repairs.extend(plain_repairs);
                Ok(doc)
            }
            _ => {
                repairs.extend(aliased_repairs);
                aliased
            }
        }
    }

    /// Strict mode validates; lenient mode only settles the root id.
    fn finish(&self, mut doc: Document) -> Result<Document, DecodeError> {
        if self.mode == ExpandMode::Strict {
            doc.validate()?;
        } else if !doc.layers.contains_key(&doc.root_id)
            && let Some(id) = sole_parentless(&doc.layers)
        {
            doc.root_id = id;
        }
        Ok(doc)
    }

    fn decode(
        &self,
        body: &Value,
        aliased: bool,
        repairs: &mut Vec<Repair>,
    ) -> Result<Document, DecodeError> {
        let Value::Object(top) = body else {
            return Err(DecodeError::Unrecognized("document is not an object"));
        };
        let root_slot = if aliased { self.table.root_alias() } else { ROOT_ID };

        let mut container = None;
        let mut root_id = None;
        let mut title = None;
        let mut description = None;
        for (key, value) in top {
            match canonical_name(self.table, key, aliased) {
                "layers" => container = value.as_object(),
                "rootId" => root_id = value.as_str().map(LayerId::intern),
                "title" => title = value.as_str().map(str::to_string),
                "description" => description = value.as_str().map(str::to_string),
                _ => {}
            }
        }
        // Without a container the layers sit directly on the top level.
        let flat = container.is_none();
        let container = container.unwrap_or(top);

        let root_id = root_id.unwrap_or_else(LayerId::root);
        let mut entries: Vec<(&str, &Value)> = container
            .iter()
            .filter(|(_, v)| !flat || v.is_object())
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        if !flat && let Some(root) = top.get(root_slot) {
            if container.contains_key(root_slot) {
                log::warn!("root stored both inside and beside the layer map; using the inner one");
            } else {
                entries.push((root_slot, root));
            }
        }

        let mut layers = BTreeMap::new();
        for (key, value) in entries {
            let id = if key == root_slot {
                root_id
            } else {
                LayerId::intern(key)
            };
            match self.decode_layer(id, value, aliased, repairs) {
                Ok(node) => {
                    layers.insert(id, node);
                }
                Err(err) if self.mode == ExpandMode::Lenient => {
                    log::warn!("dropping undecodable layer: {err}");
                }
                Err(err) => return Err(err),
            }
        }

        // Canonical payloads without an explicit root may still name it differently.
        let root_id = if !aliased && !layers.contains_key(&root_id) {
            sole_parentless(&layers).unwrap_or(root_id)
        } else {
            root_id
        };

        log::debug!("decoded {} layers (aliased: {aliased})", layers.len());
        Ok(Document {
            root_id,
            layers,
            title,
            description,
        })
    }

    fn decode_layer(
        &self,
        id: LayerId,
        value: &Value,
        aliased: bool,
        repairs: &mut Vec<Repair>,
    ) -> Result<LayerNode, DecodeError> {
        if !value.is_object() {
            return Err(DecodeError::NotAnObject { id });
        }
        let mut value = if aliased {
            expand_keys(value, self.table)
        } else {
            value.clone()
        };
        if self.mode == ExpandMode::Lenient {
            coerce_layer(id, &mut value, repairs);
        }
        LayerNode::from_value(value).map_err(|e| e.at(id))
    }
}

fn canonical_name<'a>(table: &AliasTable, key: &'a str, aliased: bool) -> &'a str {
    if aliased { table.expand(key) } else { key }
}

/// Which object a key lives in. Keys that already name a field of their
/// object are kept; the alias table reuses some plain field names (`x`, `y`)
/// as aliases for other keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Layer,
    Type,
    Props,
    Point,
    Size,
    Image,
    Font,
    FontStyle,
    Effect,
    Settings,
    Other,
}

impl Scope {
    fn fields(self) -> &'static [&'static str] {
        match self {
            Scope::Layer => &["type", "props", "locked", "child", "parent"],
            Scope::Type => &["resolvedName"],
            Scope::Props => &[
                "position",
                "boxSize",
                "rotate",
                "text",
                "scale",
                "fonts",
                "colors",
                "fontSizes",
                "effect",
                "clipPath",
                "shapeSize",
                "viewBox",
                "color",
                "image",
                "gradientBackground",
            ],
            Scope::Point => &["x", "y"],
            Scope::Size => &["width", "height"],
            Scope::Image => &["url", "thumb", "boxSize", "position", "rotate"],
            Scope::Font => &["name", "fonts"],
            Scope::FontStyle => &["style", "urls"],
            Scope::Effect => &["name", "settings"],
            Scope::Settings => &[
                "offset",
                "direction",
                "blur",
                "transparency",
                "thickness",
                "color",
            ],
            Scope::Other => &[],
        }
    }

    /// Scope of the value stored under canonical `key`.
    fn child(self, key: &str) -> Scope {
        match (self, key) {
            (Scope::Layer, "type") => Scope::Type,
            (Scope::Layer, "props") => Scope::Props,
            (Scope::Props | Scope::Image, "position") => Scope::Point,
            (Scope::Props | Scope::Image, "boxSize") | (Scope::Props, "shapeSize") => Scope::Size,
            (Scope::Props, "image") => Scope::Image,
            (Scope::Props, "fonts") => Scope::Font,
            (Scope::Font, "fonts") => Scope::FontStyle,
            (Scope::Props, "effect") => Scope::Effect,
            (Scope::Effect, "settings") => Scope::Settings,
            _ => Scope::Other,
        }
    }
}

/// Restore canonical key names below a layer object.
pub(crate) fn expand_keys(value: &Value, table: &AliasTable) -> Value {
    expand_scoped(value, table, Scope::Layer)
}

fn expand_scoped(value: &Value, table: &AliasTable, scope: Scope) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let key = if scope.fields().contains(&k.as_str()) {
                        k.as_str()
                    } else {
                        table.expand(k)
                    };
                    (key.to_string(), expand_scoped(v, table, scope.child(key)))
                })
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| expand_scoped(v, table, scope))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Fill in what lenient decoding can guess: the type of an untyped child
/// that carries text, and zero placement for non-root layers missing it.
fn coerce_layer(id: LayerId, value: &mut Value, repairs: &mut Vec<Repair>) {
    let Value::Object(layer) = value else {
        return;
    };
    let has_parent = layer
        .get("parent")
        .and_then(Value::as_str)
        .is_some_and(|p| !p.is_empty());
    let has_text = layer
        .get("props")
        .and_then(|p| p.get("text"))
        .is_some_and(Value::is_string);

    if !layer.contains_key("type") && has_parent && has_text {
        layer.insert(
            "type".to_string(),
            json!({ "resolvedName": LayerType::Text.as_str() }),
        );
        record(
            repairs,
            Repair::InferredType {
                id,
                kind: LayerType::Text,
            },
        );
    }

    let kind = match layer.get("type").and_then(|t| t.get("resolvedName")) {
        Some(name) => name.as_str().and_then(|n| n.parse::<LayerType>().ok()),
        None if has_parent => None,
        None => Some(LayerType::Root),
    };
    // Roots get zero geometry from the props decoder; unknown types fail anyway.
    if !matches!(kind, Some(k) if k != LayerType::Root) {
        return;
    }

    let props = layer
        .entry("props")
        .or_insert_with(|| Value::Object(Map::new()));
    if props.is_null() {
        *props = Value::Object(Map::new());
    }
    let Value::Object(props) = props else {
        return;
    };
    let mut defaulted = false;
    if !props.contains_key("position") {
        props.insert("position".to_string(), json!({ "x": 0.0, "y": 0.0 }));
        defaulted = true;
    }
    if !props.contains_key("boxSize") {
        props.insert("boxSize".to_string(), json!({ "width": 0.0, "height": 0.0 }));
        defaulted = true;
    }
    if defaulted {
        record(repairs, Repair::DefaultedPlacement { id });
    }
}

fn record(repairs: &mut Vec<Repair>, repair: Repair) {
    log::warn!("expand: {repair:?}");
    repairs.push(repair);
}

/// Whether any layer besides root containers was decoded.
fn has_content(doc: &Document) -> bool {
    doc.layers.values().any(|n| n.kind() != LayerType::Root)
}

/// The only layer without a parent, if there is exactly one.
fn sole_parentless(layers: &BTreeMap<LayerId, LayerNode>) -> Option<LayerId> {
    let mut roots = layers.iter().filter(|(_, n)| n.parent.is_none()).map(|(id, _)| *id);
    match (roots.next(), roots.next()) {
        (Some(id), None) => Some(id),
        _ => None,
    }
}

/// Legacy producers stored the root's child list out of sync with the layer
/// map. Rebuild it from the layers that point at the root, keeping the
/// recorded order for ids that still resolve.
fn reattach_root_children(doc: &mut Document) {
    let root_id = doc.root_id;
    let Some(root) = doc.layers.get(&root_id) else {
        return;
    };

    let points_at_root =
        |id: &LayerId| doc.layers.get(id).is_some_and(|n| n.parent == Some(root_id));
    let mut rebuilt: Vec<LayerId> = Vec::with_capacity(root.child.len());
    for id in &root.child {
        if points_at_root(id) && !rebuilt.contains(id) {
            rebuilt.push(*id);
        } else {
            log::warn!("legacy root: dropping unresolved child `{id}`");
        }
    }
    for (id, node) in &doc.layers {
        if node.parent == Some(root_id) && !rebuilt.contains(id) {
            rebuilt.push(*id);
        }
    }

    if let Some(root) = doc.layers.get_mut(&root_id) {
        root.child = rebuilt.into_iter().collect();
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
