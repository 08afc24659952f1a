//! Compactor: `Document` → compact wire form.
//!
//! Every object key is replaced by its alias, the root layer is stored under
//! the root alias (`at`) and the layer map under `as`. Values, including ids
//! in `child`/`parent`, pass through untouched.

use crate::alias::AliasTable;
use crate::model::Document;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A packed document, ready to be stored or sent as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompactDocument(Value);

impl CompactDocument {
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn to_json_string(&self) -> String {
        self.0.to_string()
    }
}

impl From<CompactDocument> for Value {
    fn from(doc: CompactDocument) -> Self {
        doc.0
    }
}

/// Pack a document with the legacy alias table.
///
/// # Errors
/// Only if a layer cannot be serialized or a layer id collides with the
/// root slot.
pub fn pack(doc: &Document) -> Result<CompactDocument, serde_json::Error> {
    pack_with(doc, AliasTable::legacy())
}

/// Pack a document with an explicit alias table.
///
/// # Errors
/// See [`pack`].
pub fn pack_with(doc: &Document, table: &AliasTable) -> Result<CompactDocument, serde_json::Error> {
    let root_slot = table.root_alias();
    let mut layers = Map::new();

    for (&id, node) in &doc.layers {
        let slot = if id == doc.root_id {
            root_slot
        } else if id.as_str() == root_slot {
            return Err(serde::ser::Error::custom(format!(
                "layer id `{id}` collides with the root slot"
            )));
        } else {
            id.as_str()
        };
        let value = serde_json::to_value(node)?;
        layers.insert(slot.to_string(), shorten_keys(value, table));
    }

    let mut out = Map::new();
    if !doc.root_id.is_root() {
        out.insert(
            table.shorten("rootId").to_string(),
            Value::String(doc.root_id.as_str().to_string()),
        );
    }
    out.insert(table.shorten("layers").to_string(), Value::Object(layers));
    if let Some(title) = &doc.title {
        out.insert(table.shorten("title").to_string(), Value::String(title.clone()));
    }
    if let Some(description) = &doc.description {
        out.insert(
            table.shorten("description").to_string(),
            Value::String(description.clone()),
        );
    }

    log::debug!("packed {} layers", doc.layers.len());
    Ok(CompactDocument(Value::Object(out)))
}

/// Recursively alias every object key below `value`.
pub(crate) fn shorten_keys(value: Value, table: &AliasTable) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (table.shorten(&k).to_string(), shorten_keys(v, table)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(|v| shorten_keys(v, table)).collect())
        }
        other => other,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::LayerId;
    use crate::model::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn headline() -> LayerNode {
        LayerNode::new(
            LayerProps::Text(TextProps {
                placement: Placement {
                    position: Point { x: 4.0, y: 8.0 },
                    box_size: Size::new(120.0, 40.0),
                    rotate: 15.0,
                },
                text: "<p>x</p>".into(),
                scale: 1.0,
                fonts: vec![FontDescriptor {
                    name: "Inter".into(),
                    fonts: vec![FontStyle {
                        style: Some("Bold".into()),
                        urls: vec!["https://fonts.example/inter-bold.woff2".into()],
                    }],
                }],
                colors: vec!["#111111".into()],
                font_sizes: vec![32.0],
                effect: None,
            }),
            None,
        )
    }

    fn sample() -> Document {
        let mut doc = Document::new(LayerId::root());
        doc.add_layer(LayerId::root(), LayerId::intern("pk_b"), headline());
        doc.add_layer(LayerId::root(), LayerId::intern("pk_a"), headline());
        doc
    }

    #[test]
    fn root_is_stored_under_alias() {
        let packed = pack(&sample()).unwrap().into_value();
        let layers = &packed["as"];
        assert!(layers.get("ROOT").is_none());
        assert_eq!(layers["at"]["be"], json!(["pk_b", "pk_a"]));
        assert_eq!(layers["at"]["bf"], Value::Null);
        assert_eq!(layers["at"]["au"]["av"], "RootLayer");
    }

    #[test]
    fn props_and_nested_descriptors_are_aliased() {
        let packed = pack(&sample()).unwrap().into_value();
        let props = &packed["as"]["pk_a"]["aw"];
        assert_eq!(props["ba"], json!({ "by": 4.0, "bz": 8.0 }));
        assert_eq!(props["ax"], json!({ "bv": 120.0, "bw": 40.0 }));
        assert_eq!(props["bb"], 15.0);
        assert_eq!(props["bj"], "<p>x</p>");
        assert_eq!(props["bk"][0]["o"], "Inter");
        assert_eq!(props["bk"][0]["bk"][0]["p"], "Bold");
        assert_eq!(props["bo"], json!([32.0]));
    }

    #[test]
    fn values_pass_through_unchanged() {
        let packed = pack(&sample()).unwrap().into_value();
        // `parent` values are ids, not keys.
        assert_eq!(packed["as"]["pk_a"]["bf"], "ROOT");
    }

    #[test]
    fn custom_root_id_is_recorded() {
        let root = LayerId::intern("page_root");
        let mut doc = Document::new(root);
        doc.add_layer(root, LayerId::intern("pk_c"), headline());
        let packed = pack(&doc).unwrap().into_value();
        assert_eq!(packed["d"], "page_root");
        assert!(packed["as"].get("at").is_some());
        assert_eq!(packed["as"]["pk_c"]["bf"], "page_root");
    }

    #[test]
    fn default_root_id_is_implicit() {
        let packed = pack(&sample()).unwrap().into_value();
        assert!(packed.get("d").is_none());
    }

    #[test]
    fn metadata_is_aliased() {
        let mut doc = sample();
        doc.title = Some("Spring sale".into());
        doc.description = Some("Poster".into());
        let packed = pack(&doc).unwrap().into_value();
        assert_eq!(packed["a"], "Spring sale");
        assert_eq!(packed["b"], "Poster");
    }

    #[test]
    fn layer_named_like_root_slot_is_rejected() {
        let mut doc = sample();
        doc.add_layer(LayerId::root(), LayerId::intern("at"), headline());
        assert!(pack(&doc).is_err());
    }
}
