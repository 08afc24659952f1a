//! Format sniffer: decide which historical shape an inbound payload has.
//!
//! Producers never wrote a version marker, so the shape is inferred from
//! key names. Checks run in a fixed order and the first match wins:
//!
//! 1. arrays are unwrapped one level and their first element reclassified;
//! 2. objects with `layers` are compact if a layer's position/size carries
//!    aliased coordinate keys, or if the top level has a probe key;
//!    otherwise canonical;
//! 3. objects with the `as`/`at` containers are compact, or legacy-root
//!    when the root lists children the layer map does not hold;
//! 4. anything else is unrecognized.
//!
//! Every verdict carries the `Evidence` that produced it so callers can
//! tell certain answers from heuristic ones.

use crate::alias::{AliasTable, PROBE_KEYS};
use crate::id::ROOT_ID;
use serde_json::{Map, Value};

/// Recognized document shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Format {
    Canonical,
    Compact,
    /// A single-element array around another shape.
    ArrayWrapped(Box<Format>),
    /// Compact containers whose root lists children stored elsewhere.
    LegacyRoot,
    Unrecognized,
}

/// Why a verdict was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evidence {
    /// Aliased coordinate keys inside a layer's position or box size.
    NestedAliasKeys,
    /// Only a top-level probe key matched. Heuristic.
    ProbeKey(&'static str),
    /// `layers` present and nothing aliased found.
    CanonicalKeys,
    /// `as`/`at` containers with a self-consistent root.
    AlternateContainer,
    /// `at` lists children absent from the layer map.
    DetachedRoot,
    NoLayerContainer,
    NotAnObject,
    EmptyArray,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub format: Format,
    pub evidence: Evidence,
}

impl Classification {
    fn new(format: Format, evidence: Evidence) -> Self {
        Self { format, evidence }
    }

    /// The verdict rests on the probe-key heuristic alone.
    pub fn is_heuristic(&self) -> bool {
        matches!(self.evidence, Evidence::ProbeKey(_))
    }

    pub fn is_wrapped(&self) -> bool {
        matches!(self.format, Format::ArrayWrapped(_))
    }

    /// The format of the payload itself, ignoring array wrapping.
    pub fn base_format(&self) -> &Format {
        match &self.format {
            Format::ArrayWrapped(inner) => inner,
            other => other,
        }
    }

    /// Whether keys must be reverse-aliased before decoding.
    pub fn is_aliased(&self) -> bool {
        matches!(self.base_format(), Format::Compact | Format::LegacyRoot)
    }
}

/// Classify with the legacy alias table.
pub fn classify(raw: &Value) -> Classification {
    classify_with(raw, AliasTable::legacy())
}

pub fn classify_with(raw: &Value, table: &AliasTable) -> Classification {
    let verdict = match raw {
        Value::Array(items) => match items.first() {
            None => Classification::new(Format::Unrecognized, Evidence::EmptyArray),
            Some(Value::Array(_)) => Classification::new(Format::Unrecognized, Evidence::NotAnObject),
            Some(first) => {
                let inner = classify_object(first, table);
                if inner.format == Format::Unrecognized {
                    inner
                } else {
                    Classification::new(Format::ArrayWrapped(Box::new(inner.format)), inner.evidence)
                }
            }
        },
        other => classify_object(other, table),
    };

    if verdict.is_heuristic() {
        log::info!(
            "classified as {:?} by heuristic ({:?}); treat as best-effort",
            verdict.format,
            verdict.evidence
        );
    } else {
        log::debug!("classified as {:?} ({:?})", verdict.format, verdict.evidence);
    }
    verdict
}

fn classify_object(raw: &Value, table: &AliasTable) -> Classification {
    let Value::Object(obj) = raw else {
        return Classification::new(Format::Unrecognized, Evidence::NotAnObject);
    };

    if let Some(layers) = obj.get("layers") {
        if has_nested_alias_keys(layers, table) {
            return Classification::new(Format::Compact, Evidence::NestedAliasKeys);
        }
        if let Some(probe) = PROBE_KEYS.iter().find(|k| obj.contains_key(**k)) {
            return Classification::new(Format::Compact, Evidence::ProbeKey(*probe));
        }
        return Classification::new(Format::Canonical, Evidence::CanonicalKeys);
    }

    let layers_alias = table.alias_of("layers").unwrap_or("as");
    let root_alias = table.root_alias();
    if obj.contains_key(layers_alias) || obj.contains_key(root_alias) {
        let container = match obj.get(layers_alias) {
            Some(Value::Object(map)) => map,
            _ => obj,
        };
        let root = obj.get(root_alias).or_else(|| container.get(root_alias));
        if root.is_some_and(|r| lists_missing_children(r, container, table)) {
            return Classification::new(Format::LegacyRoot, Evidence::DetachedRoot);
        }
        return Classification::new(Format::Compact, Evidence::AlternateContainer);
    }

    Classification::new(Format::Unrecognized, Evidence::NoLayerContainer)
}

/// Look inside each layer's props for aliased `x`/`y` or `width`/`height`.
fn has_nested_alias_keys(layers: &Value, table: &AliasTable) -> bool {
    let Value::Object(layers) = layers else {
        return false;
    };
    let alias = |key: &'static str| table.alias_of(key).unwrap_or(key);
    let field = |obj: &Map<String, Value>, key: &'static str| -> Option<Value> {
        obj.get(key).or_else(|| obj.get(alias(key))).cloned()
    };

    layers.values().any(|layer| {
        let Some(Value::Object(props)) = layer.as_object().and_then(|l| field(l, "props")) else {
            return false;
        };
        let position_aliased = matches!(
            field(&props, "position"),
            Some(Value::Object(p)) if p.contains_key(alias("x")) || p.contains_key(alias("y"))
        );
        let size_aliased = matches!(
            field(&props, "boxSize"),
            Some(Value::Object(s)) if s.contains_key(alias("width")) || s.contains_key(alias("height"))
        );
        position_aliased || size_aliased
    })
}

fn lists_missing_children(root: &Value, container: &Map<String, Value>, table: &AliasTable) -> bool {
    let child_alias = table.alias_of("child").unwrap_or("be");
    let children = root.get(child_alias).or_else(|| root.get("child"));
    let Some(Value::Array(children)) = children else {
        return false;
    };
    children.iter().any(|c| match c.as_str() {
        Some(id) => id != ROOT_ID && !container.contains_key(id),
        None => true,
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────
