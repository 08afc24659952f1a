//! Document assembler: the single entry point for loading an inbound
//! template, text style or shape fragment onto a canvas.
//!
//! Sniff → expand (lenient) → normalize. Never fails: anything that cannot
//! be decoded degrades to a fabricated placeholder layer.

use crate::alias::AliasTable;
use crate::error::DecodeError;
use crate::id::LayerId;
use crate::normalize::{FallbackReason, NormalizeConfig, Reconciled, fallback, normalize_with};
use crate::sniff::classify_with;
use crate::unpack::{ExpandMode, Expander};
use serde_json::Value;

/// Alias table and normalizer defaults for [`assemble_with`].
#[derive(Debug, Clone)]
pub struct AssembleConfig<'t> {
    pub table: &'t AliasTable,
    pub normalize: NormalizeConfig,
}

impl Default for AssembleConfig<'static> {
    fn default() -> Self {
        Self {
            table: AliasTable::legacy(),
            normalize: NormalizeConfig::default(),
        }
    }
}

/// Assemble `raw` under `host` with default config.
#[must_use]
pub fn assemble(raw: &Value, host: LayerId) -> Reconciled {
    assemble_with(raw, host, &AssembleConfig::default())
}

#[must_use]
pub fn assemble_with(raw: &Value, host: LayerId, config: &AssembleConfig<'_>) -> Reconciled {
    let classification = classify_with(raw, config.table);
    let expander = Expander::new(config.table, ExpandMode::Lenient);
    match expander.expand_with_repairs(raw, &classification) {
        Ok((doc, mut repairs)) => {
            let mut reconciled = normalize_with(doc, host, &config.normalize);
            repairs.append(&mut reconciled.repairs);
            reconciled.repairs = repairs;
            reconciled
        }
        Err(err) => {
            log::warn!("assemble: cannot decode payload ({err})");
            let (title, description) = loose_metadata(raw, config.table);
            fallback(
                host,
                FallbackReason::Undecodable(err),
                title,
                description,
                &config.normalize,
            )
        }
    }
}

/// Assemble a JSON string. Invalid JSON also degrades to the placeholder.
#[must_use]
pub fn assemble_str(json: &str, host: LayerId) -> Reconciled {
    match serde_json::from_str::<Value>(json) {
        Ok(raw) => assemble(&raw, host),
        Err(err) => {
            log::warn!("assemble: payload is not JSON ({err})");
            let config = AssembleConfig::default();
            fallback(
                host,
                FallbackReason::Undecodable(DecodeError::Unrecognized("not valid JSON")),
                None,
                None,
                &config.normalize,
            )
        }
    }
}

/// Best-effort title/description from a payload that failed to decode.
fn loose_metadata<'v>(raw: &'v Value, table: &AliasTable) -> (Option<&'v str>, Option<&'v str>) {
    let body = match raw {
        Value::Array(items) => items.first().unwrap_or(raw),
        other => other,
    };
    let field = |key: &str| {
        let alias = table.alias_of(key);
        body.get(key)
            .or_else(|| alias.and_then(|a| body.get(a)))
            .and_then(Value::as_str)
    };
    (field("title"), field("description"))
}

// ─── Tests ────────────────────────────────────────────────────────────────
