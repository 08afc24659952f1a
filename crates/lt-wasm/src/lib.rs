//! WASM bridge for the browser editor.
//!
//! Compiled via `wasm-pack build --target web`. Every function takes and
//! returns JSON strings; decode failures surface as a thrown JS `Error`.

use lt_core::{LayerId, Outcome, Reconciled};
use serde_json::{Value, json};
use wasm_bindgen::prelude::*;

/// Pack a canonical document into its compact form.
#[wasm_bindgen(js_name = packJson)]
pub fn pack_json(document: &str) -> Result<String, JsValue> {
    panic_hook_setup();
    pack_inner(document).map_err(js_error)
}

/// Expand any recognized wire shape into a canonical document.
#[wasm_bindgen(js_name = unpackJson)]
pub fn unpack_json(raw: &str) -> Result<String, JsValue> {
    panic_hook_setup();
    unpack_inner(raw).map_err(js_error)
}

/// Classify a payload. Returns `{"format":"...","evidence":"...","heuristic":bool}`.
#[wasm_bindgen(js_name = classifyJson)]
pub fn classify_json(raw: &str) -> Result<String, JsValue> {
    panic_hook_setup();
    classify_inner(raw).map_err(js_error)
}

/// Assemble a template under `host_id`. Never throws.
///
/// Returns `{"rootId","layers","topLevel","outcome","fallbackReason"?,"repairs"}`.
#[wasm_bindgen(js_name = assembleJson)]
pub fn assemble_json(raw: &str, host_id: &str) -> String {
    panic_hook_setup();
    let reconciled = lt_core::assemble_str(raw, LayerId::intern(host_id));
    reconciled_to_json(&reconciled).to_string()
}

// ─── Native implementations ──────────────────────────────────────────────

fn pack_inner(document: &str) -> Result<String, String> {
    let doc: lt_core::Document =
        serde_json::from_str(document).map_err(|e| format!("invalid document: {e}"))?;
    doc.validate().map_err(|e| e.to_string())?;
    let packed = lt_core::pack(&doc).map_err(|e| e.to_string())?;
    Ok(packed.to_json_string())
}

fn unpack_inner(raw: &str) -> Result<String, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    let doc = lt_core::unpack(&value).map_err(|e| e.to_string())?;
    serde_json::to_string(&doc).map_err(|e| e.to_string())
}

fn classify_inner(raw: &str) -> Result<String, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
    let c = lt_core::classify(&value);
    Ok(json!({
        "format": format!("{:?}", c.format),
        "evidence": format!("{:?}", c.evidence),
        "heuristic": c.is_heuristic(),
    })
    .to_string())
}

fn reconciled_to_json(reconciled: &Reconciled) -> Value {
    let doc = &reconciled.document;
    let mut out = json!({
        "rootId": doc.root_id,
        "layers": doc.layers,
        "topLevel": reconciled.top_level,
        "outcome": "attached",
        "repairs": reconciled.repairs.iter().map(|r| format!("{r:?}")).collect::<Vec<_>>(),
    });
    if let Outcome::Fallback(reason) = &reconciled.outcome {
        out["outcome"] = json!("fallback");
        out["fallbackReason"] = json!(format!("{reason:?}"));
    }
    out
}

fn js_error(message: String) -> JsValue {
    log::warn!("{message}");
    js_sys::Error::new(&message).into()
}

// ─── Panic hook for WASM debugging ───────────────────────────────────────

fn panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("layer tree WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CANONICAL: &str = r#"{
        "rootId": "ROOT",
        "layers": {
            "ROOT": { "type": { "resolvedName": "RootLayer" }, "props": {}, "child": ["x"], "parent": null },
            "x": {
                "type": { "resolvedName": "TextLayer" },
                "props": { "position": { "x": 0, "y": 0 }, "boxSize": { "width": 300, "height": 100 }, "text": "<p>Hi</p>" },
                "child": [], "parent": "ROOT"
            }
        }
    }"#;

    #[test]
    fn pack_then_unpack() {
        let packed = pack_inner(CANONICAL).unwrap();
        let value: Value = serde_json::from_str(&packed).unwrap();
        assert!(value.get("as").is_some());

        let unpacked: Value = serde_json::from_str(&unpack_inner(&packed).unwrap()).unwrap();
        assert_eq!(unpacked["layers"]["x"]["props"]["text"], "<p>Hi</p>");
        assert_eq!(unpacked["rootId"], "ROOT");
    }

    #[test]
    fn classify_reports_format() {
        let out: Value = serde_json::from_str(&classify_inner(CANONICAL).unwrap()).unwrap();
        assert_eq!(out["format"], "Canonical");
        assert_eq!(out["heuristic"], false);
    }

    #[test]
    fn bad_input_is_an_error() {
        assert!(unpack_inner("{").is_err());
        assert!(unpack_inner(r#"{"hello":1}"#).is_err());
        assert!(pack_inner(r#"{"rootId":"ROOT","layers":{}}"#).is_err());
    }

    #[test]
    fn assemble_reports_outcome() {
        let out: Value = serde_json::from_str(&assemble_json(CANONICAL, "CANVAS")).unwrap();
        assert_eq!(out["rootId"], "CANVAS");
        assert_eq!(out["outcome"], "attached");
        assert_eq!(out["topLevel"], json!(["x"]));
        assert_eq!(out["layers"]["x"]["parent"], "CANVAS");

        let out: Value = serde_json::from_str(&assemble_json("[]", "CANVAS")).unwrap();
        assert_eq!(out["outcome"], "fallback");
        assert_eq!(out["layers"].as_object().unwrap().len(), 1);
    }
}
