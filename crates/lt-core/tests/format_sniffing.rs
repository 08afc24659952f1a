//! Integration tests: every historical payload shape classifies correctly.

use lt_core::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};

fn load(text: &str) -> Value {
    serde_json::from_str(text).expect("fixture is valid JSON")
}

#[test]
fn canonical_fixture() {
    let c = classify(&load(include_str!("fixtures/all_variants.json")));
    assert_eq!(c.format, Format::Canonical);
    assert!(!c.is_heuristic());
}

#[test]
fn compact_container_fixture() {
    let c = classify(&load(include_str!("fixtures/compact_container.json")));
    assert_eq!(c.format, Format::Compact);
    assert_eq!(c.evidence, Evidence::AlternateContainer);
}

#[test]
fn compact_flat_fixture() {
    let c = classify(&load(include_str!("fixtures/compact_flat.json")));
    assert_eq!(c.format, Format::Compact);
}

#[test]
fn legacy_root_fixture() {
    let c = classify(&load(include_str!("fixtures/legacy_root.json")));
    assert_eq!(c.format, Format::LegacyRoot);
    assert_eq!(c.evidence, Evidence::DetachedRoot);
}

#[test]
fn array_wrapped_fixtures() {
    for (text, inner) in [
        (include_str!("fixtures/all_variants.json"), Format::Canonical),
        (include_str!("fixtures/compact_container.json"), Format::Compact),
        (include_str!("fixtures/legacy_root.json"), Format::LegacyRoot),
    ] {
        let wrapped = Value::Array(vec![load(text)]);
        let c = classify(&wrapped);
        assert_eq!(c.format, Format::ArrayWrapped(Box::new(inner.clone())));
        assert_eq!(c.base_format(), &inner);
    }
}

#[test]
fn packed_output_reclassifies_as_compact() {
    let doc = unpack(&load(include_str!("fixtures/all_variants.json"))).unwrap();
    let packed = pack(&doc).unwrap();
    assert!(classify(packed.as_value()).is_aliased());
}

#[test]
fn property_named_a_is_a_known_ambiguity() {
    // A canonical document with a top-level `a` looks compact by keys alone.
    // The verdict is flagged heuristic so callers can treat it as best-effort.
    let mut raw = load(include_str!("fixtures/canonical_template.json"));
    raw["a"] = json!("not a title alias");
    let c = classify(&raw);
    assert!(c.is_heuristic());
    // Best-effort decoding still recovers the canonical layers.
    let doc = unpack(&raw).unwrap();
    assert!(doc.get(LayerId::intern("x")).is_some());
}

#[test]
fn unrecognized_payloads() {
    for raw in [json!(null), json!(42), json!([]), json!({ "pages": [] }), json!([[{}]])] {
        assert_eq!(classify(&raw).format, Format::Unrecognized, "{raw}");
    }
}
