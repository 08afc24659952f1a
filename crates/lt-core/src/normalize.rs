//! Tree normalizer: reconcile an inbound template onto a hosting canvas root.
//!
//! The template's own root is dissolved: its children (and any layer with no
//! usable parent) are re-parented onto `host`. Broken links are repaired
//! rather than reported. When nothing survives, a single placeholder text
//! layer is fabricated.
//!
//! Normalization never fails. What it did is returned explicitly in
//! `Reconciled::outcome` and `Reconciled::repairs`, and logged.

use crate::error::DecodeError;
use crate::id::LayerId;
use crate::model::*;
use crate::viewbox::parse_view_box;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use std::collections::{BTreeMap, HashSet};

// ─── Config ───────────────────────────────────────────────────────────────

/// Defaults used when the normalizer has to invent data.
#[derive(Debug, Clone)]
pub struct NormalizeConfig {
    /// Content of the fabricated layer when the template has no title or description.
    pub placeholder_text: String,
    /// Box of the fabricated text layer.
    pub placeholder_box: Size,
    pub placeholder_font_size: f64,
    pub placeholder_color: String,
    /// Shape size for shapes with neither `shapeSize` nor a usable `viewBox`.
    pub default_shape_size: Size,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            placeholder_text: "Add a heading".to_string(),
            placeholder_box: Size::new(400.0, 80.0),
            placeholder_font_size: 32.0,
            placeholder_color: "rgb(0, 0, 0)".to_string(),
            default_shape_size: Size::new(100.0, 100.0),
        }
    }
}

// ─── Result types ─────────────────────────────────────────────────────────

/// Which path normalization took.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The template's own layers were attached to the host.
    Attached,
    /// A placeholder layer was fabricated instead.
    Fallback(FallbackReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// No layers survived decoding.
    Empty,
    /// Every decoded layer was a root container.
    OnlyRoots,
    /// The payload could not be decoded at all.
    Undecodable(DecodeError),
}

/// A single repair made to the inbound tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Repair {
    /// A layer with a missing, dangling or cyclic parent was moved onto the host.
    Reparented { id: LayerId, from: Option<LayerId> },
    /// An extra root container (besides the declared one) was dissolved.
    DroppedWrapper { id: LayerId },
    /// A child id that does not point back at its parent was removed.
    DroppedChildLink { parent: LayerId, child: LayerId },
    /// A layer missing from its parent's child list was appended to it.
    RestoredChildLink { parent: LayerId, child: LayerId },
    ShapeSizeFromViewBox { id: LayerId },
    DefaultShapeSize { id: LayerId },
    /// Non-finite position, size or rotation reset to zero.
    ResetGeometry { id: LayerId },
    Fabricated { id: LayerId },
    /// An untyped layer was given the type its props imply.
    InferredType { id: LayerId, kind: LayerType },
    /// Missing position or box size filled with zeros.
    DefaultedPlacement { id: LayerId },
    /// A content layer whose id clashed with the host was given a fresh id.
    Renamed { from: LayerId, to: LayerId },
}

/// A template ready for insertion under `document.root_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Layers to insert; `root_id` is the host, which `layers` does not contain.
    pub document: Document,
    /// Ids to append to the host's child list, in z-order.
    pub top_level: Vec<LayerId>,
    pub outcome: Outcome,
    pub repairs: Vec<Repair>,
}

impl Reconciled {
    pub fn is_fallback(&self) -> bool {
        matches!(self.outcome, Outcome::Fallback(_))
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

// ─── Normalizer ───────────────────────────────────────────────────────────

/// Normalize with default config.
#[must_use]
pub fn normalize(doc: Document, host: LayerId) -> Reconciled {
    normalize_with(doc, host, &NormalizeConfig::default())
}

#[must_use]
pub fn normalize_with(doc: Document, host: LayerId, config: &NormalizeConfig) -> Reconciled {
    let mut pass = Pass {
        host,
        repairs: Vec::new(),
    };

    let Document {
        root_id,
        mut layers,
        title,
        description,
    } = doc;

    // The declared root, then every other root container, dissolve into the host.
    let declared = if layers.contains_key(&root_id) {
        Some(root_id)
    } else {
        layers
            .iter()
            .find(|(_, n)| n.parent.is_none() && n.kind() == LayerType::Root)
            .map(|(id, _)| *id)
    };
    if Some(host) != declared
        && layers
            .get(&host)
            .is_some_and(|n| n.kind() != LayerType::Root)
    {
        pass.rename_host_clash(&mut layers);
    }
    let mut wrappers: Vec<LayerId> = declared.into_iter().collect();
    wrappers.extend(
        layers
            .iter()
            .filter(|(id, n)| Some(**id) != declared && n.kind() == LayerType::Root)
            .map(|(id, _)| *id),
    );

    let had_layers = !layers.is_empty();
    let mut preferred_order = Vec::new();
    for id in &wrappers {
        if let Some(node) = layers.remove(id) {
            preferred_order.extend(node.child);
            if Some(*id) != declared {
                pass.record(Repair::DroppedWrapper { id: *id });
            }
        }
    }
    let wrapper_set: HashSet<LayerId> = wrappers.iter().copied().collect();

    pass.flatten_onto_host(&mut layers, &wrapper_set);
    pass.break_cycles(&mut layers);
    pass.relink_children(&mut layers);

    let mut outcome = Outcome::Attached;
    if layers.is_empty() {
        let reason = if had_layers {
            FallbackReason::OnlyRoots
        } else {
            FallbackReason::Empty
        };
        log::warn!("normalize: nothing to attach ({reason:?}); fabricating placeholder");
        let (id, node) = placeholder(host, title.as_deref(), description.as_deref(), config);
        layers.insert(id, node);
        pass.record(Repair::Fabricated { id });
        outcome = Outcome::Fallback(reason);
    }

    for (&id, node) in layers.iter_mut() {
        pass.repair_props(id, node, config);
    }

    let top_level = top_level_order(&layers, host, &preferred_order);
    Reconciled {
        document: Document {
            root_id: host,
            layers,
            title,
            description,
        },
        top_level,
        outcome,
        repairs: pass.repairs,
    }
}

/// A reconciled document holding only a fabricated placeholder.
///
/// Used when the payload cannot be decoded at all.
#[must_use]
pub fn fallback(
    host: LayerId,
    reason: FallbackReason,
    title: Option<&str>,
    description: Option<&str>,
    config: &NormalizeConfig,
) -> Reconciled {
    log::warn!("normalize: fabricating placeholder ({reason:?})");
    let (id, node) = placeholder(host, title, description, config);
    let mut document = Document::fragment(host);
    document.title = title.map(str::to_string);
    document.description = description.map(str::to_string);
    document.layers.insert(id, node);
    Reconciled {
        document,
        top_level: vec![id],
        outcome: Outcome::Fallback(reason),
        repairs: vec![Repair::Fabricated { id }],
    }
}

struct Pass {
    host: LayerId,
    repairs: Vec<Repair>,
}

impl Pass {
    fn record(&mut self, repair: Repair) {
        log::warn!("normalize: {repair:?}");
        self.repairs.push(repair);
    }

    /// Move a content layer stored under the host's id to a fresh id,
    /// rewriting every link that names it.
    fn rename_host_clash(&mut self, layers: &mut BTreeMap<LayerId, LayerNode>) {
        let host = self.host;
        let Some(node) = layers.remove(&host) else {
            return;
        };
        let fresh = LayerId::with_prefix("layer");
        for other in layers.values_mut() {
            if other.parent == Some(host) {
                other.parent = Some(fresh);
            }
            for child in other.child.iter_mut() {
                if *child == host {
                    *child = fresh;
                }
            }
        }
        layers.insert(fresh, node);
        self.record(Repair::Renamed {
            from: host,
            to: fresh,
        });
    }

    /// Point every top-level layer at the host.
    fn flatten_onto_host(
        &mut self,
        layers: &mut BTreeMap<LayerId, LayerNode>,
        wrappers: &HashSet<LayerId>,
    ) {
        let present: HashSet<LayerId> = layers.keys().copied().collect();
        for (&id, node) in layers.iter_mut() {
            match node.parent {
                Some(p) if p == self.host => {}
                Some(p) if wrappers.contains(&p) => {
                    log::debug!("normalize: `{id}` moves from template root `{p}` to `{}`", self.host);
                    node.parent = Some(self.host);
                }
                Some(p) if present.contains(&p) => {}
                from => {
                    node.parent = Some(self.host);
                    self.record(Repair::Reparented { id, from });
                }
            }
        }
    }

    /// Re-parent one member of each parent cycle onto the host until none remain.
    fn break_cycles(&mut self, layers: &mut BTreeMap<LayerId, LayerNode>) {
        loop {
            let mut graph = DiGraphMap::<LayerId, ()>::new();
            for (&id, node) in layers.iter() {
                graph.add_node(id);
                if let Some(parent) = node.parent.filter(|p| *p != self.host) {
                    graph.add_edge(parent, id, ());
                }
            }
            let Err(cycle) = toposort(&graph, None) else {
                return;
            };
            let id = cycle.node_id();
            if let Some(node) = layers.get_mut(&id) {
                let from = node.parent.replace(self.host);
                self.record(Repair::Reparented { id, from });
            }
        }
    }

    /// Make `child` lists agree with `parent` pointers, keeping recorded order.
    fn relink_children(&mut self, layers: &mut BTreeMap<LayerId, LayerNode>) {
        let parents: BTreeMap<LayerId, Option<LayerId>> =
            layers.iter().map(|(id, n)| (*id, n.parent)).collect();

        for (&id, node) in layers.iter_mut() {
            let mut kept = ChildList::new();
            for &child in &node.child {
                if parents.get(&child) == Some(&Some(id)) && !kept.contains(&child) {
                    kept.push(child);
                } else {
                    self.record(Repair::DroppedChildLink { parent: id, child });
                }
            }
            for (&child, parent) in &parents {
                if *parent == Some(id) && !kept.contains(&child) {
                    kept.push(child);
                    self.record(Repair::RestoredChildLink { parent: id, child });
                }
            }
            node.child = kept;
        }
    }

    fn repair_props(&mut self, id: LayerId, node: &mut LayerNode, config: &NormalizeConfig) {
        let placement = node.props.placement_mut();
        let fields = [
            &mut placement.position.x,
            &mut placement.position.y,
            &mut placement.box_size.width,
            &mut placement.box_size.height,
            &mut placement.rotate,
        ];
        let mut reset = false;
        for v in fields {
            if !v.is_finite() {
                *v = 0.0;
                reset = true;
            }
        }
        if reset {
            self.record(Repair::ResetGeometry { id });
        }

        if let LayerProps::Shape(shape) = &mut node.props
            && shape.shape_size.is_none()
        {
            let from_view_box = shape
                .view_box
                .as_deref()
                .and_then(|vb| parse_view_box(vb).ok())
                .and_then(|vb| vb.size());
            match from_view_box {
                Some(size) => {
                    shape.shape_size = Some(size);
                    self.record(Repair::ShapeSizeFromViewBox { id });
                }
                None => {
                    shape.shape_size = Some(config.default_shape_size);
                    self.record(Repair::DefaultShapeSize { id });
                }
            }
        }
    }
}

/// Host-level ids: recorded root order first, then the rest in id order.
fn top_level_order(
    layers: &BTreeMap<LayerId, LayerNode>,
    host: LayerId,
    preferred: &[LayerId],
) -> Vec<LayerId> {
    let on_host = |id: &LayerId| layers.get(id).is_some_and(|n| n.parent == Some(host));
    let mut order: Vec<LayerId> = Vec::new();
    for id in preferred {
        if on_host(id) && !order.contains(id) {
            order.push(*id);
        }
    }
    for id in layers.keys() {
        if on_host(id) && !order.contains(id) {
            order.push(*id);
        }
    }
    order
}

fn placeholder(
    host: LayerId,
    title: Option<&str>,
    description: Option<&str>,
    config: &NormalizeConfig,
) -> (LayerId, LayerNode) {
    let content = title
        .filter(|t| !t.trim().is_empty())
        .or(description.filter(|d| !d.trim().is_empty()))
        .unwrap_or(config.placeholder_text.as_str());
    let props = LayerProps::Text(TextProps {
        placement: Placement {
            position: Point::default(),
            box_size: config.placeholder_box,
            rotate: 0.0,
        },
        text: format!("<p>{}</p>", escape_html(content)),
        scale: 1.0,
        fonts: Vec::new(),
        colors: vec![config.placeholder_color.clone()],
        font_sizes: vec![config.placeholder_font_size],
        effect: None,
    });
    (LayerId::with_prefix("text"), LayerNode::new(props, Some(host)))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn host() -> LayerId {
        LayerId::intern("HOST")
    }

    fn id(s: &str) -> LayerId {
        LayerId::intern(s)
    }

    fn text(parent: Option<&str>) -> LayerNode {
        LayerNode::new(
            LayerProps::Text(TextProps {
                placement: Placement {
                    position: Point { x: 0.0, y: 0.0 },
                    box_size: Size::new(300.0, 100.0),
                    rotate: 0.0,
                },
                text: "<p>Hi</p>".into(),
                scale: 1.0,
                fonts: vec![],
                colors: vec![],
                font_sizes: vec![],
                effect: None,
            }),
            parent.map(LayerId::intern),
        )
    }

    fn group(parent: Option<&str>) -> LayerNode {
        LayerNode::new(LayerProps::Group(GroupProps::default()), parent.map(LayerId::intern))
    }

    fn shape(view_box: Option<&str>) -> LayerNode {
        LayerNode::new(
            LayerProps::Shape(ShapeProps {
                view_box: view_box.map(str::to_string),
                ..ShapeProps::default()
            }),
            Some(LayerId::root()),
        )
    }

    fn template() -> Document {
        let mut doc = Document::new(LayerId::root());
        doc.add_layer(LayerId::root(), id("n_b"), text(None));
        doc.add_layer(LayerId::root(), id("n_a"), group(None));
        doc.add_layer(id("n_a"), id("n_a1"), text(None));
        doc
    }

    #[test]
    fn dissolves_root_and_keeps_order() {
        let out = normalize(template(), host());
        assert_eq!(out.outcome, Outcome::Attached);
        assert!(out.repairs.is_empty(), "clean template needs no repairs");
        assert!(out.document.get(LayerId::root()).is_none());
        assert_eq!(out.top_level, vec![id("n_b"), id("n_a")]);
        assert_eq!(out.document.get(id("n_a1")).unwrap().parent, Some(id("n_a")));
        assert!(out.document.is_attached_to(host()));
    }

    #[test]
    fn orphans_are_attached() {
        let mut doc = template();
        doc.layers.insert(id("n_orphan"), text(None));
        doc.layers.insert(id("n_lost"), text(Some("nowhere")));
        let out = normalize(doc, host());
        assert!(out.repairs.contains(&Repair::Reparented {
            id: id("n_orphan"),
            from: None
        }));
        assert!(out.repairs.contains(&Repair::Reparented {
            id: id("n_lost"),
            from: Some(id("nowhere"))
        }));
        assert_eq!(out.top_level.len(), 4);
        assert!(out.document.is_attached_to(host()));
    }

    #[test]
    fn extra_root_wrappers_are_dissolved() {
        let mut doc = template();
        let mut inner = LayerNode::root();
        inner.parent = Some(LayerId::root());
        inner.child.push(id("n_w1"));
        doc.layers.insert(id("n_wrap"), inner);
        doc.get_mut(LayerId::root()).unwrap().child.push(id("n_wrap"));
        doc.layers.insert(id("n_w1"), text(Some("n_wrap")));

        let out = normalize(doc, host());
        assert!(out.repairs.contains(&Repair::DroppedWrapper { id: id("n_wrap") }));
        assert!(out.document.get(id("n_wrap")).is_none());
        assert_eq!(out.document.get(id("n_w1")).unwrap().parent, Some(host()));
        assert_eq!(out.top_level, vec![id("n_b"), id("n_a"), id("n_w1")]);
    }

    #[test]
    fn cycles_are_broken() {
        let mut doc = Document::new(LayerId::root());
        let mut first = group(Some("n_cy2"));
        first.child.push(id("n_cy2"));
        let mut second = group(Some("n_cy1"));
        second.child.push(id("n_cy1"));
        doc.layers.insert(id("n_cy1"), first);
        doc.layers.insert(id("n_cy2"), second);
        let out = normalize(doc, host());
        assert_eq!(out.outcome, Outcome::Attached);
        assert!(out.document.is_attached_to(host()));
        assert_eq!(out.top_level.len(), 1);
    }

    #[test]
    fn child_lists_follow_parent_pointers() {
        let mut doc = template();
        // Stale entry plus a layer its parent forgot to list.
        doc.get_mut(id("n_a")).unwrap().child.push(id("n_b"));
        doc.layers.insert(id("n_a2"), text(Some("n_a")));
        let out = normalize(doc, host());
        assert_eq!(
            out.document.get(id("n_a")).unwrap().child.as_slice(),
            &[id("n_a1"), id("n_a2")]
        );
        assert!(out.repairs.contains(&Repair::DroppedChildLink {
            parent: id("n_a"),
            child: id("n_b")
        }));
        assert!(out.repairs.contains(&Repair::RestoredChildLink {
            parent: id("n_a"),
            child: id("n_a2")
        }));
    }

    #[test]
    fn empty_document_fabricates_placeholder() {
        let mut doc = Document::fragment(LayerId::root());
        doc.title = Some("Summer <Sale>".into());
        let out = normalize(doc, host());
        assert_eq!(out.outcome, Outcome::Fallback(FallbackReason::Empty));
        assert_eq!(out.document.len(), 1);
        assert_eq!(out.top_level.len(), 1);
        let node = out.document.get(out.top_level[0]).unwrap();
        assert_eq!(node.parent, Some(host()));
        match &node.props {
            LayerProps::Text(t) => assert_eq!(t.text, "<p>Summer &lt;Sale&gt;</p>"),
            other => panic!("expected text, got {:?}", other.kind()),
        }
    }

    #[test]
    fn root_only_document_fabricates_placeholder() {
        let out = normalize(Document::new(LayerId::root()), host());
        assert_eq!(out.outcome, Outcome::Fallback(FallbackReason::OnlyRoots));
        assert!(out.is_fallback());
        match &out.document.layers.values().next().unwrap().props {
            LayerProps::Text(t) => assert_eq!(t.text, "<p>Add a heading</p>"),
            other => panic!("expected text, got {:?}", other.kind()),
        }
    }

    #[test]
    fn shape_size_from_view_box() {
        let mut doc = Document::new(LayerId::root());
        doc.add_layer(LayerId::root(), id("n_s1"), shape(Some("0 0 64 32")));
        doc.add_layer(LayerId::root(), id("n_s2"), shape(None));
        doc.add_layer(LayerId::root(), id("n_s3"), shape(Some("garbage")));
        let out = normalize(doc, host());
        let size = |s: &str| match &out.document.get(id(s)).unwrap().props {
            LayerProps::Shape(p) => p.shape_size,
            _ => None,
        };
        assert_eq!(size("n_s1"), Some(Size::new(64.0, 32.0)));
        assert_eq!(size("n_s2"), Some(Size::new(100.0, 100.0)));
        assert_eq!(size("n_s3"), Some(Size::new(100.0, 100.0)));
        assert!(out.repairs.contains(&Repair::ShapeSizeFromViewBox { id: id("n_s1") }));
        assert!(out.repairs.contains(&Repair::DefaultShapeSize { id: id("n_s2") }));
    }

    #[test]
    fn non_finite_geometry_is_reset() {
        let mut doc = Document::new(LayerId::root());
        let mut node = text(None);
        node.props.placement_mut().rotate = f64::NAN;
        doc.add_layer(LayerId::root(), id("n_nan"), node);
        let out = normalize(doc, host());
        assert_eq!(
            out.document.get(id("n_nan")).unwrap().props.placement().rotate,
            0.0
        );
        assert_eq!(out.repairs, vec![Repair::ResetGeometry { id: id("n_nan") }]);
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let once = normalize(template(), host());
        let twice = normalize(once.document.clone(), host());
        assert_eq!(twice.document, once.document);
        assert!(twice.repairs.is_empty());
    }

    #[test]
    fn same_host_and_template_root() {
        let out = normalize(template(), LayerId::root());
        assert!(out.document.get(LayerId::root()).is_none());
        assert!(out.document.is_attached_to(LayerId::root()));
    }

    #[test]
    fn content_layer_named_like_host_is_kept() {
        let mut doc = template();
        doc.add_layer(LayerId::root(), host(), text(None));
        doc.add_layer(host(), id("n_under_clash"), text(None));

        let out = normalize(doc, host());
        assert_eq!(out.outcome, Outcome::Attached);
        assert!(out.document.get(host()).is_none());
        let Some(Repair::Renamed { from, to }) = out
            .repairs
            .iter()
            .find(|r| matches!(r, Repair::Renamed { .. }))
            .cloned()
        else {
            panic!("no rename recorded: {:?}", out.repairs);
        };
        assert_eq!(from, host());
        assert_eq!(out.document.get(to).unwrap().kind(), LayerType::Text);
        assert_eq!(out.document.get(to).unwrap().parent, Some(host()));
        assert_eq!(out.document.get(to).unwrap().child.as_slice(), &[id("n_under_clash")]);
        assert_eq!(out.document.get(id("n_under_clash")).unwrap().parent, Some(to));
        assert_eq!(out.top_level, vec![id("n_b"), id("n_a"), to]);
        assert!(out.document.is_attached_to(host()));
    }

    #[test]
    fn root_layer_named_like_host_is_dissolved() {
        let mut doc = template();
        let mut clash = LayerNode::root();
        clash.parent = Some(LayerId::root());
        doc.layers.insert(host(), clash);
        doc.get_mut(LayerId::root()).unwrap().child.push(host());
        let out = normalize(doc, host());
        assert!(out.repairs.contains(&Repair::DroppedWrapper { id: host() }));
        assert!(out.document.get(host()).is_none());
    }

    #[test]
    fn explicit_fallback() {
        let out = fallback(
            host(),
            FallbackReason::Undecodable(DecodeError::Unrecognized("no layer container")),
            None,
            Some("Poster"),
            &NormalizeConfig::default(),
        );
        assert!(out.is_fallback());
        assert_eq!(out.top_level.len(), 1);
        assert!(out.document.is_attached_to(host()));
    }
}
