//! Parser for SVG `viewBox` attributes (`"min-x min-y width height"`).
//!
//! Shape layers carry the viewBox their clip path was drawn in; the
//! normalizer derives a missing `shapeSize` from it.

use crate::model::Size;
use winnow::ascii::{float, multispace0, multispace1};
use winnow::combinator::alt;
use winnow::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
    pub min_x: f64,
    pub min_y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewBox {
    /// The drawable size, if positive and finite.
    pub fn size(&self) -> Option<Size> {
        let ok = |v: f64| v.is_finite() && v > 0.0;
        (ok(self.width) && ok(self.height)).then(|| Size::new(self.width, self.height))
    }
}

/// Parse a viewBox attribute. Numbers may be separated by whitespace, commas, or both.
pub fn parse_view_box(input: &str) -> Result<ViewBox, String> {
    view_box
        .parse(input.trim())
        .map_err(|e| format!("invalid viewBox {input:?}: {e}"))
}

fn view_box(input: &mut &str) -> ModalResult<ViewBox> {
    let min_x = float.parse_next(input)?;
    separator(input)?;
    let min_y = float.parse_next(input)?;
    separator(input)?;
    let width = float.parse_next(input)?;
    separator(input)?;
    let height = float.parse_next(input)?;
    Ok(ViewBox {
        min_x,
        min_y,
        width,
        height,
    })
}

fn separator(input: &mut &str) -> ModalResult<()> {
    alt(((multispace0, ',', multispace0).void(), multispace1.void())).parse_next(input)
}
