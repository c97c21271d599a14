//! Freehand image annotations
//!
//! Arrows, circles and text labels drawn over a card image. Coordinates are
//! fractions of the image width/height in `[0, 1]`, so an overlay stays in
//! place when the image is rendered at another size. The list is stored as a
//! JSON array in `card_media.annotations`.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum number of overlays per image
pub const MAX_ANNOTATIONS: usize = 100;
/// Maximum characters in a text label
pub const MAX_TEXT_CHARS: usize = 200;
pub const MAX_STROKE_WIDTH: f64 = 50.0;
pub const MAX_FONT_SIZE: f64 = 200.0;

static COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("COLOR regex is valid"));

/// One overlay shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Annotation {
    Arrow {
        id: String,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        color: String,
        stroke_width: f64,
    },
    Circle {
        id: String,
        cx: f64,
        cy: f64,
        radius: f64,
        color: String,
        stroke_width: f64,
    },
    Text {
        id: String,
        x: f64,
        y: f64,
        text: String,
        color: String,
        font_size: f64,
    },
}

impl Annotation {
    pub fn id(&self) -> &str {
        match self {
            Annotation::Arrow { id, .. } | Annotation::Circle { id, .. } | Annotation::Text { id, .. } => id,
        }
    }

    fn color(&self) -> &str {
        match self {
            Annotation::Arrow { color, .. }
            | Annotation::Circle { color, .. }
            | Annotation::Text { color, .. } => color,
        }
    }

    /// Validate a single overlay
    pub fn validate(&self) -> Result<()> {
        if self.id().trim().is_empty() {
            return Err(invalid("annotation id must not be empty"));
        }
        if !COLOR.is_match(self.color()) {
            return Err(invalid(&format!("invalid color '{}', expected #RRGGBB", self.color())));
        }

        match self {
            Annotation::Arrow { x1, y1, x2, y2, stroke_width, .. } => {
                check_unit("x1", *x1)?;
                check_unit("y1", *y1)?;
                check_unit("x2", *x2)?;
                check_unit("y2", *y2)?;
                if x1 == x2 && y1 == y2 {
                    return Err(invalid("arrow start and end must differ"));
                }
                check_range("stroke_width", *stroke_width, MAX_STROKE_WIDTH)
            }
            Annotation::Circle { cx, cy, radius, stroke_width, .. } => {
                check_unit("cx", *cx)?;
                check_unit("cy", *cy)?;
                check_range("radius", *radius, 1.0)?;
                check_range("stroke_width", *stroke_width, MAX_STROKE_WIDTH)
            }
            Annotation::Text { x, y, text, font_size, .. } => {
                check_unit("x", *x)?;
                check_unit("y", *y)?;
                let chars = text.trim().chars().count();
                if chars == 0 || chars > MAX_TEXT_CHARS {
                    return Err(invalid(&format!("text must be 1-{} characters", MAX_TEXT_CHARS)));
                }
                check_range("font_size", *font_size, MAX_FONT_SIZE)
            }
        }
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidInput(format!("Invalid annotation: {}", message))
}

/// Value must be a finite number within `[0, 1]`
fn check_unit(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(&format!("{} must be between 0 and 1", field)))
    }
}

/// Value must be a finite number within `(0, max]`
fn check_range(field: &str, value: f64, max: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value <= max {
        Ok(())
    } else {
        Err(invalid(&format!("{} must be greater than 0 and at most {}", field, max)))
    }
}

/// Validate a full overlay set for one image
pub fn validate(items: &[Annotation]) -> Result<()> {
    if items.len() > MAX_ANNOTATIONS {
        return Err(invalid(&format!("at most {} annotations per image", MAX_ANNOTATIONS)));
    }

    let mut ids = HashSet::new();
    for item in items {
        item.validate()?;
        if !ids.insert(item.id()) {
            return Err(invalid(&format!("duplicate id '{}'", item.id())));
        }
    }
    Ok(())
}

/// Serialize for storage
pub fn to_json(items: &[Annotation]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

/// Deserialize from storage; NULL, empty and `null` mean no annotations
pub fn from_json(value: Option<&str>) -> Result<Vec<Annotation>> {
    match value.map(str::trim) {
        None | Some("") | Some("null") => Ok(Vec::new()),
        Some(json) => Ok(serde_json::from_str(json)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn arrow(id: &str) -> Annotation {
        Annotation::Arrow {
            id: id.to_string(),
            x1: 0.1,
            y1: 0.2,
            x2: 0.5,
            y2: 0.6,
            color: "#FF0000".to_string(),
            stroke_width: 3.0,
        }
    }

    #[test]
    fn test_deserialize_tagged_shapes() {
        let items: Vec<Annotation> = serde_json::from_value(json!([
            {"type": "circle", "id": "c1", "cx": 0.5, "cy": 0.5, "radius": 0.1,
             "color": "#00ff00", "stroke_width": 2},
            {"type": "text", "id": "t1", "x": 0.2, "y": 0.9, "text": "snavel",
             "color": "#FFFFFF", "font_size": 18}
        ]))
        .unwrap();

        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Annotation::Circle { .. }));
        assert!(validate(&items).is_ok());
    }

    #[test]
    fn test_serialized_form_carries_type_tag() {
        let value = serde_json::to_value(arrow("a1")).unwrap();
        assert_eq!(value["type"], "arrow");
        assert_eq!(value["stroke_width"], 3.0);
    }

    #[test]
    fn test_out_of_range_coordinate_rejected() {
        let bad = Annotation::Circle {
            id: "c".to_string(),
            cx: 1.5,
            cy: 0.5,
            radius: 0.1,
            color: "#000000".to_string(),
            stroke_width: 1.0,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_bad_color_rejected() {
        let mut a = arrow("a1");
        if let Annotation::Arrow { color, .. } = &mut a {
            *color = "red".to_string();
        }
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_degenerate_arrow_rejected() {
        let a = Annotation::Arrow {
            id: "a".to_string(),
            x1: 0.3,
            y1: 0.3,
            x2: 0.3,
            y2: 0.3,
            color: "#000000".to_string(),
            stroke_width: 1.0,
        };
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_empty_text_rejected() {
        let t = Annotation::Text {
            id: "t".to_string(),
            x: 0.1,
            y: 0.1,
            text: "   ".to_string(),
            color: "#000000".to_string(),
            font_size: 12.0,
        };
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        assert!(validate(&[arrow("a"), arrow("a")]).is_err());
        assert!(validate(&[arrow("a"), arrow("b")]).is_ok());
    }

    #[test]
    fn test_too_many_annotations_rejected() {
        let items: Vec<Annotation> = (0..=MAX_ANNOTATIONS).map(|i| arrow(&i.to_string())).collect();
        assert!(validate(&items).is_err());
    }

    #[test]
    fn test_from_json_empty_values() {
        assert!(from_json(None).unwrap().is_empty());
        assert!(from_json(Some("")).unwrap().is_empty());
        assert!(from_json(Some("null")).unwrap().is_empty());
        assert!(from_json(Some("not json")).is_err());
    }
}
