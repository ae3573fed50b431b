//! Retained-mode scene graph for the wearable display.
//!
//! The control loop rebuilds the scene every tick, hands [`Scene::redraw`] to a
//! [`Renderer`] and asks [`Scene::hit_test`] which element a click landed on.

use serde::Serialize;
use shared::{
    domain::{Bounds, ElementId, Fill, Point},
    error::RenderError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum DisplayElement {
    Rectangle {
        id: Option<ElementId>,
        bounds: Bounds,
        outline: Option<Fill>,
        fill: Option<Fill>,
    },
    Text {
        id: Option<ElementId>,
        position: Point,
        text: String,
        fill: Fill,
    },
    Ellipse {
        id: Option<ElementId>,
        bounds: Bounds,
        outline: Option<Fill>,
        fill: Option<Fill>,
    },
}

impl DisplayElement {
    /// White outline on a black body, the default look of boxes on the panel.
    pub fn rectangle(bounds: Bounds) -> Self {
        DisplayElement::Rectangle {
            id: None,
            bounds,
            outline: Some(Fill::White),
            fill: Some(Fill::Black),
        }
    }

    pub fn text(position: Point, text: impl Into<String>) -> Self {
        DisplayElement::Text {
            id: None,
            position,
            text: text.into(),
            fill: Fill::White,
        }
    }

    /// Outline-only ellipse; circles use equal axes.
    pub fn ellipse(bounds: Bounds) -> Self {
        DisplayElement::Ellipse {
            id: None,
            bounds,
            outline: Some(Fill::White),
            fill: None,
        }
    }

    pub fn with_id(mut self, element_id: impl Into<ElementId>) -> Self {
        match &mut self {
            DisplayElement::Rectangle { id, .. }
            | DisplayElement::Text { id, .. }
            | DisplayElement::Ellipse { id, .. } => *id = Some(element_id.into()),
        }
        self
    }

    pub fn with_fill(mut self, color: Option<Fill>) -> Self {
        match &mut self {
            DisplayElement::Rectangle { fill, .. } | DisplayElement::Ellipse { fill, .. } => {
                *fill = color
            }
            DisplayElement::Text { fill, .. } => {
                if let Some(color) = color {
                    *fill = color;
                }
            }
        }
        self
    }

    pub fn id(&self) -> Option<&ElementId> {
        match self {
            DisplayElement::Rectangle { id, .. }
            | DisplayElement::Text { id, .. }
            | DisplayElement::Ellipse { id, .. } => id.as_ref(),
        }
    }

    /// Screen-space box of the element. Text boxes come from the glyph metrics.
    pub fn bounds(&self, metrics: &dyn GlyphMetrics) -> Bounds {
        match self {
            DisplayElement::Rectangle { bounds, .. } | DisplayElement::Ellipse { bounds, .. } => {
                *bounds
            }
            DisplayElement::Text { position, text, .. } => {
                let (width, height) = metrics.text_size(text);
                Bounds::from_origin(*position, width, height)
            }
        }
    }

    pub fn contains(&self, point: Point, metrics: &dyn GlyphMetrics) -> bool {
        match self {
            DisplayElement::Ellipse { bounds, .. } => ellipse_contains(bounds, point),
            _ => self.bounds(metrics).contains(point),
        }
    }
}

fn ellipse_contains(bounds: &Bounds, point: Point) -> bool {
    if !bounds.contains(point) {
        return false;
    }

    let a = f64::from(bounds.width()) / 2.0;
    let b = f64::from(bounds.height()) / 2.0;
    // A zero axis collapses the ellipse to a segment or a point; the inclusive
    // box test above already is the exact containment test for that shape.
    if a == 0.0 || b == 0.0 {
        return true;
    }

    let cx = f64::from(bounds.x1) + a;
    let cy = f64::from(bounds.y1) + b;
    let nx = (f64::from(point.x) - cx) / a;
    let ny = (f64::from(point.y) - cy) / b;
    nx * nx + ny * ny <= 1.0
}

/// Size query for rendered strings, supplied by the renderer.
pub trait GlyphMetrics {
    /// Width and height in pixels of `text` rendered with the panel font.
    fn text_size(&self, text: &str) -> (u32, u32);
}

/// Fixed-cell font metrics; multi-line strings stack lines vertically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonospaceMetrics {
    pub glyph_width: u32,
    pub line_height: u32,
}

impl Default for MonospaceMetrics {
    fn default() -> Self {
        Self {
            glyph_width: 6,
            line_height: 11,
        }
    }
}

impl GlyphMetrics for MonospaceMetrics {
    fn text_size(&self, text: &str) -> (u32, u32) {
        let (columns, lines) = text
            .split('\n')
            .fold((0usize, 0u32), |(widest, lines), line| {
                (widest.max(line.chars().count()), lines + 1)
            });
        (columns as u32 * self.glyph_width, lines * self.line_height)
    }
}

/// External display collaborator: paints one full frame per call.
pub trait Renderer: GlyphMetrics + Send {
    fn render(&mut self, elements: &[DisplayElement]) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    elements: Vec<DisplayElement>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn add(&mut self, element: DisplayElement) {
        self.elements.push(element);
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn find(&self, id: &ElementId) -> Option<&DisplayElement> {
        self.elements.iter().find(|element| element.id() == Some(id))
    }

    /// Returns the id of the first element, in insertion order, containing `point`.
    ///
    /// Elements without an id are decorative and never take a click. Later
    /// elements do not occlude earlier ones even though they draw on top.
    pub fn hit_test(&self, point: Point, metrics: &dyn GlyphMetrics) -> Option<ElementId> {
        let hit = self
            .elements
            .iter()
            .filter(|element| element.id().is_some())
            .find(|element| element.contains(point, metrics))
            .and_then(|element| element.id().cloned());
        tracing::trace!(x = point.x, y = point.y, hit = ?hit, "scene hit test");
        hit
    }

    /// Ordered element list handed to the renderer for this frame.
    pub fn redraw(&self) -> &[DisplayElement] {
        &self.elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> MonospaceMetrics {
        MonospaceMetrics::default()
    }

    #[test]
    fn rectangle_boundary_is_inclusive() {
        let mut scene = Scene::new();
        scene.add(DisplayElement::rectangle(Bounds::new(10, 5, 40, 20)).with_id("box"));

        assert_eq!(
            scene.hit_test(Point::new(10, 5), &metrics()),
            Some(ElementId::new("box"))
        );
        assert_eq!(
            scene.hit_test(Point::new(40, 20), &metrics()),
            Some(ElementId::new("box"))
        );
        assert_eq!(scene.hit_test(Point::new(41, 20), &metrics()), None);
    }

    #[test]
    fn first_added_element_wins_overlap() {
        let mut scene = Scene::new();
        scene.add(DisplayElement::rectangle(Bounds::new(0, 0, 50, 50)).with_id("a"));
        scene.add(DisplayElement::rectangle(Bounds::new(25, 25, 75, 60)).with_id("b"));

        assert_eq!(
            scene.hit_test(Point::new(30, 30), &metrics()),
            Some(ElementId::new("a"))
        );
        assert_eq!(
            scene.hit_test(Point::new(70, 55), &metrics()),
            Some(ElementId::new("b"))
        );
    }

    #[test]
    fn decorative_elements_do_not_take_clicks() {
        let mut scene = Scene::new();
        scene.add(DisplayElement::ellipse(Bounds::centered(Point::new(20, 20), 10)));
        scene.add(DisplayElement::rectangle(Bounds::new(0, 0, 40, 40)).with_id("under"));

        assert_eq!(
            scene.hit_test(Point::new(20, 20), &metrics()),
            Some(ElementId::new("under"))
        );
    }

    #[test]
    fn ellipse_excludes_bounding_box_corners() {
        let mut scene = Scene::new();
        scene.add(DisplayElement::ellipse(Bounds::new(0, 0, 40, 20)).with_id("oval"));

        assert!(scene.hit_test(Point::new(20, 10), &metrics()).is_some());
        assert!(scene.hit_test(Point::new(0, 10), &metrics()).is_some());
        assert!(scene.hit_test(Point::new(1, 1), &metrics()).is_none());
        assert!(scene.hit_test(Point::new(39, 19), &metrics()).is_none());
    }

    #[test]
    fn degenerate_ellipse_behaves_like_a_line() {
        let line = DisplayElement::ellipse(Bounds::new(5, 0, 5, 10)).with_id("line");
        assert!(line.contains(Point::new(5, 7), &metrics()));
        assert!(!line.contains(Point::new(6, 7), &metrics()));

        let dot = DisplayElement::ellipse(Bounds::new(3, 3, 3, 3));
        assert!(dot.contains(Point::new(3, 3), &metrics()));
        assert!(!dot.contains(Point::new(3, 4), &metrics()));
    }

    #[test]
    fn text_hit_box_uses_glyph_metrics() {
        let label = DisplayElement::text(Point::new(10, 10), "OFF").with_id("label");
        // 3 glyphs * 6 px wide, one 11 px line
        assert!(label.contains(Point::new(28, 21), &metrics()));
        assert!(!label.contains(Point::new(29, 21), &metrics()));
        assert!(!label.contains(Point::new(28, 22), &metrics()));
    }

    #[test]
    fn multiline_text_metrics_use_widest_line() {
        assert_eq!(metrics().text_size("For the glory\nof Mankind"), (78, 22));
        assert_eq!(metrics().text_size(""), (0, 11));
    }

    #[test]
    fn clear_drops_all_elements() {
        let mut scene = Scene::new();
        scene.add(DisplayElement::text(Point::new(0, 0), "12:00"));
        scene.add(DisplayElement::rectangle(Bounds::new(0, 0, 1, 1)).with_id("x"));
        assert_eq!(scene.redraw().len(), 2);

        scene.clear();
        assert!(scene.is_empty());
        assert_eq!(scene.hit_test(Point::new(0, 0), &metrics()), None);
    }
}
