use scene::{DisplayElement, GlyphMetrics, MonospaceMetrics, Renderer};
use shared::error::RenderError;
use tracing::{debug, trace};

/// Headless renderer: logs every frame as JSON instead of driving a panel.
///
/// Unchanged frames are only visible at `trace`.
#[derive(Debug, Default)]
pub struct TraceRenderer {
    metrics: MonospaceMetrics,
    frames: u64,
    last: Option<String>,
}

impl TraceRenderer {
    pub fn new(metrics: MonospaceMetrics) -> Self {
        Self {
            metrics,
            ..Self::default()
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl GlyphMetrics for TraceRenderer {
    fn text_size(&self, text: &str) -> (u32, u32) {
        self.metrics.text_size(text)
    }
}

impl Renderer for TraceRenderer {
    fn render(&mut self, elements: &[DisplayElement]) -> Result<(), RenderError> {
        let frame =
            serde_json::to_string(elements).map_err(|err| RenderError::Draw(err.to_string()))?;
        self.frames += 1;

        if self.last.as_deref() == Some(frame.as_str()) {
            trace!(frame = self.frames, "frame unchanged");
            return Ok(());
        }
        debug!(frame = self.frames, elements = elements.len(), scene = %frame, "frame");
        self.last = Some(frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::{Bounds, Point};

    use super::*;

    #[test]
    fn counts_frames_and_keeps_latest() {
        let mut renderer = TraceRenderer::new(MonospaceMetrics::default());
        let scene = [
            DisplayElement::text(Point::new(0, 0), "12:00"),
            DisplayElement::rectangle(Bounds::new(103, 0, 127, 11)).with_id("power_off"),
        ];

        renderer.render(&scene).expect("render");
        renderer.render(&scene).expect("render");
        assert_eq!(renderer.frames(), 2);

        let last = renderer.last.as_deref().expect("frame");
        assert!(last.contains(r#""shape":"rectangle""#));
        assert!(last.contains(r#""id":"power_off""#));
    }

    #[test]
    fn metrics_come_from_the_font() {
        let renderer = TraceRenderer::new(MonospaceMetrics::default());
        assert_eq!(renderer.text_size("OFF"), (18, 11));
    }
}
