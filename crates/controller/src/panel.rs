use std::time::{Duration, Instant};

use scene::{DisplayElement, GlyphMetrics};
use shared::domain::{Bounds, ElementId, Point, ScreenSize};

/// Web summaries are cut to this many characters before display.
pub const WEB_SUMMARY_CHARS: usize = 50;

/// Top edge of the panel, just below the chrome row.
const PANEL_TOP: i32 = 13;
const PANEL_MARGIN: i32 = 2;
const TEXT_INSET: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Notes,
    Web,
}

/// Transient notes/web overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    pub kind: PanelKind,
    pub text: String,
    pub shown_at: Instant,
}

impl Panel {
    pub fn notes(text: impl Into<String>, now: Instant) -> Self {
        Self {
            kind: PanelKind::Notes,
            text: text.into(),
            shown_at: now,
        }
    }

    pub fn web(text: &str, now: Instant) -> Self {
        Self {
            kind: PanelKind::Web,
            text: summarize(text, WEB_SUMMARY_CHARS),
            shown_at: now,
        }
    }

    pub fn is_expired(&self, now: Instant, hold: Duration) -> bool {
        now.saturating_duration_since(self.shown_at) >= hold
    }

    /// Framed box with id `panel` plus the wrapped text.
    pub fn elements(&self, screen: ScreenSize, metrics: &dyn GlyphMetrics) -> [DisplayElement; 2] {
        let frame = Bounds::new(
            PANEL_MARGIN,
            PANEL_TOP,
            screen.max_x() - PANEL_MARGIN,
            screen.max_y(),
        );
        let origin = Point::new(frame.x1 + TEXT_INSET, frame.y1 + TEXT_INSET);

        let (glyph_width, line_height) = metrics.text_size("M");
        let columns = (frame.x2 - origin.x).max(0) as u32 / glyph_width.max(1);
        let rows = (frame.y2 - origin.y).max(0) as u32 / line_height.max(1);

        let mut lines = wrap(&self.text, columns as usize);
        lines.truncate(rows.max(1) as usize);

        [
            DisplayElement::rectangle(frame).with_id(ElementId::panel()),
            DisplayElement::text(origin, lines.join("\n")),
        ]
    }
}

fn summarize(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Greedy word wrap; words longer than a line are split.
fn wrap(text: &str, columns: usize) -> Vec<String> {
    let columns = columns.max(1);
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let mut rest = word;
        while !rest.is_empty() {
            let used = line.chars().count();
            let room = if used == 0 { columns } else { columns.saturating_sub(used + 1) };
            let len = rest.chars().count();

            if len <= room {
                if used > 0 {
                    line.push(' ');
                }
                line.push_str(rest);
                break;
            }
            if used > 0 {
                lines.push(std::mem::take(&mut line));
                continue;
            }
            let cut = rest.char_indices().nth(columns).map_or(rest.len(), |(i, _)| i);
            lines.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use scene::MonospaceMetrics;

    use super::*;

    #[test]
    fn web_text_is_truncated_with_ellipsis() {
        let long = "a".repeat(80);
        let panel = Panel::web(&long, Instant::now());
        assert_eq!(panel.text, format!("{}...", "a".repeat(50)));

        let short = Panel::web("exactly short", Instant::now());
        assert_eq!(short.text, "exactly short");
    }

    #[test]
    fn notes_keep_full_text() {
        let text = "b".repeat(80);
        assert_eq!(Panel::notes(text.clone(), Instant::now()).text, text);
    }

    #[test]
    fn wrap_breaks_on_words_and_splits_long_words() {
        assert_eq!(wrap("buy milk and eggs", 8), vec!["buy milk", "and eggs"]);
        assert_eq!(wrap("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert!(wrap("   ", 4).is_empty());
    }

    #[test]
    fn panel_fits_below_chrome_row() {
        let panel = Panel::notes("hello", Instant::now());
        let [frame, text] = panel.elements(ScreenSize::new(128, 64), &MonospaceMetrics::default());

        assert_eq!(frame.id(), Some(&ElementId::panel()));
        assert_eq!(frame.bounds(&MonospaceMetrics::default()), Bounds::new(2, 13, 125, 63));
        assert_eq!(text.id(), None);
        match text {
            DisplayElement::Text { text, position, .. } => {
                assert_eq!(text, "hello");
                assert_eq!(position, Point::new(5, 16));
            }
            other => panic!("unexpected element {other:?}"),
        }
    }

    #[test]
    fn panel_expires_after_hold() {
        let now = Instant::now();
        let panel = Panel::notes("x", now);
        let hold = Duration::from_secs(5);
        assert!(!panel.is_expired(now + Duration::from_secs(4), hold));
        assert!(panel.is_expired(now + hold, hold));
    }
}
