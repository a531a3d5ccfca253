// =============================================================================
// Chart Renderer - line chart + price summary for one symbol
// =============================================================================
//
// Prices are mapped onto the surface as
//   x = i / (n - 1) * width
//   y = height - (price - min) / range * height
// so the newest price sits on the right edge and higher prices sit higher.
// A flat history uses a unit range and draws along the bottom edge.
// =============================================================================

use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::market_data::price_store::price_range;

/// Line appearance for a stroked path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: &'static str,
    pub width: f64,
}

/// Appearance of overlay text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub color: &'static str,
    pub font: &'static str,
}

pub const PRICE_LINE: StrokeStyle = StrokeStyle {
    color: "#4299e1",
    width: 2.0,
};

pub const SUMMARY_TEXT: TextStyle = TextStyle {
    color: "#4a5568",
    font: "12px Arial",
};

/// Fixed-size 2D drawing target.
pub trait RenderSurface {
    fn width(&self) -> f64;
    fn height(&self) -> f64;
    fn clear(&mut self);
    fn begin_path(&mut self, style: StrokeStyle);
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn stroke(&mut self);
    fn fill_text(&mut self, text: &str, x: f64, y: f64, style: TextStyle);

    /// Called once after a complete frame has been drawn.
    fn present(&mut self) {}
}

// ---------------------------------------------------------------------------
// ChartRenderer
// ---------------------------------------------------------------------------

pub struct ChartRenderer<S> {
    symbol: String,
    label: String,
    surface: S,
}

impl<S: RenderSurface> ChartRenderer<S> {
    pub fn new(symbol: impl Into<String>, surface: S) -> Self {
        let symbol = symbol.into();
        let label = pair_label(&symbol);
        Self {
            symbol,
            label,
            surface,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Redraw the chart from `history` (oldest first). Returns `false` and
    /// leaves the surface untouched when there are fewer than two points.
    pub fn redraw(&mut self, history: &[f64]) -> bool {
        let n = history.len();
        if n < 2 {
            return false;
        }
        let Some((min, max)) = price_range(history.iter().copied()) else {
            return false;
        };
        let range = if max - min == 0.0 { 1.0 } else { max - min };
        let width = self.surface.width();
        let height = self.surface.height();
        let last_index = (n - 1) as f64;

        self.surface.clear();
        self.surface.begin_path(PRICE_LINE);
        for (i, &price) in history.iter().enumerate() {
            let x = i as f64 / last_index * width;
            let y = height - (price - min) / range * height;
            if i == 0 {
                self.surface.move_to(x, y);
            } else {
                self.surface.line_to(x, y);
            }
        }
        self.surface.stroke();

        let last = history[n - 1];
        self.surface.fill_text(
            &format!("{}: ${:.2}", self.label, last),
            10.0,
            20.0,
            SUMMARY_TEXT,
        );
        self.surface.fill_text(
            &format!("Range: ${min:.2} - ${max:.2}"),
            10.0,
            35.0,
            SUMMARY_TEXT,
        );
        self.surface.present();
        true
    }
}

/// `BTCUSDT` -> `BTC/USDT`. Symbols without a known quote asset are kept.
pub fn pair_label(symbol: &str) -> String {
    const QUOTES: &[&str] = &["USDT", "USDC", "BUSD", "USD", "EUR", "BTC", "ETH"];
    for quote in QUOTES {
        if let Some(base) = symbol.strip_suffix(quote) {
            if !base.is_empty() {
                return format!("{base}/{quote}");
            }
        }
    }
    symbol.to_string()
}

// ---------------------------------------------------------------------------
// SvgSurface
// ---------------------------------------------------------------------------

/// Last presented SVG document, shared with the dashboard API.
pub type FrameSlot = Arc<RwLock<Option<String>>>;

/// Records primitives into an SVG document. Only complete frames become
/// visible: the document is published to the shared slot on `present`.
pub struct SvgSurface {
    width: u32,
    height: u32,
    elements: Vec<String>,
    path: String,
    path_style: StrokeStyle,
    published: FrameSlot,
}

impl SvgSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            elements: Vec::new(),
            path: String::new(),
            path_style: PRICE_LINE,
            published: Arc::new(RwLock::new(None)),
        }
    }

    pub fn frame_slot(&self) -> FrameSlot {
        Arc::clone(&self.published)
    }

    fn document(&self) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = self.width,
            h = self.height
        );
        for element in &self.elements {
            svg.push_str(element);
        }
        svg.push_str("</svg>");
        svg
    }
}

impl RenderSurface for SvgSurface {
    fn width(&self) -> f64 {
        f64::from(self.width)
    }

    fn height(&self) -> f64 {
        f64::from(self.height)
    }

    fn clear(&mut self) {
        self.elements.clear();
        self.path.clear();
    }

    fn begin_path(&mut self, style: StrokeStyle) {
        self.path.clear();
        self.path_style = style;
    }

    fn move_to(&mut self, x: f64, y: f64) {
        let _ = write!(self.path, "M{x:.2} {y:.2} ");
    }

    fn line_to(&mut self, x: f64, y: f64) {
        let _ = write!(self.path, "L{x:.2} {y:.2} ");
    }

    fn stroke(&mut self) {
        if self.path.is_empty() {
            return;
        }
        self.elements.push(format!(
            r#"<path d="{}" fill="none" stroke="{}" stroke-width="{}"/>"#,
            self.path.trim_end(),
            self.path_style.color,
            self.path_style.width
        ));
        self.path.clear();
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, style: TextStyle) {
        self.elements.push(format!(
            r#"<text x="{x}" y="{y}" fill="{}" style="font: {}">{}</text>"#,
            style.color,
            style.font,
            escape_xml(text)
        ));
    }

    fn present(&mut self) {
        *self.published.write() = Some(self.document());
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Op {
        Clear,
        BeginPath,
        MoveTo(f64, f64),
        LineTo(f64, f64),
        Stroke,
        Text(String),
        Present,
    }

    /// Surface that records every call for inspection.
    pub(crate) struct RecordingSurface {
        pub(crate) ops: Arc<RwLock<Vec<Op>>>,
    }

    impl RecordingSurface {
        pub(crate) fn new() -> Self {
            Self {
                ops: Arc::new(RwLock::new(Vec::new())),
            }
        }
    }

    impl RenderSurface for RecordingSurface {
        fn width(&self) -> f64 {
            100.0
        }
        fn height(&self) -> f64 {
            50.0
        }
        fn clear(&mut self) {
            self.ops.write().push(Op::Clear);
        }
        fn begin_path(&mut self, _style: StrokeStyle) {
            self.ops.write().push(Op::BeginPath);
        }
        fn move_to(&mut self, x: f64, y: f64) {
            self.ops.write().push(Op::MoveTo(x, y));
        }
        fn line_to(&mut self, x: f64, y: f64) {
            self.ops.write().push(Op::LineTo(x, y));
        }
        fn stroke(&mut self) {
            self.ops.write().push(Op::Stroke);
        }
        fn fill_text(&mut self, text: &str, _x: f64, _y: f64, _style: TextStyle) {
            self.ops.write().push(Op::Text(text.to_string()));
        }
        fn present(&mut self) {
            self.ops.write().push(Op::Present);
        }
    }

    #[test]
    fn fewer_than_two_points_draws_nothing() {
        let mut chart = ChartRenderer::new("BTCUSDT", RecordingSurface::new());
        assert!(!chart.redraw(&[]));
        assert!(!chart.redraw(&[101.0]));
        assert!(chart.surface().ops.read().is_empty());
    }

    #[test]
    fn maps_points_onto_the_surface() {
        let mut chart = ChartRenderer::new("BTCUSDT", RecordingSurface::new());
        assert!(chart.redraw(&[100.0, 110.0, 105.0]));

        let ops = chart.surface().ops.read().clone();
        assert_eq!(
            ops,
            vec![
                Op::Clear,
                Op::BeginPath,
                Op::MoveTo(0.0, 50.0),
                Op::LineTo(50.0, 0.0),
                Op::LineTo(100.0, 25.0),
                Op::Stroke,
                Op::Text("BTC/USDT: $105.00".into()),
                Op::Text("Range: $100.00 - $110.00".into()),
                Op::Present,
            ]
        );
    }

    #[test]
    fn flat_history_draws_a_flat_line() {
        let mut chart = ChartRenderer::new("ETHUSDT", RecordingSurface::new());
        assert!(chart.redraw(&[42.0; 5]));

        let ops = chart.surface().ops.read().clone();
        let ys: Vec<f64> = ops
            .iter()
            .filter_map(|op| match op {
                Op::MoveTo(_, y) | Op::LineTo(_, y) => Some(*y),
                _ => None,
            })
            .collect();
        assert_eq!(ys.len(), 5);
        assert!(ys.iter().all(|y| y.is_finite() && *y == 50.0));
        assert!(ops.contains(&Op::Text("Range: $42.00 - $42.00".into())));
    }

    #[test]
    fn pair_labels() {
        assert_eq!(pair_label("BTCUSDT"), "BTC/USDT");
        assert_eq!(pair_label("DOTUSDT"), "DOT/USDT");
        assert_eq!(pair_label("ETHBTC"), "ETH/BTC");
        assert_eq!(pair_label("USDT"), "USDT");
        assert_eq!(pair_label("XYZ"), "XYZ");
    }

    #[test]
    fn svg_surface_publishes_complete_frames_only() {
        let surface = SvgSurface::new(200, 100);
        let slot = surface.frame_slot();
        let mut chart = ChartRenderer::new("BTCUSDT", surface);

        assert!(!chart.redraw(&[1.0]));
        assert!(slot.read().is_none());

        assert!(chart.redraw(&[1.0, 3.0]));
        let svg = slot.read().clone().expect("frame published");
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"d="M0.00 100.00 L200.00 0.00""#));
        assert!(svg.contains("stroke=\"#4299e1\""));
        assert!(svg.contains("BTC/USDT: $3.00"));
        assert!(svg.contains("Range: $1.00 - $3.00"));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn xml_is_escaped() {
        assert_eq!(escape_xml("a<b & \"c\">"), "a&lt;b &amp; &quot;c&quot;&gt;");
    }
}
