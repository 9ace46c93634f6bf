//! Chart model drawn by user scripts.
//!
//! Charts live in a per-run arena owned by the execution context. Scripts only
//! ever see a handle carrying the chart's index into that arena.

use plotbox_core::PlotArtifact;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Element id the artifact is rendered into on the client.
pub const ARTIFACT_TARGET_ID: &str = "plot";

/// Default chart title.
pub const DEFAULT_TITLE: &str = "Graph";

/// Default chart width in pixels.
pub const DEFAULT_WIDTH: u32 = 600;

/// Default chart height in pixels.
pub const DEFAULT_HEIGHT: u32 = 400;

/// Default sampling range and density for function plots.
pub const DEFAULT_RANGE: (f64, f64) = (-10.0, 10.0);
pub const DEFAULT_SAMPLES: usize = 400;

/// Most points one chart may hold across all of its glyphs.
pub const MAX_CHART_POINTS: usize = 200_000;

/// Default glyph colors.
pub const FUNCTION_COLOR: &str = "#1f77b4";
pub const POINTS_COLOR: &str = "#d62728";
pub const PARAMETRIC_COLOR: &str = "#2ca02c";

/// Default glyph sizes.
pub const LINE_WIDTH: f64 = 2.0;
pub const POINT_SIZE: f64 = 8.0;

/// One chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub title: String,
    pub width: u32,
    pub height: u32,

    /// Free-form style options passed at creation.
    #[serde(default)]
    pub options: serde_json::Map<String, serde_json::Value>,

    /// Glyphs drawn so far, in drawing order.
    #[serde(default)]
    pub renderers: Vec<Renderer>,
}

impl Default for Chart {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE, DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl Chart {
    /// Create an empty chart.
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            options: serde_json::Map::new(),
            renderers: Vec::new(),
        }
    }

    /// Attach style options.
    pub fn with_options(mut self, options: serde_json::Map<String, serde_json::Value>) -> Self {
        self.options = options;
        self
    }

    /// Whether anything has been drawn.
    pub fn has_renderers(&self) -> bool {
        !self.renderers.is_empty()
    }

    /// Points drawn so far.
    pub fn point_count(&self) -> usize {
        self.renderers.iter().map(Renderer::len).sum()
    }

    /// Append a glyph, refusing it if the chart would exceed [`MAX_CHART_POINTS`].
    pub fn draw(&mut self, renderer: Renderer) -> Result<(), PointLimitExceeded> {
        let total = self.point_count() + renderer.len();
        if total > MAX_CHART_POINTS {
            return Err(PointLimitExceeded { requested: total });
        }
        self.renderers.push(renderer);
        Ok(())
    }

    /// Serialize into the artifact document sent to the client.
    pub fn to_artifact(&self) -> Option<PlotArtifact> {
        let mut value = serde_json::to_value(self).ok()?;
        if let Some(object) = value.as_object_mut() {
            object.insert(
                "target_id".to_string(),
                serde_json::Value::String(ARTIFACT_TARGET_ID.to_string()),
            );
        }
        Some(PlotArtifact::new(value))
    }
}

/// A drawn glyph.
///
/// Coordinates that could not be computed are NaN and serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "glyph", rename_all = "snake_case")]
pub enum Renderer {
    Line {
        x: Vec<f64>,
        y: Vec<f64>,
        color: String,
        line_width: f64,
        legend: Option<String>,
    },
    Scatter {
        marker: Marker,
        x: Vec<f64>,
        y: Vec<f64>,
        size: f64,
        color: String,
        legend: Option<String>,
    },
}

impl Renderer {
    /// Number of points in the glyph.
    pub fn len(&self) -> usize {
        match self {
            Renderer::Line { x, .. } | Renderer::Scatter { x, .. } => x.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A glyph that would push a chart past [`MAX_CHART_POINTS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("chart point limit exceeded: {requested} points requested, at most {} allowed per chart", MAX_CHART_POINTS)]
pub struct PointLimitExceeded {
    pub requested: usize,
}

/// Scatter marker shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    #[default]
    Circle,
    Square,
    Triangle,
    InvertedTriangle,
    Diamond,
    Cross,
    X,
    Star,
    Hex,
    Asterisk,
    Dot,
}

impl Marker {
    const NAMES: &'static [(&'static str, Marker)] = &[
        ("circle", Marker::Circle),
        ("square", Marker::Square),
        ("triangle", Marker::Triangle),
        ("inverted_triangle", Marker::InvertedTriangle),
        ("diamond", Marker::Diamond),
        ("cross", Marker::Cross),
        ("x", Marker::X),
        ("star", Marker::Star),
        ("hex", Marker::Hex),
        ("asterisk", Marker::Asterisk),
        ("dot", Marker::Dot),
    ];

    /// Resolve a marker by name, falling back to a circle for unknown shapes.
    pub fn from_name(name: &str) -> Self {
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, m)| *m)
            .unwrap_or_default()
    }
}

/// `num` evenly spaced values over `[start, end]`, both endpoints included.
pub fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (num - 1) as f64;
            (0..num)
                .map(|i| {
                    if i == num - 1 {
                        end
                    } else {
                        start + step * i as f64
                    }
                })
                .collect()
        }
    }
}

/// Sample `f` over `[start, end]`. Samples where `f` yields nothing become NaN.
pub fn sample_function<F>(start: f64, end: f64, num: usize, mut f: F) -> (Vec<f64>, Vec<f64>)
where
    F: FnMut(f64) -> Option<f64>,
{
    let xs = linspace(start, end, num);
    let ys = xs.iter().map(|&x| f(x).unwrap_or(f64::NAN)).collect();
    (xs, ys)
}

/// Sample a parametric curve over `[start, end]`.
///
/// `f` yields both coordinates of a sample; when it yields nothing both are
/// blanked.
pub fn sample_parametric<F>(start: f64, end: f64, num: usize, mut f: F) -> (Vec<f64>, Vec<f64>)
where
    F: FnMut(f64) -> Option<(f64, f64)>,
{
    let mut xs = Vec::with_capacity(num);
    let mut ys = Vec::with_capacity(num);
    for t in linspace(start, end, num) {
        match f(t) {
            Some((x, y)) => {
                xs.push(x);
                ys.push(y);
            }
            None => {
                xs.push(f64::NAN);
                ys.push(f64::NAN);
            }
        }
    }
    (xs, ys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace_endpoints() {
        let xs = linspace(-10.0, 10.0, 400);
        assert_eq!(xs.len(), 400);
        assert_eq!(xs[0], -10.0);
        assert_eq!(xs[399], 10.0);
        assert!(xs.windows(2).all(|w| w[0] < w[1]));

        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(3.0, 5.0, 1), vec![3.0]);
        assert_eq!(linspace(0.0, 1.0, 3), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_failed_samples_become_nan() {
        let (xs, ys) = sample_function(-1.0, 1.0, 5, |x| if x == 0.0 { None } else { Some(x * 2.0) });
        assert_eq!(xs, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert!(ys[2].is_nan());
        assert_eq!(ys[0], -2.0);
        assert_eq!(ys[4], 2.0);
    }

    #[test]
    fn test_parametric_failure_blanks_both() {
        let (xs, ys) = sample_parametric(0.0, 2.0, 3, |t| if t == 1.0 { None } else { Some((t, -t)) });
        assert_eq!(xs[0], 0.0);
        assert!(xs[1].is_nan());
        assert!(ys[1].is_nan());
        assert_eq!(ys[2], -2.0);
    }

    #[test]
    fn test_marker_fallback() {
        assert_eq!(Marker::from_name("square"), Marker::Square);
        assert_eq!(Marker::from_name("inverted_triangle"), Marker::InvertedTriangle);
        assert_eq!(Marker::from_name("teapot"), Marker::Circle);
    }

    #[test]
    fn test_artifact_shape() {
        let mut chart = Chart::new("Waves", 800, 300);
        assert!(!chart.has_renderers());
        chart
            .draw(Renderer::Line {
                x: vec![0.0, 1.0],
                y: vec![f64::NAN, 1.0],
                color: FUNCTION_COLOR.to_string(),
                line_width: LINE_WIDTH,
                legend: None,
            })
            .unwrap();
        chart
            .draw(Renderer::Scatter {
                marker: Marker::Diamond,
                x: vec![1.0],
                y: vec![2.0],
                size: POINT_SIZE,
                color: POINTS_COLOR.to_string(),
                legend: Some("pts".to_string()),
            })
            .unwrap();
        assert_eq!(chart.point_count(), 3);

        let artifact = chart.to_artifact().unwrap().into_json();
        assert_eq!(artifact["target_id"], "plot");
        assert_eq!(artifact["title"], "Waves");
        assert_eq!(artifact["width"], 800);
        assert_eq!(artifact["renderers"][0]["glyph"], "line");
        assert!(artifact["renderers"][0]["y"][0].is_null());
        assert_eq!(artifact["renderers"][1]["glyph"], "scatter");
        assert_eq!(artifact["renderers"][1]["marker"], "diamond");
        assert_eq!(artifact["renderers"][1]["legend"], "pts");
    }

    #[test]
    fn test_point_limit_spans_glyphs() {
        let line = |n: usize| Renderer::Line {
            x: vec![0.0; n],
            y: vec![0.0; n],
            color: FUNCTION_COLOR.to_string(),
            line_width: LINE_WIDTH,
            legend: None,
        };
        let mut chart = Chart::default();
        chart.draw(line(MAX_CHART_POINTS - 10)).unwrap();
        chart.draw(line(10)).unwrap();

        let err = chart.draw(line(1)).unwrap_err();
        assert_eq!(err.requested, MAX_CHART_POINTS + 1);
        assert!(err.to_string().contains("point limit"));
        assert_eq!(chart.renderers.len(), 2);
    }
}
