//! Chart artifact selection after a run.

use crate::environment::Environment;
use plotbox_core::PlotArtifact;
use tracing::debug;

/// Names scanned for a chart, highest priority first.
pub const ARTIFACT_NAMES: &[&str] = &["plot", "fig", "figure", "p", "default_plot"];

/// Pick at most one chart to return to the caller.
///
/// The first name in [`ARTIFACT_NAMES`] bound to a chart with at least one
/// drawn element wins. Failing that, the environment's current default chart
/// is used if it has been drawn on. Lookups that throw, values that are not
/// charts and empty charts all count as absent.
pub fn extract_artifact(env: &mut Environment) -> Option<PlotArtifact> {
    for name in ARTIFACT_NAMES {
        let expression = format!("(typeof {name} !== 'undefined') ? {name} : undefined");
        let Some(value) = env.lookup(&expression) else {
            continue;
        };
        if let Some(chart) = env.chart_of(&value) {
            if chart.has_renderers() {
                debug!(name, "Selected chart artifact");
                return chart.to_artifact();
            }
        }
    }

    let state = env.state();
    let chart = state.current_chart();
    if chart.has_renderers() {
        debug!("Selected default chart artifact");
        return chart.to_artifact();
    }

    None
}
