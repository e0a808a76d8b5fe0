//! Timeline tick placement for the span column header.

use crate::trace_view::TraceView;

/// Rounds `target_ms` up to the nearest 1, 2 or 5 times a power of ten.
pub fn nice_step_ms(target_ms: f64) -> f64 {
    if !(target_ms > 0.0) || !target_ms.is_finite() {
        return 1.0;
    }
    let base = 10f64.powf(target_ms.log10().floor());
    let mant = target_ms / base;
    let nice = if mant <= 1.0 {
        1.0
    } else if mant <= 2.0 {
        2.0
    } else if mant <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * base
}

/// Tick positions, in milliseconds relative to the trace origin, covering the
/// visible trace view with roughly `target_px` pixels between ticks.
pub fn compute_timeline_intervals(view: &TraceView, target_px: f64) -> Vec<f64> {
    let px_per_ms = view.px_per_ms();
    if !(px_per_ms > 0.0) || !(target_px > 0.0) {
        return Vec::new();
    }

    let step = nice_step_ms(target_px / px_per_ms);
    let start = view.trace_view.x;
    let end = view.trace_view.x + view.trace_view.width;

    let first = (start / step).ceil() as i64;
    let last = (end / step).floor() as i64;
    (first..=last).map(|i| i as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace_view::ViewUpdate;

    #[test]
    fn steps_snap_to_one_two_five() {
        assert_eq!(nice_step_ms(0.7), 1.0);
        assert_eq!(nice_step_ms(1.3), 2.0);
        assert_eq!(nice_step_ms(30.0), 50.0);
        assert_eq!(nice_step_ms(700.0), 1000.0);
        assert_eq!(nice_step_ms(0.0), 1.0);
    }

    #[test]
    fn intervals_follow_the_view() {
        let mut view = TraceView::default();
        view.set_trace_space([0.0, 0.0, 1000.0, 1.0]);
        view.set_trace_physical_space([0.0, 0.0, 1000.0, 1.0], [0.0, 0.0, 1000.0, 1.0]);

        let ticks = compute_timeline_intervals(&view, 180.0);
        assert_eq!(ticks, vec![0.0, 200.0, 400.0, 600.0, 800.0, 1000.0]);

        view.set_trace_view(ViewUpdate::both(450.0, 100.0));
        let ticks = compute_timeline_intervals(&view, 180.0);
        assert_eq!(ticks, vec![460.0, 480.0, 500.0, 520.0, 540.0]);
    }
}
