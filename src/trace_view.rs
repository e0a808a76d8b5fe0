//! The three nested coordinate spaces of a trace waterfall.
//!
//! * trace space: the full extent of the data, in milliseconds relative to `to_origin`
//! * trace view: the zoomed/panned window into trace space
//! * trace physical space: pixel size of the span column
//!
//! The container physical space (the whole waterfall, both columns) is kept
//! alongside for gesture math that works in container-relative pixels.

use crate::dom_view::DomView;
use crate::mat3::Mat3;

/// Partial update for [`TraceView::set_trace_view`]; `None` keeps the current value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ViewUpdate {
    pub x: Option<f64>,
    pub width: Option<f64>,
}

impl ViewUpdate {
    pub fn x(x: f64) -> Self {
        Self {
            x: Some(x),
            width: None,
        }
    }

    pub fn width(width: f64) -> Self {
        Self {
            x: None,
            width: Some(width),
        }
    }

    pub fn both(x: f64, width: f64) -> Self {
        Self {
            x: Some(x),
            width: Some(width),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TraceView {
    pub to_origin: f64,
    pub trace_space: DomView,
    pub trace_view: DomView,
    pub trace_physical_space: DomView,
    pub trace_container_physical_space: DomView,
    max_zoom_precision: f64,
}

impl Default for TraceView {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl TraceView {
    pub fn new(max_zoom_precision: f64) -> Self {
        Self {
            to_origin: 0.0,
            trace_space: DomView::default(),
            trace_view: DomView::default(),
            trace_physical_space: DomView::default(),
            trace_container_physical_space: DomView::default(),
            max_zoom_precision,
        }
    }

    pub fn max_zoom_precision(&self) -> f64 {
        self.max_zoom_precision
    }

    /// Initializes the data extent from `[origin, y, duration, height]` and
    /// resets the view to cover it.
    pub fn set_trace_space(&mut self, space: [f64; 4]) {
        self.to_origin = space[0];
        self.trace_space = DomView::new(0.0, 0.0, space[2], space[3]);
        self.trace_view = DomView::new(0.0, 0.0, space[2], space[3]);
    }

    pub fn set_trace_physical_space(&mut self, container: [f64; 4], span_column: [f64; 4]) {
        self.trace_container_physical_space = DomView::from_array(container);
        self.trace_physical_space = DomView::from_array(span_column);
    }

    /// Moves/zooms the view, keeping it inside trace space.
    ///
    /// Width is bounded first, to `[max_zoom_precision, trace_space.width]`,
    /// then x to `[0, trace_space.width - width]`, so the window never leaves
    /// the data extent whatever order zoom and pan deltas arrive in.
    /// Returns `true` when the view changed.
    pub fn set_trace_view(&mut self, update: ViewUpdate) -> bool {
        // A trace made of a single instant has no timeline to move through.
        if self.trace_view.width == 0.0 {
            return false;
        }

        let x = update
            .x
            .filter(|x| !x.is_nan())
            .unwrap_or(self.trace_view.x);
        let width = update
            .width
            .filter(|w| !w.is_nan())
            .unwrap_or(self.trace_view.width);

        let max_width = self.trace_space.width.max(self.max_zoom_precision);
        let width = width.max(self.max_zoom_precision).min(max_width);
        let x = x.max(0.0).min((self.trace_space.width - width).max(0.0));

        let changed = x != self.trace_view.x || width != self.trace_view.width;
        self.trace_view.x = x;
        self.trace_view.width = width;
        changed
    }

    pub fn reset(&mut self) -> bool {
        self.set_trace_view(ViewUpdate::both(0.0, self.trace_space.width))
    }

    /// Trace view (config space, origin-relative) to span column pixels.
    pub fn span_to_px(&self) -> Mat3 {
        self.trace_view.between(&self.trace_physical_space)
    }

    /// Matrix taking the unit square of a `[start, duration]` span (absolute
    /// timestamps) to its rectangle in pixel space.
    pub fn get_span_to_px_for_space(&self, space: [f64; 2]) -> Mat3 {
        self.span_to_px()
            * Mat3::from_translation(space[0] - self.to_origin, 0.0)
            * Mat3::from_scaling(space[1], 1.0)
    }

    /// Maps a pointer position in physical space back into trace view coordinates.
    pub fn get_config_space_cursor(&self, x: f64, y: f64) -> (f64, f64) {
        self.trace_physical_space
            .between(&self.trace_view)
            .transform_point(x, y)
    }

    /// Pixel offset, relative to the span column, of an absolute timestamp.
    pub fn config_to_px(&self, timestamp: f64) -> f64 {
        let (x, _) = self
            .span_to_px()
            .transform_point(timestamp - self.to_origin, 0.0);
        x - self.trace_physical_space.x
    }

    /// Pixels covered by one millisecond at the current zoom.
    pub fn px_per_ms(&self) -> f64 {
        if self.trace_view.width <= 0.0 {
            return 0.0;
        }
        self.trace_physical_space.width / self.trace_view.width
    }

    /// Milliseconds covered by one pixel at the current zoom.
    pub fn ms_per_px(&self) -> f64 {
        if self.trace_physical_space.width <= 0.0 {
            return 0.0;
        }
        self.trace_view.width / self.trace_physical_space.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> TraceView {
        let mut view = TraceView::default();
        view.set_trace_space([0.0, 0.0, 100.0, 1.0]);
        view.set_trace_physical_space([0.0, 0.0, 1000.0, 1.0], [0.0, 0.0, 1000.0, 1.0]);
        view
    }

    #[test]
    fn zero_width_request_is_clamped_to_precision() {
        let mut view = view();
        view.set_trace_view(ViewUpdate::width(0.0));
        assert!(view.trace_view.width > 0.0);
        assert_eq!(view.trace_view.width, 1.0);

        view.set_trace_view(ViewUpdate::width(-20.0));
        assert_eq!(view.trace_view.width, 1.0);
    }

    #[test]
    fn x_stays_inside_trace_space() {
        let mut view = view();
        view.set_trace_view(ViewUpdate::width(40.0));
        for x in [-1000.0, -1.0, 0.0, 30.0, 60.0, 61.0, 1e9] {
            view.set_trace_view(ViewUpdate::x(x));
            assert!(view.trace_view.x >= 0.0);
            assert!(view.trace_view.x <= view.trace_space.width - view.trace_view.width);
        }
        assert_eq!(view.trace_view.width, 40.0);
    }

    #[test]
    fn panning_past_the_end_keeps_width() {
        let mut view = view();
        view.set_trace_view(ViewUpdate::both(80.0, 50.0));
        assert_eq!(view.trace_view.x, 50.0);
        assert_eq!(view.trace_view.width, 50.0);
    }

    #[test]
    fn degenerate_view_ignores_updates() {
        let mut view = TraceView::default();
        view.set_trace_space([10.0, 0.0, 0.0, 1.0]);
        assert!(!view.set_trace_view(ViewUpdate::both(0.0, 5.0)));
        assert_eq!(view.trace_view.width, 0.0);
    }

    #[test]
    fn nan_components_are_ignored() {
        let mut view = view();
        view.set_trace_view(ViewUpdate::both(f64::NAN, 20.0));
        assert_eq!(view.trace_view.x, 0.0);
        assert_eq!(view.trace_view.width, 20.0);
    }

    #[test]
    fn config_space_cursor_inverts_physical_mapping() {
        let mut view = view();
        assert!((view.get_config_space_cursor(500.0, 0.0).0 - 50.0).abs() < 1e-9);

        view.set_trace_view(ViewUpdate::both(50.0, 50.0));
        assert!((view.get_config_space_cursor(500.0, 0.0).0 - 75.0).abs() < 1e-9);
    }

    #[test]
    fn span_to_px_places_span_rectangle() {
        let mut view = TraceView::default();
        view.set_trace_space([1000.0, 0.0, 100.0, 1.0]);
        view.set_trace_physical_space([0.0, 0.0, 1500.0, 20.0], [500.0, 0.0, 1000.0, 1.0]);
        view.set_trace_view(ViewUpdate::both(50.0, 50.0));

        let m = view.get_span_to_px_for_space([1060.0, 10.0]);
        let (left, _) = m.transform_point(0.0, 0.0);
        let (right, _) = m.transform_point(1.0, 0.0);
        assert!((left - 700.0).abs() < 1e-9);
        assert!((right - 900.0).abs() < 1e-9);
        assert!((view.config_to_px(1060.0) - 200.0).abs() < 1e-9);
    }
}
