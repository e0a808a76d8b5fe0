/// Pixel paddings and thresholds used when placing span duration labels.
///
/// These are visual tuning, not correctness constraints.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextPlacementConfig {
    /// Gap between a label and the span edge it is anchored to.
    pub padding_px: f64,
    /// Spans starting past this fraction of the trace view get their label on the left.
    pub anchor_left_threshold: f64,
    /// Width of an error/performance icon drawn on a span.
    pub icon_width_px: f64,
}

impl Default for TextPlacementConfig {
    fn default() -> Self {
        Self {
            padding_px: 2.0,
            anchor_left_threshold: 0.9,
            icon_width_px: 18.0,
        }
    }
}

/// Tunables for a [`crate::VirtualizedViewManager`].
#[derive(Clone, Debug, PartialEq)]
pub struct ViewManagerConfig {
    pub max_zoom_precision_ms: f64,
    pub row_height: f64,
    pub overscroll_rows: usize,
    pub min_column_px: f64,
    pub wheel_zoom_factor: f64,
    pub wheel_end_ms: f64,
    pub scroll_source_reset_ms: f64,
    pub fov_debounce_ms: f64,
    pub zoom_animation_min_ms: f64,
    pub zoom_animation_max_ms: f64,
    pub initial_list_fraction: f64,
    pub text_placement: TextPlacementConfig,
}

impl Default for ViewManagerConfig {
    fn default() -> Self {
        Self {
            max_zoom_precision_ms: 1.0,
            row_height: 24.0,
            overscroll_rows: 10,
            min_column_px: 100.0,
            wheel_zoom_factor: 0.01,
            wheel_end_ms: 300.0,
            scroll_source_reset_ms: 100.0,
            fov_debounce_ms: 500.0,
            zoom_animation_min_ms: 200.0,
            zoom_animation_max_ms: 600.0,
            initial_list_fraction: 0.5,
            text_placement: TextPlacementConfig::default(),
        }
    }
}

impl ViewManagerConfig {
    /// Smallest trace view width, in milliseconds.
    ///
    /// Default: 1.0
    #[inline]
    pub fn max_zoom_precision_ms(mut self, precision: f64) -> Self {
        if precision.is_finite() && precision > 0.0 {
            self.max_zoom_precision_ms = precision;
        }
        self
    }

    #[inline]
    pub fn row_height(mut self, row_height: f64) -> Self {
        self.row_height = row_height.max(1.0);
        self
    }

    /// Rows rendered above and below the viewport.
    #[inline]
    pub fn overscroll_rows(mut self, rows: usize) -> Self {
        self.overscroll_rows = rows;
        self
    }

    /// Neither column can be dragged narrower than this.
    ///
    /// Default: 100.0
    #[inline]
    pub fn min_column_px(mut self, px: f64) -> Self {
        self.min_column_px = px.max(0.0);
        self
    }

    #[inline]
    pub fn wheel_zoom_factor(mut self, factor: f64) -> Self {
        self.wheel_zoom_factor = factor;
        self
    }

    #[inline]
    pub fn wheel_end_ms(mut self, ms: f64) -> Self {
        self.wheel_end_ms = ms.max(0.0);
        self
    }

    #[inline]
    pub fn scroll_source_reset_ms(mut self, ms: f64) -> Self {
        self.scroll_source_reset_ms = ms.max(0.0);
        self
    }

    #[inline]
    pub fn fov_debounce_ms(mut self, ms: f64) -> Self {
        self.fov_debounce_ms = ms.max(0.0);
        self
    }

    /// Bounds for the "zoom into span" animation duration.
    #[inline]
    pub fn zoom_animation_ms(mut self, min: f64, max: f64) -> Self {
        self.zoom_animation_min_ms = min.max(0.0);
        self.zoom_animation_max_ms = max.max(self.zoom_animation_min_ms);
        self
    }

    /// Share of the container given to the list column at start.
    ///
    /// Default: 0.5
    #[inline]
    pub fn initial_list_fraction(mut self, fraction: f64) -> Self {
        self.initial_list_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    #[inline]
    pub fn text_placement(mut self, text_placement: TextPlacementConfig) -> Self {
        self.text_placement = text_placement;
        self
    }
}
