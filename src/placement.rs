//! Where a span's duration label goes relative to its bar.

use crate::config::TextPlacementConfig;
use crate::trace_view::TraceView;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextPlacement {
    /// Left of the bar, ending at its start.
    OutsideLeft,
    /// Right of the bar, starting at its end.
    OutsideRight,
    /// Inside the bar, against its visible left edge.
    InsideLeft,
    /// Inside the bar, against its visible right edge.
    InsideRight,
}

impl TextPlacement {
    pub fn is_inside(self) -> bool {
        matches!(self, TextPlacement::InsideLeft | TextPlacement::InsideRight)
    }
}

/// Picks a placement for a label `text_width` pixels wide and returns it with
/// the label's left edge, in pixels relative to the span column.
///
/// `space` is the span's `[start, duration]` and `icon_extent` the absolute
/// `(min, max)` timestamps once error/performance icons are included; labels
/// placed outside the bar clear the icons too.
pub fn compute_span_text_placement(
    view: &TraceView,
    space: [f64; 2],
    text_width: f64,
    icon_extent: (f64, f64),
    config: &TextPlacementConfig,
) -> (TextPlacement, f64) {
    let padding = config.padding_px;
    let view_width_px = view.trace_physical_space.width;

    let left_px = view.config_to_px(icon_extent.0.min(space[0]));
    let right_px = view.config_to_px(icon_extent.1.max(space[0] + space[1]));

    // Entirely left of the view: pin the label to the view start.
    if right_px < 0.0 {
        return (TextPlacement::OutsideRight, padding);
    }
    // Entirely right of the view: pin the label to the view end.
    if left_px > view_width_px {
        return (
            TextPlacement::OutsideLeft,
            view_width_px - text_width - padding,
        );
    }
    // Covers the view.
    if left_px <= 0.0 && right_px >= view_width_px {
        return (TextPlacement::InsideLeft, padding);
    }

    let visible_left = left_px.max(0.0);
    let visible_right = right_px.min(view_width_px);
    let fits_inside = visible_right - visible_left >= text_width + 2.0 * padding;

    let span_start = space[0] - view.to_origin;
    let anchor_left = span_start
        > view.trace_view.x + view.trace_view.width * config.anchor_left_threshold;

    if anchor_left {
        let outside_left = left_px - padding - text_width;
        if outside_left >= 0.0 {
            return (TextPlacement::OutsideLeft, outside_left);
        }
        if fits_inside {
            return (TextPlacement::InsideLeft, visible_left + padding);
        }
        return (TextPlacement::OutsideRight, right_px + padding);
    }

    if right_px + padding + text_width <= view_width_px {
        return (TextPlacement::OutsideRight, right_px + padding);
    }
    if fits_inside {
        return (
            TextPlacement::InsideRight,
            visible_right - padding - text_width,
        );
    }
    (TextPlacement::OutsideLeft, left_px - padding - text_width)
}
