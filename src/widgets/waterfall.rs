use std::collections::{HashMap, HashSet};
use std::time::Duration;

use eframe::egui::{
    self, pos2, vec2, Align2, Color32, CursorIcon, FontId, Pos2, Rect, Response, Sense, Shape,
    Stroke, TextStyle, Ui, Widget,
};

use crate::config::ViewManagerConfig;
use crate::text::{format_duration, GlyphMetrics};
use crate::themes;
use crate::timeline::compute_timeline_intervals;
use crate::tree::TraceTree;
use crate::view_manager::{
    ArrowDirection, ElementStyle, ElementTarget, SpanElement, VirtualizedViewManager, WheelInput,
};

const HEADER_HEIGHT: f32 = 22.0;
const DIVIDER_GRAB: f32 = 6.0;
const INDENT: f32 = 14.0;
const TIMELINE_TICK_PX: f64 = 96.0;
const CURSOR_INDICATOR: &str = "cursor";

/// Text widths from an egui font.
pub struct EguiGlyphMetrics<'a> {
    pub ctx: &'a egui::Context,
    pub font_id: FontId,
}

impl GlyphMetrics for EguiGlyphMetrics<'_> {
    fn measure_text(&self, text: &str) -> f64 {
        self.ctx.fonts_mut(|fonts| {
            fonts
                .layout_no_wrap(text.to_owned(), self.font_id.clone(), Color32::PLACEHOLDER)
                .size()
                .x as f64
        })
    }
}

/// Everything a [`Waterfall`] keeps between frames.
#[derive(Debug)]
pub struct WaterfallState {
    pub manager: VirtualizedViewManager,
    styles: HashMap<ElementTarget, ElementStyle>,
    mounted: HashSet<usize>,
    generation: Option<u64>,
    metrics_ready: bool,
}

impl WaterfallState {
    pub fn new(config: ViewManagerConfig, tree: &TraceTree) -> Self {
        let mut manager = VirtualizedViewManager::new(config);
        if let Some(space) = tree.trace_space() {
            manager.set_trace_space(space);
        }
        Self {
            manager,
            styles: HashMap::new(),
            mounted: HashSet::new(),
            generation: None,
            metrics_ready: false,
        }
    }

    fn style(&self, target: &ElementTarget) -> Option<&ElementStyle> {
        self.styles.get(target)
    }
}

/// Two-column trace waterfall: span tree on the left, timeline bars on the right.
///
/// Ctrl/cmd + scroll zooms around the pointer, horizontal scroll pans,
/// vertical scroll moves through the rows. Clicking a bar zooms to it,
/// double-clicking resets, clicking a row label toggles its children.
pub struct Waterfall<'a> {
    tree: &'a mut TraceTree,
    state: &'a mut WaterfallState,
    height: Option<f32>,
}

impl<'a> Waterfall<'a> {
    pub fn new(tree: &'a mut TraceTree, state: &'a mut WaterfallState) -> Self {
        Self {
            tree,
            state,
            height: None,
        }
    }

    /// Default: all available height.
    #[inline]
    pub fn height(mut self, height: f32) -> Self {
        self.height = Some(height);
        self
    }
}

impl Widget for Waterfall<'_> {
    fn ui(self, ui: &mut Ui) -> Response {
        let Waterfall {
            tree,
            state,
            height,
        } = self;

        let now_ms = ui.input(|i| i.time) * 1000.0;
        let font_id = TextStyle::Small.resolve(ui.style());
        let size = vec2(
            ui.available_width().max(240.0),
            height.unwrap_or_else(|| ui.available_height()).max(HEADER_HEIGHT * 3.0),
        );
        let (rect, response) = ui.allocate_exact_size(size, Sense::click_and_drag());
        let id = response.id;

        if !state.metrics_ready {
            let metrics = EguiGlyphMetrics {
                ctx: ui.ctx(),
                font_id: font_id.clone(),
            };
            state.manager.set_glyph_metrics(&metrics);
            state.metrics_ready = true;
        }

        let rows_rect = Rect::from_min_max(pos2(rect.left(), rect.top() + HEADER_HEIGHT), rect.max);
        state.manager.register_container(rows_rect);

        if state.generation != Some(tree.generation()) {
            state.generation = Some(tree.generation());
            for row in state.mounted.drain() {
                state.manager.unregister_row(row);
            }
            state.manager.invalidate_rows();
        }

        let columns = state.manager.columns();
        let split_x = rows_rect.left() + rows_rect.width() * columns.list as f32;
        let list_rect = Rect::from_min_max(rect.min, pos2(split_x, rect.bottom()));
        let span_rect = Rect::from_min_max(pos2(split_x, rect.top()), rect.max);

        handle_divider(ui, id, split_x, rect, state);
        handle_wheel(ui, &response, list_rect, state, now_ms);

        let hover = response.hover_pos().filter(|pos| span_rect.contains(*pos));
        match hover {
            Some(pos) if state.manager.is_pointer_events_enabled() => {
                let (ms, _) = state
                    .manager
                    .view()
                    .get_config_space_cursor(pos.x as f64, 0.0);
                let timestamp = ms + state.manager.view().to_origin;
                state
                    .manager
                    .register_vertical_indicator(CURSOR_INDICATOR, timestamp);
            }
            _ => state.manager.unregister_vertical_indicator(CURSOR_INDICATOR),
        }

        if state.manager.tick(now_ms) || state.manager.is_animating() {
            ui.ctx().request_repaint();
        } else if let Some(deadline) = state.manager.next_deadline_ms() {
            let wait = ((deadline - now_ms).max(0.0) / 1000.0).max(0.001);
            ui.ctx().request_repaint_after(Duration::from_secs_f64(wait));
        }

        let rows = {
            let _span = tracing::trace_span!("mount_rows").entered();
            let rows = state.manager.visible_rows(tree.list());
            let visible: HashSet<usize> = rows.iter().map(|row| row.index).collect();
            for gone in state.mounted.difference(&visible) {
                state.manager.unregister_row(*gone);
            }
            state.mounted = visible;

            let icon_width_ms = state.manager.icon_width_ms();
            for row in &rows {
                let node = &tree.list()[row.index];
                let duration = format_duration(node.space[1]);
                let label_width = state.manager.text_measurer_mut().measure(&node.label());
                let content_width = node.depth as f64 * INDENT as f64 + INDENT as f64 + label_width;
                let manager = &mut state.manager;
                manager.register_span_bar(row.index, node.space);
                manager.register_invisible_bar(row.index, node.space);
                manager.register_span_arrow(row.index, node.space);
                manager.register_span_text(
                    row.index,
                    node.space,
                    &duration,
                    node.icon_timestamps(icon_width_ms),
                );
                manager.register_list_content(row.index, node.id, content_width);
            }
            rows
        };

        state.manager.draw(&mut state.styles);

        let painter = ui.painter_at(rect);
        let visuals = ui.visuals().clone();
        let ink = visuals.text_color();
        let grid = themes::mix(visuals.panel_fill, ink, 0.12);
        let stripe = themes::mix(visuals.panel_fill, ink, 0.03);
        let row_height = state.manager.list().row_height() as f32;
        let scroll_top = state.manager.list().scroll_top() as f32;

        paint_timeline(&painter, span_rect, rows_rect, &font_id, grid, ink, state);

        let list_painter = painter.with_clip_rect(Rect::from_min_max(
            pos2(list_rect.left(), rows_rect.top()),
            list_rect.max,
        ));
        let span_painter = painter.with_clip_rect(Rect::from_min_max(
            pos2(span_rect.left(), rows_rect.top()),
            span_rect.max,
        ));

        let mut toggled = None;
        let mut zoom_to = None;
        let pointer_enabled = state.manager.is_pointer_events_enabled();

        for row in &rows {
            let node = &tree.list()[row.index];
            let top = rows_rect.top() + row.style.top as f32 - scroll_top;
            let row_rect =
                Rect::from_min_size(pos2(rect.left(), top), vec2(rect.width(), row_height));
            if row.index % 2 == 1 {
                painter
                    .with_clip_rect(rows_rect)
                    .rect_filled(row_rect, 0.0, stripe);
            }
            let span_target = |element| ElementTarget::Span {
                row: row.index,
                element,
            };
            let center_y = row_rect.center().y;

            // List column.
            let shift = match state.style(&span_target(SpanElement::ListContent)) {
                Some(ElementStyle::TranslateX(x)) => *x as f32,
                _ => 0.0,
            };
            let indent_x = list_rect.left() + shift + node.depth as f32 * INDENT;
            if node.has_children {
                let glyph = if node.expanded { "▾" } else { "▸" };
                list_painter.text(
                    pos2(indent_x + 2.0, center_y),
                    Align2::LEFT_CENTER,
                    glyph,
                    font_id.clone(),
                    ink,
                );
            }
            list_painter.text(
                pos2(indent_x + INDENT, center_y),
                Align2::LEFT_CENTER,
                node.label(),
                font_id.clone(),
                ink,
            );

            // Span column.
            let color = themes::span_color(&node.op);
            let bar_height = (row_height * 0.55).max(4.0);
            let mut bar_rect = None;
            if let Some(ElementStyle::Matrix(m)) = state.style(&span_target(SpanElement::Bar)) {
                let left = span_rect.left() + m.translate_x() as f32;
                let width = (m.scale_x() as f32).max(1.0);
                let bar = Rect::from_min_size(
                    pos2(left, center_y - bar_height / 2.0),
                    vec2(width, bar_height),
                );
                span_painter.rect_filled(bar, 1.0, color);
                bar_rect = Some(bar);
            }

            let icon_radius = (bar_height / 2.0).min(5.0);
            for (timestamps, fill) in [
                (&node.errors, themes::ERROR_COLOR),
                (&node.performance_issues, themes::PERFORMANCE_ISSUE_COLOR),
            ] {
                for timestamp in timestamps {
                    let x = span_rect.left() + state.manager.view().config_to_px(*timestamp) as f32;
                    span_painter.circle_filled(pos2(x, center_y), icon_radius, fill);
                }
            }

            if let Some(ElementStyle::Label { x, placement }) =
                state.style(&span_target(SpanElement::Text))
            {
                let label_color = if placement.is_inside() {
                    themes::text_color_on(color)
                } else {
                    ink
                };
                span_painter.text(
                    pos2(span_rect.left() + *x as f32, center_y),
                    Align2::LEFT_CENTER,
                    format_duration(node.space[1]),
                    font_id.clone(),
                    label_color,
                );
            }

            let arrow = state.style(&span_target(SpanElement::Arrow));
            if let Some(ElementStyle::Arrow(direction)) = arrow {
                paint_arrow(&span_painter, span_rect, center_y, *direction, ink);
            }

            if !pointer_enabled {
                continue;
            }
            let Some(pos) = response.interact_pointer_pos() else {
                continue;
            };
            if !row_rect.contains(pos) || !response.clicked() {
                continue;
            }
            if list_rect.contains(pos) {
                toggled = Some(node.id);
            } else if bar_rect.is_some_and(|bar| bar.expand2(vec2(4.0, 0.0)).contains(pos))
                || matches!(
                    state.style(&span_target(SpanElement::Arrow)),
                    Some(ElementStyle::Arrow(_))
                )
            {
                zoom_to = Some(node.space);
            }
        }

        if let Some(ElementStyle::TranslateX(x)) =
            state.style(&ElementTarget::Indicator(CURSOR_INDICATOR.to_owned()))
        {
            let x = span_rect.left() + *x as f32;
            painter.line_segment(
                [pos2(x, rect.top()), pos2(x, rect.bottom())],
                Stroke::new(1.0, themes::mix(visuals.panel_fill, ink, 0.5)),
            );
        }

        painter.line_segment(
            [pos2(split_x, rect.top()), pos2(split_x, rect.bottom())],
            Stroke::new(1.0, grid),
        );
        paint_fake_scrollbar(&painter, list_rect, rows_rect, ink, state);

        if let Some(id) = toggled {
            if let Some(expanded) = tree.toggle_expanded(id) {
                log::debug!("span {id} expanded: {expanded}");
            }
            ui.ctx().request_repaint();
        }
        let pointer = response.interact_pointer_pos().unwrap_or(Pos2::ZERO);
        if response.double_clicked() && span_rect.contains(pointer) {
            state.manager.reset_zoom(now_ms);
            ui.ctx().request_repaint();
        } else if let Some(space) = zoom_to {
            state.manager.on_zoom_into_space(space, now_ms);
            ui.ctx().request_repaint();
        }

        response
    }
}

fn handle_divider(ui: &Ui, id: egui::Id, split_x: f32, rect: Rect, state: &mut WaterfallState) {
    let grab = Rect::from_min_max(
        pos2(split_x - DIVIDER_GRAB / 2.0, rect.top()),
        pos2(split_x + DIVIDER_GRAB / 2.0, rect.bottom()),
    );
    let divider = ui
        .interact(grab, id.with("divider"), Sense::drag())
        .on_hover_cursor(CursorIcon::ResizeHorizontal);
    let Some(pos) = divider.interact_pointer_pos() else {
        return;
    };
    let manager = &mut state.manager;
    if divider.drag_started() {
        manager.on_divider_mouse_down(pos.x as f64);
    } else if divider.drag_stopped() {
        manager.on_divider_mouse_up(pos.x as f64);
    } else if divider.dragged()
        && manager.is_divider_listening()
        && manager.on_divider_mouse_move(pos.x as f64)
    {
        ui.ctx().request_repaint();
    }
}

fn handle_wheel(
    ui: &Ui,
    response: &Response,
    list_rect: Rect,
    state: &mut WaterfallState,
    now_ms: f64,
) {
    if !response.contains_pointer() {
        return;
    }
    let (scroll, zoom, modifiers, pointer) = ui.input(|i| {
        (
            i.raw_scroll_delta,
            i.zoom_delta(),
            i.modifiers,
            i.pointer.hover_pos(),
        )
    });
    let Some(pointer) = pointer else {
        return;
    };
    let manager = &mut state.manager;

    let moved = if zoom != 1.0 {
        // Ctrl/cmd + scroll arrives as a zoom factor; map it back onto a wheel delta.
        let delta_y = (1.0 - zoom as f64) / manager.config().wheel_zoom_factor;
        manager.on_wheel(
            WheelInput {
                delta_y,
                client_x: pointer.x as f64,
                ctrl_key: modifiers.ctrl,
                meta_key: modifiers.command && !modifiers.ctrl,
                ..Default::default()
            },
            now_ms,
        )
    } else if scroll != egui::Vec2::ZERO {
        let (delta_x, delta_y) = (-scroll.x as f64, -scroll.y as f64);
        if list_rect.contains(pointer) && delta_x != 0.0 {
            let left = manager.list_scroll_left() + delta_x;
            manager.on_list_scroll(left, now_ms)
        } else {
            manager.on_wheel(
                WheelInput {
                    delta_x,
                    delta_y,
                    client_x: pointer.x as f64,
                    shift_key: modifiers.shift,
                    ..Default::default()
                },
                now_ms,
            )
        }
    } else {
        false
    };
    if moved {
        ui.ctx().request_repaint();
    }
}

fn paint_timeline(
    painter: &egui::Painter,
    span_rect: Rect,
    rows_rect: Rect,
    font_id: &FontId,
    grid: Color32,
    ink: Color32,
    state: &WaterfallState,
) {
    let view = state.manager.view();
    let header = Rect::from_min_max(span_rect.min, pos2(span_rect.right(), rows_rect.top()));
    let header_painter = painter.with_clip_rect(header);
    let grid_painter = painter.with_clip_rect(Rect::from_min_max(
        pos2(span_rect.left(), rows_rect.top()),
        span_rect.max,
    ));

    painter.line_segment(
        [pos2(header.left(), header.bottom()), pos2(header.right(), header.bottom())],
        Stroke::new(1.0, grid),
    );
    for tick in compute_timeline_intervals(view, TIMELINE_TICK_PX) {
        let x = span_rect.left() + view.config_to_px(tick + view.to_origin) as f32;
        header_painter.line_segment(
            [pos2(x, header.bottom() - 5.0), pos2(x, header.bottom())],
            Stroke::new(1.0, ink),
        );
        header_painter.text(
            pos2(x + 3.0, header.center().y),
            Align2::LEFT_CENTER,
            format_duration(tick),
            font_id.clone(),
            ink,
        );
        grid_painter.line_segment(
            [pos2(x, rows_rect.top()), pos2(x, rows_rect.bottom())],
            Stroke::new(1.0, grid),
        );
    }
}

fn paint_arrow(
    painter: &egui::Painter,
    span_rect: Rect,
    y: f32,
    direction: ArrowDirection,
    color: Color32,
) {
    let size = 5.0;
    let points = match direction {
        ArrowDirection::Left => {
            let x = span_rect.left() + 4.0;
            vec![pos2(x, y), pos2(x + size, y - size), pos2(x + size, y + size)]
        }
        ArrowDirection::Right => {
            let x = span_rect.right() - 4.0;
            vec![pos2(x, y), pos2(x - size, y - size), pos2(x - size, y + size)]
        }
    };
    painter.add(Shape::convex_polygon(points, color, Stroke::NONE));
}

fn paint_fake_scrollbar(
    painter: &egui::Painter,
    list_rect: Rect,
    rows_rect: Rect,
    ink: Color32,
    state: &WaterfallState,
) {
    let content = state.style(&ElementTarget::FakeScrollbarContent);
    let Some(ElementStyle::WidthPx(content)) = content else {
        return;
    };
    let visible = list_rect.width();
    let content = *content as f32;
    if content <= visible {
        return;
    }
    let left = match state.style(&ElementTarget::FakeScrollbar) {
        Some(ElementStyle::ScrollLeft(left)) => *left as f32,
        _ => 0.0,
    };
    let thumb_width = (visible * visible / content).max(16.0);
    let progress = (left / (content - visible)).clamp(0.0, 1.0);
    let thumb_x = list_rect.left() + progress * (visible - thumb_width);
    let thumb = Rect::from_min_size(
        pos2(thumb_x, rows_rect.bottom() - 4.0),
        vec2(thumb_width, 3.0),
    );
    painter.rect_filled(thumb, 1.5, themes::mix(Color32::TRANSPARENT, ink, 0.4));
}
