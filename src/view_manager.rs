//! Gesture handling and style output for one rendered trace waterfall.
//!
//! The rendering layer registers the elements it mounted for each visible
//! row, forwards input as it arrives and calls [`VirtualizedViewManager::tick`]
//! once per frame. [`VirtualizedViewManager::draw`] then writes styles for
//! every registered element into a [`StyleSink`], skipping values the sink
//! already holds.

use std::collections::{BTreeMap, HashMap};

use crate::config::ViewManagerConfig;
use crate::dom_view::DomView;
use crate::fov::{self, FieldOfView, FovError};
use crate::frame::{ease_out_sine, Debounce, FrameRequest};
use crate::mat3::Mat3;
use crate::measure::RowWidthMeasurer;
use crate::placement::{compute_span_text_placement, TextPlacement};
use crate::scheduler::{
    Priority, SchedulerListener, TraceScheduler, TraceViewEvent, TraceViewEventKind,
};
use crate::text::{GlyphMetrics, TraceTextMeasurer};
use crate::trace_view::{TraceView, ViewUpdate};
use crate::tree::{NodeId, TraceNode};
use crate::virtual_list::{ScrollAnchor, VirtualizedList, VirtualizedRow};

/// Smallest per-event wheel zoom scale; larger wheel deltas would flip the view.
const MIN_WHEEL_SCALE: f64 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpanElement {
    Bar,
    Text,
    Arrow,
    InvisibleBar,
    /// The list column content of a row, shifted by the horizontal scroll.
    ListContent,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ElementTarget {
    Span { row: usize, element: SpanElement },
    Indicator(String),
    ListColumn,
    SpanColumn,
    Divider,
    Container,
    FakeScrollbar,
    FakeScrollbarContent,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrowDirection {
    Left,
    Right,
}

/// A style value for one element. Positions are pixels relative to the
/// column the element lives in.
#[derive(Clone, Debug, PartialEq)]
pub enum ElementStyle {
    Hidden,
    Matrix(Mat3),
    TranslateX(f64),
    Label { x: f64, placement: TextPlacement },
    Arrow(ArrowDirection),
    WidthPercent(f64),
    WidthPx(f64),
    PointerEvents(bool),
    ScrollLeft(f64),
}

impl ElementStyle {
    /// The inline style a DOM host would set for this value.
    pub fn css(&self) -> String {
        match self {
            ElementStyle::Hidden => "display: none".to_owned(),
            ElementStyle::Matrix(m) => format!("transform: {}", m.css_matrix()),
            ElementStyle::TranslateX(x) | ElementStyle::Label { x, .. } => {
                format!("transform: translateX({x}px)")
            }
            ElementStyle::Arrow(ArrowDirection::Left) => "display: block; left: 0".to_owned(),
            ElementStyle::Arrow(ArrowDirection::Right) => "display: block; right: 0".to_owned(),
            ElementStyle::WidthPercent(fraction) => format!("width: {}%", fraction * 100.0),
            ElementStyle::WidthPx(px) => format!("width: {px}px"),
            ElementStyle::PointerEvents(true) => "pointer-events: auto".to_owned(),
            ElementStyle::PointerEvents(false) => "pointer-events: none".to_owned(),
            ElementStyle::ScrollLeft(left) => format!("--scroll-left: {left}px"),
        }
    }
}

/// Receives style mutations from [`VirtualizedViewManager::draw`].
pub trait StyleSink {
    fn apply(&mut self, target: &ElementTarget, style: &ElementStyle);
}

impl StyleSink for HashMap<ElementTarget, ElementStyle> {
    fn apply(&mut self, target: &ElementTarget, style: &ElementStyle) {
        self.insert(target.clone(), style.clone());
    }
}

impl StyleSink for Vec<(ElementTarget, ElementStyle)> {
    fn apply(&mut self, target: &ElementTarget, style: &ElementStyle) {
        self.push((target.clone(), style.clone()));
    }
}

/// Width shares of the list and span columns; they always sum to 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Columns {
    pub list: f64,
    pub span_list: f64,
}

impl Columns {
    pub fn new(list: f64) -> Self {
        let list = list.clamp(0.0, 1.0);
        Self {
            list,
            span_list: 1.0 - list,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollingSource {
    List,
    FakeScrollbar,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WheelInput {
    pub delta_x: f64,
    pub delta_y: f64,
    pub client_x: f64,
    pub ctrl_key: bool,
    pub meta_key: bool,
    pub shift_key: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct SpanSlot {
    space: [f64; 2],
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct TextSlot {
    space: [f64; 2],
    width: f64,
    icon_extent: (f64, f64),
}

#[derive(Clone, Copy, Debug, Default)]
struct RowSlots {
    bar: Option<SpanSlot>,
    text: Option<TextSlot>,
    arrow: Option<SpanSlot>,
    invisible_bar: Option<SpanSlot>,
    list_content: Option<NodeId>,
}

#[derive(Clone, Copy, Debug, Default)]
struct Timers {
    wheel_end: Debounce,
    scroll_source_reset: Debounce,
    fov: Debounce,
}

#[derive(Clone, Copy, Debug)]
struct DividerDrag {
    start_x: f64,
    start_list: f64,
}

#[derive(Clone, Copy, Debug)]
struct ZoomAnimation {
    started_at: f64,
    duration_ms: f64,
    from: (f64, f64),
    to: (f64, f64),
}

impl ZoomAnimation {
    /// View `(x, width)` at `now_ms` and whether the animation is done.
    fn sample(&self, now_ms: f64) -> ((f64, f64), bool) {
        let t = if self.duration_ms > 0.0 {
            (now_ms - self.started_at) / self.duration_ms
        } else {
            1.0
        };
        if t >= 1.0 {
            return (self.to, true);
        }
        let e = ease_out_sine(t);
        (
            (
                self.from.0 + (self.to.0 - self.from.0) * e,
                self.from.1 + (self.to.1 - self.from.1) * e,
            ),
            false,
        )
    }
}

/// Owns the coordinate spaces, caches and gesture state of one waterfall.
#[derive(Debug)]
pub struct VirtualizedViewManager {
    config: ViewManagerConfig,
    view: TraceView,
    columns: Columns,
    scheduler: TraceScheduler,
    row_measurer: RowWidthMeasurer<NodeId>,
    text_measurer: TraceTextMeasurer,
    list: VirtualizedList<NodeId, ()>,

    /// Slots of mounted rows only, keyed by row index.
    rows: BTreeMap<usize, RowSlots>,
    indicators: BTreeMap<String, f64>,
    container: Option<DomView>,
    applied: HashMap<ElementTarget, ElementStyle>,

    frame: FrameRequest,
    timers: Timers,
    zoom_animation: Option<ZoomAnimation>,
    wheel_offset: Option<f64>,
    pointer_events: bool,
    divider: Option<DividerDrag>,
    divider_listeners_attached: bool,
    scrolling_source: Option<ScrollingSource>,
    list_scroll_left: f64,
    fake_scrollbar_scroll_left: f64,
    field_of_view: Option<FieldOfView>,
    pending_field_of_view: Option<FieldOfView>,
}

impl Default for VirtualizedViewManager {
    fn default() -> Self {
        Self::new(ViewManagerConfig::default())
    }
}

impl VirtualizedViewManager {
    pub fn new(config: ViewManagerConfig) -> Self {
        Self {
            view: TraceView::new(config.max_zoom_precision_ms),
            columns: Columns::new(config.initial_list_fraction),
            scheduler: TraceScheduler::new(),
            row_measurer: RowWidthMeasurer::new(),
            text_measurer: TraceTextMeasurer::default(),
            list: VirtualizedList::new(config.row_height, config.overscroll_rows),
            rows: BTreeMap::new(),
            indicators: BTreeMap::new(),
            container: None,
            applied: HashMap::new(),
            frame: FrameRequest::default(),
            timers: Timers::default(),
            zoom_animation: None,
            wheel_offset: None,
            pointer_events: true,
            divider: None,
            divider_listeners_attached: false,
            scrolling_source: None,
            list_scroll_left: 0.0,
            fake_scrollbar_scroll_left: 0.0,
            field_of_view: None,
            pending_field_of_view: None,
            config,
        }
    }

    pub fn config(&self) -> &ViewManagerConfig {
        &self.config
    }

    pub fn view(&self) -> &TraceView {
        &self.view
    }

    pub fn columns(&self) -> Columns {
        self.columns
    }

    pub fn list(&self) -> &VirtualizedList<NodeId, ()> {
        &self.list
    }

    pub fn row_measurer_mut(&mut self) -> &mut RowWidthMeasurer<NodeId> {
        &mut self.row_measurer
    }

    pub fn text_measurer_mut(&mut self) -> &mut TraceTextMeasurer {
        &mut self.text_measurer
    }

    /// Swaps in real font metrics. Label placements are recomputed on the next draw.
    pub fn set_glyph_metrics(&mut self, metrics: &dyn GlyphMetrics) {
        self.text_measurer = TraceTextMeasurer::new(Some(metrics));
        for slots in self.rows.values_mut() {
            slots.text = None;
        }
        self.applied.retain(|target, _| {
            !matches!(
                target,
                ElementTarget::Span {
                    element: SpanElement::Text,
                    ..
                }
            )
        });
        self.frame.request();
    }

    pub fn on(
        &mut self,
        kind: TraceViewEventKind,
        priority: Priority,
        listener: impl FnMut(&TraceViewEvent) + Send + Sync + 'static,
    ) -> SchedulerListener {
        self.scheduler.on(kind, priority, listener)
    }

    pub fn off(&mut self, kind: TraceViewEventKind, listener: SchedulerListener) -> bool {
        self.scheduler.off(kind, listener)
    }

    pub fn is_pointer_events_enabled(&self) -> bool {
        self.pointer_events
    }

    pub fn is_divider_listening(&self) -> bool {
        self.divider_listeners_attached
    }

    pub fn scrolling_source(&self) -> Option<ScrollingSource> {
        self.scrolling_source
    }

    pub fn list_scroll_left(&self) -> f64 {
        self.list_scroll_left
    }

    pub fn fake_scrollbar_scroll_left(&self) -> f64 {
        self.fake_scrollbar_scroll_left
    }

    pub fn is_animating(&self) -> bool {
        self.zoom_animation.is_some()
    }

    /// Last field of view published after the debounce window.
    pub fn field_of_view(&self) -> Option<FieldOfView> {
        self.field_of_view
    }

    /// Field of view published since the last call, for hosts that persist it.
    pub fn take_field_of_view_change(&mut self) -> Option<FieldOfView> {
        self.pending_field_of_view.take()
    }

    /// Earliest pending timer deadline, so hosts can schedule their next tick.
    pub fn next_deadline_ms(&self) -> Option<f64> {
        [
            self.timers.wheel_end.deadline_ms(),
            self.timers.scroll_source_reset.deadline_ms(),
            self.timers.fov.deadline_ms(),
        ]
        .into_iter()
        .flatten()
        .reduce(f64::min)
    }

    /// Sets the data extent from a `[start, duration]` interval in absolute milliseconds.
    pub fn set_trace_space(&mut self, space: [f64; 2]) {
        let space = [space[0], 0.0, space[1].max(0.0), 1.0];
        self.view.set_trace_space(space);
        self.zoom_animation = None;
        self.scheduler
            .dispatch(&TraceViewEvent::SetTraceSpace { space });
        self.dispatch_view();
        self.frame.request();
    }

    /// Registers the waterfall container; the span column is derived from the column shares.
    pub fn register_container(&mut self, rect: impl Into<DomView>) {
        let rect = rect.into();
        if self.container == Some(rect) {
            return;
        }
        self.container = Some(rect);
        self.list.set_viewport_height(rect.height);
        self.update_physical_space();
    }

    pub fn register_span_bar(&mut self, row: usize, space: [f64; 2]) {
        self.row_mut(row).bar = Some(SpanSlot { space });
    }

    pub fn register_span_text(
        &mut self,
        row: usize,
        space: [f64; 2],
        text: &str,
        icon_extent: (f64, f64),
    ) {
        let width = self.text_measurer.measure(text);
        self.row_mut(row).text = Some(TextSlot {
            space,
            width,
            icon_extent,
        });
    }

    pub fn register_span_arrow(&mut self, row: usize, space: [f64; 2]) {
        self.row_mut(row).arrow = Some(SpanSlot { space });
    }

    pub fn register_invisible_bar(&mut self, row: usize, space: [f64; 2]) {
        self.row_mut(row).invisible_bar = Some(SpanSlot { space });
    }

    /// Registers the list column content of a row and queues its width measurement.
    pub fn register_list_content(&mut self, row: usize, id: NodeId, width_px: f64) {
        self.row_mut(row).list_content = Some(id);
        self.row_measurer.enqueue_measure(id, width_px);
    }

    pub fn register_vertical_indicator(&mut self, key: impl Into<String>, timestamp: f64) {
        self.indicators.insert(key.into(), timestamp);
    }

    pub fn unregister_vertical_indicator(&mut self, key: &str) {
        if self.indicators.remove(key).is_some() {
            self.applied.remove(&ElementTarget::Indicator(key.to_owned()));
        }
    }

    /// Drops every element of an unmounted row.
    pub fn unregister_row(&mut self, row: usize) {
        if self.rows.remove(&row).is_none() {
            return;
        }
        for element in [
            SpanElement::Bar,
            SpanElement::Text,
            SpanElement::Arrow,
            SpanElement::InvisibleBar,
            SpanElement::ListContent,
        ] {
            self.applied.remove(&ElementTarget::Span { row, element });
        }
    }

    /// Icon width in milliseconds at the current zoom.
    pub fn icon_width_ms(&self) -> f64 {
        self.config.text_placement.icon_width_px * self.view.ms_per_px()
    }

    /// Writes styles for every registered element, skipping values the sink
    /// already received. Returns the number of mutations.
    pub fn draw(&mut self, sink: &mut dyn StyleSink) -> usize {
        let _span = tracing::trace_span!("draw", rows = self.rows.len()).entered();

        let mut mutations = 0;
        for (target, style) in self.collect_styles() {
            if self.applied.get(&target) == Some(&style) {
                continue;
            }
            sink.apply(&target, &style);
            self.applied.insert(target, style);
            mutations += 1;
        }
        self.scheduler.dispatch(&TraceViewEvent::Draw);
        mutations
    }

    fn collect_styles(&self) -> Vec<(ElementTarget, ElementStyle)> {
        let mut styles = Vec::with_capacity(self.rows.len() * 3 + self.indicators.len() + 6);

        styles.push((
            ElementTarget::ListColumn,
            ElementStyle::WidthPercent(self.columns.list),
        ));
        styles.push((
            ElementTarget::SpanColumn,
            ElementStyle::WidthPercent(self.columns.span_list),
        ));
        if let Some(container) = self.container {
            styles.push((
                ElementTarget::Divider,
                ElementStyle::TranslateX(container.width * self.columns.list),
            ));
            styles.push((
                ElementTarget::Container,
                ElementStyle::PointerEvents(self.pointer_events),
            ));
        }
        styles.push((
            ElementTarget::FakeScrollbar,
            ElementStyle::ScrollLeft(self.fake_scrollbar_scroll_left),
        ));
        styles.push((
            ElementTarget::FakeScrollbarContent,
            ElementStyle::WidthPx(self.row_measurer.max()),
        ));

        let view_start = self.view.to_origin + self.view.trace_view.x;
        let view_end = view_start + self.view.trace_view.width;

        for (&row, slots) in &self.rows {
            let target = |element| ElementTarget::Span { row, element };
            if let Some(bar) = slots.bar {
                styles.push((
                    target(SpanElement::Bar),
                    ElementStyle::Matrix(self.bar_matrix(bar.space)),
                ));
            }
            if let Some(bar) = slots.invisible_bar {
                styles.push((
                    target(SpanElement::InvisibleBar),
                    ElementStyle::Matrix(self.bar_matrix(bar.space)),
                ));
            }
            if let Some(text) = slots.text {
                let (placement, x) = compute_span_text_placement(
                    &self.view,
                    text.space,
                    text.width,
                    text.icon_extent,
                    &self.config.text_placement,
                );
                styles.push((target(SpanElement::Text), ElementStyle::Label { x, placement }));
            }
            if let Some(arrow) = slots.arrow {
                let style = if arrow.space[0] + arrow.space[1] < view_start {
                    ElementStyle::Arrow(ArrowDirection::Left)
                } else if arrow.space[0] > view_end {
                    ElementStyle::Arrow(ArrowDirection::Right)
                } else {
                    ElementStyle::Hidden
                };
                styles.push((target(SpanElement::Arrow), style));
            }
            if slots.list_content.is_some() {
                styles.push((
                    target(SpanElement::ListContent),
                    ElementStyle::TranslateX(-self.list_scroll_left),
                ));
            }
        }

        for (key, timestamp) in &self.indicators {
            let style = if *timestamp >= view_start && *timestamp <= view_end {
                ElementStyle::TranslateX(self.view.config_to_px(*timestamp))
            } else {
                ElementStyle::Hidden
            };
            styles.push((ElementTarget::Indicator(key.clone()), style));
        }

        styles
    }

    /// Horizontal part of the span-to-pixel matrix, relative to the span column.
    fn bar_matrix(&self, space: [f64; 2]) -> Mat3 {
        let m = self.view.get_span_to_px_for_space(space);
        Mat3::from_values(
            m.scale_x(),
            0.0,
            0.0,
            0.0,
            1.0,
            0.0,
            m.translate_x() - self.view.trace_physical_space.x,
            0.0,
            1.0,
        )
    }

    /// Ctrl/meta wheel zooms around the cursor, other horizontal deltas pan,
    /// vertical deltas scroll the list. Returns whether anything moved.
    pub fn on_wheel(&mut self, input: WheelInput, now_ms: f64) -> bool {
        if input.ctrl_key || input.meta_key {
            return self.on_wheel_zoom(input, now_ms);
        }

        let horizontal = if input.shift_key {
            if input.delta_y.abs() > input.delta_x.abs() {
                input.delta_y
            } else {
                input.delta_x
            }
        } else if input.delta_x.abs() > input.delta_y.abs() {
            input.delta_x
        } else {
            0.0
        };

        if horizontal != 0.0 {
            let physical_width = self.view.trace_physical_space.width;
            if physical_width <= 0.0 {
                return false;
            }
            self.zoom_animation = None;
            let delta = horizontal / physical_width * self.view.trace_view.width;
            let x = self.view.trace_view.x + delta;
            return self.apply_view(ViewUpdate::x(x), now_ms);
        }

        if input.delta_y != 0.0 {
            let before = self.list.scroll_top();
            let after = self.list.set_scroll_top(before + input.delta_y);
            if after != before {
                self.frame.request();
                return true;
            }
        }
        false
    }

    fn on_wheel_zoom(&mut self, input: WheelInput, now_ms: f64) -> bool {
        if self.container.is_none() || self.view.trace_physical_space.width <= 0.0 {
            return false;
        }
        if self.wheel_offset.is_none() {
            log::debug!("wheel zoom started");
            self.wheel_offset = Some(self.view.trace_physical_space.x);
            self.pointer_events = false;
            self.frame.request();
        }
        self.timers.wheel_end.schedule(now_ms, self.config.wheel_end_ms);
        self.zoom_animation = None;

        let offset = self.wheel_offset.unwrap_or(self.view.trace_physical_space.x);
        let scale = (1.0 - input.delta_y * self.config.wheel_zoom_factor).max(MIN_WHEEL_SCALE);
        let (center, _) = self.view.get_config_space_cursor(
            self.view.trace_physical_space.x + (input.client_x - offset),
            0.0,
        );

        let zoom = Mat3::from_translation(center, 0.0)
            * Mat3::from_scaling(1.0 / scale, 1.0)
            * Mat3::from_translation(-center, 0.0);
        let [x, _, width, _] = self.view.trace_view.transform(&zoom);

        let update = if width < self.view.max_zoom_precision() {
            ViewUpdate::width(width)
        } else {
            ViewUpdate::both(x, width)
        };
        self.apply_view(update, now_ms)
    }

    pub fn on_divider_mouse_down(&mut self, client_x: f64) {
        let Some(container) = self.container else {
            return;
        };
        if container.width <= 0.0 {
            return;
        }
        log::debug!("divider drag started at {client_x}");
        self.divider = Some(DividerDrag {
            start_x: client_x,
            start_list: self.columns.list,
        });
        self.divider_listeners_attached = true;
    }

    pub fn on_divider_mouse_move(&mut self, client_x: f64) -> bool {
        let (Some(drag), Some(container)) = (self.divider, self.container) else {
            return false;
        };
        let min = (self.config.min_column_px / container.width).min(0.5);
        let list = (drag.start_list + (client_x - drag.start_x) / container.width)
            .clamp(min, 1.0 - min);
        if list == self.columns.list {
            return false;
        }
        self.columns = Columns::new(list);
        self.scheduler.dispatch(&TraceViewEvent::DividerResize {
            list: self.columns.list,
            span_list: self.columns.span_list,
        });
        self.update_physical_space();
        true
    }

    pub fn on_divider_mouse_up(&mut self, client_x: f64) {
        if self.divider.is_none() {
            return;
        }
        self.on_divider_mouse_move(client_x);
        log::debug!(
            "divider drag ended at {:.3}/{:.3}",
            self.columns.list,
            self.columns.span_list
        );
        self.divider = None;
        self.divider_listeners_attached = false;
    }

    pub fn on_list_scroll(&mut self, scroll_left: f64, now_ms: f64) -> bool {
        self.on_horizontal_scroll(ScrollingSource::List, scroll_left, now_ms)
    }

    pub fn on_fake_scrollbar_scroll(&mut self, scroll_left: f64, now_ms: f64) -> bool {
        self.on_horizontal_scroll(ScrollingSource::FakeScrollbar, scroll_left, now_ms)
    }

    fn on_horizontal_scroll(
        &mut self,
        source: ScrollingSource,
        scroll_left: f64,
        now_ms: f64,
    ) -> bool {
        // The follower's echo of our own update must not drive the leader.
        if self.scrolling_source.is_some_and(|current| current != source) {
            return false;
        }
        self.scrolling_source = Some(source);
        self.timers
            .scroll_source_reset
            .schedule(now_ms, self.config.scroll_source_reset_ms);

        let scroll_left = scroll_left.max(0.0);
        let changed = scroll_left != self.list_scroll_left;
        self.list_scroll_left = scroll_left;
        self.fake_scrollbar_scroll_left = scroll_left;
        if changed {
            self.frame.request();
        }
        changed
    }

    fn max_scroll_left(&self) -> f64 {
        let list_width = self
            .container
            .map(|container| container.width * self.columns.list)
            .unwrap_or(0.0);
        (self.row_measurer.max() - list_width).max(0.0)
    }

    /// Animates the view to `[start, duration]` (absolute milliseconds).
    /// Spans narrower than the zoom precision are centered in a precision-wide view.
    pub fn on_zoom_into_space(&mut self, space: [f64; 2], now_ms: f64) {
        if self.view.trace_view.width == 0.0 {
            return;
        }
        let precision = self.view.max_zoom_precision();
        let trace_width = self.view.trace_space.width;
        let width = space[1].max(precision).min(trace_width.max(precision));
        let x = (space[0] - self.view.to_origin - (width - space[1]).max(0.0) / 2.0)
            .clamp(0.0, (trace_width - width).max(0.0));

        let from = (self.view.trace_view.x, self.view.trace_view.width);
        let distance = (from.0 - x).abs().max((from.1 - width).abs());
        if distance == 0.0 {
            self.zoom_animation = None;
            return;
        }
        let duration_ms = (self.config.zoom_animation_min_ms + 70.0 * distance.log10())
            .clamp(self.config.zoom_animation_min_ms, self.config.zoom_animation_max_ms);

        log::debug!("zooming to {x:.3},{width:.3} over {duration_ms:.0}ms");
        self.zoom_animation = Some(ZoomAnimation {
            started_at: now_ms,
            duration_ms,
            from,
            to: (x, width),
        });
        self.frame.request();
    }

    pub fn reset_zoom(&mut self, now_ms: f64) {
        self.on_zoom_into_space([self.view.to_origin, self.view.trace_space.width], now_ms);
    }

    /// Runs due timers, the zoom animation and pending measurements.
    /// Returns whether the host should draw.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        if self.timers.wheel_end.poll(now_ms) {
            log::debug!("wheel zoom ended");
            self.wheel_offset = None;
            self.pointer_events = true;
            self.frame.request();
        }

        if self.timers.scroll_source_reset.poll(now_ms) {
            self.scrolling_source = None;
            let max = self.max_scroll_left();
            if self.list_scroll_left > max {
                self.list_scroll_left = max;
                self.fake_scrollbar_scroll_left = max;
                self.frame.request();
            }
        }

        if let Some(animation) = self.zoom_animation {
            let ((x, width), done) = animation.sample(now_ms);
            if done {
                self.zoom_animation = None;
            }
            self.apply_view(ViewUpdate::both(x, width), now_ms);
            self.frame.request();
        }

        if self.timers.fov.poll(now_ms) {
            let fov = FieldOfView::new(self.view.trace_view.x, self.view.trace_view.width);
            if self.field_of_view != Some(fov) {
                self.field_of_view = Some(fov);
                self.pending_field_of_view = Some(fov);
                self.scheduler
                    .dispatch(&TraceViewEvent::FieldOfViewChanged(fov));
            }
        }

        if self.row_measurer.tick() {
            self.frame.request();
        }

        self.frame.take()
    }

    /// Applies a `fov=<x>,<width>` parameter from `query`, if present.
    /// Returns `Ok(true)` when the view was initialized from it.
    pub fn maybe_initialize_trace_view_from_qs(&mut self, query: &str) -> Result<bool, FovError> {
        let Some(value) = fov::read_query(query) else {
            return Ok(false);
        };
        let result = value
            .parse::<FieldOfView>()
            .and_then(|fov| fov.validate(self.view.trace_space.width).map(|()| fov));
        let fov = match result {
            Ok(fov) => fov,
            Err(err) => {
                log::warn!("ignoring field of view {value:?}: {err}");
                return Err(err);
            }
        };
        self.zoom_animation = None;
        if self.view.set_trace_view(ViewUpdate::both(fov.x, fov.width)) {
            self.dispatch_view();
            self.frame.request();
        }
        self.field_of_view = Some(fov);
        Ok(true)
    }

    pub fn set_list_scroll_top(&mut self, scroll_top: f64) -> f64 {
        let before = self.list.scroll_top();
        let after = self.list.set_scroll_top(scroll_top);
        if after != before {
            self.frame.request();
        }
        after
    }

    pub fn scroll_to_row(&mut self, index: usize, anchor: ScrollAnchor) -> f64 {
        let before = self.list.scroll_top();
        let after = self.list.scroll_to_row(index, anchor);
        if after != before {
            self.frame.request();
        }
        after
    }

    /// Rows to mount at the current scroll offset.
    pub fn visible_rows(&mut self, items: &[TraceNode]) -> Vec<VirtualizedRow<NodeId, ()>> {
        self.list.rows(items, |_, _| ())
    }

    /// Drops cached row renders after the row list changed.
    pub fn invalidate_rows(&mut self) {
        self.list.clear_cache();
        self.frame.request();
    }

    fn apply_view(&mut self, update: ViewUpdate, now_ms: f64) -> bool {
        if !self.view.set_trace_view(update) {
            return false;
        }
        self.dispatch_view();
        self.timers.fov.schedule(now_ms, self.config.fov_debounce_ms);
        self.frame.request();
        true
    }

    fn dispatch_view(&mut self) {
        self.scheduler.dispatch(&TraceViewEvent::SetTraceView {
            x: self.view.trace_view.x,
            width: self.view.trace_view.width,
        });
    }

    fn update_physical_space(&mut self) {
        let Some(container) = self.container else {
            return;
        };
        let list_width = container.width * self.columns.list;
        let container = [container.x, container.y, container.width, container.height];
        let span_column = [
            container[0] + list_width,
            container[1],
            container[2] - list_width,
            container[3],
        ];
        self.view.set_trace_physical_space(container, span_column);
        self.scheduler.dispatch(&TraceViewEvent::SetTracePhysicalSpace {
            container,
            span_column,
        });
        self.frame.request();
    }

    fn row_mut(&mut self, row: usize) -> &mut RowSlots {
        self.rows.entry(row).or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// 0..1000 ms in a 1500 px container, list column 500 px, span column 1000 px.
    fn manager() -> VirtualizedViewManager {
        let config = ViewManagerConfig::default().initial_list_fraction(1.0 / 3.0);
        let mut manager = VirtualizedViewManager::new(config);
        manager.set_trace_space([0.0, 1000.0]);
        manager.register_container([0.0, 0.0, 1500.0, 600.0]);
        manager
    }

    fn zoom(delta_y: f64, client_x: f64) -> WheelInput {
        WheelInput {
            delta_y,
            client_x,
            ctrl_key: true,
            ..Default::default()
        }
    }

    #[test]
    fn container_splits_into_columns() {
        let manager = manager();
        assert!((manager.view().trace_physical_space.x - 500.0).abs() < 1e-9);
        assert!((manager.view().trace_physical_space.width - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn wheel_zoom_centers_on_cursor() {
        let mut manager = manager();
        assert!(manager.on_wheel(zoom(-100.0, 1000.0), 0.0));
        let view = manager.view().trace_view;
        assert!((view.width - 500.0).abs() < 1e-9);
        assert!((view.x - 250.0).abs() < 1e-9);
        assert!(!manager.is_pointer_events_enabled());

        manager.tick(100.0);
        manager.on_wheel(zoom(-10.0, 1000.0), 200.0);
        // Still in the gesture: the end debounce restarted at 200.
        manager.tick(450.0);
        assert!(!manager.is_pointer_events_enabled());
        manager.tick(500.0);
        assert!(manager.is_pointer_events_enabled());
    }

    #[test]
    fn wheel_zoom_stops_at_precision_without_sliding() {
        let mut manager = manager();
        for step in 0..200 {
            manager.on_wheel(zoom(-100.0, 1300.0), step as f64);
            assert!(manager.view().trace_view.width >= 1.0);
        }
        let x = manager.view().trace_view.x;
        manager.on_wheel(zoom(-100.0, 600.0), 300.0);
        assert_eq!(manager.view().trace_view.width, 1.0);
        assert_eq!(manager.view().trace_view.x, x);
    }

    #[test]
    fn huge_positive_delta_zooms_out_to_full_trace() {
        let mut manager = manager();
        manager.on_wheel(zoom(-300.0, 1000.0), 0.0);
        manager.on_wheel(zoom(10_000.0, 1000.0), 1.0);
        assert_eq!(manager.view().trace_view.x, 0.0);
        assert_eq!(manager.view().trace_view.width, 1000.0);
    }

    #[test]
    fn wheel_pans_and_scrolls() {
        let mut manager = manager();
        manager.on_wheel(zoom(-100.0, 500.0), 0.0);
        assert!(manager.view().trace_view.x.abs() < 1e-9);

        // 100 px over a 1000 px column showing 500 ms.
        manager.on_wheel(WheelInput { delta_x: 100.0, ..Default::default() }, 1.0);
        assert!((manager.view().trace_view.x - 50.0).abs() < 1e-9);

        manager.on_wheel(
            WheelInput {
                delta_y: 100.0,
                shift_key: true,
                ..Default::default()
            },
            2.0,
        );
        assert!((manager.view().trace_view.x - 100.0).abs() < 1e-9);

        let items: Vec<TraceNode> = (0..100)
            .map(|i| TraceNode {
                id: NodeId(i),
                depth: 0,
                space: [0.0, 1.0],
                op: String::new(),
                description: String::new(),
                errors: Vec::new(),
                performance_issues: Vec::new(),
                has_children: false,
                expanded: true,
            })
            .collect();
        manager.visible_rows(&items);
        assert!(manager.on_wheel(WheelInput { delta_y: 48.0, ..Default::default() }, 3.0));
        assert_eq!(manager.list().scroll_top(), 48.0);
        assert!((manager.view().trace_view.x - 100.0).abs() < 1e-9);
    }

    #[test]
    fn divider_respects_minimum_column_width() {
        let mut manager = manager();
        manager.on_divider_mouse_down(500.0);
        assert!(manager.is_divider_listening());
        manager.on_divider_mouse_move(-1000.0);
        assert!((manager.columns().list * 1500.0 - 100.0).abs() < 1e-9);
        manager.on_divider_mouse_move(5000.0);
        assert!((manager.columns().span_list * 1500.0 - 100.0).abs() < 1e-9);
        manager.on_divider_mouse_up(800.0);
        assert!(!manager.is_divider_listening());
        assert!((manager.columns().list * 1500.0 - 800.0).abs() < 1e-9);
        assert!((manager.view().trace_physical_space.width - 700.0).abs() < 1e-9);

        // No drag in progress.
        assert!(!manager.on_divider_mouse_move(100.0));
    }

    #[test]
    fn scrolling_source_blocks_echo_until_reset() {
        let mut manager = manager();
        assert!(manager.on_list_scroll(40.0, 0.0));
        assert_eq!(manager.fake_scrollbar_scroll_left(), 40.0);
        assert_eq!(manager.scrolling_source(), Some(ScrollingSource::List));

        assert!(!manager.on_fake_scrollbar_scroll(10.0, 50.0));
        assert_eq!(manager.list_scroll_left(), 40.0);

        manager.tick(99.0);
        assert_eq!(manager.scrolling_source(), Some(ScrollingSource::List));
        manager.tick(100.0);
        assert_eq!(manager.scrolling_source(), None);
        // Nothing measured wider than the column, so the scroll is pulled back.
        assert_eq!(manager.list_scroll_left(), 0.0);

        assert!(manager.on_fake_scrollbar_scroll(10.0, 200.0));
        assert_eq!(manager.list_scroll_left(), 10.0);
    }

    #[test]
    fn zoom_animation_is_replaced_by_a_new_one() {
        let mut manager = manager();
        manager.on_zoom_into_space([100.0, 10.0], 0.0);
        manager.tick(50.0);
        assert!(manager.is_animating());
        manager.on_zoom_into_space([600.0, 100.0], 60.0);
        for t in 0..100 {
            manager.tick(60.0 + t as f64 * 16.0);
        }
        assert!(!manager.is_animating());
        assert_eq!(manager.view().trace_view.x, 600.0);
        assert_eq!(manager.view().trace_view.width, 100.0);
    }

    #[test]
    fn narrow_spans_are_centered_at_precision() {
        let mut manager = manager();
        manager.on_zoom_into_space([500.0, 0.2], 0.0);
        manager.tick(1_000.0);
        assert!((manager.view().trace_view.x - 499.6).abs() < 1e-9);
        assert_eq!(manager.view().trace_view.width, 1.0);
    }

    #[test]
    fn field_of_view_is_published_after_debounce() {
        let published = Arc::new(Mutex::new(Vec::new()));
        let mut manager = manager();
        manager.on(TraceViewEventKind::FieldOfViewChanged, Priority::Normal, {
            let published = published.clone();
            move |event| {
                if let TraceViewEvent::FieldOfViewChanged(fov) = event {
                    published.lock().push(*fov);
                }
            }
        });

        manager.on_wheel(zoom(-100.0, 1000.0), 0.0);
        manager.on_wheel(zoom(-100.0, 1000.0), 300.0);
        manager.tick(600.0);
        assert!(published.lock().is_empty());
        manager.tick(800.0);
        let fov = manager.field_of_view().unwrap();
        assert_eq!(*published.lock(), vec![fov]);
        assert_eq!(manager.take_field_of_view_change(), Some(fov));
        assert_eq!(manager.take_field_of_view_change(), None);
    }

    #[test]
    fn query_string_initializes_view() {
        let mut manager = manager();
        assert_eq!(manager.maybe_initialize_trace_view_from_qs("tab=spans"), Ok(false));
        assert_eq!(manager.maybe_initialize_trace_view_from_qs("?fov=100,200"), Ok(true));
        assert_eq!(manager.view().trace_view.x, 100.0);
        assert_eq!(manager.view().trace_view.width, 200.0);

        assert!(manager.maybe_initialize_trace_view_from_qs("fov=900,200").is_err());
        assert!(manager.maybe_initialize_trace_view_from_qs("fov=abc").is_err());
        assert_eq!(manager.view().trace_view.x, 100.0);

        assert_eq!(manager.maybe_initialize_trace_view_from_qs("fov=300%2C150"), Ok(true));
        assert_eq!(manager.view().trace_view.x, 300.0);
        assert_eq!(manager.view().trace_view.width, 150.0);
    }

    #[test]
    fn draw_styles_registered_elements() {
        let mut manager = manager();
        manager.register_span_bar(0, [100.0, 50.0]);
        manager.register_span_arrow(1, [100.0, 50.0]);
        manager.register_vertical_indicator("cursor", 250.0);

        let mut sink: HashMap<ElementTarget, ElementStyle> = HashMap::new();
        manager.draw(&mut sink);

        let bar = ElementTarget::Span { row: 0, element: SpanElement::Bar };
        let ElementStyle::Matrix(m) = &sink[&bar] else {
            panic!("bar is not a matrix");
        };
        assert!((m.scale_x() - 50.0).abs() < 1e-9);
        assert!((m.translate_x() - 100.0).abs() < 1e-9);
        assert_eq!(sink[&bar].css(), "transform: matrix(50,0,0,1,100,0)");

        let arrow = ElementTarget::Span { row: 1, element: SpanElement::Arrow };
        assert_eq!(sink[&arrow], ElementStyle::Hidden);
        manager.on_zoom_into_space([500.0, 100.0], 0.0);
        manager.tick(1_000.0);
        manager.draw(&mut sink);
        assert_eq!(sink[&arrow], ElementStyle::Arrow(ArrowDirection::Left));
        assert_eq!(sink[&ElementTarget::Indicator("cursor".into())], ElementStyle::Hidden);
    }

    #[test]
    fn unregistered_rows_are_restyled_when_mounted_again() {
        let mut manager = manager();
        manager.register_span_bar(3, [0.0, 10.0]);
        let mut sink: Vec<(ElementTarget, ElementStyle)> = Vec::new();
        manager.draw(&mut sink);
        manager.unregister_row(3);
        manager.unregister_row(42);

        sink.clear();
        assert_eq!(manager.draw(&mut sink), 0);
        manager.register_span_bar(3, [0.0, 10.0]);
        assert_eq!(manager.draw(&mut sink), 1);
    }

    #[test]
    fn wheel_zoom_without_container_is_ignored() {
        let mut manager = VirtualizedViewManager::new(ViewManagerConfig::default());
        manager.set_trace_space([0.0, 1000.0]);
        assert!(!manager.on_wheel(zoom(-100.0, 800.0), 0.0));
        assert_eq!(manager.view().trace_view.x, 0.0);
        assert_eq!(manager.view().trace_view.width, 1000.0);
        assert!(manager.is_pointer_events_enabled());
        assert_eq!(manager.next_deadline_ms(), None);
    }

    #[test]
    fn only_mounted_rows_hold_slots() {
        let mut manager = manager();
        manager.register_span_bar(50_000, [0.0, 10.0]);
        manager.register_span_text(50_001, [0.0, 10.0], "10ms", (0.0, 10.0));
        assert_eq!(manager.rows.len(), 2);

        let mut sink: Vec<(ElementTarget, ElementStyle)> = Vec::new();
        manager.draw(&mut sink);
        let rows: Vec<usize> = sink
            .iter()
            .filter_map(|(target, _)| match target {
                ElementTarget::Span { row, .. } => Some(*row),
                _ => None,
            })
            .collect();
        assert_eq!(rows, vec![50_000, 50_001]);

        manager.unregister_row(50_000);
        manager.unregister_row(50_001);
        assert!(manager.rows.is_empty());
    }

    #[test]
    fn scroll_reset_clamps_to_widest_measured_row() {
        let mut manager = manager();
        // List column is 500 px wide.
        manager.register_list_content(0, NodeId(1), 800.0);
        manager.tick(0.0);
        assert_eq!(manager.row_measurer_mut().max(), 800.0);

        assert!(manager.on_list_scroll(450.0, 10.0));
        manager.tick(60.0);
        assert_eq!(manager.list_scroll_left(), 450.0);
        manager.tick(110.0);
        assert_eq!(manager.scrolling_source(), None);
        assert_eq!(manager.list_scroll_left(), 300.0);
        assert_eq!(manager.fake_scrollbar_scroll_left(), 300.0);

        let mut sink: HashMap<ElementTarget, ElementStyle> = HashMap::new();
        manager.draw(&mut sink);
        assert_eq!(sink[&ElementTarget::FakeScrollbarContent], ElementStyle::WidthPx(800.0));
        assert_eq!(sink[&ElementTarget::FakeScrollbar], ElementStyle::ScrollLeft(300.0));
        let content = ElementTarget::Span {
            row: 0,
            element: SpanElement::ListContent,
        };
        assert_eq!(sink[&content], ElementStyle::TranslateX(-300.0));

        // Within bounds: left alone.
        assert!(manager.on_fake_scrollbar_scroll(120.0, 200.0));
        manager.tick(300.0);
        assert_eq!(manager.list_scroll_left(), 120.0);
    }

    #[test]
    fn css_strings() {
        assert_eq!(ElementStyle::WidthPercent(0.25).css(), "width: 25%");
        assert_eq!(ElementStyle::TranslateX(-4.0).css(), "transform: translateX(-4px)");
        assert_eq!(ElementStyle::PointerEvents(false).css(), "pointer-events: none");
        assert_eq!(ElementStyle::Hidden.css(), "display: none");
    }
}
