//! Cross-cutting view-state notifications for independently rendered parts
//! of a waterfall (rows, timeline, overlays).

use crate::events::{Emitter, Event, ListenerId};
use crate::fov::FieldOfView;

#[derive(Clone, Debug, PartialEq)]
pub enum TraceViewEvent {
    SetTraceSpace {
        space: [f64; 4],
    },
    SetTracePhysicalSpace {
        container: [f64; 4],
        span_column: [f64; 4],
    },
    /// The trace view after clamping.
    SetTraceView {
        x: f64,
        width: f64,
    },
    DividerResize {
        list: f64,
        span_list: f64,
    },
    FieldOfViewChanged(FieldOfView),
    Draw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TraceViewEventKind {
    SetTraceSpace,
    SetTracePhysicalSpace,
    SetTraceView,
    DividerResize,
    FieldOfViewChanged,
    Draw,
}

impl Event for TraceViewEvent {
    type Kind = TraceViewEventKind;

    fn kind(&self) -> TraceViewEventKind {
        match self {
            TraceViewEvent::SetTraceSpace { .. } => TraceViewEventKind::SetTraceSpace,
            TraceViewEvent::SetTracePhysicalSpace { .. } => {
                TraceViewEventKind::SetTracePhysicalSpace
            }
            TraceViewEvent::SetTraceView { .. } => TraceViewEventKind::SetTraceView,
            TraceViewEvent::DividerResize { .. } => TraceViewEventKind::DividerResize,
            TraceViewEvent::FieldOfViewChanged(_) => TraceViewEventKind::FieldOfViewChanged,
            TraceViewEvent::Draw => TraceViewEventKind::Draw,
        }
    }
}

/// `High` listeners run before any `Normal` listener of the same event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    Normal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SchedulerListener {
    priority: Priority,
    id: ListenerId,
}

#[derive(Debug, Default)]
pub struct TraceScheduler {
    high: Emitter<TraceViewEvent>,
    normal: Emitter<TraceViewEvent>,
}

impl TraceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        &mut self,
        kind: TraceViewEventKind,
        priority: Priority,
        listener: impl FnMut(&TraceViewEvent) + Send + Sync + 'static,
    ) -> SchedulerListener {
        let id = self.tier(priority).on(kind, listener);
        SchedulerListener { priority, id }
    }

    pub fn once(
        &mut self,
        kind: TraceViewEventKind,
        priority: Priority,
        listener: impl FnMut(&TraceViewEvent) + Send + Sync + 'static,
    ) -> SchedulerListener {
        let id = self.tier(priority).once(kind, listener);
        SchedulerListener { priority, id }
    }

    pub fn off(&mut self, kind: TraceViewEventKind, listener: SchedulerListener) -> bool {
        self.tier(listener.priority).off(kind, listener.id)
    }

    pub fn dispatch(&mut self, event: &TraceViewEvent) {
        self.high.dispatch(event);
        self.normal.dispatch(event);
    }

    pub fn listener_count(&self, kind: TraceViewEventKind) -> usize {
        self.high.listener_count(kind) + self.normal.listener_count(kind)
    }

    fn tier(&mut self, priority: Priority) -> &mut Emitter<TraceViewEvent> {
        match priority {
            Priority::High => &mut self.high,
            Priority::Normal => &mut self.normal,
        }
    }
}
