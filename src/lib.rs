//! Virtualized trace waterfall: coordinate spaces, row windowing, measurement
//! caches and the gesture/style orchestrator behind a zoomable span timeline.
//!
//! The core types are host agnostic. [`VirtualizedViewManager`] takes input
//! events and a clock and writes [`ElementStyle`]s into a [`StyleSink`]; the
//! [`widgets::Waterfall`] egui widget is one such host.

pub mod config;
pub mod dom_view;
pub mod events;
pub mod fov;
pub mod frame;
pub mod mat3;
pub mod measure;
pub mod placement;
pub mod scheduler;
pub mod text;
pub mod themes;
pub mod timeline;
pub mod trace_view;
pub mod tree;
pub mod view_manager;
pub mod virtual_list;
pub mod widgets;

pub use config::{TextPlacementConfig, ViewManagerConfig};
pub use dom_view::DomView;
pub use fov::{FieldOfView, FovError};
pub use mat3::Mat3;
pub use measure::{MeasureEvent, MeasureEventKind, MeasureTarget, RowWidthMeasurer};
pub use placement::{compute_span_text_placement, TextPlacement};
pub use scheduler::{Priority, TraceScheduler, TraceViewEvent, TraceViewEventKind};
pub use text::{format_duration, GlyphMetrics, TraceTextMeasurer};
pub use trace_view::{TraceView, ViewUpdate};
#[cfg(feature = "serde")]
pub use tree::TraceLoadError;
pub use tree::{NodeId, SpanRecord, TraceNode, TraceTree};
pub use view_manager::{
    ElementStyle, ElementTarget, StyleSink, VirtualizedViewManager, WheelInput,
};
pub use virtual_list::{compute_window, ScrollAnchor, VirtualItem, VirtualizedList, WindowParams};
