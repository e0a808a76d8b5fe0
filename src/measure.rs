//! Batched, cached row width measurement.
//!
//! Reading layout is expensive, so measurements requested during a frame
//! are queued and read together in one [`RowWidthMeasurer::drain`] at the
//! next frame boundary.

use std::collections::HashMap;
use std::hash::Hash;

use crate::events::{Emitter, Event, ListenerId};
use crate::frame::FrameRequest;

/// Something whose rendered width can be read.
pub trait MeasureTarget {
    fn measure_width(&self) -> f64;
}

impl MeasureTarget for f64 {
    fn measure_width(&self) -> f64 {
        *self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MeasureEvent {
    /// A new widest row was measured.
    Max(f64),
    /// A batched drain finished.
    RowMeasureEnd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MeasureEventKind {
    Max,
    RowMeasureEnd,
}

impl Event for MeasureEvent {
    type Kind = MeasureEventKind;

    fn kind(&self) -> MeasureEventKind {
        match self {
            MeasureEvent::Max(_) => MeasureEventKind::Max,
            MeasureEvent::RowMeasureEnd => MeasureEventKind::RowMeasureEnd,
        }
    }
}

/// Widths keyed by row identity. Entries are never invalidated one by one;
/// call [`RowWidthMeasurer::reset`] when the layout changes as a whole.
pub struct RowWidthMeasurer<K, E = f64> {
    cache: HashMap<K, f64>,
    queue: Vec<(K, E)>,
    frame: FrameRequest,
    max: f64,
    emitter: Emitter<MeasureEvent>,
}

impl<K, E> Default for RowWidthMeasurer<K, E> {
    fn default() -> Self {
        Self {
            cache: HashMap::new(),
            queue: Vec::new(),
            frame: FrameRequest::default(),
            max: 0.0,
            emitter: Emitter::default(),
        }
    }
}

impl<K: std::fmt::Debug, E> std::fmt::Debug for RowWidthMeasurer<K, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowWidthMeasurer")
            .field("cached", &self.cache.len())
            .field("queued", &self.queue.len())
            .field("max", &self.max)
            .finish()
    }
}

impl<K, E> RowWidthMeasurer<K, E>
where
    K: Clone + Eq + Hash,
    E: MeasureTarget,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(
        &mut self,
        kind: MeasureEventKind,
        listener: impl FnMut(&MeasureEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.emitter.on(kind, listener)
    }

    pub fn once(
        &mut self,
        kind: MeasureEventKind,
        listener: impl FnMut(&MeasureEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.emitter.once(kind, listener)
    }

    pub fn off(&mut self, kind: MeasureEventKind, id: ListenerId) -> bool {
        self.emitter.off(kind, id)
    }

    /// Queues a deferred measurement. Cached keys are skipped.
    pub fn enqueue_measure(&mut self, key: K, element: E) {
        if self.cache.contains_key(&key) {
            return;
        }
        self.queue.push((key, element));
        self.frame.request();
    }

    /// Measures right away unless the width is already cached.
    pub fn measure(&mut self, key: K, element: &E) -> f64 {
        if let Some(width) = self.cache.get(&key) {
            return *width;
        }
        let width = element.measure_width();
        self.record(key, width);
        width
    }

    /// Cached width; `None` means "not measured yet".
    pub fn get(&self, key: &K) -> Option<f64> {
        self.cache.get(key).copied()
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_drain_scheduled(&self) -> bool {
        self.frame.is_pending()
    }

    /// Frame boundary hook: drains only if something was queued since the last drain.
    /// Returns whether a drain ran.
    pub fn tick(&mut self) -> bool {
        if !self.frame.take() {
            return false;
        }
        self.drain();
        true
    }

    pub fn drain(&mut self) {
        self.frame.cancel();
        let queue = std::mem::take(&mut self.queue);
        for (key, element) in queue {
            if self.cache.contains_key(&key) {
                continue;
            }
            let width = element.measure_width();
            self.record(key, width);
        }
        self.emitter.dispatch(&MeasureEvent::RowMeasureEnd);
    }

    pub fn reset(&mut self) {
        self.cache.clear();
        self.queue.clear();
        self.frame.cancel();
        self.max = 0.0;
    }

    fn record(&mut self, key: K, width: f64) {
        self.cache.insert(key, width);
        if width > self.max {
            self.max = width;
            self.emitter.dispatch(&MeasureEvent::Max(width));
        }
    }
}
