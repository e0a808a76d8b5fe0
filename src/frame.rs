//! Frame and timeout bookkeeping for a cooperative, host-driven tick loop.
//!
//! Nothing here runs on its own: the host calls into its owner once per
//! rendered frame with the current time and the owner polls these handles.

/// At most one pending flush per frame, however many callers asked for it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameRequest {
    pending: bool,
}

impl FrameRequest {
    /// Returns `true` when this call scheduled the flush.
    pub fn request(&mut self) -> bool {
        !std::mem::replace(&mut self.pending, true)
    }

    /// Consumes the pending flush, if any.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }

    pub fn cancel(&mut self) {
        self.pending = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

/// A cancellable deadline. Rescheduling replaces the previous deadline, so a
/// burst of events keeps pushing the firing time out.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Debounce {
    deadline_ms: Option<f64>,
}

impl Debounce {
    pub fn schedule(&mut self, now_ms: f64, delay_ms: f64) {
        self.deadline_ms = Some(now_ms + delay_ms);
    }

    pub fn cancel(&mut self) {
        self.deadline_ms = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline_ms.is_some()
    }

    pub fn deadline_ms(&self) -> Option<f64> {
        self.deadline_ms
    }

    /// Fires once when `now_ms` has reached the deadline.
    pub fn poll(&mut self, now_ms: f64) -> bool {
        match self.deadline_ms {
            Some(deadline) if now_ms >= deadline => {
                self.deadline_ms = None;
                true
            }
            _ => false,
        }
    }
}

/// `sin(t * π/2)` for `t` clamped to `[0, 1]`.
pub fn ease_out_sine(t: f64) -> f64 {
    (t.clamp(0.0, 1.0) * std::f64::consts::FRAC_PI_2).sin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_request_coalesces() {
        let mut frame = FrameRequest::default();
        assert!(frame.request());
        assert!(!frame.request());
        assert!(!frame.request());
        assert!(frame.take());
        assert!(!frame.take());
    }

    #[test]
    fn debounce_resets_on_reschedule() {
        let mut timer = Debounce::default();
        timer.schedule(0.0, 100.0);
        timer.schedule(80.0, 100.0);
        assert!(!timer.poll(120.0));
        assert!(timer.poll(180.0));
        assert!(!timer.poll(500.0));
    }

    #[test]
    fn cancelled_debounce_never_fires() {
        let mut timer = Debounce::default();
        timer.schedule(0.0, 10.0);
        timer.cancel();
        assert!(!timer.poll(1_000.0));
    }

    #[test]
    fn easing_endpoints() {
        assert_eq!(ease_out_sine(0.0), 0.0);
        assert!((ease_out_sine(1.0) - 1.0).abs() < 1e-12);
        assert!((ease_out_sine(4.0) - 1.0).abs() < 1e-12);
        assert!(ease_out_sine(0.5) > 0.5);
    }
}
