//! Duration label formatting and width estimation.
//!
//! Duration labels are drawn for every visible span on every frame, so
//! their width is estimated from per-glyph-class widths measured once up
//! front instead of shaping each string.

use std::collections::HashMap;

/// Average advance of an 11px UI font, used when no font metrics are available.
pub const FALLBACK_PX_PER_CHAR: f64 = 6.5;

const DURATION_UNITS: [&str; 6] = ["ns", "ms", "s", "m", "h", "d"];

/// Source of real text widths, e.g. a font atlas or a canvas context.
pub trait GlyphMetrics {
    fn measure_text(&self, text: &str) -> f64;
}

#[derive(Clone, Debug)]
pub struct TraceTextMeasurer {
    number: f64,
    dot: f64,
    duration: HashMap<&'static str, f64>,
    cache: HashMap<String, f64>,
    fallback: bool,
}

impl Default for TraceTextMeasurer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl TraceTextMeasurer {
    pub fn new(metrics: Option<&dyn GlyphMetrics>) -> Self {
        let Some(metrics) = metrics else {
            return Self {
                number: FALLBACK_PX_PER_CHAR,
                dot: FALLBACK_PX_PER_CHAR,
                duration: HashMap::new(),
                cache: HashMap::new(),
                fallback: true,
            };
        };

        let number = ('0'..='9')
            .map(|digit| metrics.measure_text(digit.encode_utf8(&mut [0; 4])))
            .fold(0.0, f64::max);
        let dot = 0.5 * metrics.measure_text(".");
        let duration = DURATION_UNITS
            .iter()
            .map(|unit| (*unit, metrics.measure_text(unit)))
            .collect();

        Self {
            number,
            dot,
            duration,
            cache: HashMap::new(),
            fallback: false,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Estimated width of `text` in pixels, cached per string.
    pub fn measure(&mut self, text: &str) -> f64 {
        if let Some(width) = self.cache.get(text) {
            return *width;
        }
        let width = self.compute_string_length(text);
        self.cache.insert(text.to_owned(), width);
        width
    }

    pub fn compute_string_length(&self, text: &str) -> f64 {
        if self.fallback {
            return text.chars().count() as f64 * FALLBACK_PX_PER_CHAR;
        }

        let mut width = 0.0;
        for (i, c) in text.char_indices() {
            match c {
                '.' => width += self.dot,
                '0'..='9' => width += self.number,
                _ => {
                    if let Some(unit) = self.duration.get(&text[i..]) {
                        return width + unit;
                    }
                    width += self.number;
                }
            }
        }
        width
    }
}

/// Formats a duration in milliseconds with a unit picked by magnitude.
pub fn format_duration(ms: f64) -> String {
    const SECOND: f64 = 1_000.0;
    const MINUTE: f64 = 60.0 * SECOND;
    const HOUR: f64 = 60.0 * MINUTE;
    const DAY: f64 = 24.0 * HOUR;

    let abs = ms.abs();
    if abs > 0.0 && abs < 0.001 {
        format!("{:.2}ns", ms * 1_000_000.0)
    } else if abs < SECOND {
        format!("{ms:.2}ms")
    } else if abs < MINUTE {
        format!("{:.2}s", ms / SECOND)
    } else if abs < HOUR {
        format!("{:.2}m", ms / MINUTE)
    } else if abs < DAY {
        format!("{:.2}h", ms / HOUR)
    } else {
        format!("{:.2}d", ms / DAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Monospace font: every glyph is 7px, except `.` at 4px.
    struct Mono;

    impl GlyphMetrics for Mono {
        fn measure_text(&self, text: &str) -> f64 {
            text.chars().map(|c| if c == '.' { 4.0 } else { 7.0 }).sum()
        }
    }

    #[test]
    fn estimates_from_glyph_classes() {
        let mut measurer = TraceTextMeasurer::new(Some(&Mono));
        // 4 digits, one half-dot, `ms` suffix
        assert_eq!(measurer.measure("12.50ms"), 4.0 * 7.0 + 2.0 + 14.0);
        assert_eq!(measurer.measure("3.00s"), 3.0 * 7.0 + 2.0 + 7.0);
    }

    #[test]
    fn falls_back_without_metrics() {
        let mut measurer = TraceTextMeasurer::new(None);
        assert!(measurer.is_fallback());
        assert_eq!(measurer.measure("1.00ms"), 6.0 * FALLBACK_PX_PER_CHAR);
    }

    #[test]
    fn formats_by_magnitude() {
        assert_eq!(format_duration(0.0), "0.00ms");
        assert_eq!(format_duration(0.0005), "500.00ns");
        assert_eq!(format_duration(12.5), "12.50ms");
        assert_eq!(format_duration(1_500.0), "1.50s");
        assert_eq!(format_duration(90_000.0), "1.50m");
        assert_eq!(format_duration(5_400_000.0), "1.50h");
        assert_eq!(format_duration(172_800_000.0), "2.00d");
    }
}
