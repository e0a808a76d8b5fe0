mod waterfall;

pub use waterfall::{EguiGlyphMetrics, Waterfall, WaterfallState};
