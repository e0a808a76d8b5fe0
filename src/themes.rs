//! Span colors and waterfall visuals.

use egui::{Color32, Rgba, Stroke, Visuals};

/// Categorical span fills, chosen to stay distinct on light and dark panels.
pub const SPAN_PALETTE: &[Color32] = &[
    Color32::from_rgb(0x3f, 0x88, 0xc5), // blue
    Color32::from_rgb(0xe5, 0x8c, 0x2c), // orange
    Color32::from_rgb(0x5a, 0xa8, 0x5c), // green
    Color32::from_rgb(0xb4, 0x4a, 0xc9), // violet
    Color32::from_rgb(0xd4, 0x4c, 0x58), // red
    Color32::from_rgb(0x2f, 0xa8, 0xa0), // teal
    Color32::from_rgb(0xc9, 0xa2, 0x27), // ochre
    Color32::from_rgb(0x6c, 0x70, 0xd8), // indigo
    Color32::from_rgb(0x9c, 0x6b, 0x4e), // umber
    Color32::from_rgb(0xd0, 0x6a, 0xa6), // pink
];

pub const ERROR_COLOR: Color32 = Color32::from_rgb(0xe0, 0x3e, 0x3e);
pub const PERFORMANCE_ISSUE_COLOR: Color32 = Color32::from_rgb(0x3f, 0x6d, 0xe0);

/// Spans with the same op share a color.
pub fn span_color(op: &str) -> Color32 {
    // FNV-1a; stable across runs and platforms.
    let hash = op.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    });
    SPAN_PALETTE[(hash % SPAN_PALETTE.len() as u64) as usize]
}

/// Black or white, whichever reads better on `background`.
pub fn text_color_on(background: Color32) -> Color32 {
    if Rgba::from(background).intensity() > 0.3 {
        Color32::BLACK
    } else {
        Color32::WHITE
    }
}

/// `t` of the way from `a` to `b`, in gamma space.
pub fn mix(a: Color32, b: Color32, t: f32) -> Color32 {
    a.lerp_to_gamma(b, t)
}

/// Flat visuals for the viewer: square corners, no window shadow, accent
/// selection outline.
pub fn waterfall_visuals(dark: bool) -> Visuals {
    let mut visuals = if dark { Visuals::dark() } else { Visuals::light() };
    let foreground = visuals.text_color();
    let background = visuals.panel_fill;
    let accent = SPAN_PALETTE[1];

    visuals.faint_bg_color = mix(background, foreground, 0.04);
    visuals.selection.stroke = Stroke::new(1.5, accent);
    visuals.selection.bg_fill = mix(background, accent, 0.25);
    visuals.window_stroke = Stroke::new(1.0, mix(foreground, background, 0.6));
    visuals.window_shadow = egui::epaint::Shadow::NONE;
    visuals.menu_corner_radius = 0.0.into();
    visuals
}
