use crate::mat3::Mat3;

/// Axis-aligned rectangle describing one coordinate space.
///
/// Trace space, the trace view and the physical (pixel) spaces are each a
/// `DomView`. Matrices between two spaces come from [`DomView::between`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DomView {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl DomView {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn from_array(space: [f64; 4]) -> Self {
        Self::new(space[0], space[1], space[2], space[3])
    }

    pub fn center(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Matrix mapping coordinates of `self` onto `to`.
    ///
    /// An axis with zero or non-finite extent in `self` maps through
    /// unchanged (scale 1, no translation) instead of producing `inf`/`NaN`.
    pub fn between(&self, to: &DomView) -> Mat3 {
        let (sx, tx) = axis_between(self.x, self.width, to.x, to.width);
        let (sy, ty) = axis_between(self.y, self.height, to.y, to.height);
        Mat3::from_values(sx, 0.0, 0.0, 0.0, sy, 0.0, tx, ty, 1.0)
    }

    /// Applies `m` and returns `[x, y, width, height]`.
    pub fn transform(&self, m: &Mat3) -> [f64; 4] {
        let m = &m.0;
        let x = self.x * m[0] + self.y * m[3] + m[6];
        let y = self.x * m[1] + self.y * m[4] + m[7];
        let width = self.width * m[0] + self.height * m[3];
        let height = self.width * m[1] + self.height * m[4];
        [x, y, width, height]
    }
}

fn axis_between(from_pos: f64, from_len: f64, to_pos: f64, to_len: f64) -> (f64, f64) {
    if from_len == 0.0 || !from_len.is_finite() || !to_len.is_finite() {
        return (1.0, 0.0);
    }
    let scale = to_len / from_len;
    (scale, to_pos - from_pos * scale)
}

impl From<[f64; 4]> for DomView {
    fn from(space: [f64; 4]) -> Self {
        Self::from_array(space)
    }
}

impl From<egui::Rect> for DomView {
    fn from(rect: egui::Rect) -> Self {
        Self::new(
            rect.min.x as f64,
            rect.min.y as f64,
            rect.width() as f64,
            rect.height() as f64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn between_maps_origin_and_extent() {
        let config = DomView::new(0.0, 0.0, 100.0, 1.0);
        let physical = DomView::new(0.0, 0.0, 1000.0, 20.0);
        let m = config.between(&physical);
        assert_eq!(
            DomView::new(50.0, 0.0, 10.0, 1.0).transform(&m),
            [500.0, 0.0, 100.0, 20.0]
        );
    }

    #[test]
    fn between_accounts_for_offsets() {
        let view = DomView::new(50.0, 0.0, 50.0, 1.0);
        let physical = DomView::new(200.0, 0.0, 500.0, 1.0);
        let (x, _) = view.between(&physical).transform_point(75.0, 0.0);
        assert_eq!(x, 450.0);
    }

    #[test]
    fn zero_extent_axis_passes_through() {
        let degenerate = DomView::new(3.0, 0.0, 0.0, 0.0);
        let physical = DomView::new(0.0, 0.0, 640.0, 480.0);
        let m = degenerate.between(&physical);
        assert!(m.0.iter().all(|v| v.is_finite()));
        assert_eq!(m.transform_point(7.0, 9.0), (7.0, 9.0));
    }

    #[test]
    fn edges() {
        let v = DomView::new(10.0, 5.0, 20.0, 4.0);
        assert_eq!(v.left(), 10.0);
        assert_eq!(v.right(), 30.0);
        assert_eq!(v.center(), 20.0);
        assert_eq!(v.top(), 5.0);
        assert_eq!(v.bottom(), 9.0);
    }

    #[test]
    fn converts_from_egui_rect() {
        let rect = egui::Rect::from_min_size(egui::pos2(10.0, 22.0), egui::vec2(300.0, 120.0));
        assert_eq!(DomView::from(rect), DomView::new(10.0, 22.0, 300.0, 120.0));
    }
}
