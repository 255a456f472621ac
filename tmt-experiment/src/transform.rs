use tmt_core::Node;

/// Per-axis margins kept clear around the drawing surface edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub x: f32,
    pub y: f32,
}

impl Margins {
    pub fn uniform(m: f32) -> Self {
        Self { x: m, y: m }
    }
}

/// Isotropic mapping from the origin-centered, Y-up abstract space into
/// drawing-surface pixels (Y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceTransform {
    pub scale: f32,
    pub cx: f32,
    pub cy: f32,
    pub max_abs_x: f32,
    pub max_abs_y: f32,
}

impl SurfaceTransform {
    /// Fits `nodes` inside `width`×`height` minus margins on both axes at once.
    pub fn fit(nodes: &[Node], width: f32, height: f32, margins: Margins) -> Self {
        let max_abs_x = max_abs(nodes.iter().map(|n| n.x));
        let max_abs_y = max_abs(nodes.iter().map(|n| n.y));

        let usable_w = (width - 2.0 * margins.x).max(0.0);
        let usable_h = (height - 2.0 * margins.y).max(0.0);
        let sx = usable_w / (2.0 * max_abs_x);
        let sy = usable_h / (2.0 * max_abs_y);

        Self {
            scale: sx.min(sy),
            cx: width / 2.0,
            cy: height / 2.0,
            max_abs_x,
            max_abs_y,
        }
    }

    pub fn to_px(&self, x: f32, y: f32) -> (f32, f32) {
        (self.cx + x * self.scale, self.cy - y * self.scale)
    }

    /// Overwrites abstract coordinates with pixel coordinates in place
    pub fn apply(&self, nodes: &mut [Node]) {
        for node in nodes {
            let (px, py) = self.to_px(node.x, node.y);
            node.x = px;
            node.y = py;
        }
    }
}

/// Largest absolute value, or 1 when every value is zero
fn max_abs(values: impl Iterator<Item = f32>) -> f32 {
    let m = values.map(f32::abs).fold(0.0f32, f32::max);
    if m > 0.0 { m } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(points: &[(f32, f32)]) -> Vec<Node> {
        points
            .iter()
            .enumerate()
            .map(|(i, (x, y))| Node::new(i as u32 + 1, (i + 1).to_string(), *x, *y))
            .collect()
    }

    #[test]
    fn picks_the_smaller_axis_scale() {
        // usable 752x452, extents 10x10 -> sx 37.6, sy 22.6
        let set = nodes(&[(10.0, 0.0), (0.0, -10.0)]);
        let t = SurfaceTransform::fit(&set, 800.0, 500.0, Margins::uniform(24.0));
        assert!((t.scale - 22.6).abs() < 1e-4);
        assert_eq!((t.cx, t.cy), (400.0, 250.0));
    }

    #[test]
    fn y_up_maps_to_pixel_up() {
        let set = nodes(&[(1.0, 1.0)]);
        let t = SurfaceTransform::fit(&set, 200.0, 200.0, Margins::uniform(0.0));
        let (px, py) = t.to_px(1.0, 1.0);
        assert_eq!((px, py), (200.0, 0.0));
        let (px, py) = t.to_px(-1.0, -1.0);
        assert_eq!((px, py), (0.0, 200.0));
    }

    #[test]
    fn all_zero_coordinates_do_not_divide_by_zero() {
        let set = nodes(&[(0.0, 0.0), (0.0, 0.0)]);
        let t = SurfaceTransform::fit(&set, 800.0, 500.0, Margins::uniform(24.0));
        assert!(t.scale.is_finite());
        assert_eq!(t.to_px(0.0, 0.0), (400.0, 250.0));
    }

    #[test]
    fn extremes_stay_inside_margins() {
        let set = nodes(&[(-7.0, 3.0), (7.0, -3.0), (2.0, 1.0), (-1.5, -2.5)]);
        for (w, h, mx, my) in [
            (800.0, 500.0, 24.0, 24.0),
            (300.0, 900.0, 10.0, 40.0),
            (1920.0, 1080.0, 24.0, 24.0),
        ] {
            let mut placed = set.clone();
            let t = SurfaceTransform::fit(&placed, w, h, Margins { x: mx, y: my });
            t.apply(&mut placed);
            for n in &placed {
                assert!(n.x >= mx - 1e-3 && n.x <= w - mx + 1e-3, "x {} in {w}", n.x);
                assert!(n.y >= my - 1e-3 && n.y <= h - my + 1e-3, "y {} in {h}", n.y);
            }
        }
    }

    #[test]
    fn apply_preserves_order_and_labels() {
        let mut set = nodes(&[(1.0, 2.0), (-3.0, 0.5)]);
        let t = SurfaceTransform::fit(&set, 400.0, 400.0, Margins::uniform(20.0));
        t.apply(&mut set);
        assert_eq!(set[0].order, 1);
        assert_eq!(set[1].label, "2");
        assert!(set[1].x < set[0].x);
    }
}
