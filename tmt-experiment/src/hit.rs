use tmt_core::Node;

/// Nearest node to `(x, y)` if it lies within `tolerance` pixels.
/// Ties keep the first node in list order.
pub fn hit_test(nodes: &[Node], x: f32, y: f32, tolerance: f32) -> Option<&Node> {
    let mut best: Option<(&Node, f32)> = None;
    for node in nodes {
        let dx = node.x - x;
        let dy = node.y - y;
        let d2 = dx * dx + dy * dy;
        if best.is_none_or(|(_, best_d2)| d2 < best_d2) {
            best = Some((node, d2));
        }
    }
    best.filter(|(_, d2)| d2.sqrt() <= tolerance)
        .map(|(node, _)| node)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Vec<Node> {
        vec![
            Node::new(1, "1", 100.0, 100.0),
            Node::new(2, "2", 160.0, 100.0),
            Node::new(3, "3", 100.0, 300.0),
        ]
    }

    #[test]
    fn returns_nearest_within_tolerance() {
        let nodes = board();
        assert_eq!(hit_test(&nodes, 135.0, 100.0, 28.0).unwrap().order, 2);
        assert_eq!(hit_test(&nodes, 104.0, 96.0, 28.0).unwrap().order, 1);
    }

    #[test]
    fn tolerance_reaches_beyond_visual_radius() {
        let nodes = board();
        // 26 px away: outside a 24 px circle, still a hit at 28 px tolerance
        assert_eq!(hit_test(&nodes, 100.0, 326.0, 28.0).unwrap().order, 3);
        assert!(hit_test(&nodes, 100.0, 329.0, 28.0).is_none());
    }

    #[test]
    fn equidistant_tie_goes_to_first() {
        let nodes = board();
        assert_eq!(hit_test(&nodes, 130.0, 100.0, 40.0).unwrap().order, 1);
    }

    #[test]
    fn empty_board_never_hits() {
        assert!(hit_test(&[], 0.0, 0.0, 100.0).is_none());
    }
}
