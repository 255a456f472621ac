//! Loading of `order;label;x;y` point files.

use std::collections::HashMap;
use std::path::PathBuf;
use tmt_core::{Node, Pattern, TmtError};
use tracing::{debug, warn};

/// Where a trial's point data comes from. `fetch` returns the raw text.
pub trait PointSource {
    fn fetch(&self, reference: &str) -> Result<String, TmtError>;
}

/// Reads point files relative to a base directory
#[derive(Debug, Clone)]
pub struct FsPointSource {
    pub dir: PathBuf,
}

impl FsPointSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PointSource for FsPointSource {
    fn fetch(&self, reference: &str) -> Result<String, TmtError> {
        let path = self.dir.join(reference);
        debug!(path = %path.display(), "reading point file");
        std::fs::read_to_string(&path).map_err(|source| TmtError::ResourceLoad {
            reference: path.display().to_string(),
            source,
        })
    }
}

/// In-memory sources keyed by reference
#[derive(Debug, Clone, Default)]
pub struct MemoryPointSource {
    files: HashMap<String, String>,
}

impl MemoryPointSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reference: &str, content: &str) -> Self {
        self.files.insert(reference.to_string(), content.to_string());
        self
    }
}

impl PointSource for MemoryPointSource {
    fn fetch(&self, reference: &str) -> Result<String, TmtError> {
        self.files
            .get(reference)
            .cloned()
            .ok_or_else(|| TmtError::ResourceLoad {
                reference: reference.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such point source"),
            })
    }
}

/// Parses the header line plus `order;label;x;y` records and sorts by order.
///
/// Unparsable coordinates come back as NaN; [`validate_points`] rejects them.
pub fn parse_points(text: &str) -> Result<Vec<Node>, TmtError> {
    let text = text.trim_start_matches('\u{feff}');
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());
    // header
    lines.next();

    let mut nodes = Vec::new();
    for (idx, line) in lines {
        let line_no = idx + 1;
        let fields: Vec<&str> = line.trim().split(';').collect();
        if fields.len() < 4 {
            return Err(TmtError::MalformedRecord {
                line: line_no,
                reason: format!("expected 4 fields, found {}", fields.len()),
            });
        }
        let order = fields[0]
            .trim()
            .parse::<u32>()
            .map_err(|e| TmtError::MalformedRecord {
                line: line_no,
                reason: format!("order {:?}: {e}", fields[0]),
            })?;
        nodes.push(Node {
            order,
            label: fields[1].trim().to_string(),
            x: parse_coordinate(fields[2]),
            y: parse_coordinate(fields[3]),
        });
    }
    nodes.sort_by_key(|n| n.order);
    Ok(nodes)
}

fn parse_coordinate(field: &str) -> f32 {
    field.trim().parse::<f32>().unwrap_or(f32::NAN)
}

/// Fails unless the set is non-empty, every coordinate is finite and the
/// orders are exactly `1..=N` (nodes must already be sorted).
pub fn validate_points(nodes: &[Node]) -> Result<(), TmtError> {
    if nodes.is_empty() {
        return Err(TmtError::InvalidPointSet {
            reason: "no points".into(),
        });
    }
    if let Some(bad) = nodes.iter().find(|n| !n.is_finite()) {
        return Err(TmtError::InvalidPointSet {
            reason: format!("non-finite coordinates on node {} ({:?})", bad.order, bad.label),
        });
    }
    for (i, node) in nodes.iter().enumerate() {
        let expected = i as u32 + 1;
        if node.order != expected {
            return Err(TmtError::InvalidPointSet {
                reason: format!("expected order {expected}, found {}", node.order),
            });
        }
    }
    Ok(())
}

/// Pattern B labels must alternate number, letter, number, ... starting with a number.
/// Returns the orders of nodes that break the alternation.
pub fn alternation_breaks(nodes: &[Node], pattern: Pattern) -> Vec<u32> {
    if pattern == Pattern::A {
        return nodes
            .iter()
            .filter(|n| !is_numeric(&n.label))
            .map(|n| n.order)
            .collect();
    }
    nodes
        .iter()
        .filter(|n| {
            let wants_number = n.order % 2 == 1;
            if wants_number {
                !is_numeric(&n.label)
            } else {
                !is_alphabetic(&n.label)
            }
        })
        .map(|n| n.order)
        .collect()
}

/// Logs labels that do not follow the trial's pattern. Not fatal.
pub fn warn_on_label_pattern(nodes: &[Node], pattern: Pattern) {
    let breaks = alternation_breaks(nodes, pattern);
    if !breaks.is_empty() {
        warn!(?pattern, orders = ?breaks, "point labels do not follow the trial pattern");
    }
}

fn is_numeric(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_digit())
}

fn is_alphabetic(label: &str) -> bool {
    !label.is_empty() && label.chars().all(char::is_alphabetic)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "order;label;x;y\r\n3;3;1.5;-2\r\n1;1;0;0\r\n\r\n2;2;-4.25;3\r\n";

    #[test]
    fn parses_and_sorts_by_order() {
        let nodes = parse_points(SAMPLE).unwrap();
        let orders: Vec<u32> = nodes.iter().map(|n| n.order).collect();
        assert_eq!(orders, vec![1, 2, 3]);
        assert_eq!(nodes[1].label, "2");
        assert_eq!(nodes[1].x, -4.25);
        assert_eq!(nodes[2].y, -2.0);
        validate_points(&nodes).unwrap();
    }

    #[test]
    fn byte_order_mark_is_ignored() {
        let nodes = parse_points("\u{feff}order;label;x;y\n1;1;0;0\n").unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn bad_coordinate_becomes_nan_and_fails_validation() {
        let nodes = parse_points("order;label;x;y\n1;1;abc;0\n").unwrap();
        assert!(nodes[0].x.is_nan());
        assert!(matches!(
            validate_points(&nodes),
            Err(TmtError::InvalidPointSet { .. })
        ));
    }

    #[test]
    fn bad_order_is_malformed() {
        let err = parse_points("order;label;x;y\nx;1;0;0\n").unwrap_err();
        assert!(matches!(err, TmtError::MalformedRecord { line: 2, .. }));
    }

    #[test]
    fn short_record_is_malformed() {
        let err = parse_points("order;label;x;y\n1;1;0\n").unwrap_err();
        assert!(matches!(err, TmtError::MalformedRecord { .. }));
    }

    #[test]
    fn gaps_and_duplicates_are_rejected() {
        let gap = parse_points("h\n1;1;0;0\n3;3;1;1\n").unwrap();
        assert!(validate_points(&gap).is_err());
        let dup = parse_points("h\n1;1;0;0\n1;A;1;1\n").unwrap();
        assert!(validate_points(&dup).is_err());
        assert!(validate_points(&[]).is_err());
    }

    #[test]
    fn pattern_b_alternation() {
        let good = parse_points("h\n1;1;0;0\n2;A;0;0\n3;2;0;0\n4;B;0;0\n").unwrap();
        assert!(alternation_breaks(&good, Pattern::B).is_empty());
        let bad = parse_points("h\n1;1;0;0\n2;2;0;0\n3;A;0;0\n").unwrap();
        assert_eq!(alternation_breaks(&bad, Pattern::B), vec![2, 3]);
        assert_eq!(alternation_breaks(&good, Pattern::A), vec![2, 4]);
    }

    #[test]
    fn missing_memory_source_is_resource_error() {
        let source = MemoryPointSource::new().with("a.csv", "h\n1;1;0;0\n");
        assert!(source.fetch("a.csv").is_ok());
        assert!(matches!(
            source.fetch("b.csv"),
            Err(TmtError::ResourceLoad { .. })
        ));
    }

    #[test]
    fn fs_source_reads_relative_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("p.csv"), SAMPLE).unwrap();
        let source = FsPointSource::new(dir.path());
        assert_eq!(source.fetch("p.csv").unwrap(), SAMPLE);
        assert!(matches!(
            source.fetch("absent.csv"),
            Err(TmtError::ResourceLoad { .. })
        ));
    }
}
