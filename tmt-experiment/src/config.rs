use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tmt_core::{TmtError, TrialKind};

/// Point file and error policy of one trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialConfig {
    pub source: String,
    /// Whether an out-of-sequence click increments the error counter
    pub count_errors: bool,
}

impl TrialConfig {
    fn new(source: &str, count_errors: bool) -> Self {
        Self {
            source: source.to_string(),
            count_errors,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TmtConfig {
    pub node_radius: f32,
    pub hit_radius: f32,
    pub margin_x: f32,
    pub margin_y: f32,
    pub surface_width: u32,
    pub surface_height: u32,
    pub warning_ms: u64,
    pub tick_hz: f64,

    pub points_dir: PathBuf,
    pub practice_a: TrialConfig,
    pub test_a: TrialConfig,
    pub practice_b: TrialConfig,
    pub test_b: TrialConfig,

    pub export_dir: PathBuf,
    pub store_path: PathBuf,
    pub storage_key: String,
    pub cumulative_file_name: String,

    pub start_marker: String,
    pub warning_a: String,
    pub warning_b: String,
    pub font_path: Option<PathBuf>,
}

impl Default for TmtConfig {
    fn default() -> Self {
        Self {
            node_radius: 24.0,
            hit_radius: 28.0,
            margin_x: 24.0,
            margin_y: 24.0,
            surface_width: 800,
            surface_height: 500,
            warning_ms: 3000,
            tick_hz: 60.0,
            points_dir: PathBuf::from("."),
            practice_a: TrialConfig::new("tmt_positions_A_entrainement.csv", false),
            test_a: TrialConfig::new("tmt_positions_A.csv", true),
            practice_b: TrialConfig::new("tmt_positions_B_entrainement.csv", true),
            test_b: TrialConfig::new("tmt_positions_B.csv", true),
            export_dir: PathBuf::from("exports"),
            store_path: PathBuf::from("tmt_store.json"),
            storage_key: "TMT_RESULTS_V1".to_string(),
            cumulative_file_name: "tmt_cumulative.csv".to_string(),
            start_marker: "start".to_string(),
            warning_a: "That's an error! Click the next number in ascending order.".to_string(),
            warning_b: "That's an error! Alternate numbers and letters, numbers in ascending \
                        order and letters in alphabetical order."
                .to_string(),
            font_path: None,
        }
    }
}

impl TmtConfig {
    pub fn load(path: &Path) -> Result<Self, TmtError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TmtError::Config(format!("read {}: {e}", path.display())))?;
        let config: TmtConfig = serde_json::from_str(&content)
            .map_err(|e| TmtError::Config(format!("parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TmtError> {
        if !(self.node_radius > 0.0) {
            return Err(TmtError::Config("node_radius must be positive".into()));
        }
        if !(self.hit_radius > self.node_radius) {
            return Err(TmtError::Config(format!(
                "hit_radius ({}) must exceed node_radius ({})",
                self.hit_radius, self.node_radius
            )));
        }
        if self.margin_x < 0.0 || self.margin_y < 0.0 {
            return Err(TmtError::Config("margins must not be negative".into()));
        }
        if self.surface_width == 0 || self.surface_height == 0 {
            return Err(TmtError::Config("surface size must be non-zero".into()));
        }
        if !(self.tick_hz > 0.0) {
            return Err(TmtError::Config("tick_hz must be positive".into()));
        }
        Ok(())
    }

    pub fn trial(&self, kind: TrialKind) -> &TrialConfig {
        match kind {
            TrialKind::PracticeA => &self.practice_a,
            TrialKind::TestA => &self.test_a,
            TrialKind::PracticeB => &self.practice_b,
            TrialKind::TestB => &self.test_b,
        }
    }

    pub fn warning(&self, kind: TrialKind) -> &str {
        match kind.pattern() {
            tmt_core::Pattern::A => &self.warning_a,
            tmt_core::Pattern::B => &self.warning_b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = TmtConfig::default();
        config.validate().unwrap();
        assert!(!config.trial(TrialKind::PracticeA).count_errors);
        assert!(config.trial(TrialKind::TestA).count_errors);
        assert!(config.trial(TrialKind::PracticeB).count_errors);
        assert_eq!(config.trial(TrialKind::TestB).source, "tmt_positions_B.csv");
    }

    #[test]
    fn tolerance_must_exceed_node_radius() {
        let config = TmtConfig {
            hit_radius: 24.0,
            ..TmtConfig::default()
        };
        assert!(matches!(config.validate(), Err(TmtError::Config(_))));
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "warning_ms": 1500, "practice_a": {{ "source": "pa.csv", "count_errors": true }} }}"#
        )
        .unwrap();
        let config = TmtConfig::load(file.path()).unwrap();
        assert_eq!(config.warning_ms, 1500);
        assert_eq!(config.practice_a.source, "pa.csv");
        assert!(config.practice_a.count_errors);
        assert_eq!(config.hit_radius, 28.0);
    }

    #[test]
    fn unreadable_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(matches!(TmtConfig::load(&missing), Err(TmtError::Config(_))));
    }
}
