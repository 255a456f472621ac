use crate::error::TmtError;
use serde::{Deserialize, Serialize};

/// Node ordering rule of a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    /// Ascending numbers only: 1, 2, 3, ...
    A,
    /// Numbers and letters interleaved: 1, A, 2, B, ...
    B,
}

/// The four trials of a session, in administration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrialKind {
    PracticeA,
    TestA,
    PracticeB,
    TestB,
}

impl TrialKind {
    pub const ALL: [TrialKind; 4] = [
        TrialKind::PracticeA,
        TrialKind::TestA,
        TrialKind::PracticeB,
        TrialKind::TestB,
    ];

    pub fn next(&self) -> Option<Self> {
        use TrialKind::*;
        Some(match self {
            PracticeA => TestA,
            TestA => PracticeB,
            PracticeB => TestB,
            TestB => return None,
        })
    }

    pub fn pattern(&self) -> Pattern {
        match self {
            TrialKind::PracticeA | TrialKind::TestA => Pattern::A,
            TrialKind::PracticeB | TrialKind::TestB => Pattern::B,
        }
    }

    pub fn is_practice(&self) -> bool {
        matches!(self, TrialKind::PracticeA | TrialKind::PracticeB)
    }

    pub fn title(&self) -> &'static str {
        match self {
            TrialKind::PracticeA => "Practice A",
            TrialKind::TestA => "Test A",
            TrialKind::PracticeB => "Practice B",
            TrialKind::TestB => "Test B",
        }
    }
}

/// Lifecycle of a single trial
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialStatus {
    Idle,
    Loading,
    Ready,
    Running,
    Completed,
}

/// Snapshot taken once when a trial's last node is clicked
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResult {
    pub duration_ms: f64,
    pub errors: u32,
    pub n: u32,
}

/// One optional result per trial kind. Slots fill once and only
/// [`ResultsAggregate::clear`] empties them again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsAggregate {
    pub practice_a: Option<TrialResult>,
    pub test_a: Option<TrialResult>,
    pub practice_b: Option<TrialResult>,
    pub test_b: Option<TrialResult>,
}

impl ResultsAggregate {
    pub fn get(&self, kind: TrialKind) -> Option<&TrialResult> {
        match kind {
            TrialKind::PracticeA => self.practice_a.as_ref(),
            TrialKind::TestA => self.test_a.as_ref(),
            TrialKind::PracticeB => self.practice_b.as_ref(),
            TrialKind::TestB => self.test_b.as_ref(),
        }
    }

    fn slot_mut(&mut self, kind: TrialKind) -> &mut Option<TrialResult> {
        match kind {
            TrialKind::PracticeA => &mut self.practice_a,
            TrialKind::TestA => &mut self.test_a,
            TrialKind::PracticeB => &mut self.practice_b,
            TrialKind::TestB => &mut self.test_b,
        }
    }

    pub fn record(&mut self, kind: TrialKind, result: TrialResult) -> Result<(), TmtError> {
        let slot = self.slot_mut(kind);
        if slot.is_some() {
            return Err(TmtError::SlotAlreadyRecorded(kind));
        }
        *slot = Some(result);
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn recorded(&self) -> usize {
        TrialKind::ALL
            .iter()
            .filter(|kind| self.get(**kind).is_some())
            .count()
    }
}
