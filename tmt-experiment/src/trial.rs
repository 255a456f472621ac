use crate::input::InputToken;
use tmt_core::{Node, TrialKind, TrialResult, TrialStatus};
use tmt_timing::TickHandle;

/// Mutable record of the trial currently administered. Created fresh for
/// every start and dropped when the trial ends or is abandoned.
#[derive(Debug)]
pub struct ActiveTrial {
    pub kind: TrialKind,
    pub generation: u64,
    pub status: TrialStatus,
    pub nodes: Vec<Node>,
    pub progress: u32,
    pub errors: u32,
    pub count_errors: bool,
    pub started_at: Option<u64>,
    pub input: Option<InputToken>,
    pub tick: Option<TickHandle>,
    pub result: Option<TrialResult>,
}

impl ActiveTrial {
    pub fn loading(kind: TrialKind, generation: u64, count_errors: bool) -> Self {
        Self {
            kind,
            generation,
            status: TrialStatus::Loading,
            nodes: Vec::new(),
            progress: 0,
            errors: 0,
            count_errors,
            started_at: None,
            input: None,
            tick: None,
            result: None,
        }
    }

    pub fn n(&self) -> u32 {
        self.nodes.len() as u32
    }

    pub fn expected_order(&self) -> u32 {
        self.progress + 1
    }

    pub fn is_running(&self) -> bool {
        self.status == TrialStatus::Running
    }

    pub fn is_finished(&self) -> bool {
        self.progress >= self.n() && !self.nodes.is_empty()
    }

    /// Advances progress by one; returns true when the last node was reached
    pub fn accept(&mut self) -> bool {
        if self.progress < self.n() {
            self.progress += 1;
        }
        self.is_finished()
    }

    /// Charges an error if this trial counts them; returns the error total
    pub fn reject(&mut self) -> u32 {
        if self.count_errors {
            self.errors += 1;
        }
        self.errors
    }
}
