pub mod error;
pub mod node;
pub mod screen;
pub mod trial;

pub use error::TmtError;
pub use node::{BoardView, Node};
pub use screen::{Screen, ScreenSelector, ScreenState};
pub use trial::{Pattern, ResultsAggregate, TrialKind, TrialResult, TrialStatus};
