pub mod ticker;
pub mod timer;

pub use ticker::{TickHandle, TickSchedule};
pub use timer::{FrameWindow, HighPrecisionTimer, ManualTimer, PacingStats, Timer};
