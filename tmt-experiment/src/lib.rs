pub mod config;
pub mod export;
pub mod hit;
pub mod input;
pub mod notice;
pub mod pointset;
pub mod state;
pub mod store;
pub mod transform;
pub mod trial;

pub use config::{TmtConfig, TrialConfig};
pub use export::{DirExportSink, ExportRow, ExportSink, ExportSummary, MemoryExportSink};
pub use input::{Binding, InputOwnership, InputToken};
pub use pointset::{FsPointSource, MemoryPointSource, PointSource};
pub use state::{ClickOutcome, LoadOutcome, LoadRequest, SessionMachine};
pub use store::{CumulativeLog, JsonFileStore, KeyValueStore, MemoryStore};
pub use transform::{Margins, SurfaceTransform};
pub use trial::ActiveTrial;
