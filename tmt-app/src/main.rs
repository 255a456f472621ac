mod app;
mod logging;

use anyhow::Context;
use std::path::PathBuf;
use tmt_experiment::TmtConfig;
use tracing::info;

pub use app::App;

fn main() -> anyhow::Result<()> {
    logging::init(std::env::var_os("TMT_DEBUG").is_some());

    let config_path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("TMT_CONFIG"))
        .map(PathBuf::from);
    let config = match config_path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            TmtConfig::load(&path)
                .with_context(|| format!("reading configuration from {}", path.display()))?
        }
        None => TmtConfig::default(),
    };

    App::run(config)
}
