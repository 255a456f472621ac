pub mod render;
pub mod text;

pub use render::{BoardStyle, FrameStats, Hud, Scene, SceneRenderer, SkiaRenderer, BOARD_PADDING, HUD_HEIGHT};
pub use text::{load_font, render_text_pixmap, TextCache};
