use crate::text::TextCache;
use ab_glyph::FontArc;
use anyhow::{Result, anyhow};
use std::time::Duration;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};
use tmt_core::BoardView;
use tmt_timing::Timer;
use tracing::debug;

/// Height of the heads-up strip above the board
pub const HUD_HEIGHT: u32 = 72;
pub const BOARD_PADDING: u32 = 16;

const BACKGROUND: u32 = 0xf4f4f4;
const BOARD: u32 = 0xffffff;
const BOARD_EDGE: u32 = 0xcccccc;
const PENDING_FILL: u32 = 0xffffff;
const PENDING_STROKE: u32 = 0x333333;
const DONE_FILL: u32 = 0xd4edda;
const DONE_STROKE: u32 = 0x28a745;
const PATH: u32 = 0x000000;
const LABEL: u32 = 0x000000;
const MARKER: u32 = 0x007bff;
const TEXT: u32 = 0x222222;
const NOTICE: u32 = 0xc0392b;

fn rgb(hex: u32) -> Color {
    Color::from_rgba8((hex >> 16) as u8, (hex >> 8) as u8, hex as u8, 255)
}

fn solid(hex: u32) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(rgb(hex));
    paint.anti_alias = true;
    paint
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoardStyle {
    pub node_radius: f32,
    pub outline_width: f32,
    pub path_width: f32,
    pub label_px: f32,
    pub marker_px: f32,
}

impl Default for BoardStyle {
    fn default() -> Self {
        Self {
            node_radius: 24.0,
            outline_width: 2.0,
            path_width: 3.0,
            label_px: 18.0,
            marker_px: 22.0,
        }
    }
}

/// Heads-up strip content for the game view
#[derive(Debug, Clone, Copy)]
pub struct Hud<'a> {
    pub title: &'a str,
    pub elapsed: Duration,
    pub errors: u32,
    pub notice: Option<&'a str>,
}

/// What a frame shows
#[derive(Debug, Clone, Copy)]
pub enum Scene<'a> {
    /// Centered heading plus body lines (welcome, intros, final)
    Message { heading: &'a str, lines: &'a [String] },
    Game { hud: Hud<'a>, board: Option<BoardView<'a>> },
}

pub struct FrameStats {
    pub clear: Duration,
    pub scene: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub board_redrawn: bool,
}

pub trait SceneRenderer {
    /// Draws `scene` on the offscreen canvas; true when the board was re-rasterized
    fn render_scene(&mut self, scene: &Scene<'_>) -> Result<bool>;
}

/// Paints the board: white surface, path through completed nodes, then
/// every node with its label, then the start marker above node 1.
pub fn draw_board(pixmap: &mut Pixmap, board: &BoardView<'_>, style: &BoardStyle, text: &mut TextCache) {
    pixmap.fill(rgb(BOARD));

    let mut path = PathBuilder::new();
    for (i, node) in board.completed_path().enumerate() {
        if i == 0 {
            path.move_to(node.x, node.y);
        } else {
            path.line_to(node.x, node.y);
        }
    }
    if board.progress >= 2 {
        if let Some(path) = path.finish() {
            let stroke = Stroke {
                width: style.path_width,
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &solid(PATH), &stroke, Transform::identity(), None);
        }
    }

    let outline = Stroke {
        width: style.outline_width,
        ..Stroke::default()
    };
    for node in board.nodes {
        let Some(circle) = PathBuilder::from_circle(node.x, node.y, style.node_radius) else {
            continue;
        };
        let (fill, edge) = if node.is_completed(board.progress) {
            (DONE_FILL, DONE_STROKE)
        } else {
            (PENDING_FILL, PENDING_STROKE)
        };
        pixmap.fill_path(&circle, &solid(fill), FillRule::Winding, Transform::identity(), None);
        pixmap.stroke_path(&circle, &solid(edge), &outline, Transform::identity(), None);

        if let Some(label) = text.get_or_render(&node.label, style.label_px, rgb(LABEL)) {
            blit_centered(pixmap, &label, (node.x, node.y));
        }
    }

    if let (Some(marker), Some(first)) = (board.start_marker, board.nodes.first()) {
        if let Some(pm) = text.get_or_render(marker, style.marker_px, rgb(MARKER)) {
            blit_centered(pixmap, &pm, (first.x, first.y - style.node_radius - 18.0));
        }
    }
}

fn blit_centered(dst: &mut Pixmap, src: &Pixmap, center: (f32, f32)) {
    let x0 = (center.0 - src.width() as f32 * 0.5).floor() as i32;
    let y0 = (center.1 - src.height() as f32 * 0.5).floor() as i32;
    blit(dst, src, x0, y0);
}

/// Premultiplied source-over copy of `src` with its top-left at `(x0, y0)`, clipped to `dst`
fn blit(dst: &mut Pixmap, src: &Pixmap, x0: i32, y0: i32) {
    let (dw, dh) = (dst.width() as i32, dst.height() as i32);
    let (sw, sh) = (src.width() as i32, src.height() as i32);
    if x0 >= dw || y0 >= dh || x0 + sw <= 0 || y0 + sh <= 0 {
        return;
    }

    let dst_x = x0.max(0) as usize;
    let dst_y = y0.max(0) as usize;
    let src_x = (-x0).max(0) as usize;
    let src_y = (-y0).max(0) as usize;
    let copy_w = ((x0 + sw).min(dw) as usize).saturating_sub(dst_x);
    let copy_h = ((y0 + sh).min(dh) as usize).saturating_sub(dst_y);
    if copy_w == 0 || copy_h == 0 {
        return;
    }

    let src_stride = src.width() as usize * 4;
    let dst_stride = dst.width() as usize * 4;
    let src_data = src.data();
    let dst_data = dst.data_mut();

    for row in 0..copy_h {
        let s_off = (src_y + row) * src_stride + src_x * 4;
        let d_off = (dst_y + row) * dst_stride + dst_x * 4;
        let s_row = &src_data[s_off..s_off + copy_w * 4];
        let d_row = &mut dst_data[d_off..d_off + copy_w * 4];

        if s_row.iter().skip(3).step_by(4).all(|&a| a == 255) {
            d_row.copy_from_slice(s_row);
            continue;
        }
        for (s, d) in s_row.chunks_exact(4).zip(d_row.chunks_exact_mut(4)) {
            let inv = 255 - s[3] as u32;
            for c in 0..4 {
                d[c] = (s[c] as u32 + (d[c] as u32 * inv + 127) / 255).min(255) as u8;
            }
        }
    }
}

struct BoardCache {
    revision: u64,
    pixmap: Pixmap,
}

/// Whole-frame software renderer: a heads-up strip over a cached board,
/// or centered text for the message screens.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    style: BoardStyle,
    canvas: Pixmap,
    board: Option<BoardCache>,
    text: TextCache,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32, style: BoardStyle, font: Option<FontArc>) -> Result<Self> {
        let canvas = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| anyhow!("cannot allocate a {width}x{height} canvas"))?;
        Ok(Self {
            width: width.max(1),
            height: height.max(1),
            style,
            canvas,
            board: None,
            text: TextCache::new(font),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        self.canvas = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| anyhow!("cannot allocate a {width}x{height} canvas"))?;
        self.width = width.max(1);
        self.height = height.max(1);
        self.board = None;
        debug!(width, height, "renderer resized");
        Ok(())
    }

    /// Top-left of the board surface in window pixels
    pub fn board_origin(&self) -> (f32, f32) {
        (BOARD_PADDING as f32, (HUD_HEIGHT + BOARD_PADDING) as f32)
    }

    pub fn board_size(&self) -> (u32, u32) {
        let w = self.width.saturating_sub(2 * BOARD_PADDING).max(1);
        let h = self
            .height
            .saturating_sub(HUD_HEIGHT + 2 * BOARD_PADDING)
            .max(1);
        (w, h)
    }

    /// Renders `scene` and copies the canvas into an RGBA8 frame buffer of the same size
    pub fn render_frame<T>(
        &mut self,
        scene: &Scene<'_>,
        frame_buffer: &mut [u8],
        timer: &mut T,
    ) -> Result<FrameStats>
    where
        T: Timer<Timestamp = u64>,
    {
        if frame_buffer.len() != self.canvas.data().len() {
            return Err(anyhow!(
                "frame buffer holds {} bytes, canvas needs {}",
                frame_buffer.len(),
                self.canvas.data().len()
            ));
        }

        let t = timer.now();
        self.canvas.fill(rgb(BACKGROUND));
        let clear = timer.elapsed(t);

        let t = timer.now();
        let board_redrawn = self.render_scene(scene)?;
        let scene_time = timer.elapsed(t);

        let t = timer.now();
        frame_buffer.copy_from_slice(self.canvas.data());
        let copy = timer.elapsed(t);

        let total = clear + scene_time + copy;
        timer.record_frame(total);
        Ok(FrameStats {
            clear,
            scene: scene_time,
            copy,
            total,
            board_redrawn,
        })
    }

    fn ensure_board(&mut self, board: &BoardView<'_>) -> Result<bool> {
        let (w, h) = self.board_size();
        let fresh = self.board.as_ref().is_some_and(|c| {
            c.revision == board.revision && c.pixmap.width() == w && c.pixmap.height() == h
        });
        if fresh {
            return Ok(false);
        }
        let mut pixmap = match self.board.take() {
            Some(c) if c.pixmap.width() == w && c.pixmap.height() == h => c.pixmap,
            _ => Pixmap::new(w, h).ok_or_else(|| anyhow!("cannot allocate a {w}x{h} board"))?,
        };
        draw_board(&mut pixmap, board, &self.style, &mut self.text);
        self.board = Some(BoardCache {
            revision: board.revision,
            pixmap,
        });
        Ok(true)
    }

    fn draw_text(&mut self, text: &str, size: f32, color: u32, anchor: Anchor, y: f32) {
        let Some(pm) = self.text.get_or_render(text, size, rgb(color)) else {
            return;
        };
        let margin = 24;
        let x0 = match anchor {
            Anchor::Left => margin,
            Anchor::Center => (self.width as i32 - pm.width() as i32) / 2,
            Anchor::Right => self.width as i32 - margin - pm.width() as i32,
        };
        let y0 = (y - pm.height() as f32 * 0.5).floor() as i32;
        blit(&mut self.canvas, &pm, x0, y0);
    }

    fn draw_hud(&mut self, hud: &Hud<'_>) {
        let row = HUD_HEIGHT as f32 * 0.33;
        self.draw_text(hud.title, 22.0, TEXT, Anchor::Left, row);
        let time = format!("Time: {:.1}s", hud.elapsed.as_secs_f64());
        self.draw_text(&time, 20.0, TEXT, Anchor::Center, row);
        let errors = format!("Errors: {}", hud.errors);
        self.draw_text(&errors, 20.0, TEXT, Anchor::Right, row);
        if let Some(notice) = hud.notice {
            self.draw_text(notice, 18.0, NOTICE, Anchor::Center, HUD_HEIGHT as f32 * 0.75);
        }
    }

    fn draw_board_frame(&mut self) {
        let (ox, oy) = self.board_origin();
        let Some(cache) = self.board.as_ref() else {
            return;
        };
        let (w, h) = (cache.pixmap.width() as f32, cache.pixmap.height() as f32);
        if let Some(rect) = tiny_skia::Rect::from_xywh(ox - 1.0, oy - 1.0, w + 2.0, h + 2.0) {
            self.canvas
                .fill_rect(rect, &solid(BOARD_EDGE), Transform::identity(), None);
        }
        blit(&mut self.canvas, &cache.pixmap, ox as i32, oy as i32);
    }
}

#[derive(Debug, Clone, Copy)]
enum Anchor {
    Left,
    Center,
    Right,
}

impl SceneRenderer for SkiaRenderer {
    fn render_scene(&mut self, scene: &Scene<'_>) -> Result<bool> {
        match scene {
            Scene::Message { heading, lines } => {
                let spacing = 32.0;
                let block = spacing * (lines.len() as f32 + 1.5);
                let mut y = (self.height as f32 - block) * 0.5;
                self.draw_text(heading, 30.0, TEXT, Anchor::Center, y);
                y += spacing * 1.5;
                for line in lines.iter() {
                    self.draw_text(line, 20.0, TEXT, Anchor::Center, y);
                    y += spacing;
                }
                Ok(false)
            }
            Scene::Game { hud, board } => {
                self.draw_hud(hud);
                let redrawn = match board {
                    Some(board) => self.ensure_board(board)?,
                    None => {
                        self.board = None;
                        false
                    }
                };
                self.draw_board_frame();
                Ok(redrawn)
            }
        }
    }
}
