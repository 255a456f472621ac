use ab_glyph::{point, Font, FontArc, Glyph, PxScale, ScaleFont};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_skia::{Color, Pixmap, PremultipliedColorU8};
use tracing::{debug, warn};

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
];

/// Loads the first readable font, trying `preferred` before the usual system locations.
pub fn load_font(preferred: Option<&Path>) -> Option<FontArc> {
    let candidates = preferred
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONTS.iter().map(PathBuf::from));

    for path in candidates {
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        match FontArc::try_from_vec(bytes) {
            Ok(font) => {
                debug!(path = %path.display(), "font loaded");
                return Some(font);
            }
            Err(e) => warn!(path = %path.display(), %e, "unreadable font file"),
        }
    }
    warn!("no usable font found, text will not be drawn");
    None
}

/// Rasterizes `text` into a tight, transparent, premultiplied pixmap.
/// Returns `None` when nothing in `text` has an outline.
pub fn render_text_pixmap(text: &str, font_size: f32, font: &FontArc, color: Color) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // Baseline at ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    if outlines.is_empty() {
        return None;
    }

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    let cu = color.to_color_u8();
    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            let a = (cov * cu.alpha() as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let inv = 1.0 - a;
            let bg = dst[i];
            // Porter-Duff over, premultiplied
            let blend = |s: u8, d: u8| ((s as f32 * a) as u8).saturating_add((d as f32 * inv) as u8);
            let r = blend(cu.red(), bg.red());
            let g = blend(cu.green(), bg.green());
            let bl = blend(cu.blue(), bg.blue());
            let al = sa.saturating_add((bg.alpha() as f32 * inv) as u8);
            if let Some(px) = PremultipliedColorU8::from_rgba(r.min(al), g.min(al), bl.min(al), al) {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TextKey {
    text: String,
    size_bits: u32,
    rgba: [u8; 4],
}

/// Rendered text pixmaps keyed by content, size and color.
/// Without a font every lookup misses and nothing is drawn.
pub struct TextCache {
    font: Option<FontArc>,
    map: HashMap<TextKey, Arc<Pixmap>>,
    capacity: usize,
}

impl TextCache {
    pub fn new(font: Option<FontArc>) -> Self {
        Self {
            font,
            map: HashMap::new(),
            capacity: 512,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get_or_render(&mut self, text: &str, size_px: f32, color: Color) -> Option<Arc<Pixmap>> {
        let font = self.font.as_ref()?;
        let c = color.to_color_u8();
        let key = TextKey {
            text: text.to_string(),
            size_bits: size_px.to_bits(),
            rgba: [c.red(), c.green(), c.blue(), c.alpha()],
        };
        if let Some(p) = self.map.get(&key) {
            return Some(Arc::clone(p));
        }
        let pm = Arc::new(render_text_pixmap(text, size_px, font, color)?);
        // the running clock produces a fresh string every tenth of a second
        if self.map.len() >= self.capacity {
            self.map.clear();
        }
        self.map.insert(key, Arc::clone(&pm));
        Some(pm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_without_font_draws_nothing() {
        let mut cache = TextCache::new(None);
        assert!(cache.get_or_render("1", 18.0, Color::BLACK).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_preferred_font_falls_through() {
        // only asserts that a bad path is not fatal
        let _ = load_font(Some(Path::new("/nonexistent/font.ttf")));
    }

    #[test]
    fn renders_and_caches_with_system_font() {
        let Some(font) = load_font(None) else {
            return;
        };
        let mut cache = TextCache::new(Some(font));
        let a = cache.get_or_render("12", 18.0, Color::BLACK).unwrap();
        let b = cache.get_or_render("12", 18.0, Color::BLACK).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.width() > 1 && a.height() > 1);
        cache.get_or_render("12", 22.0, Color::BLACK).unwrap();
        assert_eq!(cache.len(), 2);
    }
}
