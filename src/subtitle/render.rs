use std::{collections::HashMap, path::PathBuf, sync::Arc};

use fontdue::Metrics;
use image::RgbaImage;

use crate::{
    model::{AudioTimestamps, RenderSettings},
    subtitle::{
        font::CaptionFont,
        group::{WordGroup, group_words},
    },
};

#[derive(Clone, Debug)]
pub struct SubtitleStyle {
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub color: String,
    pub active_color: String,
    pub stroke_color: String,
    pub stroke_width: u32,
    pub max_words_per_group: usize,
    pub max_chars_per_line: usize,
    pub padding_x: u32,
    pub padding_y: u32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_path: None,
            font_size: 70.0,
            color: "white".to_string(),
            active_color: "#FFD700".to_string(),
            stroke_color: "black".to_string(),
            stroke_width: 3,
            max_words_per_group: 6,
            max_chars_per_line: 35,
            padding_x: 40,
            padding_y: 20,
        }
    }
}

impl SubtitleStyle {
    pub fn from_settings(settings: &RenderSettings) -> Self {
        Self {
            font_path: settings.subtitle_font_path.clone(),
            font_size: settings.subtitle_font_size,
            color: settings.subtitle_color.clone(),
            active_color: settings.subtitle_active_color.clone(),
            ..Self::default()
        }
    }
}

/// Parse `#RRGGBB` / `#RRGGBBAA` or a small set of named colors. Unknown
/// names fall back to white.
pub fn parse_color(color: &str) -> [u8; 4] {
    if let Some(hex) = color.strip_prefix('#')
        && hex.chars().all(|c| c.is_ascii_hexdigit())
    {
        let parse = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        if hex.len() == 6
            && let (Some(r), Some(g), Some(b)) = (parse(0..2), parse(2..4), parse(4..6))
        {
            return [r, g, b, 255];
        }
        if hex.len() == 8
            && let (Some(r), Some(g), Some(b), Some(a)) =
                (parse(0..2), parse(2..4), parse(4..6), parse(6..8))
        {
            return [r, g, b, a];
        }
    }

    match color.to_ascii_lowercase().as_str() {
        "black" => [0, 0, 0, 255],
        "red" => [255, 0, 0, 255],
        "green" => [0, 255, 0, 255],
        "blue" => [0, 0, 255, 255],
        "yellow" => [255, 255, 0, 255],
        "gold" => [255, 215, 0, 255],
        _ => [255, 255, 255, 255],
    }
}

/// Fraction of frame height at which captions are anchored.
const SUBTITLE_Y_FRACTION: f64 = 0.72;

/// Renders caption groups as karaoke bitmaps: one frame per active-word
/// index, cached per group, base/accent colors and a stroke outline.
pub struct CaptionRenderer {
    video_width: u32,
    style: SubtitleStyle,
    font: Option<CaptionFont>,
    subtitle_y: i64,
}

impl CaptionRenderer {
    pub fn new(video_width: u32, video_height: u32, style: SubtitleStyle) -> Self {
        let font = CaptionFont::load(style.font_path.as_deref(), style.font_size);
        Self {
            video_width,
            style,
            font,
            subtitle_y: (f64::from(video_height) * SUBTITLE_Y_FRACTION) as i64,
        }
    }

    pub fn style(&self) -> &SubtitleStyle {
        &self.style
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Group the word stream and produce one positioned clip per group.
    /// Without a usable font this returns no clips (quality degrades,
    /// correctness does not).
    pub fn build_clips(&self, timestamps: &AudioTimestamps) -> Vec<SubtitleClip> {
        let Some(font) = self.font.as_ref() else {
            tracing::warn!("no caption font loaded, skipping subtitle clips");
            return Vec::new();
        };

        let groups = group_words(
            timestamps,
            self.style.max_words_per_group,
            self.style.max_chars_per_line,
        );
        tracing::debug!(groups = groups.len(), "building subtitle clips");

        groups
            .into_iter()
            .map(|group| {
                let (width, height) = self.frame_dimensions(font, &group);
                let x = (i64::from(self.video_width) - i64::from(width)) / 2;
                SubtitleClip {
                    start: group.start_time,
                    end: group.end_time,
                    x,
                    y: self.subtitle_y,
                    width,
                    height,
                    group,
                    cache: HashMap::new(),
                }
            })
            .collect()
    }

    fn frame_dimensions(&self, font: &CaptionFont, group: &WordGroup) -> (u32, u32) {
        let space = font.space_width();
        let text_width: f32 = group
            .words
            .iter()
            .map(|w| font.word_width(&w.word))
            .sum::<f32>()
            + space * group.words.len().saturating_sub(1) as f32;
        let width = text_width.ceil().max(1.0) as u32 + self.style.padding_x * 2;
        let height = font.line_height().ceil().max(1.0) as u32 + self.style.padding_y * 2;
        (width, height)
    }

    /// Render one group bitmap with `active` highlighted. Only the highlight
    /// colors vary between frames of the same group; geometry is identical.
    fn render_group_frame(&self, group: &WordGroup, active: Option<usize>) -> RgbaImage {
        let Some(font) = self.font.as_ref() else {
            return RgbaImage::new(1, 1);
        };

        let base = parse_color(&self.style.color);
        let accent = parse_color(&self.style.active_color);
        let stroke = parse_color(&self.style.stroke_color);
        let stroke_width = self.style.stroke_width as i64;

        let (width, height) = self.frame_dimensions(font, group);
        let mut img = RgbaImage::new(width, height);

        let baseline = f32::from(self.style.padding_y as u16) + font.ascent();
        let mut cursor = self.style.padding_x as f32;
        let space = font.space_width();

        for (i, word) in group.words.iter().enumerate() {
            let color = if Some(i) == active { accent } else { base };

            if stroke_width > 0 {
                for dy in -stroke_width..=stroke_width {
                    for dx in -stroke_width..=stroke_width {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        draw_word(&mut img, font, &word.word, cursor, baseline, dx, dy, stroke);
                    }
                }
            }
            draw_word(&mut img, font, &word.word, cursor, baseline, 0, 0, color);

            cursor += font.word_width(&word.word) + space;
        }

        img
    }
}

fn draw_word(
    img: &mut RgbaImage,
    font: &CaptionFont,
    word: &str,
    start_x: f32,
    baseline: f32,
    offset_x: i64,
    offset_y: i64,
    color: [u8; 4],
) {
    let mut cursor = start_x;
    for c in word.chars() {
        let (metrics, coverage) = font.rasterize(c);
        let glyph_x = cursor.round() as i64 + i64::from(metrics.xmin) + offset_x;
        let glyph_y =
            baseline.round() as i64 - (metrics.height as i64 + i64::from(metrics.ymin)) + offset_y;
        blend_glyph(img, &metrics, &coverage, glyph_x, glyph_y, color);
        cursor += metrics.advance_width;
    }
}

fn blend_glyph(
    img: &mut RgbaImage,
    metrics: &Metrics,
    coverage: &[u8],
    glyph_x: i64,
    glyph_y: i64,
    color: [u8; 4],
) {
    let (w, h) = img.dimensions();
    for gy in 0..metrics.height {
        let py = glyph_y + gy as i64;
        if py < 0 || py >= i64::from(h) {
            continue;
        }
        for gx in 0..metrics.width {
            let px = glyph_x + gx as i64;
            if px < 0 || px >= i64::from(w) {
                continue;
            }
            let cov = coverage[gy * metrics.width + gx];
            if cov == 0 {
                continue;
            }
            let src_a = u32::from(cov) * u32::from(color[3]) / 255;
            let dst = img.get_pixel_mut(px as u32, py as u32);
            let dst_a = u32::from(dst.0[3]);
            let out_a = src_a + dst_a * (255 - src_a) / 255;
            if out_a == 0 {
                continue;
            }
            for c in 0..3 {
                let s = u32::from(color[c]);
                let d = u32::from(dst.0[c]);
                dst.0[c] = ((s * src_a + d * dst_a * (255 - src_a) / 255) / out_a).min(255) as u8;
            }
            dst.0[3] = out_a.min(255) as u8;
        }
    }
}

/// One caption positioned on the video, owning its per-active-word frame
/// cache. At most `words + 1` distinct frames exist per group.
pub struct SubtitleClip {
    pub group: WordGroup,
    pub start: f64,
    pub end: f64,
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
    cache: HashMap<Option<usize>, Arc<RgbaImage>>,
}

impl SubtitleClip {
    pub fn covers(&self, time: f64) -> bool {
        self.start <= time && time < self.end
    }

    /// Bitmap for `time`, rendered on first use and cached by active-word
    /// index afterwards.
    pub fn frame_at(&mut self, renderer: &CaptionRenderer, time: f64) -> Arc<RgbaImage> {
        let active = self.group.active_word_index(time);
        self.cache
            .entry(active)
            .or_insert_with(|| Arc::new(renderer.render_group_frame(&self.group, active)))
            .clone()
    }

    pub fn cached_frame_count(&self) -> usize {
        self.cache.len()
    }
}
