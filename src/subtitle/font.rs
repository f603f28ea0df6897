use std::path::{Path, PathBuf};

use fontdue::{Font, FontSettings, Metrics};

/// Well-known bold faces tried after an explicit style path fails.
const BOLD_SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// Directories scanned as a last resort for any usable face.
const FONT_ROOTS: &[&str] = &["/usr/share/fonts", "/usr/local/share/fonts"];

/// Upper bound on directory entries visited during the fallback scan.
const SCAN_LIMIT: usize = 512;

/// A loaded caption face at a fixed pixel size.
pub struct CaptionFont {
    font: Font,
    size: f32,
}

impl CaptionFont {
    /// Resolve a font through the fallback chain: explicit path, well-known
    /// bold system faces, then any face found under the system font roots.
    ///
    /// Never fails: `None` means captions render without glyphs, degrading
    /// quality but not correctness.
    pub fn load(explicit: Option<&Path>, size: f32) -> Option<Self> {
        if let Some(path) = explicit {
            match Self::from_path(path, size) {
                Some(font) => return Some(font),
                None => {
                    tracing::warn!(path = %path.display(), "failed to load caption font, falling back");
                }
            }
        }

        for candidate in BOLD_SYSTEM_FONTS {
            if let Some(font) = Self::from_path(Path::new(candidate), size) {
                return Some(font);
            }
        }

        for root in FONT_ROOTS {
            if let Some(path) = first_face_under(Path::new(root))
                && let Some(font) = Self::from_path(&path, size)
            {
                tracing::debug!(path = %path.display(), "caption font resolved by directory scan");
                return Some(font);
            }
        }

        tracing::warn!("no caption font available, subtitles will not be drawn");
        None
    }

    fn from_path(path: &Path, size: f32) -> Option<Self> {
        let bytes = std::fs::read(path).ok()?;
        let font = Font::from_bytes(bytes, FontSettings::default()).ok()?;
        Some(Self { font, size })
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn rasterize(&self, c: char) -> (Metrics, Vec<u8>) {
        self.font.rasterize(c, self.size)
    }

    /// Horizontal advance of a whole word in pixels.
    pub fn word_width(&self, word: &str) -> f32 {
        word.chars()
            .map(|c| self.font.metrics(c, self.size).advance_width)
            .sum()
    }

    pub fn space_width(&self) -> f32 {
        self.font.metrics(' ', self.size).advance_width
    }

    pub fn ascent(&self) -> f32 {
        self.font
            .horizontal_line_metrics(self.size)
            .map(|m| m.ascent)
            .unwrap_or(self.size * 0.8)
    }

    pub fn descent(&self) -> f32 {
        self.font
            .horizontal_line_metrics(self.size)
            .map(|m| -m.descent)
            .unwrap_or(self.size * 0.2)
    }

    pub fn line_height(&self) -> f32 {
        self.ascent() + self.descent()
    }
}

fn is_face_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("ttf") | Some("otf")
    )
}

fn first_face_under(root: &Path) -> Option<PathBuf> {
    let mut pending = vec![root.to_path_buf()];
    let mut visited = 0usize;

    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            visited += 1;
            if visited > SCAN_LIMIT {
                return None;
            }
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_face_file(&path) {
                return Some(path);
            }
        }
    }
    None
}
