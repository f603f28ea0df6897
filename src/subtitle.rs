pub mod font;
pub mod group;
pub mod render;
pub mod srt;

pub use font::CaptionFont;
pub use group::{WordGroup, group_words};
pub use render::{CaptionRenderer, SubtitleClip, SubtitleStyle, parse_color};
pub use srt::{format_srt_timestamp, write_srt, write_srt_highlighted};
