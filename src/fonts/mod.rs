//! Font cataloguing, discovery and resolution.

mod catalog;
mod cmap;
mod descriptor;
mod encoding;
mod resolver;
mod standard;
mod system;
mod truetype;

pub use catalog::FontCatalog;
pub use cmap::{generate_tounicode_cmap, CMap};
pub use descriptor::{
    normalize_font_name, same_font_name, style_from_name, FontDescriptor, FontFlags, FontSource,
};
pub use encoding::{
    glyph_name_to_unicode, is_winansi_char, unicode_to_winansi, winansi_to_unicode, BaseEncoding,
    SimpleEncoding,
};
pub use resolver::{
    derived_font_name, FontCache, FontResolver, MatchQuality, Resolution, ResolutionStrategy,
};
pub use standard::StandardFont;
pub use system::{default_font_dirs, FontLocator, SystemFontLocator};
pub use truetype::{FontProgram, ProgramMetrics};
