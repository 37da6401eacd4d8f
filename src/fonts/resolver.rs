//! Font resolution with quality classification.
//!
//! Given the name of the font a run was drawn with, find something
//! loadable to draw replacement text with, and say how close it is to the
//! original:
//!
//! 1. the document's own embedded program (`Exact`)
//! 2. a host font whose name is the requested name (`Exact`)
//! 3. a host font of the same family but another variant (`Variant`)
//! 4. a base-14 font of the same broad family (`Fallback`)
//! 5. the configured last-resort font (`Fallback`), or nothing (`Missing`)
//!
//! A requested name that is itself one of the base-14 fonts resolves as
//! `Exact` right after step 1, since every viewer provides it.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::catalog::FontCatalog;
use super::descriptor::{normalize_font_name, same_font_name, FontDescriptor, FontSource};
use super::standard::StandardFont;
use super::system::FontLocator;
use super::truetype::FontProgram;
use crate::config::FallbackFont;

/// How closely a resolved font matches the requested one.
///
/// Ordered from worst to best, so `Exact > Variant > Fallback > Missing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchQuality {
    /// No usable font at all
    Missing,
    /// A generic substitute
    Fallback,
    /// Another weight/width of the same family
    Variant,
    /// The font named in the document
    Exact,
}

impl MatchQuality {
    /// Whether this resolution degrades fidelity.
    pub fn is_degraded(&self) -> bool {
        *self != MatchQuality::Exact
    }
}

impl fmt::Display for MatchQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MatchQuality::Exact => "exact",
            MatchQuality::Variant => "variant",
            MatchQuality::Fallback => "fallback",
            MatchQuality::Missing => "missing",
        };
        f.write_str(label)
    }
}

/// Which step of the chain produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionStrategy {
    /// Program embedded in the document
    Embedded,
    /// Requested name is a base-14 font
    Standard,
    /// Host font with the requested name
    SystemExact,
    /// Host font of another variant
    SystemVariant,
    /// Static family table
    FamilyMap,
    /// Configured last resort
    LastResort,
    /// Nothing applied
    Unavailable,
}

/// Result of resolving one font request.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Name that was asked for (normalized)
    pub requested: String,
    /// Resolved font, shared with every cache hit
    pub descriptor: Rc<FontDescriptor>,
    /// Match quality relative to `requested`
    pub quality: MatchQuality,
    /// Chain step that produced the font
    pub strategy: ResolutionStrategy,
}

impl Resolution {
    /// Display name of the font actually used.
    pub fn resolved_name(&self) -> &str {
        &self.descriptor.normalized_name
    }
}

/// Session-scoped memo of resolutions keyed by `(normalized name, bold, italic)`.
#[derive(Debug, Default)]
pub struct FontCache {
    entries: HashMap<(String, bool, bool), Resolution>,
}

impl FontCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached resolution, if any.
    pub fn get(&self, name: &str, bold: bool, italic: bool) -> Option<&Resolution> {
        self.entries.get(&(normalize_font_name(name), bold, italic))
    }

    fn insert(&mut self, resolution: Resolution, bold: bool, italic: bool) {
        self.entries
            .insert((resolution.requested.clone(), bold, italic), resolution);
    }

    /// Number of cached resolutions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been resolved yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves font requests through the strategy chain.
#[derive(Debug)]
pub struct FontResolver<L: FontLocator> {
    locator: L,
    fallback: FallbackFont,
}

impl<L: FontLocator> FontResolver<L> {
    /// Resolver using `locator` for host fonts and `fallback` as last resort.
    pub fn new(locator: L, fallback: FallbackFont) -> Self {
        Self { locator, fallback }
    }

    /// The host font locator.
    pub fn locator(&self) -> &L {
        &self.locator
    }

    /// Resolve through `cache`: a repeated request returns the cached
    /// resolution (sharing the same descriptor) without consulting the locator.
    pub fn resolve_cached(
        &self,
        cache: &mut FontCache,
        desired: &str,
        bold: bool,
        italic: bool,
        catalog: &FontCatalog,
    ) -> Resolution {
        if let Some(hit) = cache.get(desired, bold, italic) {
            log::trace!("Font cache hit for '{}'", desired);
            return hit.clone();
        }
        let resolution = self.resolve(desired, bold, italic, catalog);
        cache.insert(resolution.clone(), bold, italic);
        resolution
    }

    /// Resolve one request; never fails, `Missing` carries an unresolved descriptor.
    pub fn resolve(&self, desired: &str, bold: bool, italic: bool, catalog: &FontCatalog) -> Resolution {
        let requested = normalize_font_name(desired);
        let resolution = self.run_chain(&requested, bold, italic, catalog);
        match resolution.quality {
            MatchQuality::Exact => log::debug!(
                "Font '{}' resolved exactly via {:?}",
                requested,
                resolution.strategy
            ),
            MatchQuality::Missing => log::warn!("Font '{}' could not be resolved to any usable font", requested),
            quality => log::warn!(
                "Font '{}' not available exactly; using {} '{}' ({:?})",
                requested,
                quality,
                resolution.resolved_name(),
                resolution.strategy
            ),
        }
        resolution
    }

    fn run_chain(&self, requested: &str, bold: bool, italic: bool, catalog: &FontCatalog) -> Resolution {
        let make = |descriptor: FontDescriptor, quality, strategy| Resolution {
            requested: requested.to_string(),
            descriptor: Rc::new(descriptor),
            quality,
            strategy,
        };

        if let Some(embedded) = catalog.embedded(requested) {
            return make(embedded.clone(), MatchQuality::Exact, ResolutionStrategy::Embedded);
        }

        if let Some(standard) = StandardFont::from_base_font(requested) {
            return make(standard_descriptor(standard), MatchQuality::Exact, ResolutionStrategy::Standard);
        }

        if let Some(path) = self.locator.find(requested, bold, italic) {
            let derived = derived_font_name(&path);
            let descriptor = FontDescriptor::new(derived.clone())
                .with_style(bold, italic)
                .with_source(FontSource::System(path));
            if same_font_name(&derived, requested) {
                return make(descriptor, MatchQuality::Exact, ResolutionStrategy::SystemExact);
            }
            return make(descriptor, MatchQuality::Variant, ResolutionStrategy::SystemVariant);
        }

        if let Some(standard) = StandardFont::map_family(requested, bold, italic) {
            return make(standard_descriptor(standard), MatchQuality::Fallback, ResolutionStrategy::FamilyMap);
        }

        match &self.fallback {
            FallbackFont::Standard(font) => {
                let font = if *font == StandardFont::Helvetica {
                    StandardFont::sans(bold, italic)
                } else {
                    *font
                };
                make(standard_descriptor(font), MatchQuality::Fallback, ResolutionStrategy::LastResort)
            },
            FallbackFont::File(path) => match FontProgram::from_file(path) {
                Ok(program) => {
                    let name = program
                        .name()
                        .map(str::to_string)
                        .unwrap_or_else(|| derived_font_name(path));
                    let descriptor = FontDescriptor::new(name).with_source(FontSource::System(path.clone()));
                    make(descriptor, MatchQuality::Fallback, ResolutionStrategy::LastResort)
                },
                Err(e) => {
                    log::warn!("Last-resort font {} cannot be loaded: {}", path.display(), e);
                    make(
                        FontDescriptor::new(requested).with_style(bold, italic),
                        MatchQuality::Missing,
                        ResolutionStrategy::Unavailable,
                    )
                },
            },
        }
    }
}

fn standard_descriptor(font: StandardFont) -> FontDescriptor {
    FontDescriptor::new(font.base_font())
        .with_style(font.is_bold(), font.is_italic())
        .with_encoding("WinAnsiEncoding")
        .with_source(FontSource::Standard(font))
}

/// Name a font file calls itself: its PostScript name, else the file stem.
pub fn derived_font_name(path: &Path) -> String {
    FontProgram::from_file(path)
        .ok()
        .and_then(|program| program.name().map(str::to_string))
        .or_else(|| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .unwrap_or_default()
}
