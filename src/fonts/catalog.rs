//! Catalogue of the fonts a document references.

use indexmap::IndexMap;

use super::descriptor::{normalize_font_name, FontDescriptor, FontSource};
use crate::engine::DocumentEngine;
use crate::error::Result;

/// Fonts of a document indexed by normalized name, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct FontCatalog {
    fonts: IndexMap<String, FontDescriptor>,
}

impl FontCatalog {
    /// Empty catalogue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogue every font referenced by the document's pages.
    pub fn extract<E: DocumentEngine + ?Sized>(document: &E) -> Result<Self> {
        let catalog = Self::from_descriptors(document.extract_fonts()?);
        log::debug!(
            "Font catalog: {} font(s), {} embedded",
            catalog.len(),
            catalog.iter().filter(|f| f.embedded_bytes().is_some()).count()
        );
        Ok(catalog)
    }

    /// Build a catalogue from raw descriptors.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = FontDescriptor>) -> Self {
        let mut catalog = Self::new();
        for descriptor in descriptors {
            catalog.insert(descriptor);
        }
        catalog
    }

    /// Add a descriptor, merging with an existing entry of the same font.
    ///
    /// The same font often appears under different subset prefixes on
    /// different pages. Entries merge under the normalized name and the
    /// first embedded program found is kept.
    pub fn insert(&mut self, descriptor: FontDescriptor) {
        match self.fonts.get_mut(&descriptor.normalized_name) {
            Some(existing) => {
                if existing.embedded_bytes().is_none() && descriptor.embedded_bytes().is_some() {
                    existing.source = descriptor.source;
                    existing.object_id = descriptor.object_id;
                }
                existing.is_bold |= descriptor.is_bold;
                existing.is_italic |= descriptor.is_italic;
                if existing.encoding.is_none() {
                    existing.encoding = descriptor.encoding;
                }
            },
            None => {
                self.fonts.insert(descriptor.normalized_name.clone(), descriptor);
            },
        }
    }

    /// Look up a font by name; prefixes and letter case are ignored.
    pub fn get(&self, name: &str) -> Option<&FontDescriptor> {
        let normalized = normalize_font_name(name);
        self.fonts.get(&normalized).or_else(|| {
            self.fonts
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(&normalized))
                .map(|(_, descriptor)| descriptor)
        })
    }

    /// Look up a font that carries an embedded program.
    pub fn embedded(&self, name: &str) -> Option<&FontDescriptor> {
        self.get(name)
            .filter(|descriptor| matches!(descriptor.source, FontSource::Embedded(_)))
    }

    /// Number of distinct fonts.
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// Whether the catalogue is empty.
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Fonts in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &FontDescriptor> {
        self.fonts.values()
    }

    /// Normalized names in first-seen order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fonts.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_merges_subset_prefixes() {
        let catalog = FontCatalog::from_descriptors(vec![
            FontDescriptor::new("AAAAAA+ArialMT"),
            FontDescriptor::new("BBBBBB+ArialMT")
                .with_source(FontSource::Embedded(Arc::new(vec![1, 2, 3]))),
            FontDescriptor::new("CCCCCC+ArialMT")
                .with_source(FontSource::Embedded(Arc::new(vec![9, 9]))),
        ]);
        assert_eq!(catalog.len(), 1);
        let arial = catalog.get("ArialMT").unwrap();
        assert_eq!(arial.embedded_bytes().map(|b| b.as_slice()), Some(&[1u8, 2, 3][..]));
        // The raw name of the first occurrence is kept
        assert_eq!(arial.name, "AAAAAA+ArialMT");
    }

    #[test]
    fn test_lookup_ignores_prefix_and_case() {
        let catalog = FontCatalog::from_descriptors(vec![FontDescriptor::new("XYZABC+Calibri-Bold")]);
        assert!(catalog.get("Calibri-Bold").is_some());
        assert!(catalog.get("QWERTY+Calibri-Bold").is_some());
        assert!(catalog.get("calibri-bold").is_some());
        assert!(catalog.get("Calibri").is_none());
        assert!(catalog.embedded("Calibri-Bold").is_none());
    }

    #[test]
    fn test_preserves_first_seen_order() {
        let catalog = FontCatalog::from_descriptors(vec![
            FontDescriptor::new("Times-Roman"),
            FontDescriptor::new("ArialMT"),
            FontDescriptor::new("Times-Roman"),
        ]);
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names, vec!["Times-Roman", "ArialMT"]);
    }
}
