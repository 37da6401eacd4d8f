//! Property tests for name normalization, matching tolerances and caching.

use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

use pdf_fontkeeper::config::{FallbackFont, MatchPolicy};
use pdf_fontkeeper::editor::CorrespondenceMatcher;
use pdf_fontkeeper::fonts::{normalize_font_name, FontCache, FontCatalog, FontLocator, FontResolver};
use pdf_fontkeeper::TextRun;
use proptest::prelude::*;

proptest! {
    #[test]
    fn normalize_strips_subset_prefix(prefix in "[A-Z]{6}", name in "[A-Za-z][A-Za-z0-9-]{0,20}") {
        let tagged = format!("{}+{}", prefix, name);
        prop_assert_eq!(normalize_font_name(&tagged), name);
    }

    #[test]
    fn normalize_is_idempotent(name in "([A-Z]{6}\\+){0,3}[A-Za-z0-9+ -]{0,24}") {
        let once = normalize_font_name(&name);
        prop_assert_eq!(normalize_font_name(&once), once.clone());
    }

    #[test]
    fn matcher_accepts_boundary_and_rejects_beyond(
        x in 0i32..500,
        y in 0i32..700,
        dx_sign in prop::bool::ANY,
        dy_sign in prop::bool::ANY,
    ) {
        let policy = MatchPolicy::default();
        let matcher = CorrespondenceMatcher::new(policy);
        let before = TextRun::new(0, x as f32, y as f32, 80.0, 12.0, "Hello", "ArialMT");
        let sx = if dx_sign { 1.0 } else { -1.0 };
        let sy = if dy_sign { 1.0 } else { -1.0 };

        let mut edge = before.clone();
        edge.x += sx * policy.x_tolerance;
        edge.y += sy * policy.y_tolerance;
        prop_assert_eq!(matcher.score(&before, "Hello", &edge), Some(policy.max_score()));

        let mut beyond = before.clone();
        beyond.x += sx * (policy.x_tolerance + 1.0);
        beyond.y += sy * (policy.y_tolerance + 1.0);
        let expected = policy.max_score() - policy.x_weight - policy.y_weight;
        prop_assert_eq!(matcher.score(&before, "Hello", &beyond), Some(expected));
    }
}

/// Locator that always finds the same file and counts lookups.
struct CountingLocator {
    calls: Cell<usize>,
}

impl FontLocator for CountingLocator {
    fn find(&self, _name: &str, _bold: bool, _italic: bool) -> Option<PathBuf> {
        self.calls.set(self.calls.get() + 1);
        None
    }
}

#[test]
fn test_cache_returns_identical_descriptor() {
    let resolver = FontResolver::new(CountingLocator { calls: Cell::new(0) }, FallbackFont::default());
    let catalog = FontCatalog::new();
    let mut cache = FontCache::new();

    let first = resolver.resolve_cached(&mut cache, "Calibri-Bold", true, false, &catalog);
    let second = resolver.resolve_cached(&mut cache, "ABCDEF+Calibri-Bold", true, false, &catalog);

    assert!(Rc::ptr_eq(&first.descriptor, &second.descriptor));
    assert_eq!(resolver.locator().calls.get(), 1);
    assert_eq!(cache.len(), 1);
}
