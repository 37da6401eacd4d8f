//! Pairing of a run before an edit with the run found after it.
//!
//! Redaction and reinsertion do not reproduce geometry to the point, so the
//! run written by an engine is found by scoring every candidate on the page
//! rather than by id.

use crate::config::MatchPolicy;
use crate::elements::TextRun;

/// Slack added to every tolerance so boundary values survive float rounding.
const BOUNDARY_EPSILON: f32 = 1e-3;

/// A candidate accepted by the matcher.
#[derive(Debug, Clone, PartialEq)]
pub struct Correspondence {
    /// Matched run
    pub run: TextRun,
    /// Score under the matching policy
    pub score: u32,
}

/// Scores candidate runs against an expected run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrespondenceMatcher {
    policy: MatchPolicy,
}

impl CorrespondenceMatcher {
    /// Matcher using `policy`.
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    /// The policy in use.
    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    /// Score one candidate; `None` when it is on another page.
    pub fn score(&self, before: &TextRun, expected_content: &str, candidate: &TextRun) -> Option<u32> {
        if candidate.page != before.page {
            return None;
        }
        let policy = &self.policy;
        let within = |a: f32, b: f32, tolerance: f32| (a - b).abs() <= tolerance + BOUNDARY_EPSILON;

        let mut score = policy.same_page_weight;
        if within(candidate.x, before.x, policy.x_tolerance) {
            score += policy.x_weight;
        }
        if within(candidate.y, before.y, policy.y_tolerance) {
            score += policy.y_weight;
        }
        if within(candidate.width, before.width, policy.size_tolerance)
            && within(candidate.height, before.height, policy.size_tolerance)
        {
            score += policy.size_weight;
        }

        let expected = expected_content.trim();
        let found = candidate.content.trim();
        if found == expected {
            score += policy.exact_content_weight;
        } else if !found.is_empty() && !expected.is_empty() && (found.contains(expected) || expected.contains(found)) {
            score += policy.partial_content_weight;
        }
        Some(score)
    }

    /// Best candidate at or above the minimum score.
    ///
    /// Equal scores go to the candidate closest to `before`.
    pub fn find(&self, before: &TextRun, expected_content: &str, candidates: &[TextRun]) -> Option<Correspondence> {
        let displacement = |run: &TextRun| (run.x - before.x).abs() + (run.y - before.y).abs();
        let mut best: Option<(&TextRun, u32)> = None;
        for candidate in candidates {
            let Some(score) = self.score(before, expected_content, candidate) else {
                continue;
            };
            if score < self.policy.min_score {
                continue;
            }
            let better = match best {
                None => true,
                Some((current, current_score)) => {
                    score > current_score
                        || (score == current_score && displacement(candidate) < displacement(current))
                },
            };
            if better {
                best = Some((candidate, score));
            }
        }
        best.map(|(run, score)| {
            log::trace!("Matched run '{}' with score {}", run.content, score);
            Correspondence {
                run: run.clone(),
                score,
            }
        })
    }
}
