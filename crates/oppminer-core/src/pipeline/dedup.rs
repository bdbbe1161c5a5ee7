//! Idea deduplication.
//!
//! New ideas are screened against prior persisted names (strict
//! threshold: only near-identical names are rejected) and against ideas
//! already accepted in this batch (loose threshold). Accepted ideas join
//! the batch reference set, so each candidate sees everything accepted
//! before it.

use std::collections::HashSet;

use crate::idea::{name_norm, Idea};
use crate::pipeline::{DEDUP_BATCH_THRESHOLD, DEDUP_PERSISTED_THRESHOLD, MIN_SCORE_THRESHOLD};

/// Minimum similarity implied by an exact persona match.
const PERSONA_BONUS: f64 = 0.3;

/// Why a candidate idea was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Too similar to an idea persisted by a prior run.
    SimilarToExisting { name: String, similarity: f64 },
    /// Too similar to an idea accepted earlier in this batch.
    SimilarInBatch { name: String, similarity: f64 },
    /// Below the minimum score threshold.
    BelowScoreThreshold,
}

struct RefEntry {
    name: String,
    tokens: HashSet<String>,
    persona: String,
}

impl RefEntry {
    fn new(name: &str, target_user: &str) -> Self {
        RefEntry {
            name: name.to_string(),
            tokens: name_tokens(name),
            persona: name_norm(target_user),
        }
    }
}

/// Screens candidate ideas against prior and in-batch reference sets.
pub struct Deduplicator {
    prior: Vec<RefEntry>,
    accepted: Vec<RefEntry>,
}

impl Deduplicator {
    /// Build a deduplicator seeded with `(name, target_user)` pairs from
    /// prior runs.
    pub fn new(prior_ideas: &[(String, String)]) -> Self {
        Deduplicator {
            prior: prior_ideas
                .iter()
                .map(|(name, user)| RefEntry::new(name, user))
                .collect(),
            accepted: Vec::new(),
        }
    }

    /// Screen one candidate. On acceptance the candidate joins the
    /// in-batch reference set.
    pub fn screen(&mut self, idea: &Idea) -> Result<(), Rejection> {
        if idea.score < MIN_SCORE_THRESHOLD {
            return Err(Rejection::BelowScoreThreshold);
        }

        let candidate = RefEntry::new(&idea.name, &idea.target_user);

        for existing in &self.prior {
            let similarity = pair_similarity(&candidate, existing);
            if similarity > DEDUP_PERSISTED_THRESHOLD {
                return Err(Rejection::SimilarToExisting {
                    name: existing.name.clone(),
                    similarity,
                });
            }
        }

        for existing in &self.accepted {
            let similarity = pair_similarity(&candidate, existing);
            if similarity > DEDUP_BATCH_THRESHOLD {
                return Err(Rejection::SimilarInBatch {
                    name: existing.name.clone(),
                    similarity,
                });
            }
        }

        self.accepted.push(candidate);
        Ok(())
    }

    /// Number of ideas accepted so far.
    pub fn accepted_count(&self) -> usize {
        self.accepted.len()
    }
}

/// Tokens of the normalized name longer than two characters.
fn name_tokens(name: &str) -> HashSet<String> {
    name_norm(name)
        .split_whitespace()
        .filter(|token| token.len() > 2)
        .map(str::to_string)
        .collect()
}

/// `max(jaccard, persona bonus)`: word-set Jaccard over the name tokens,
/// floored at [`PERSONA_BONUS`] when the normalized personas match.
fn pair_similarity(a: &RefEntry, b: &RefEntry) -> f64 {
    let jaccard = jaccard_similarity(&a.tokens, &b.tokens);
    let persona_bonus =
        if !a.persona.is_empty() && a.persona == b.persona {
            PERSONA_BONUS
        } else {
            0.0
        };
    jaccard.max(persona_bonus)
}

/// Jaccard similarity between two word sets. Two empty sets count as
/// disjoint here: two ideas with no comparable tokens are not duplicates.
fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}
