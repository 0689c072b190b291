use crate::normalize::Vocabulary;
use crate::similarity::jaro_winkler;

pub const ACCEPT_THRESHOLD: f64 = 0.80;
pub const REVIEW_THRESHOLD: f64 = 0.85;
pub const NORMALIZED_NAME_THRESHOLD: f64 = 0.90;
pub const EXACT_NAME_SCORE: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    ExactName,
    NormalizedName,
    Fuzzy,
}

impl MatchMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExactName => "exact_name",
            Self::NormalizedName => "normalized_name",
            Self::Fuzzy => "fuzzy",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDistrict {
    pub ref_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchDecision {
    pub ref_id: String,
    pub canonical_name: String,
    pub normalized_incoming: String,
    pub normalized_candidate: String,
    pub method: MatchMethod,
    pub score: f64,
    pub needs_review: bool,
}

pub fn accepts(score: f64) -> bool {
    score >= ACCEPT_THRESHOLD
}

pub fn needs_review(score: f64) -> bool {
    score < REVIEW_THRESHOLD
}

pub fn method_for_score(score: f64) -> MatchMethod {
    if score >= NORMALIZED_NAME_THRESHOLD {
        MatchMethod::NormalizedName
    } else {
        MatchMethod::Fuzzy
    }
}

// Scans candidates in supplied order; the store hands them over sorted by
// ref_id, so a score tie resolves to the lowest reference identifier.
pub fn best_match(
    incoming_name: &str,
    candidates: &[ReferenceDistrict],
    vocabulary: &Vocabulary,
) -> Option<MatchDecision> {
    let normalized_incoming = vocabulary.normalize(incoming_name);
    if normalized_incoming.is_empty() {
        return None;
    }

    let mut best: Option<(f64, &ReferenceDistrict, String)> = None;
    for candidate in candidates {
        let normalized_candidate = vocabulary.normalize(&candidate.name);
        if normalized_candidate.is_empty() {
            continue;
        }

        if normalized_candidate == normalized_incoming {
            // first exact match wins outright
            return Some(MatchDecision {
                ref_id: candidate.ref_id.clone(),
                canonical_name: candidate.name.clone(),
                normalized_incoming,
                normalized_candidate,
                method: MatchMethod::ExactName,
                score: EXACT_NAME_SCORE,
                needs_review: needs_review(EXACT_NAME_SCORE),
            });
        }

        let score = jaro_winkler(&normalized_incoming, &normalized_candidate);
        if score <= 0.0 || !accepts(score) {
            continue;
        }
        let beats_running_best = match &best {
            Some((best_score, _, _)) => score > *best_score,
            None => true,
        };
        if beats_running_best {
            best = Some((score, candidate, normalized_candidate));
        }
    }

    best.map(|(score, candidate, normalized_candidate)| MatchDecision {
        ref_id: candidate.ref_id.clone(),
        canonical_name: candidate.name.clone(),
        normalized_incoming,
        normalized_candidate,
        method: method_for_score(score),
        score,
        needs_review: needs_review(score),
    })
}
