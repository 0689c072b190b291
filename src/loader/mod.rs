use log::{info, warn};
use serde::Serialize;
use serde_json::json;

use crate::matcher::{MatchMethod, best_match};
use crate::normalize::Vocabulary;
use crate::records::RosterRecord;
use crate::store::{NewMatchEdge, RosterStore};

pub const UNMATCHED_SAMPLE_MAX: usize = 10;

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub jurisdiction: String,
    pub source: String,
    pub source_hash: String,
    pub vocabulary: Vocabulary,
}

#[derive(Debug)]
pub enum LoadError {
    AlreadyLoaded { jurisdiction: String, existing: i64 },
    Store(rusqlite::Error),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyLoaded {
                jurisdiction,
                existing,
            } => write!(
                f,
                "jurisdiction `{jurisdiction}` already has {existing} roster records; \
                 delete its batches before re-loading"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<rusqlite::Error> for LoadError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub batch_id: i64,
    pub jurisdiction: String,
    pub source: String,
    pub incoming: usize,
    pub loaded: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub errors: usize,
    pub exact_name: usize,
    pub normalized_name: usize,
    pub fuzzy: usize,
    pub needs_review: usize,
    pub unmatched_sample: Vec<String>,
    pub coverage_before: f64,
    pub coverage_after: f64,
}

pub struct Loader<'a> {
    store: &'a RosterStore,
    config: LoaderConfig,
}

impl<'a> Loader<'a> {
    pub fn new(store: &'a RosterStore, config: LoaderConfig) -> Self {
        Self { store, config }
    }

    pub fn run(&self, records: &[RosterRecord]) -> Result<RunSummary, LoadError> {
        let jurisdiction = self.config.jurisdiction.to_lowercase();

        // idempotency guard: never load a jurisdiction twice
        let existing = self.store.roster_record_count(&jurisdiction)?;
        if existing > 0 {
            return Err(LoadError::AlreadyLoaded {
                jurisdiction,
                existing,
            });
        }

        let candidates = self.store.reference_candidates(&jurisdiction)?;
        let coverage_before = self.coverage(&jurisdiction)?;
        let batch_id = self.store.create_batch(
            &jurisdiction,
            &self.config.source,
            &self.config.source_hash,
            records.len(),
        )?;
        info!(
            "batch {batch_id}: loading {} records for `{jurisdiction}` against {} candidates",
            records.len(),
            candidates.len()
        );

        let mut loaded = 0usize;
        let mut matched = 0usize;
        let mut errors = 0usize;
        let mut exact_name = 0usize;
        let mut normalized_name = 0usize;
        let mut fuzzy = 0usize;
        let mut review = 0usize;
        let mut unmatched_names = Vec::new();

        for record in records {
            if !record.jurisdiction.eq_ignore_ascii_case(&jurisdiction) {
                warn!(
                    "batch {batch_id}: row `{}` carries jurisdiction `{}`, expected `{jurisdiction}`",
                    record.name, record.jurisdiction
                );
                errors += 1;
                continue;
            }

            let payload = match serde_json::to_string(record) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!("batch {batch_id}: row `{}` payload failed: {err}", record.name);
                    errors += 1;
                    continue;
                }
            };
            let record_id = match self.store.insert_record(batch_id, record, &payload) {
                Ok(id) => id,
                Err(err) => {
                    warn!("batch {batch_id}: row `{}` insert failed: {err}", record.name);
                    errors += 1;
                    continue;
                }
            };
            loaded += 1;

            let Some(decision) = best_match(&record.name, &candidates, &self.config.vocabulary)
            else {
                unmatched_names.push(record.name.clone());
                continue;
            };

            let detail = json!({
                "incoming_name": record.name,
                "normalized_incoming": decision.normalized_incoming,
                "candidate_name": decision.canonical_name,
                "normalized_candidate": decision.normalized_candidate,
            })
            .to_string();
            let edge = NewMatchEdge {
                record_id,
                ref_id: &decision.ref_id,
                batch_id,
                method: decision.method.as_str(),
                confidence: decision.score,
                needs_review: decision.needs_review,
                detail: &detail,
            };
            if let Err(err) = self.store.insert_match_edge(&edge) {
                warn!("batch {batch_id}: edge for `{}` failed: {err}", record.name);
                errors += 1;
                unmatched_names.push(record.name.clone());
                continue;
            }

            matched += 1;
            match decision.method {
                MatchMethod::ExactName => exact_name += 1,
                MatchMethod::NormalizedName => normalized_name += 1,
                MatchMethod::Fuzzy => fuzzy += 1,
            }
            if decision.needs_review {
                review += 1;
            }
        }

        self.store.finalize_batch(batch_id, loaded, loaded, errors)?;
        let coverage_after = self.coverage(&jurisdiction)?;
        info!(
            "batch {batch_id}: loaded={loaded} matched={matched} unmatched={} errors={errors}",
            unmatched_names.len()
        );

        let unmatched = unmatched_names.len();
        unmatched_names.truncate(UNMATCHED_SAMPLE_MAX);
        Ok(RunSummary {
            batch_id,
            jurisdiction,
            source: self.config.source.clone(),
            incoming: records.len(),
            loaded,
            matched,
            unmatched,
            errors,
            exact_name,
            normalized_name,
            fuzzy,
            needs_review: review,
            unmatched_sample: unmatched_names,
            coverage_before,
            coverage_after,
        })
    }

    fn coverage(&self, jurisdiction: &str) -> Result<f64, LoadError> {
        let total = self.store.reference_count(jurisdiction)?;
        if total == 0 {
            return Ok(0.0);
        }
        let matched = self.store.matched_reference_count(jurisdiction)?;
        Ok(matched as f64 / total as f64)
    }
}
