//! Keyword, semantic and hybrid retrieval plus the iterative refinement loop.
//!
//! Every entry point here returns a sequence of hits, never an error: provider
//! faults are logged and folded into the typed [`RetrievalOutcome`] or
//! [`RefinementReport`] so callers that care can still tell "no matches" apart
//! from "the index was down".

use crate::embeddings::EmbeddingProvider;
use crate::models::{Hit, HitIdentity, SearchMode};
use crate::store::IndexQuery;
use crate::traits::DocumentIndex;
use crate::SearchError;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultStage {
    Embedding,
    Index,
}

impl fmt::Display for FaultStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultStage::Embedding => f.write_str("embedding"),
            FaultStage::Index => f.write_str("index"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalFault {
    pub stage: FaultStage,
    pub message: String,
}

impl RetrievalFault {
    fn new(stage: FaultStage, error: &SearchError) -> Self {
        Self {
            stage,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for RetrievalFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fault: {}", self.stage, self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalOutcome {
    Matched(Vec<Hit>),
    NoMatches,
    Fault(RetrievalFault),
    /// Hybrid query failed and keyword retrieval answered instead.
    Fallback {
        cause: RetrievalFault,
        keyword: Box<RetrievalOutcome>,
    },
}

impl RetrievalOutcome {
    fn from_hits(mut hits: Vec<Hit>, top_k: usize) -> Self {
        hits.truncate(top_k);
        if hits.is_empty() {
            RetrievalOutcome::NoMatches
        } else {
            RetrievalOutcome::Matched(hits)
        }
    }

    pub fn hits(&self) -> &[Hit] {
        match self {
            RetrievalOutcome::Matched(hits) => hits,
            RetrievalOutcome::NoMatches | RetrievalOutcome::Fault(_) => &[],
            RetrievalOutcome::Fallback { keyword, .. } => keyword.hits(),
        }
    }

    pub fn into_hits(self) -> Vec<Hit> {
        match self {
            RetrievalOutcome::Matched(hits) => hits,
            RetrievalOutcome::NoMatches | RetrievalOutcome::Fault(_) => Vec::new(),
            RetrievalOutcome::Fallback { keyword, .. } => keyword.into_hits(),
        }
    }

    /// The fault that caused this outcome, if any. For a fallback this is the
    /// hybrid failure, not the keyword result.
    pub fn fault(&self) -> Option<&RetrievalFault> {
        match self {
            RetrievalOutcome::Fault(fault) => Some(fault),
            RetrievalOutcome::Fallback { cause, .. } => Some(cause),
            RetrievalOutcome::Matched(_) | RetrievalOutcome::NoMatches => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundTrace {
    pub round: usize,
    pub query: String,
    pub hit_count: usize,
    pub new_hits: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    NoSteps,
    StepsExhausted,
    EmptyRound { round: usize },
    Fault { round: usize, fault: RetrievalFault },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefinementReport {
    pub hits: Vec<Hit>,
    pub rounds: Vec<RoundTrace>,
    pub termination: Termination,
    pub final_query: String,
}

/// First period-delimited fragment of `text`, or the whole text if it has no
/// period. No trimming.
pub fn expansion_term(text: &str) -> &str {
    text.split('.').next().unwrap_or(text)
}

/// Insertion-ordered hit list that drops repeats by [`Hit::identity`].
#[derive(Debug, Default)]
struct HitAccumulator {
    seen: HashSet<HitIdentity>,
    hits: Vec<Hit>,
}

impl HitAccumulator {
    fn extend(&mut self, round: &[Hit]) -> usize {
        let before = self.hits.len();
        for hit in round {
            if self.seen.insert(hit.identity()) {
                self.hits.push(hit.clone());
            }
        }
        self.hits.len() - before
    }

    fn into_hits(self) -> Vec<Hit> {
        self.hits
    }
}

/// Runs queries against one document index and one embedding provider.
pub struct Retriever<I, E>
where
    I: DocumentIndex,
    E: EmbeddingProvider,
{
    index: I,
    embedder: E,
}

impl<I, E> Retriever<I, E>
where
    I: DocumentIndex + Send + Sync,
    E: EmbeddingProvider + Send + Sync,
{
    pub fn new(index: I, embedder: E) -> Self {
        Self { index, embedder }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub async fn keyword(&self, query_text: &str, top_k: usize) -> RetrievalOutcome {
        let top_k = top_k.max(1);
        match self
            .index
            .search(&IndexQuery::text_match(query_text, top_k))
            .await
        {
            Ok(hits) => RetrievalOutcome::from_hits(hits, top_k),
            Err(error) => {
                warn!(mode = "keyword", stage = "index", %error, "Keyword search error");
                RetrievalOutcome::Fault(RetrievalFault::new(FaultStage::Index, &error))
            }
        }
    }

    pub async fn semantic(&self, query_text: &str, top_k: usize) -> RetrievalOutcome {
        let top_k = top_k.max(1);
        let vector = match self.embedder.embed(query_text).await {
            Ok(vector) => vector,
            Err(error) => {
                warn!(mode = "semantic", stage = "embedding", %error, "Semantic search error");
                return RetrievalOutcome::Fault(RetrievalFault::new(FaultStage::Embedding, &error));
            }
        };

        match self.index.search(&IndexQuery::knn(vector, top_k)).await {
            Ok(hits) => RetrievalOutcome::from_hits(hits, top_k),
            Err(error) => {
                warn!(mode = "semantic", stage = "index", %error, "Semantic search error");
                RetrievalOutcome::Fault(RetrievalFault::new(FaultStage::Index, &error))
            }
        }
    }

    /// One OR-combined knn + match query. Any failure, including the embedding
    /// step, degrades to plain keyword retrieval with the same arguments.
    pub async fn hybrid(&self, query_text: &str, top_k: usize) -> RetrievalOutcome {
        let top_k = top_k.max(1);
        let combined = match self.embedder.embed(query_text).await {
            Ok(vector) => self
                .index
                .search(&IndexQuery::hybrid(query_text, vector, top_k))
                .await
                .map_err(|error| RetrievalFault::new(FaultStage::Index, &error)),
            Err(error) => Err(RetrievalFault::new(FaultStage::Embedding, &error)),
        };

        match combined {
            Ok(hits) => RetrievalOutcome::from_hits(hits, top_k),
            Err(cause) => {
                warn!(
                    mode = "hybrid",
                    stage = %cause.stage,
                    error = %cause.message,
                    "Hybrid search error, falling back to keyword search"
                );
                let keyword = self.keyword(query_text, top_k).await;
                RetrievalOutcome::Fallback {
                    cause,
                    keyword: Box::new(keyword),
                }
            }
        }
    }

    pub async fn keyword_search(&self, query_text: &str, top_k: usize) -> Vec<Hit> {
        self.keyword(query_text, top_k).await.into_hits()
    }

    pub async fn semantic_search(&self, query_text: &str, top_k: usize) -> Vec<Hit> {
        self.semantic(query_text, top_k).await.into_hits()
    }

    pub async fn hybrid_search(&self, query_text: &str, top_k: usize) -> Vec<Hit> {
        self.hybrid(query_text, top_k).await.into_hits()
    }

    pub async fn retrieve(&self, mode: SearchMode, query_text: &str, top_k: usize) -> RetrievalOutcome {
        match mode {
            SearchMode::Keyword => self.keyword(query_text, top_k).await,
            SearchMode::Semantic => self.semantic(query_text, top_k).await,
            SearchMode::Hybrid => self.hybrid(query_text, top_k).await,
        }
    }

    pub async fn search(&self, mode: SearchMode, query_text: &str, top_k: usize) -> Vec<Hit> {
        self.retrieve(mode, query_text, top_k).await.into_hits()
    }

    /// Keyword-only refinement: each round re-queries with the current query,
    /// keeps unseen hits, then appends the first sentence of the round's top
    /// hit to the query. Stops after `refinement_steps` rounds, on the first
    /// empty round, or on the first fault.
    pub async fn iterate(
        &self,
        query_text: &str,
        refinement_steps: usize,
        top_k: usize,
    ) -> RefinementReport {
        let mut current_query = query_text.to_string();
        let mut accumulated = HitAccumulator::default();
        let mut rounds = Vec::new();
        let mut termination = if refinement_steps == 0 {
            Termination::NoSteps
        } else {
            Termination::StepsExhausted
        };

        for round in 0..refinement_steps {
            let results = match self.keyword(&current_query, top_k).await {
                RetrievalOutcome::Fault(fault) => {
                    debug!(round, error = %fault, "stopping refinement with partial results");
                    termination = Termination::Fault { round, fault };
                    break;
                }
                outcome => outcome.into_hits(),
            };

            let Some(top_hit) = results.first() else {
                debug!(round, query = %current_query, "round returned no hits");
                rounds.push(RoundTrace {
                    round,
                    query: current_query.clone(),
                    hit_count: 0,
                    new_hits: 0,
                });
                termination = Termination::EmptyRound { round };
                break;
            };

            let term = expansion_term(&top_hit.text).to_string();
            let new_hits = accumulated.extend(&results);
            rounds.push(RoundTrace {
                round,
                query: current_query.clone(),
                hit_count: results.len(),
                new_hits,
            });
            debug!(round, hit_count = results.len(), new_hits, %term, "expanding query");

            current_query.push(' ');
            current_query.push_str(&term);
        }

        let hits = accumulated.into_hits();
        info!(
            rounds = rounds.len(),
            total_hits = hits.len(),
            termination = ?termination,
            "iterative search finished"
        );

        RefinementReport {
            hits,
            rounds,
            termination,
            final_query: current_query,
        }
    }

    pub async fn iterative_search(
        &self,
        query_text: &str,
        refinement_steps: usize,
        top_k: usize,
    ) -> Vec<Hit> {
        self.iterate(query_text, refinement_steps, top_k).await.hits
    }
}
