//! Prediction oracles: trained models reduced to one `predict` capability.
//!
//! The engine depends only on [`Oracle`]. Oracles are read-only once built
//! and shared across tickers behind `Arc`.

use crate::domain::error::TraderError;
use crate::domain::features::FeatureRow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OracleError {
    #[error("prediction failed: {0}")]
    Failed(String),

    #[error("no prediction produced")]
    NoPrediction,

    #[error("expected {expected} features, got {got}")]
    FeatureCount { expected: usize, got: usize },

    #[error("timed out after {millis} ms")]
    Timeout { millis: u128 },

    #[error("unresponsive: {stuck} timed-out calls still running")]
    Unresponsive { stuck: usize },
}

/// Model families an oracle can be backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    TreeEnsemble,
    GradientBoosted,
    Kernel,
    LinearElastic,
    Decomposition,
    SequenceNetwork,
}

impl ModelKind {
    pub const ALL: [ModelKind; 6] = [
        ModelKind::TreeEnsemble,
        ModelKind::GradientBoosted,
        ModelKind::Kernel,
        ModelKind::LinearElastic,
        ModelKind::Decomposition,
        ModelKind::SequenceNetwork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::TreeEnsemble => "tree_ensemble",
            ModelKind::GradientBoosted => "gradient_boosted",
            ModelKind::Kernel => "kernel",
            ModelKind::LinearElastic => "linear_elastic",
            ModelKind::Decomposition => "decomposition",
            ModelKind::SequenceNetwork => "sequence_network",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tree_ensemble" | "random_forest" => Ok(ModelKind::TreeEnsemble),
            "gradient_boosted" | "gradient_boosting" | "xgboost" => Ok(ModelKind::GradientBoosted),
            "kernel" | "svr" => Ok(ModelKind::Kernel),
            "linear_elastic" | "elastic_net" | "linear" => Ok(ModelKind::LinearElastic),
            "decomposition" | "prophet" => Ok(ModelKind::Decomposition),
            "sequence_network" | "lstm" | "sequence" => Ok(ModelKind::SequenceNetwork),
            other => Err(format!("unknown model kind '{other}'")),
        }
    }
}

pub trait Oracle: Send + Sync {
    fn kind(&self) -> ModelKind;

    /// Predicted next close for the bar described by `row`.
    fn predict(&self, row: &FeatureRow, as_of: NaiveDate) -> Result<f64, OracleError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleVote {
    pub model_id: String,
    pub predicted_next_price: f64,
}

/// Adapts a closure into an [`Oracle`], for callers with their own models.
pub struct FnOracle<F> {
    kind: ModelKind,
    predict: F,
}

impl<F> FnOracle<F>
where
    F: Fn(&FeatureRow, NaiveDate) -> Result<f64, OracleError> + Send + Sync,
{
    pub fn new(kind: ModelKind, predict: F) -> Self {
        Self { kind, predict }
    }
}

impl<F> Oracle for FnOracle<F>
where
    F: Fn(&FeatureRow, NaiveDate) -> Result<f64, OracleError> + Send + Sync,
{
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn predict(&self, row: &FeatureRow, as_of: NaiveDate) -> Result<f64, OracleError> {
        (self.predict)(row, as_of)
    }
}

/// Timed-out calls a [`TimedOracle`] tolerates before it stops spawning new ones.
pub const MAX_STUCK_CALLS: usize = 2;

const CALL_RUNNING: u8 = 0;
const CALL_FINISHED: u8 = 1;
const CALL_ABANDONED: u8 = 2;

/// Bounds a single prediction call. The inner call runs on its own thread;
/// on timeout the thread is abandoned and the vote counts as a failure.
///
/// Abandoned threads are counted until they return. While
/// [`MAX_STUCK_CALLS`] of them are still running, calls fail with
/// [`OracleError::Unresponsive`] without spawning, so a hung model holds at
/// most that many threads.
pub struct TimedOracle {
    inner: Arc<dyn Oracle>,
    timeout: Duration,
    stuck: Arc<AtomicUsize>,
}

impl TimedOracle {
    pub fn new(inner: Arc<dyn Oracle>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            stuck: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Timed-out calls whose threads have not returned yet.
    pub fn stuck_calls(&self) -> usize {
        self.stuck.load(Ordering::SeqCst)
    }
}

impl Oracle for TimedOracle {
    fn kind(&self) -> ModelKind {
        self.inner.kind()
    }

    fn predict(&self, row: &FeatureRow, as_of: NaiveDate) -> Result<f64, OracleError> {
        let stuck = self.stuck_calls();
        if stuck >= MAX_STUCK_CALLS {
            return Err(OracleError::Unresponsive { stuck });
        }

        let (tx, rx) = mpsc::channel();
        let state = Arc::new(AtomicU8::new(CALL_RUNNING));
        let inner = Arc::clone(&self.inner);
        let row = row.clone();
        let thread_state = Arc::clone(&state);
        let thread_stuck = Arc::clone(&self.stuck);
        thread::spawn(move || {
            let result = inner.predict(&row, as_of);
            let claimed = thread_state.compare_exchange(
                CALL_RUNNING,
                CALL_FINISHED,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
            match claimed {
                Ok(_) => {
                    let _ = tx.send(result);
                }
                Err(_) => {
                    thread_stuck.fetch_sub(1, Ordering::SeqCst);
                }
            }
        });

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                // Count before abandoning so the worker never decrements first.
                self.stuck.fetch_add(1, Ordering::SeqCst);
                let abandoned = state.compare_exchange(
                    CALL_RUNNING,
                    CALL_ABANDONED,
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                );
                if abandoned.is_ok() {
                    return Err(OracleError::Timeout {
                        millis: self.timeout.as_millis(),
                    });
                }
                // Finished right at the deadline; the result is on its way.
                self.stuck.fetch_sub(1, Ordering::SeqCst);
                rx.recv()
                    .unwrap_or_else(|_| Err(OracleError::Failed("oracle thread panicked".into())))
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(OracleError::Failed("oracle thread panicked".into()))
            }
        }
    }
}

#[derive(Clone)]
pub struct OracleMember {
    pub id: String,
    pub oracle: Arc<dyn Oracle>,
}

impl fmt::Debug for OracleMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleMember")
            .field("id", &self.id)
            .field("kind", &self.oracle.kind())
            .finish()
    }
}

/// The configured models for a run, in configuration order, plus the
/// tie-breaker. Validated at construction; immutable afterwards.
#[derive(Debug, Clone)]
pub struct OracleSet {
    members: Vec<OracleMember>,
    tie_breaker: usize,
}

impl OracleSet {
    pub fn new(
        members: Vec<(String, Arc<dyn Oracle>)>,
        tie_breaker: Option<&str>,
    ) -> Result<Self, TraderError> {
        if members.is_empty() {
            return Err(TraderError::EmptyModelSet);
        }

        let mut seen = HashSet::new();
        for (id, _) in &members {
            if !seen.insert(id.as_str()) {
                return Err(TraderError::DuplicateModel {
                    model_id: id.clone(),
                });
            }
        }

        let tie_breaker = match tie_breaker {
            None => 0,
            Some(wanted) => members
                .iter()
                .position(|(id, _)| id == wanted)
                .ok_or_else(|| TraderError::UnknownTieBreaker {
                    model_id: wanted.to_string(),
                })?,
        };

        Ok(Self {
            members: members
                .into_iter()
                .map(|(id, oracle)| OracleMember { id, oracle })
                .collect(),
            tie_breaker,
        })
    }

    /// Single-model convenience constructor.
    pub fn single(id: impl Into<String>, oracle: Arc<dyn Oracle>) -> Self {
        Self {
            members: vec![OracleMember {
                id: id.into(),
                oracle,
            }],
            tie_breaker: 0,
        }
    }

    /// Wrap every member in a [`TimedOracle`].
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let members = self
            .members
            .into_iter()
            .map(|m| OracleMember {
                id: m.id,
                oracle: Arc::new(TimedOracle::new(m.oracle, timeout)) as Arc<dyn Oracle>,
            })
            .collect();
        Self {
            members,
            tie_breaker: self.tie_breaker,
        }
    }

    pub fn members(&self) -> &[OracleMember] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn tie_breaker_index(&self) -> usize {
        self.tie_breaker
    }

    pub fn tie_breaker_id(&self) -> &str {
        &self.members[self.tie_breaker].id
    }

    pub fn ids(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.id.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(price: f64) -> Arc<dyn Oracle> {
        Arc::new(FnOracle::new(
            ModelKind::LinearElastic,
            move |_: &FeatureRow, _: NaiveDate| Ok(price),
        ))
    }

    fn row() -> FeatureRow {
        FeatureRow {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            close: 100.0,
            values: vec![1.0],
        }
    }

    #[test]
    fn model_kind_aliases() {
        assert_eq!("random_forest".parse(), Ok(ModelKind::TreeEnsemble));
        assert_eq!("XGBoost".parse(), Ok(ModelKind::GradientBoosted));
        assert_eq!("svr".parse(), Ok(ModelKind::Kernel));
        assert_eq!("elastic_net".parse(), Ok(ModelKind::LinearElastic));
        assert_eq!("prophet".parse(), Ok(ModelKind::Decomposition));
        assert_eq!("lstm".parse(), Ok(ModelKind::SequenceNetwork));
        assert!("mystery".parse::<ModelKind>().is_err());
        for kind in ModelKind::ALL {
            assert_eq!(kind.as_str().parse::<ModelKind>(), Ok(kind));
        }
    }

    #[test]
    fn empty_set_is_rejected() {
        let err = OracleSet::new(vec![], None).unwrap_err();
        assert!(matches!(err, TraderError::EmptyModelSet));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = OracleSet::new(
            vec![("a".into(), constant(1.0)), ("a".into(), constant(2.0))],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, TraderError::DuplicateModel { .. }));
    }

    #[test]
    fn tie_breaker_defaults_to_first() {
        let set = OracleSet::new(
            vec![("a".into(), constant(1.0)), ("b".into(), constant(2.0))],
            None,
        )
        .unwrap();
        assert_eq!(set.tie_breaker_id(), "a");
        assert_eq!(set.ids(), vec!["a", "b"]);
    }

    #[test]
    fn unknown_tie_breaker_is_rejected() {
        let err = OracleSet::new(vec![("a".into(), constant(1.0))], Some("z")).unwrap_err();
        assert!(matches!(err, TraderError::UnknownTieBreaker { .. }));
    }

    #[test]
    fn timed_oracle_passes_fast_results_through() {
        let timed = TimedOracle::new(constant(101.0), Duration::from_secs(5));
        assert_eq!(timed.predict(&row(), row().date), Ok(101.0));
        assert_eq!(timed.kind(), ModelKind::LinearElastic);
    }

    #[test]
    fn timed_oracle_times_out() {
        let slow: Arc<dyn Oracle> = Arc::new(FnOracle::new(ModelKind::SequenceNetwork, |_: &FeatureRow, _: NaiveDate| {
            thread::sleep(Duration::from_millis(500));
            Ok(1.0)
        }));
        let timed = TimedOracle::new(slow, Duration::from_millis(20));
        assert!(matches!(
            timed.predict(&row(), row().date),
            Err(OracleError::Timeout { millis: 20 })
        ));
    }

    #[test]
    fn hung_oracle_stops_spawning_threads() {
        let started = Arc::new(AtomicUsize::new(0));
        let release = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let hung: Arc<dyn Oracle> = {
            let started = Arc::clone(&started);
            let release = Arc::clone(&release);
            Arc::new(FnOracle::new(ModelKind::SequenceNetwork, move |_: &FeatureRow, _: NaiveDate| {
                started.fetch_add(1, Ordering::SeqCst);
                while !release.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
                Ok(1.0)
            }))
        };
        let timed = TimedOracle::new(hung, Duration::from_millis(2));

        for _ in 0..200 {
            assert!(timed.predict(&row(), row().date).is_err());
        }
        assert_eq!(started.load(Ordering::SeqCst), MAX_STUCK_CALLS);
        assert_eq!(timed.stuck_calls(), MAX_STUCK_CALLS);
        assert_eq!(
            timed.predict(&row(), row().date),
            Err(OracleError::Unresponsive {
                stuck: MAX_STUCK_CALLS
            })
        );

        // Once the hung calls return the oracle is tried again.
        release.store(true, Ordering::SeqCst);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while timed.stuck_calls() > 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(timed.stuck_calls(), 0);
        let _ = timed.predict(&row(), row().date);
        while started.load(Ordering::SeqCst) == MAX_STUCK_CALLS && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(started.load(Ordering::SeqCst), MAX_STUCK_CALLS + 1);
    }
}
