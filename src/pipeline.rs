// src/pipeline.rs
use crate::{
    error::IngestResult,
    load::{self, BatchOutcome, Target},
    process::{self, RecordSet},
    source::{SourceDescriptor, Strategy},
};
use chrono::{DateTime, Utc};
use std::{fmt, path::PathBuf};
use tracing::{error, info, warn};

/// Lifecycle of one source within a run. `Committed` and `Failed` are final.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Loading,
    Committed { rows: u64 },
    Failed { reason: String },
}

impl LoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadState::Committed { .. } | LoadState::Failed { .. })
    }

    /// Move to `next` if the transition is allowed; returns whether it was.
    pub fn advance(&mut self, next: LoadState) -> bool {
        let allowed = matches!(
            (&*self, &next),
            (LoadState::Pending, LoadState::Loading)
                | (LoadState::Pending, LoadState::Failed { .. })
                | (LoadState::Loading, LoadState::Committed { .. })
                | (LoadState::Loading, LoadState::Failed { .. })
        );
        if allowed {
            *self = next;
        }
        allowed
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Pending => f.write_str("PENDING"),
            LoadState::Loading => f.write_str("LOADING"),
            LoadState::Committed { rows } => write!(f, "COMMITTED ({} rows)", rows),
            LoadState::Failed { reason } => write!(f, "FAILED ({})", reason),
        }
    }
}

/// What happened to one source.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub table: String,
    pub file_path: PathBuf,
    pub strategy: Strategy,
    pub state: LoadState,
    /// Set once the loader ran; absent when the file never got that far.
    pub outcome: Option<BatchOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SourceReport {
    fn new(desc: &SourceDescriptor) -> Self {
        Self {
            table: desc.table.clone(),
            file_path: desc.file_path.clone(),
            strategy: desc.strategy,
            state: LoadState::Pending,
            outcome: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Advance the state, logging a rejected transition.
    fn transition(&mut self, next: LoadState) -> bool {
        let moved = self.state.advance(next);
        if !moved {
            warn!(table = %self.table, state = %self.state, "ignored transition out of state");
        }
        moved
    }

    fn finish(&mut self, state: LoadState) {
        self.transition(state);
        self.finished_at = Some(Utc::now());
    }

    pub fn is_committed(&self) -> bool {
        matches!(self.state, LoadState::Committed { .. })
    }
}

/// Read, relabel and normalize one source file.
pub fn prepare_source(desc: &SourceDescriptor) -> IngestResult<RecordSet> {
    let raw = process::read_csv(&desc.file_path)?;
    info!(path = %desc.file_path.display(), rows = raw.rows.len(), "loaded CSV file");

    let mut set = process::apply_mapping(raw, &desc.mapping(), &desc.file_path)?;
    process::normalize(&mut set, &desc.numeric_columns);
    Ok(set)
}

/// Run one source through mapper, normalizer and loader.
#[tracing::instrument(level = "info", skip_all, fields(table = %desc.table, strategy = %desc.strategy))]
pub async fn process_source<T: Target + ?Sized>(
    target: &mut T,
    desc: &SourceDescriptor,
) -> SourceReport {
    let mut report = SourceReport::new(desc);

    let set = match prepare_source(desc) {
        Ok(set) => set,
        Err(e) => {
            error!(error = %e, "skipping upload due to loading issues");
            report.finish(LoadState::Failed {
                reason: e.to_string(),
            });
            return report;
        }
    };

    report.transition(LoadState::Loading);
    let outcome = load::load(target, &set, &desc.table, desc.strategy).await;
    let state = match outcome.clone().into_result(&desc.table) {
        Ok(rows) => LoadState::Committed { rows },
        Err(e) => LoadState::Failed {
            reason: e.to_string(),
        },
    };
    report.outcome = Some(outcome);
    report.finish(state);
    report
}

/// Process every source in order against one target. A failed source never
/// stops the ones after it.
pub async fn run_pipeline<T: Target + ?Sized>(
    target: &mut T,
    sources: &[SourceDescriptor],
) -> Vec<SourceReport> {
    let mut reports = Vec::with_capacity(sources.len());
    for desc in sources {
        reports.push(process_source(target, desc).await);
    }
    reports
}

/// One log line per source plus a total.
pub fn log_summary(reports: &[SourceReport]) {
    for r in reports {
        let elapsed = r
            .finished_at
            .map(|end| (end - r.started_at).num_milliseconds())
            .unwrap_or_default();
        if r.is_committed() {
            info!(table = %r.table, state = %r.state, elapsed_ms = elapsed, "source done");
        } else {
            warn!(table = %r.table, state = %r.state, elapsed_ms = elapsed, "source done");
        }
    }
    let ok = reports.iter().filter(|r| r.is_committed()).count();
    info!(committed = ok, failed = reports.len() - ok, "run finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_final() {
        let mut s = LoadState::Pending;
        assert!(s.advance(LoadState::Loading));
        assert!(s.advance(LoadState::Committed { rows: 3 }));
        assert!(s.is_terminal());
        assert!(!s.advance(LoadState::Failed {
            reason: "late".into()
        }));
        assert!(!s.advance(LoadState::Loading));
        assert_eq!(s, LoadState::Committed { rows: 3 });
    }

    #[test]
    fn report_refuses_to_reopen_a_finished_source() {
        let desc = SourceDescriptor::new(
            "day_wise.csv",
            "day_wise",
            vec![crate::source::Column::new("date")],
            vec![],
            Strategy::Row,
        );
        let mut report = SourceReport::new(&desc);
        assert!(report.transition(LoadState::Loading));
        report.finish(LoadState::Committed { rows: 2 });

        assert!(!report.transition(LoadState::Loading));
        assert_eq!(report.state, LoadState::Committed { rows: 2 });
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn pending_can_fail_but_not_commit() {
        let mut s = LoadState::Pending;
        assert!(!s.advance(LoadState::Committed { rows: 1 }));
        assert!(s.advance(LoadState::Failed {
            reason: "missing file".into()
        }));
    }
}
