use bon::Builder;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::warn;

use crate::db::Batch;
use crate::db::Db;
use crate::db::DbImpl;
use crate::db::LookupEntry;
use crate::db::StorageError;
use crate::resolve::ResolutionError;
use crate::resolve::Resolve;
use crate::resolve::ResolveExt;

/// Drives a whole run: one transaction, every name, one commit.
#[derive(Debug, Builder)]
pub struct Engine<R> {
    resolver: R,
    db: DbImpl,
}

/// Counts of what a run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Names processed.
    pub names: usize,
    /// Names that failed to resolve.
    pub failed: usize,
    /// Rows inserted.
    pub rows: usize,
}

impl<R> Engine<R>
where
    R: Resolve,
{
    /// Resolves every name in order and records its addresses, then commits
    /// and closes the database. `on_failure` is told about each name that
    /// could not be resolved.
    ///
    /// # Errors
    ///
    /// Any [`StorageError`]. Nothing from the run is committed in that case.
    pub async fn run<S>(
        &self,
        names: &[S],
        on_failure: impl FnMut(&str, &ResolutionError),
    ) -> Result<Summary, StorageError>
    where
        S: AsRef<str>,
    {
        let mut batch = self.db.begin().await?;
        let summary = record_lookups(&self.resolver, &mut batch, names, on_failure).await?;
        batch.commit().await?;
        self.db.close().await;

        info!(
            names = summary.names,
            failed = summary.failed,
            rows = summary.rows,
            "Committed lookups"
        );
        Ok(summary)
    }
}

/// Resolves each name and appends one row per address to `batch`.
///
/// Resolution failures are reported through `on_failure` and skipped; the
/// name contributes no rows. Storage failures are returned immediately.
///
/// # Errors
///
/// The first [`StorageError`] raised by `batch`.
#[instrument(skip_all, fields(names = names.len()))]
pub async fn record_lookups<R, B, S>(
    resolver: &R,
    batch: &mut B,
    names: &[S],
    mut on_failure: impl FnMut(&str, &ResolutionError),
) -> Result<Summary, StorageError>
where
    R: Resolve + ?Sized,
    B: Batch + Send,
    S: AsRef<str>,
{
    let mut summary = Summary::default();

    for name in names {
        let name = name.as_ref();
        summary.names += 1;

        let addrs = match resolver.resolve_all(name).await {
            Ok(addrs) => addrs,
            Err(error) => {
                warn!(name, %error, "Unable to resolve");
                summary.failed += 1;
                on_failure(name, &error);
                continue;
            }
        };

        for addr in addrs {
            debug!(name, %addr, "Recording lookup");
            batch.insert(&LookupEntry::new(name, addr)).await?;
            summary.rows += 1;
        }
    }

    Ok(summary)
}
