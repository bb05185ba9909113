use rayon::prelude::*;

use crate::discovery::Artifact;
use crate::fingerprint::Fingerprint;
use crate::store::FingerprintStore;

/// Which signals differ between the stored and the current fingerprint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Changes {
    pub timestamp: bool,
    pub size: bool,
    pub hash: bool,
}

impl Changes {
    pub fn between(stored: &Fingerprint, current: &Fingerprint) -> Self {
        Self {
            timestamp: stored.modified_at != current.modified_at,
            size: stored.size_bytes != current.size_bytes,
            // An empty current hash means hashing failed: never trust it as a match.
            hash: current.content_hash.is_empty() || stored.content_hash != current.content_hash,
        }
    }

    pub fn any(self) -> bool {
        self.timestamp || self.size || self.hash
    }

    /// `before -> after` for every differing signal, e.g. `size: 50 -> 60 bytes`.
    pub fn describe(self, stored: &Fingerprint, current: &Fingerprint) -> String {
        let mut parts = Vec::new();
        if self.timestamp {
            parts.push(format!(
                "time: {} -> {}",
                format_timestamp(stored.modified_at),
                format_timestamp(current.modified_at)
            ));
        }
        if self.size {
            parts.push(format!(
                "size: {} -> {} bytes",
                stored.size_bytes, current.size_bytes
            ));
        }
        if self.hash {
            let before = if stored.content_hash.is_empty() {
                "none"
            } else {
                stored.short_hash()
            };
            let after = if current.content_hash.is_empty() {
                "error"
            } else {
                current.short_hash()
            };
            parts.push(format!("hash: {before} -> {after}"));
        }
        parts.join(", ")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Staleness {
    Unchanged,
    Changed(Changes),
}

impl Staleness {
    pub fn is_changed(self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// Compare `current` against the stored entry. An absent entry compares as the default
/// fingerprint, which no real file matches.
pub fn classify(stored: Option<&Fingerprint>, current: &Fingerprint) -> Staleness {
    let never = Fingerprint::default();
    let changes = Changes::between(stored.unwrap_or(&never), current);
    if changes.any() {
        Staleness::Changed(changes)
    } else {
        Staleness::Unchanged
    }
}

/// A changed artifact together with the fingerprint observed before rendering it.
///
/// That fingerprint is what gets recorded on success, so an edit made while the tool is
/// running is picked up by the next run.
#[derive(Clone, Debug, PartialEq)]
pub struct StaleArtifact {
    pub artifact: Artifact,
    pub fingerprint: Fingerprint,
    pub changes: Changes,
}

#[derive(Clone, Debug, Default)]
pub struct StalenessReport {
    /// Changed artifacts, in discovery order.
    pub changed: Vec<StaleArtifact>,
    pub unchanged: Vec<Artifact>,
}

impl StalenessReport {
    pub fn total(&self) -> usize {
        self.changed.len() + self.unchanged.len()
    }
}

/// Fingerprint every artifact and split them into changed and unchanged.
///
/// Hashing runs on a rayon pool (`threads == 0` uses the global pool); results keep
/// discovery order.
#[tracing::instrument(skip_all, fields(artifacts = artifacts.len()))]
pub fn detect(
    artifacts: &[Artifact],
    store: &FingerprintStore,
    threads: usize,
) -> StalenessReport {
    let probes = probe_all(artifacts, threads);

    let mut report = StalenessReport::default();
    for (artifact, current) in artifacts.iter().zip(probes) {
        let stored = store.get(&artifact.identity);
        match classify(stored, &current) {
            Staleness::Changed(changes) => {
                let never = Fingerprint::default();
                tracing::info!(
                    name = %artifact.display_name,
                    changes = %changes.describe(stored.unwrap_or(&never), &current),
                    "changed"
                );
                report.changed.push(StaleArtifact {
                    artifact: artifact.clone(),
                    fingerprint: current,
                    changes,
                });
            }
            Staleness::Unchanged => {
                tracing::info!(
                    name = %artifact.display_name,
                    modified = %format_timestamp(current.modified_at),
                    "unchanged"
                );
                report.unchanged.push(artifact.clone());
            }
        }
    }

    tracing::info!(
        total = report.total(),
        changed = report.changed.len(),
        unchanged = report.unchanged.len(),
        "staleness check complete"
    );
    report
}

fn probe_all(artifacts: &[Artifact], threads: usize) -> Vec<Fingerprint> {
    let probe = || {
        artifacts
            .par_iter()
            .map(|a| Fingerprint::probe(&a.location))
            .collect::<Vec<_>>()
    };

    if threads == 0 {
        return probe();
    }
    match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool.install(probe),
        Err(e) => {
            tracing::warn!(error = %e, "failed to build hashing pool, using the global pool");
            probe()
        }
    }
}

/// Local `YYYY-MM-DD HH:MM:SS`, or `never` for a zero timestamp.
pub fn format_timestamp(secs: f64) -> String {
    if secs <= 0.0 {
        return "never".to_string();
    }
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9) as u32;
    match chrono::DateTime::from_timestamp(whole, nanos) {
        Some(utc) => utc
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => format!("{secs}"),
    }
}

#[cfg(test)]
#[path = "../tests/unit/staleness.rs"]
mod tests;
