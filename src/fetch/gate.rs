//! Identifier gate: raw strings in, registered typed handles out.
//!
//! Syntax checks are pure; DOI existence checks hit the resolution registry
//! concurrently (one task per DOI, bounded only by the shared rate limiter)
//! and are all joined before [`IdentifierGate::admit`] returns.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::parser::{Handle, HandleKind, parse_handle};
use crate::registry::DoiRegistry;

use super::error::{Stage, StageError, StageFailure};

/// Attribution for a task that ended without reporting its identifier.
pub(crate) const UNKNOWN_IDENTIFIER: &str = "<unknown>";

/// Result of gating one batch of inputs.
#[derive(Debug, Default)]
pub struct GateOutcome {
    /// Admitted handles, in input order, without duplicates.
    pub handles: Vec<Handle>,
    /// One validation failure per rejected input.
    pub failures: Vec<StageFailure>,
}

/// Validates inputs and checks DOI registration.
#[derive(Debug, Clone)]
pub struct IdentifierGate {
    registry: DoiRegistry,
}

impl IdentifierGate {
    /// Creates a gate backed by `registry`.
    #[must_use]
    pub fn new(registry: DoiRegistry) -> Self {
        Self { registry }
    }

    /// Admits every input that parses and, for DOIs, is registered.
    ///
    /// Rejections are logged and returned, never raised. Inputs that
    /// normalize to an already-admitted handle are dropped with a warning.
    #[instrument(skip_all, fields(inputs = inputs.len()))]
    pub async fn admit<S: AsRef<str>>(&self, inputs: &[S]) -> GateOutcome {
        let mut failures = Vec::new();
        let mut admitted: Vec<(usize, Handle)> = Vec::new();
        let mut seen = HashSet::new();
        let mut checks = JoinSet::new();

        for (index, raw) in inputs.iter().enumerate() {
            let raw = raw.as_ref();
            let handle = match parse_handle(raw) {
                Ok(handle) => handle,
                Err(error) => {
                    warn!(input = %raw, error = %error, "rejecting identifier");
                    failures.push(StageFailure::new(raw.trim(), Stage::Validation, error.into()));
                    continue;
                }
            };

            // DOIs compare case-insensitively.
            let key = match handle.kind() {
                HandleKind::Doi => handle.value().to_lowercase(),
                HandleKind::Isbn => handle.value().to_string(),
            };
            if !seen.insert((handle.kind(), key)) {
                warn!(identifier = %handle, input = %raw, "duplicate identifier; skipping");
                continue;
            }

            match handle.kind() {
                HandleKind::Isbn => admitted.push((index, handle)),
                HandleKind::Doi => {
                    let registry = self.registry.clone();
                    checks.spawn(async move {
                        let registered = AssertUnwindSafe(registry.is_registered(handle.value()))
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|payload| {
                                Err(StageError::panicked(handle.value(), payload.as_ref()))
                            });
                        (index, handle, registered)
                    });
                }
            }
        }

        while let Some(joined) = checks.join_next().await {
            match joined {
                Ok((index, handle, Ok(true))) => {
                    debug!(identifier = %handle, "DOI registered");
                    admitted.push((index, handle));
                }
                Ok((_, handle, Ok(false))) => {
                    warn!(identifier = %handle, "rejecting unregistered DOI");
                    failures.push(StageFailure::new(
                        handle.value(),
                        Stage::Validation,
                        StageError::validation(handle.value(), "DOI is not registered"),
                    ));
                }
                Ok((_, handle, Err(error))) => {
                    warn!(identifier = %handle, error = %error, "DOI registration check failed");
                    failures.push(StageFailure::new(handle.value(), Stage::Validation, error));
                }
                Err(join_error) => {
                    warn!(error = %join_error, "registration check task did not complete");
                    failures.push(StageFailure::new(
                        UNKNOWN_IDENTIFIER,
                        Stage::Validation,
                        StageError::Panicked {
                            identifier: UNKNOWN_IDENTIFIER.to_string(),
                            message: join_error.to_string(),
                        },
                    ));
                }
            }
        }

        admitted.sort_by_key(|(index, _)| *index);
        GateOutcome {
            handles: admitted.into_iter().map(|(_, handle)| handle).collect(),
            failures,
        }
    }
}
