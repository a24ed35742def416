//! Runs one phase across many output nodes.
//!
//! Nodes of the same walk run concurrently, bounded by the configured
//! parallelism. Each node runs on the blocking pool because evaluation is a
//! synchronous call that may wait on other nodes. There is no ordering
//! between distinct addresses; diagnostics are reported in address order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::addrs::AbsOutputAddr;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::eval::EvalContext;
use crate::planner::OutputNode;

/// Default number of nodes evaluated at once.
pub const DEFAULT_PARALLELISM: usize = 10;

/// The walk being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Compute intended changes.
    Plan,
    /// Commit planned changes.
    Apply,
    /// Resynchronize stored values.
    Refresh,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::Refresh => "refresh",
        };
        write!(f, "{s}")
    }
}

/// Outcome of one walk.
#[derive(Debug, Clone, Serialize)]
pub struct WalkResult {
    /// Phase that was walked.
    pub phase: Phase,
    /// Nodes that finished without errors.
    pub succeeded: usize,
    /// Nodes that reported errors.
    pub failed: usize,
    /// All diagnostics, grouped by address.
    pub diagnostics: Diagnostics,
}

impl WalkResult {
    /// Returns true if no node reported an error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Drives a set of output nodes through one phase.
#[derive(Debug, Clone, Copy)]
pub struct Walker {
    parallelism: usize,
}

impl Walker {
    /// Creates a walker running at most `parallelism` nodes at once.
    /// Zero is treated as one.
    #[must_use]
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
        }
    }

    /// Returns the parallelism limit.
    #[must_use]
    pub const fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Runs every node once and aggregates the results.
    pub async fn walk(
        &self,
        phase: Phase,
        ctx: &EvalContext,
        nodes: Vec<Arc<dyn OutputNode>>,
    ) -> WalkResult {
        info!("Starting {phase} walk over {} outputs", nodes.len());

        let semaphore = Arc::new(Semaphore::new(self.parallelism));
        let mut tasks = JoinSet::new();
        let mut pending = HashMap::new();
        let mut outcomes: Vec<(Option<AbsOutputAddr>, Diagnostics)> = Vec::new();

        for node in nodes {
            let addr = node.addr().clone();
            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                outcomes.push((Some(addr.clone()), not_completed(&addr, "the walk was shut down")));
                continue;
            };

            let ctx = ctx.clone();
            let task_addr = addr.clone();
            let handle = tasks.spawn_blocking(move || {
                let _permit = permit;
                debug!("Evaluating {task_addr} for {phase}");
                node.eval(&ctx)
            });
            pending.insert(handle.id(), addr);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((id, diags)) => outcomes.push((pending.remove(&id), diags)),
                Err(e) => {
                    // The payload may quote output values, so only the address is reported.
                    let addr = pending.remove(&e.id());
                    let reason = if e.is_panic() {
                        format!("the node panicked during {phase}")
                    } else {
                        format!("the node was cancelled during {phase}")
                    };
                    match &addr {
                        Some(addr) => warn!("Output node for {addr} did not complete: {reason}"),
                        None => warn!("Output node did not complete: {reason}"),
                    }
                    let diags = addr.as_ref().map_or_else(
                        || {
                            Diagnostic::error(
                                "Output evaluation did not complete",
                                format!("An output node was not evaluated: {reason}."),
                            )
                            .into()
                        },
                        |addr| not_completed(addr, &reason),
                    );
                    outcomes.push((addr, diags));
                }
            }
        }

        // Nodes without an address sort first.
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));

        let mut result = WalkResult {
            phase,
            succeeded: 0,
            failed: 0,
            diagnostics: Diagnostics::new(),
        };
        for (_, diags) in outcomes {
            if diags.has_errors() {
                result.failed += 1;
            } else {
                result.succeeded += 1;
            }
            result.diagnostics.append(diags);
        }

        info!(
            "Finished {phase} walk: {} succeeded, {} failed",
            result.succeeded, result.failed
        );
        result
    }
}

impl Default for Walker {
    fn default() -> Self {
        Self::new(DEFAULT_PARALLELISM)
    }
}

fn not_completed(addr: &AbsOutputAddr, reason: &str) -> Diagnostics {
    Diagnostic::error(
        "Output evaluation did not complete",
        format!("{addr} was not evaluated: {reason}."),
    )
    .into()
}
