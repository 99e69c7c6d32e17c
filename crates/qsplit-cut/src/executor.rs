//! The fragment execution boundary.
//!
//! The cutting engine never runs circuits itself. Every fragment instance is
//! handed to a [`FragmentExecutor`], which returns the distribution over the
//! fragment's local wires:
//!
//! ```text
//!   for each (fragment, assignment):
//!       prepare Rho wires ──→ run fragment ──→ rotate O wires ──→ measure
//! ```
//!
//! Implementations decide how: exact simulation, sampling, remote hardware.
//! Retry and timeout policy belongs to the implementation; the engine only
//! sees the result or the error.

use std::sync::Arc;

use async_trait::async_trait;

use crate::distribution::FragmentDistribution;
use crate::error::ExecutionError;
use crate::instance::BasisAssignment;
use crate::partition::Fragment;

/// Executes one fragment under one boundary assignment.
///
/// The returned distribution must cover all local wires of the fragment,
/// indexed little-endian. Wires listed in `assignment.meas` are read out in
/// the requested basis; wires listed in `assignment.inits` start in the
/// requested state instead of `|0>`.
#[async_trait]
pub trait FragmentExecutor: Send + Sync {
    /// Name of the executor, for logs and reports.
    fn name(&self) -> &str;

    /// Execute `fragment` under `assignment`.
    async fn execute(
        &self,
        fragment: &Fragment,
        assignment: &BasisAssignment,
    ) -> Result<FragmentDistribution, ExecutionError>;
}

#[async_trait]
impl<E: FragmentExecutor + ?Sized> FragmentExecutor for Arc<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn execute(
        &self,
        fragment: &Fragment,
        assignment: &BasisAssignment,
    ) -> Result<FragmentDistribution, ExecutionError> {
        (**self).execute(fragment, assignment).await
    }
}
