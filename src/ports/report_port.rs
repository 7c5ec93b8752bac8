//! Report generation port trait.

use crate::domain::engine::RunResult;
use crate::domain::error::TraderError;
use crate::domain::metrics::Metrics;
use std::path::Path;

/// Port for persisting a finished run.
pub trait ReportPort {
    fn write(
        &self,
        result: &RunResult,
        metrics: &Metrics,
        output_path: &Path,
    ) -> Result<(), TraderError>;
}
