//! Schema-driven canonicalization of relation names in TypeScript sources.
//!
//! The pipeline, leaves first:
//!
//! - [`schema`] parses `model` blocks into [`Model`]s and their relation fields
//! - [`index`] derives the [`CanonicalIndex`] of declared names and their variants
//! - [`diagnostics`] confirms correction pairs against compiler output
//! - [`classify`] finds the occurrences that are relation references
//! - [`rewrite`] replaces exactly those tokens
//! - [`batch`] runs the rewrite over a source tree with dry-run/apply semantics
//!
//! Everything derived from the schema is built once and passed by reference;
//! there is no process-wide state.

pub mod batch;
pub mod classify;
pub mod config;
pub mod corrections;
pub mod diagnostics;
pub mod index;
pub mod lexer;
pub mod rewrite;
pub mod schema;

pub use batch::{BackupPolicy, BatchError, BatchOptions, BatchSummary, FileError, FileOutcome, Mode};
pub use classify::{Certainty, ClassifiedSpan, Classifier, ContextRules, SpanKind};
pub use config::{Config, ConfigError};
pub use corrections::{Confidence, CorrectionError, CorrectionPair, CorrectionReport, CorrectionSet, Location};
pub use diagnostics::{DiagnosticReconciler, ReconcileStats, Reconciliation};
pub use index::CanonicalIndex;
pub use rewrite::{RewriteOptions, RewriteReport, ReviewItem};
pub use schema::{Field, Model, Multiplicity, Schema, SchemaError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Corrections(#[from] CorrectionError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Schema-derived state for one run.
#[derive(Debug, Clone)]
pub struct Project {
    pub schema: Schema,
    pub index: CanonicalIndex,
}

impl Project {
    pub fn load(schema_path: &std::path::Path) -> Result<Self> {
        let schema = schema::parse_schema_file(schema_path)?;
        let index = CanonicalIndex::build(&schema);
        Ok(Self { schema, index })
    }

    /// Corrections from a persisted report, re-validated against this schema.
    pub fn load_corrections(&self, report: &std::path::Path) -> Result<CorrectionSet> {
        Ok(CorrectionReport::load(report)?.into_set(&self.index))
    }
}
