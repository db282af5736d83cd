//! Modification deltas: the invertible unit of undo/redo.

use crate::document::{Document, ParamSnapshot};
use crate::error::Error;
use crate::id::ParameterId;

/// State change of one parameter cell inside a committed transaction.
#[derive(Clone, Debug, PartialEq)]
pub struct DeltaRecord {
    /// The affected cell.
    pub id: ParameterId,
    /// Cell state when the transaction opened.
    pub before: ParamSnapshot,
    /// Cell state at commit.
    pub after: ParamSnapshot,
}

/// Atomic, invertible description of one committed mutation.
///
/// A delta captures, per touched parameter, the cell state on both sides of
/// the transaction. Applying a delta moves the document to its `after`
/// side; [`invert`](ModificationDelta::invert) produces the delta for the
/// opposite direction. Structural changes (node growth/pruning) are the
/// document store's responsibility and are not part of a delta.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModificationDelta {
    records: Vec<DeltaRecord>,
}

impl ModificationDelta {
    /// Creates an empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one cell change.
    pub fn push(&mut self, record: DeltaRecord) {
        self.records.push(record);
    }

    /// The recorded cell changes, in touch order.
    pub fn records(&self) -> &[DeltaRecord] {
        &self.records
    }

    /// Whether the delta records no changes at all.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The delta describing the opposite direction.
    ///
    /// Records are reversed so that re-application order mirrors the
    /// original touch order.
    pub fn invert(&self) -> Self {
        Self {
            records: self
                .records
                .iter()
                .rev()
                .map(|r| DeltaRecord {
                    id: r.id.clone(),
                    before: r.after.clone(),
                    after: r.before.clone(),
                })
                .collect(),
        }
    }

    /// Moves the document to this delta's `after` side.
    ///
    /// Cells that disappeared from the document since the delta was
    /// recorded are skipped; the transaction result carries the alive flag
    /// for callers that need to notice.
    pub fn apply(&self, doc: &mut Document) -> Result<(), Error> {
        for record in &self.records {
            if doc.has_parameter(&record.id) {
                doc.restore(&record.id, &record.after)?;
            }
        }
        Ok(())
    }

    /// Ids touched by this delta, in touch order.
    pub fn touched_ids(&self) -> impl Iterator<Item = &ParameterId> {
        self.records.iter().map(|r| &r.id)
    }
}
