//! Transaction engine: bounded undo/redo log of modification deltas paired
//! with caller payloads.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use crate::delta::{DeltaRecord, ModificationDelta};
use crate::document::Document;
use crate::error::Error;
use crate::id::{trim_to_parameter_id, ParameterId};
use crate::value::{ParamType, ParamValue};

/// One primitive of a [`TxData`] payload.
#[derive(Clone, Debug, PartialEq)]
pub enum TxDatum {
    /// Integer item.
    Int(i64),
    /// Real item.
    Real(f64),
    /// String item.
    Str(String),
    /// Boolean item.
    Bool(bool),
}

impl From<i64> for TxDatum {
    fn from(v: i64) -> Self {
        TxDatum::Int(v)
    }
}

impl From<f64> for TxDatum {
    fn from(v: f64) -> Self {
        TxDatum::Real(v)
    }
}

impl From<&str> for TxDatum {
    fn from(v: &str) -> Self {
        TxDatum::Str(v.to_owned())
    }
}

impl From<String> for TxDatum {
    fn from(v: String) -> Self {
        TxDatum::Str(v)
    }
}

impl From<bool> for TxDatum {
    fn from(v: bool) -> Self {
        TxDatum::Bool(v)
    }
}

/// Opaque caller payload attached to a committed transaction.
///
/// The engine never interprets the items; a UI typically streams in an
/// action name and its arguments to label undo entries:
///
/// ```ignore
/// let data = TxData::new().with("rename node").with(42);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TxData {
    items: Vec<TxDatum>,
}

impl TxData {
    /// Creates an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one item, builder-style.
    pub fn with(mut self, item: impl Into<TxDatum>) -> Self {
        self.items.push(item.into());
        self
    }

    /// The streamed items, in insertion order.
    pub fn items(&self) -> &[TxDatum] {
        &self.items
    }
}

/// Live handle carried by a [`TxResRecord`] for parameters still present in
/// the document.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamHandle {
    /// Concrete type tag at extraction time.
    pub ty: ParamType,
    /// Value at extraction time.
    pub value: ParamValue,
}

/// One affected parameter in a transaction result.
#[derive(Clone, Debug, PartialEq)]
pub struct TxResRecord {
    /// The affected parameter.
    pub id: ParameterId,
    /// Snapshot handle, present while the parameter is alive.
    pub handle: Option<ParamHandle>,
    /// Whether the parameter still exists in the document.
    pub alive: bool,
    /// Whether the parameter's concrete type is unresolved. Unknown
    /// parameters are considered alive.
    pub undefined_type: bool,
}

/// Externally visible result of one transaction: the set of affected
/// parameters, unique by id, with liveness flags a caller can use to decide
/// whether to re-resolve held references.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TxRes {
    records: Vec<TxResRecord>,
}

impl TxRes {
    /// The affected parameters, in touch order.
    pub fn records(&self) -> &[TxResRecord] {
        &self.records
    }

    /// Whether no parameter was affected.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up the record for one parameter.
    pub fn get(&self, id: &ParameterId) -> Option<&TxResRecord> {
        self.records.iter().find(|r| &r.id == id)
    }
}

/// Transactional scope state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TxState {
    /// No scope open.
    #[default]
    Idle,
    /// A scope is open and collecting backups.
    Open,
}

struct PendingTx {
    /// First-write-wins backups, in touch order.
    backups: Vec<(ParameterId, crate::document::ParamSnapshot)>,
    seen: HashSet<ParameterId>,
}

/// Bounded undo/redo log of `(ModificationDelta, TxData)` pairs.
///
/// Mutations enter through [`set_value`](TransactionEngine::set_value) and
/// friends, which open a scope on first use and snapshot each cell before
/// its first write so the commit stays invertible. Undo/redo depth requests
/// clamp to the available stack instead of failing.
pub struct TransactionEngine {
    undo: VecDeque<(ModificationDelta, TxData)>,
    redo: VecDeque<(ModificationDelta, TxData)>,
    undo_limit: usize,
    pending: Option<PendingTx>,
}

impl fmt::Debug for TransactionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionEngine")
            .field("undo", &self.undo.len())
            .field("redo", &self.redo.len())
            .field("undo_limit", &self.undo_limit)
            .field("state", &self.state())
            .finish()
    }
}

impl TransactionEngine {
    /// Creates an engine keeping at most `undo_limit` committed
    /// transactions.
    pub fn new(undo_limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            undo_limit,
            pending: None,
        }
    }

    /// The configured undo limit.
    pub fn undo_limit(&self) -> usize {
        self.undo_limit
    }

    /// Current scope state.
    pub fn state(&self) -> TxState {
        if self.pending.is_some() {
            TxState::Open
        } else {
            TxState::Idle
        }
    }

    /// Whether a transactional scope is open.
    pub fn has_open_command(&self) -> bool {
        self.pending.is_some()
    }

    /// Opens a transactional scope explicitly.
    pub fn open_command(&mut self) -> Result<(), Error> {
        if self.pending.is_some() {
            return Err(Error::TransactionAlreadyOpen);
        }
        self.pending = Some(PendingTx {
            backups: Vec::new(),
            seen: HashSet::new(),
        });
        Ok(())
    }

    fn ensure_open(&mut self) {
        if self.pending.is_none() {
            self.pending = Some(PendingTx {
                backups: Vec::new(),
                seen: HashSet::new(),
            });
        }
    }

    /// Snapshots a cell into the open scope before its first write.
    ///
    /// Opens a scope if none is open. Later writes to the same cell keep
    /// the original backup.
    pub fn backup(&mut self, doc: &Document, id: &ParameterId) -> Result<(), Error> {
        self.ensure_open();
        let pending = self.pending.as_mut().expect("scope just ensured");
        if pending.seen.insert(id.clone()) {
            pending.backups.push((id.clone(), doc.snapshot(id)?));
        }
        Ok(())
    }

    /// Transactional write: backup, then overwrite the cell.
    pub fn set_value(
        &mut self,
        doc: &mut Document,
        id: &ParameterId,
        value: ParamValue,
    ) -> Result<(), Error> {
        self.backup(doc, id)?;
        doc.set_value(id, value)?;
        Ok(())
    }

    /// Transactional invalidation: backup, then mark the cell pending.
    pub fn mark_pending(&mut self, doc: &mut Document, id: &ParameterId) -> Result<(), Error> {
        self.backup(doc, id)?;
        doc.mark_pending(id)?;
        Ok(())
    }

    /// Finalizes the open scope into a delta, pairs it with `tx_data`,
    /// pushes the pair onto the undo stack and clears the redo stack.
    ///
    /// The undo stack is bounded by the undo limit; the oldest entry is
    /// evicted on overflow. Returns the affected-parameter result.
    pub fn commit_command_ext(
        &mut self,
        doc: &Document,
        tx_data: TxData,
    ) -> Result<TxRes, Error> {
        let pending = self.pending.take().ok_or(Error::NoOpenTransaction)?;

        let mut delta = ModificationDelta::new();
        for (id, before) in pending.backups {
            let after = if doc.has_parameter(&id) {
                doc.snapshot(&id)?
            } else {
                before.clone()
            };
            delta.push(DeltaRecord { id, before, after });
        }

        let res = extract_tx_res(doc, delta.touched_ids());

        self.undo.push_back((delta, tx_data));
        self.redo.clear();
        while self.undo.len() > self.undo_limit {
            self.undo.pop_front();
        }
        Ok(res)
    }

    /// Commits with an empty payload.
    pub fn commit_command(&mut self, doc: &Document) -> Result<TxRes, Error> {
        self.commit_command_ext(doc, TxData::default())
    }

    /// Rolls the open scope back: every backup is restored in reverse
    /// touch order and the scope is discarded.
    pub fn abort_command(&mut self, doc: &mut Document) -> Result<(), Error> {
        let pending = self.pending.take().ok_or(Error::NoOpenTransaction)?;
        for (id, snapshot) in pending.backups.iter().rev() {
            if doc.has_parameter(id) {
                doc.restore(id, snapshot)?;
            }
        }
        Ok(())
    }

    /// Number of committed transactions available to undo.
    pub fn nb_undos(&self) -> usize {
        self.undo.len()
    }

    /// Number of undone transactions available to redo.
    pub fn nb_redos(&self) -> usize {
        self.redo.len()
    }

    /// Applies up to `n` inverse deltas, moving the pairs onto the redo
    /// stack.
    ///
    /// The depth clamps to the available stack; the applied count is
    /// returned together with the union of affected parameters.
    pub fn undo(&mut self, doc: &mut Document, n: usize) -> Result<(usize, TxRes), Error> {
        let applied = n.min(self.undo.len());
        let mut affected = Vec::new();
        for _ in 0..applied {
            let (delta, data) = self.undo.pop_back().expect("clamped to stack length");
            delta.invert().apply(doc)?;
            affected.extend(delta.touched_ids().cloned().collect::<Vec<_>>());
            self.redo.push_back((delta, data));
        }
        let res = extract_tx_res(doc, affected.iter());
        Ok((applied, res))
    }

    /// Re-applies up to `n` undone deltas, moving the pairs back onto the
    /// undo stack. Clamps like [`undo`](TransactionEngine::undo).
    pub fn redo(&mut self, doc: &mut Document, n: usize) -> Result<(usize, TxRes), Error> {
        let applied = n.min(self.redo.len());
        let mut affected = Vec::new();
        for _ in 0..applied {
            let (delta, data) = self.redo.pop_back().expect("clamped to stack length");
            delta.apply(doc)?;
            affected.extend(delta.touched_ids().cloned().collect::<Vec<_>>());
            self.undo.push_back((delta, data));
        }
        let res = extract_tx_res(doc, affected.iter());
        Ok((applied, res))
    }

    /// Read-only peek at the undo payloads, most recent first.
    pub fn get_undo_data(&self, depth: usize) -> Vec<TxData> {
        self.undo
            .iter()
            .rev()
            .take(depth)
            .map(|(_, data)| data.clone())
            .collect()
    }

    /// Read-only peek at the redo payloads, most recent first.
    pub fn get_redo_data(&self, depth: usize) -> Vec<TxData> {
        self.redo
            .iter()
            .rev()
            .take(depth)
            .map(|(_, data)| data.clone())
            .collect()
    }

    /// Drops both stacks.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

/// Builds the transaction result for a set of raw affected ids.
///
/// Ids that do not trim to a parameter id are skipped. Unknown-typed
/// parameters count as alive.
pub(crate) fn extract_tx_res<'a>(
    doc: &Document,
    ids: impl Iterator<Item = &'a ParameterId>,
) -> TxRes {
    let mut res = TxRes::default();
    let mut seen = HashSet::new();
    for raw in ids {
        let Some(id) = trim_to_parameter_id(raw.as_str()) else {
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }
        let alive = doc.has_parameter(&id);
        let undefined_type = alive
            && doc
                .param_type(&id)
                .map(|ty| ty == ParamType::Undefined)
                .unwrap_or(false);
        let handle = if alive {
            Some(ParamHandle {
                ty: doc.param_type(&id).unwrap_or(ParamType::Undefined),
                value: doc.value(&id).cloned().unwrap_or(ParamValue::None),
            })
        } else {
            None
        };
        res.records.push(TxResRecord {
            id,
            handle,
            alive: alive || undefined_type,
            undefined_type,
        });
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;

    fn pid(s: &str) -> ParameterId {
        ParameterId::new(s).unwrap()
    }

    fn doc_with_param(v: i64) -> (Document, ParameterId) {
        let mut doc = Document::new();
        doc.add_node(NodeId::new("0:1:0:1").unwrap(), "n", false, None)
            .unwrap();
        let id = pid("0:1:0:1:2");
        doc.add_parameter(id.clone(), ParamValue::Int(v)).unwrap();
        (doc, id)
    }

    #[test]
    fn first_write_wins_backup() {
        let (mut doc, id) = doc_with_param(1);
        let mut txn = TransactionEngine::new(8);
        txn.set_value(&mut doc, &id, ParamValue::Int(2)).unwrap();
        txn.set_value(&mut doc, &id, ParamValue::Int(3)).unwrap();
        txn.commit_command(&doc).unwrap();

        txn.undo(&mut doc, 1).unwrap();
        assert_eq!(doc.value(&id).unwrap().as_int(), Some(1));
    }

    #[test]
    fn abort_restores_pre_transaction_state() {
        let (mut doc, id) = doc_with_param(1);
        let mut txn = TransactionEngine::new(8);
        txn.set_value(&mut doc, &id, ParamValue::Int(99)).unwrap();
        txn.abort_command(&mut doc).unwrap();
        assert_eq!(doc.value(&id).unwrap().as_int(), Some(1));
        assert_eq!(txn.nb_undos(), 0);
    }

    #[test]
    fn explicit_double_open_is_an_error() {
        let mut txn = TransactionEngine::new(8);
        txn.open_command().unwrap();
        assert!(matches!(
            txn.open_command(),
            Err(Error::TransactionAlreadyOpen)
        ));
    }

    #[test]
    fn undo_clamps_to_available_depth() {
        let (mut doc, id) = doc_with_param(0);
        let mut txn = TransactionEngine::new(8);
        for v in 1..=2 {
            txn.set_value(&mut doc, &id, ParamValue::Int(v)).unwrap();
            txn.commit_command(&doc).unwrap();
        }
        let (applied, _) = txn.undo(&mut doc, 10).unwrap();
        assert_eq!(applied, 2);
        assert_eq!(doc.value(&id).unwrap().as_int(), Some(0));
        let (applied, _) = txn.undo(&mut doc, 1).unwrap();
        assert_eq!(applied, 0);
    }

    #[test]
    fn undo_limit_evicts_oldest() {
        let (mut doc, id) = doc_with_param(0);
        let limit = 3;
        let mut txn = TransactionEngine::new(limit);
        for v in 1..=(limit as i64 + 1) {
            txn.set_value(&mut doc, &id, ParamValue::Int(v)).unwrap();
            txn.commit_command(&doc).unwrap();
        }
        assert_eq!(txn.nb_undos(), limit);
        // Fully unwinding lands on the oldest surviving backup, not 0.
        let (applied, _) = txn.undo(&mut doc, limit).unwrap();
        assert_eq!(applied, limit);
        assert_eq!(doc.value(&id).unwrap().as_int(), Some(1));
    }

    #[test]
    fn tx_data_round_trips_through_undo_redo() {
        let (mut doc, id) = doc_with_param(1);
        let mut txn = TransactionEngine::new(8);
        let data = TxData::new().with("set").with(2i64);
        txn.set_value(&mut doc, &id, ParamValue::Int(2)).unwrap();
        txn.commit_command_ext(&doc, data.clone()).unwrap();

        let (applied, _) = txn.undo(&mut doc, 1).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(doc.value(&id).unwrap().as_int(), Some(1));
        assert_eq!(txn.get_redo_data(1), vec![data.clone()]);
        assert!(txn.get_undo_data(1).is_empty());

        let (applied, _) = txn.redo(&mut doc, 1).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(doc.value(&id).unwrap().as_int(), Some(2));
        assert_eq!(txn.get_undo_data(1), vec![data]);
        assert!(txn.get_redo_data(1).is_empty());
    }

    #[test]
    fn commit_clears_redo() {
        let (mut doc, id) = doc_with_param(0);
        let mut txn = TransactionEngine::new(8);
        txn.set_value(&mut doc, &id, ParamValue::Int(1)).unwrap();
        txn.commit_command(&doc).unwrap();
        txn.undo(&mut doc, 1).unwrap();
        assert_eq!(txn.nb_redos(), 1);

        txn.set_value(&mut doc, &id, ParamValue::Int(5)).unwrap();
        txn.commit_command(&doc).unwrap();
        assert_eq!(txn.nb_redos(), 0);
    }

    #[test]
    fn tx_res_flags_dead_parameters() {
        let (mut doc, id) = doc_with_param(1);
        let mut txn = TransactionEngine::new(8);
        txn.set_value(&mut doc, &id, ParamValue::Int(2)).unwrap();
        let res = txn.commit_command(&doc).unwrap();
        let rec = res.get(&id).unwrap();
        assert!(rec.alive);
        assert!(!rec.undefined_type);
        assert_eq!(
            rec.handle.as_ref().map(|h| h.ty),
            Some(crate::value::ParamType::Int)
        );

        doc.prune(&NodeId::new("0:1:0:1").unwrap()).unwrap();
        let res = extract_tx_res(&doc, [&id].into_iter());
        let rec = res.get(&id).unwrap();
        assert!(!rec.alive);
        assert!(rec.handle.is_none());
    }
}
