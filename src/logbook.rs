//! LogBook: the dirty-set of document locations touched since the last
//! execution pass.
//!
//! Four record kinds are kept, mirroring the roles locations play in the
//! commit loop:
//!
//! - **touched** — explicitly modified by the user;
//! - **impacted** — written by a tree function during a pass;
//! - **forced** — queued for execution regardless of input changes;
//! - **heavy deployment** — heavy functions granted out-of-band execution.
//!
//! The book only scopes the dependency walk; it never stores values. The
//! implicit backup taken when a location is first logged lives in the open
//! transaction's pending delta.

use std::collections::HashSet;

use crate::id::ParameterId;

/// Record kind inside the [`LogBook`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogKind {
    /// Explicit user modification.
    Touched,
    /// Written by function execution.
    Impacted,
    /// Queued for forced execution.
    Forced,
    /// Granted heavy out-of-band execution.
    HeavyDeploy,
}

/// Dirty-tracker over parameter locations.
#[derive(Default)]
pub struct LogBook {
    touched: HashSet<ParameterId>,
    impacted: HashSet<ParameterId>,
    forced: HashSet<ParameterId>,
    heavy_deploy: HashSet<ParameterId>,
}

impl LogBook {
    /// Creates an empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a location touched.
    pub fn log_label(&mut self, loc: ParameterId) {
        self.touched.insert(loc);
    }

    /// Marks a location impacted (written by a function).
    pub fn impact(&mut self, loc: ParameterId) {
        self.impacted.insert(loc);
    }

    /// Queues a function's argument location for forced execution.
    pub fn force(&mut self, loc: ParameterId) {
        self.forced.insert(loc);
    }

    /// Grants heavy deployment for a function's argument location.
    pub fn heavy_deploy(&mut self, loc: ParameterId) {
        self.heavy_deploy.insert(loc);
    }

    /// Whether the location is marked touched or impacted.
    pub fn is_logged(&self, loc: &ParameterId) -> bool {
        self.touched.contains(loc) || self.impacted.contains(loc)
    }

    /// Whether the location carries a record of the given kind.
    pub fn contains(&self, kind: LogKind, loc: &ParameterId) -> bool {
        match kind {
            LogKind::Touched => self.touched.contains(loc),
            LogKind::Impacted => self.impacted.contains(loc),
            LogKind::Forced => self.forced.contains(loc),
            LogKind::HeavyDeploy => self.heavy_deploy.contains(loc),
        }
    }

    /// Whether the location is marked touched.
    pub fn is_touched(&self, loc: &ParameterId) -> bool {
        self.touched.contains(loc)
    }

    /// Whether the location is marked impacted.
    pub fn is_impacted(&self, loc: &ParameterId) -> bool {
        self.impacted.contains(loc)
    }

    /// Whether the location is queued for forced execution.
    pub fn is_forced(&self, loc: &ParameterId) -> bool {
        self.forced.contains(loc)
    }

    /// Whether the location is granted heavy deployment.
    pub fn is_heavy_deployed(&self, loc: &ParameterId) -> bool {
        self.heavy_deploy.contains(loc)
    }

    /// Clears every record of every kind.
    pub fn release_logged(&mut self) {
        self.touched.clear();
        self.impacted.clear();
        self.forced.clear();
        self.heavy_deploy.clear();
    }

    /// Clears one location from the touched and impacted records.
    pub fn release_logged_one(&mut self, loc: &ParameterId) {
        self.touched.remove(loc);
        self.impacted.remove(loc);
    }

    /// Drops every record of a location that left the document.
    pub fn clear_references_for(&mut self, loc: &ParameterId) {
        self.touched.remove(loc);
        self.impacted.remove(loc);
        self.forced.remove(loc);
        self.heavy_deploy.remove(loc);
    }

    /// Touched locations, unordered.
    pub fn touched(&self) -> impl Iterator<Item = &ParameterId> {
        self.touched.iter()
    }

    /// Forced locations, unordered.
    pub fn forced(&self) -> impl Iterator<Item = &ParameterId> {
        self.forced.iter()
    }

    /// Whether nothing at all is logged.
    pub fn is_empty(&self) -> bool {
        self.touched.is_empty()
            && self.impacted.is_empty()
            && self.forced.is_empty()
            && self.heavy_deploy.is_empty()
    }
}
