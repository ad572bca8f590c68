//! Deferred values
//!
//! A [`Deferred`] is a single-assignment cell: it starts pending and is
//! settled exactly once, either resolved with a value or failed with a
//! [`ResolutionError`]. Cells compose before they settle (`map`, `combine`,
//! `fallback`, `all`), so a deployment can wire values that only exist after
//! provisioning into further declarations without blocking.
//!
//! Every cell records its lineage: the cells it derives from and, for
//! descriptor outputs, the descriptor it belongs to. Lineage is how
//! descriptors discover their dependencies and how late binding rejects
//! cycles.

use crate::descriptor::DescriptorId;
use crate::error::{ConstructionError, ResolutionError};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Identity of a cell in the composition graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cell#{}", self.0)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Lineage {
    id: CellId,
    origin: Option<DescriptorId>,
    parents: Mutex<Vec<Arc<Lineage>>>,
}

impl Lineage {
    fn new(origin: Option<DescriptorId>, parents: Vec<Arc<Lineage>>) -> Arc<Self> {
        Arc::new(Self {
            id: CellId::next(),
            origin,
            parents: Mutex::new(parents),
        })
    }

    /// Visit this node and every ancestor once
    fn walk(&self, mut visit: impl FnMut(&Lineage) -> bool) {
        if !visit(self) {
            return;
        }
        let mut seen = HashSet::new();
        let mut stack: Vec<Arc<Lineage>> = lock(&self.parents).clone();
        while let Some(node) = stack.pop() {
            if !seen.insert(node.id) {
                continue;
            }
            if !visit(node.as_ref()) {
                return;
            }
            stack.extend(lock(&node.parents).iter().cloned());
        }
    }

    fn reaches(&self, target: CellId) -> bool {
        let mut found = false;
        self.walk(|node| {
            found = node.id == target;
            !found
        });
        found
    }

    fn origins(&self) -> BTreeSet<DescriptorId> {
        let mut origins = BTreeSet::new();
        self.walk(|node| {
            if let Some(origin) = node.origin {
                origins.insert(origin);
            }
            true
        });
        origins
    }
}

type Continuation<T> = Box<dyn FnOnce(Result<T, ResolutionError>) + Send>;

enum Slot<T> {
    Pending(Vec<Continuation<T>>),
    Resolved(T),
    Failed(ResolutionError),
}

impl<T: Clone> Slot<T> {
    fn outcome(&self) -> Option<Result<T, ResolutionError>> {
        match self {
            Self::Pending(_) => None,
            Self::Resolved(value) => Some(Ok(value.clone())),
            Self::Failed(error) => Some(Err(error.clone())),
        }
    }
}

struct Cell<T> {
    slot: Mutex<Slot<T>>,
    settled: Condvar,
    lineage: Arc<Lineage>,
}

impl<T: Clone> Cell<T> {
    fn new(slot: Slot<T>, lineage: Arc<Lineage>) -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(slot),
            settled: Condvar::new(),
            lineage,
        })
    }

    /// Settle once; continuations run afterwards, outside the lock
    fn settle(&self, outcome: Result<T, ResolutionError>) -> bool {
        let continuations = {
            let mut slot = lock(&self.slot);
            if !matches!(*slot, Slot::Pending(_)) {
                return false;
            }
            let settled = match &outcome {
                Ok(value) => Slot::Resolved(value.clone()),
                Err(error) => Slot::Failed(error.clone()),
            };
            match std::mem::replace(&mut *slot, settled) {
                Slot::Pending(continuations) => continuations,
                _ => Vec::new(),
            }
        };
        self.settled.notify_all();

        for continuation in continuations {
            continuation(outcome.clone());
        }
        true
    }
}

/// Snapshot of a cell's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellState<T> {
    Pending,
    Resolved(T),
    Failed(ResolutionError),
}

/// Handle to a single-assignment cell.
///
/// Cloning the handle shares the cell.
pub struct Deferred<T> {
    cell: Arc<Cell<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match lock(&self.cell.slot).outcome() {
            None => CellState::Pending,
            Some(Ok(value)) => CellState::Resolved(value),
            Some(Err(error)) => CellState::Failed(error),
        };
        f.debug_struct("Deferred")
            .field("id", &self.cell.lineage.id)
            .field("state", &state)
            .finish()
    }
}

/// Write side of a pending cell. Settles it at most once.
pub struct Completer<T> {
    cell: Arc<Cell<T>>,
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("cell", &self.cell.lineage.id)
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> Completer<T> {
    /// Resolve the cell. Returns false if it had already settled.
    pub fn resolve(self, value: T) -> bool {
        self.cell.settle(Ok(value))
    }

    /// Fail the cell. Returns false if it had already settled.
    pub fn fail(self, error: ResolutionError) -> bool {
        self.cell.settle(Err(error))
    }

    pub fn settle(self, outcome: Result<T, ResolutionError>) -> bool {
        self.cell.settle(outcome)
    }

    /// Settle this cell from `source` once `source` settles.
    ///
    /// Rejected with [`ConstructionError::CellCycle`] when `source` already
    /// derives from this cell, before anything resolves.
    pub fn bind(self, source: &Deferred<T>) -> Result<(), ConstructionError> {
        let target = self.cell.lineage.id;
        if source.cell.lineage.reaches(target) {
            return Err(ConstructionError::CellCycle { cell: target });
        }

        lock(&self.cell.lineage.parents).push(Arc::clone(&source.cell.lineage));
        source.on_settle(move |outcome| {
            self.settle(outcome);
        });
        Ok(())
    }
}

impl<T: Clone + Send + Sync + 'static> Deferred<T> {
    /// A cell that is already resolved
    pub fn resolved(value: T) -> Self {
        Self {
            cell: Cell::new(Slot::Resolved(value), Lineage::new(None, Vec::new())),
        }
    }

    /// A cell that has already failed
    pub fn failed(error: ResolutionError) -> Self {
        Self {
            cell: Cell::new(Slot::Failed(error), Lineage::new(None, Vec::new())),
        }
    }

    /// A pending cell and the handle that settles it
    pub fn pending() -> (Self, Completer<T>) {
        Self::with_lineage(Lineage::new(None, Vec::new()))
    }

    /// A pending cell carrying the outputs of a descriptor
    pub(crate) fn output_of(origin: DescriptorId) -> (Self, Completer<T>) {
        Self::with_lineage(Lineage::new(Some(origin), Vec::new()))
    }

    fn derived_from(parents: Vec<Arc<Lineage>>) -> (Self, Completer<T>) {
        Self::with_lineage(Lineage::new(None, parents))
    }

    fn with_lineage(lineage: Arc<Lineage>) -> (Self, Completer<T>) {
        let cell = Cell::new(Slot::Pending(Vec::new()), lineage);
        (
            Self {
                cell: Arc::clone(&cell),
            },
            Completer { cell },
        )
    }

    fn lineage(&self) -> Arc<Lineage> {
        Arc::clone(&self.cell.lineage)
    }

    pub fn id(&self) -> CellId {
        self.cell.lineage.id
    }

    pub fn state(&self) -> CellState<T> {
        match self.try_get() {
            None => CellState::Pending,
            Some(Ok(value)) => CellState::Resolved(value),
            Some(Err(error)) => CellState::Failed(error),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(*lock(&self.cell.slot), Slot::Pending(_))
    }

    /// The value, if resolved
    pub fn value(&self) -> Option<T> {
        self.try_get().and_then(Result::ok)
    }

    /// The error, if failed
    pub fn error(&self) -> Option<ResolutionError> {
        self.try_get().and_then(Result::err)
    }

    /// The outcome without blocking; `None` while pending
    pub fn try_get(&self) -> Option<Result<T, ResolutionError>> {
        lock(&self.cell.slot).outcome()
    }

    /// Block until the cell settles.
    ///
    /// Only for collecting final results; a cell nothing will ever settle
    /// blocks forever.
    pub fn wait(&self) -> Result<T, ResolutionError> {
        let mut slot = lock(&self.cell.slot);
        loop {
            if let Some(outcome) = slot.outcome() {
                return outcome;
            }
            slot = self
                .cell
                .settled
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Descriptors this cell transitively reads from
    pub fn origins(&self) -> BTreeSet<DescriptorId> {
        self.cell.lineage.origins()
    }

    /// Whether this cell is `other` or derives from it
    pub fn derives_from<U>(&self, other: &Deferred<U>) -> bool {
        self.cell.lineage.reaches(other.cell.lineage.id)
    }

    fn on_settle(&self, continuation: impl FnOnce(Result<T, ResolutionError>) + Send + 'static) {
        let outcome = {
            let mut slot = lock(&self.cell.slot);
            match &mut *slot {
                Slot::Pending(continuations) => {
                    continuations.push(Box::new(continuation));
                    return;
                }
                Slot::Resolved(value) => Ok(value.clone()),
                Slot::Failed(error) => Err(error.clone()),
            }
        };
        continuation(outcome);
    }

    /// Transform the value once it resolves. Failures pass through and `f`
    /// is not called.
    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let (derived, completer) = Deferred::derived_from(vec![self.lineage()]);
        self.on_settle(move |outcome| {
            completer.settle(outcome.map(f));
        });
        derived
    }

    /// Like [`Deferred::map`], for transformations that can fail
    pub fn try_map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Result<U, ResolutionError> + Send + 'static,
    {
        let (derived, completer) = Deferred::derived_from(vec![self.lineage()]);
        self.on_settle(move |outcome| {
            completer.settle(outcome.and_then(f));
        });
        derived
    }

    /// Combine with another cell; see [`combine`]
    pub fn combine<B, C, F>(&self, other: &Deferred<B>, f: F) -> Deferred<C>
    where
        B: Clone + Send + Sync + 'static,
        C: Clone + Send + Sync + 'static,
        F: FnOnce(T, B) -> C + Send + 'static,
    {
        combine(self, other, f)
    }

    /// Observe the value once it resolves. Not called on failure.
    pub fn register<F>(&self, callback: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.on_settle(move |outcome| {
            if let Ok(value) = outcome {
                callback(value);
            }
        });
    }
}

struct Join<A, B, C, F> {
    left: Option<A>,
    right: Option<B>,
    finish: Option<(F, Completer<C>)>,
}

impl<A, B, C, F> Join<A, B, C, F>
where
    C: Clone + Send + Sync + 'static,
    F: FnOnce(A, B) -> C,
{
    fn try_finish(join: &Mutex<Self>) {
        let ready = {
            let mut join = lock(join);
            match (join.left.take(), join.right.take()) {
                (Some(left), Some(right)) => join
                    .finish
                    .take()
                    .map(|(f, completer)| (left, right, f, completer)),
                (left, right) => {
                    join.left = left;
                    join.right = right;
                    None
                }
            }
        };
        if let Some((left, right, f, completer)) = ready {
            completer.resolve(f(left, right));
        }
    }

    fn fail(join: &Mutex<Self>, error: ResolutionError) {
        let finish = lock(join).finish.take();
        if let Some((_, completer)) = finish {
            completer.fail(error);
        }
    }
}

/// Resolve to `f(a, b)` once both inputs resolve.
///
/// The inputs may settle in either order. The first failure fails the
/// result and `f` is never called.
pub fn combine<A, B, C, F>(a: &Deferred<A>, b: &Deferred<B>, f: F) -> Deferred<C>
where
    A: Clone + Send + Sync + 'static,
    B: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    F: FnOnce(A, B) -> C + Send + 'static,
{
    let (derived, completer) = Deferred::derived_from(vec![a.lineage(), b.lineage()]);
    let join = Arc::new(Mutex::new(Join {
        left: None,
        right: None,
        finish: Some((f, completer)),
    }));

    let left = Arc::clone(&join);
    a.on_settle(move |outcome| match outcome {
        Ok(value) => {
            lock(&left).left = Some(value);
            Join::try_finish(&*left);
        }
        Err(error) => Join::fail(&*left, error),
    });

    let right = join;
    b.on_settle(move |outcome| match outcome {
        Ok(value) => {
            lock(&right).right = Some(value);
            Join::try_finish(&*right);
        }
        Err(error) => Join::fail(&*right, error),
    });

    derived
}

struct Gather<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
    completer: Option<Completer<Vec<T>>>,
}

/// Resolve to every value, in input order, once all cells resolve.
///
/// Fails with the first failure among the inputs. An empty input resolves
/// immediately to an empty vector.
pub fn all<T>(cells: Vec<Deferred<T>>) -> Deferred<Vec<T>>
where
    T: Clone + Send + Sync + 'static,
{
    if cells.is_empty() {
        return Deferred::resolved(Vec::new());
    }

    let parents = cells.iter().map(Deferred::lineage).collect();
    let (derived, completer) = Deferred::derived_from(parents);
    let gather = Arc::new(Mutex::new(Gather {
        slots: vec![None; cells.len()],
        remaining: cells.len(),
        completer: Some(completer),
    }));

    for (index, cell) in cells.iter().enumerate() {
        let gather = Arc::clone(&gather);
        cell.on_settle(move |outcome| {
            let finished = {
                let mut gather = lock(&gather);
                match outcome {
                    Ok(value) => {
                        gather.slots[index] = Some(value);
                        gather.remaining -= 1;
                        if gather.remaining == 0 {
                            let values = std::mem::take(&mut gather.slots)
                                .into_iter()
                                .flatten()
                                .collect();
                            gather.completer.take().map(|c| (c, Ok(values)))
                        } else {
                            None
                        }
                    }
                    Err(error) => gather.completer.take().map(|c| (c, Err(error))),
                }
            };
            if let Some((completer, outcome)) = finished {
                completer.settle(outcome);
            }
        });
    }

    derived
}

/// A value that may be standing in for one the backend has not assigned.
///
/// Placeholders only exist so preview runs can still wire descriptors
/// together. They must never be used as real identities; the executor
/// rejects them outside preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provisional<T> {
    Known(T),
    Placeholder(T),
}

impl<T> Provisional<T> {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }

    /// The value, only if it is real
    pub fn known(&self) -> Option<&T> {
        match self {
            Self::Known(value) => Some(value),
            Self::Placeholder(_) => None,
        }
    }

    /// The value regardless of provenance, for preview display
    pub fn preview_value(&self) -> &T {
        match self {
            Self::Known(value) | Self::Placeholder(value) => value,
        }
    }
}

/// Payloads that can be "absent" once resolved
pub trait Presence: Clone + Send + Sync + 'static {
    type Present: Clone + Send + Sync + 'static;

    fn into_present(self) -> Option<Self::Present>;
}

impl<T: Clone + Send + Sync + 'static> Presence for Option<T> {
    type Present = T;

    fn into_present(self) -> Option<T> {
        self
    }
}

impl Presence for serde_json::Value {
    type Present = serde_json::Value;

    fn into_present(self) -> Option<serde_json::Value> {
        if self.is_null() { None } else { Some(self) }
    }
}

impl<T: Presence> Deferred<T> {
    /// Substitute `placeholder` when the resolved value is absent or the cell
    /// failed.
    ///
    /// The result is a [`Provisional`], so downstream code can always tell a
    /// placeholder from a value the backend actually assigned.
    pub fn fallback(&self, placeholder: T::Present) -> Deferred<Provisional<T::Present>> {
        let (derived, completer) = Deferred::derived_from(vec![self.lineage()]);
        let source = self.id();
        self.on_settle(move |outcome| {
            let value = match outcome.map(T::into_present) {
                Ok(Some(value)) => Provisional::Known(value),
                Ok(None) => {
                    log::debug!("{source} resolved empty, using placeholder");
                    Provisional::Placeholder(placeholder)
                }
                Err(error) => {
                    log::debug!("{source} failed ({error}), using placeholder");
                    Provisional::Placeholder(placeholder)
                }
            };
            completer.resolve(value);
        });
        derived
    }
}
