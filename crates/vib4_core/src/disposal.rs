//! Cascading disposal with dependency ordering
//!
//! Teardown in the engine follows one rule: nothing may outlive something it
//! depends on being torn down first. The [`DisposalGraph`] records
//! depends-on edges between disposables and, when one is disposed, disposes
//! its dependents first, then runs its own teardown, then notifies
//! listeners. The dependency graph is kept acyclic by rejecting edges
//! before they are recorded.
//!
//! Entries live in an arena and keep their (Disposed) state forever, so
//! using one after disposal is a detectable error rather than undefined
//! behavior.

use std::fmt;

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Generational key addressing a disposable in a [`DisposalGraph`]
    pub struct DisposeKey;
}

/// Lifecycle state of a disposable
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisposeState {
    /// Live; may gain dependencies and listeners
    Active,
    /// Teardown cascade in progress
    Disposing,
    /// Torn down; terminal
    Disposed,
}

type Teardown = Box<dyn FnOnce()>;
type Listener = Box<dyn FnOnce() -> Result<(), DisposalError>>;

struct DisposeEntry {
    label: String,
    state: DisposeState,
    depends_on: Vec<DisposeKey>,
    dependents: Vec<DisposeKey>,
    teardown: Option<Teardown>,
    listeners: Vec<Listener>,
}

/// Error type for disposal operations
#[derive(Debug)]
pub enum DisposalError {
    /// A disposable cannot depend on itself
    SelfDependency,
    /// The edge would create a cycle in the dependency graph
    WouldCycle,
    /// The referenced disposable was already disposed
    Disposed,
    /// The key does not belong to this graph
    NotFound,
    /// A single-assignment container was assigned twice
    AlreadyAssigned,
    /// A dispose listener failed (isolated and logged, never fatal)
    ListenerFault(String),
}

impl fmt::Display for DisposalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisposalError::SelfDependency => write!(f, "A disposable cannot depend on itself"),
            DisposalError::WouldCycle => write!(f, "Dependency edge would create a cycle"),
            DisposalError::Disposed => write!(f, "Disposable already disposed"),
            DisposalError::NotFound => write!(f, "Unknown disposable key"),
            DisposalError::AlreadyAssigned => {
                write!(f, "Single-assignment disposable assigned twice")
            }
            DisposalError::ListenerFault(msg) => write!(f, "Dispose listener failed: {}", msg),
        }
    }
}

impl std::error::Error for DisposalError {}

/// Arena of disposables with dependency-ordered cascading teardown
pub struct DisposalGraph {
    entries: SlotMap<DisposeKey, DisposeEntry>,
    pending: Vec<DisposeKey>,
}

impl Default for DisposalGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DisposalGraph {
    pub fn new() -> Self {
        Self {
            entries: SlotMap::with_key(),
            pending: Vec::new(),
        }
    }

    /// Register a new disposable with a debug label
    pub fn register(&mut self, label: impl Into<String>) -> DisposeKey {
        self.entries.insert(DisposeEntry {
            label: label.into(),
            state: DisposeState::Active,
            depends_on: Vec::new(),
            dependents: Vec::new(),
            teardown: None,
            listeners: Vec::new(),
        })
    }

    /// Attach the teardown callback run when this disposable is disposed
    pub fn set_teardown<F: FnOnce() + 'static>(
        &mut self,
        key: DisposeKey,
        teardown: F,
    ) -> Result<(), DisposalError> {
        let entry = self.entries.get_mut(key).ok_or(DisposalError::NotFound)?;
        if entry.state != DisposeState::Active {
            return Err(DisposalError::Disposed);
        }
        entry.teardown = Some(Box::new(teardown));
        Ok(())
    }

    /// Add a dispose listener. Listener failures are isolated: they are
    /// logged and never interrupt the cascade or other listeners.
    pub fn add_listener<F>(&mut self, key: DisposeKey, listener: F) -> Result<(), DisposalError>
    where
        F: FnOnce() -> Result<(), DisposalError> + 'static,
    {
        let entry = self.entries.get_mut(key).ok_or(DisposalError::NotFound)?;
        if entry.state != DisposeState::Active {
            return Err(DisposalError::Disposed);
        }
        entry.listeners.push(Box::new(listener));
        Ok(())
    }

    /// Record that `key` depends on `dependency` (so `key` must be disposed
    /// before `dependency` finishes its own teardown).
    ///
    /// Rejected before anything is recorded if the edge is a self-reference,
    /// if either endpoint is no longer active, or if `dependency` already
    /// depends (transitively) on `key`.
    pub fn add_dependency(
        &mut self,
        key: DisposeKey,
        dependency: DisposeKey,
    ) -> Result<(), DisposalError> {
        if key == dependency {
            return Err(DisposalError::SelfDependency);
        }
        match (self.entries.get(key), self.entries.get(dependency)) {
            (Some(a), Some(b)) => {
                if a.state != DisposeState::Active || b.state != DisposeState::Active {
                    return Err(DisposalError::Disposed);
                }
            }
            _ => return Err(DisposalError::NotFound),
        }
        if self.depends_transitively(dependency, key) {
            return Err(DisposalError::WouldCycle);
        }

        let entry = &mut self.entries[key];
        if !entry.depends_on.contains(&dependency) {
            entry.depends_on.push(dependency);
            self.entries[dependency].dependents.push(key);
        }
        Ok(())
    }

    /// Whether `from` reaches `target` along depends-on edges
    fn depends_transitively(&self, from: DisposeKey, target: DisposeKey) -> bool {
        let mut stack = vec![from];
        while let Some(key) = stack.pop() {
            if key == target {
                return true;
            }
            if let Some(entry) = self.entries.get(key) {
                stack.extend(entry.depends_on.iter().copied());
            }
        }
        false
    }

    /// Dispose a disposable and, first, everything that depends on it.
    ///
    /// Idempotent: only the first call does anything. Returns the number of
    /// disposables torn down by this call (0 if it was already disposed).
    pub fn dispose(&mut self, key: DisposeKey) -> usize {
        let Some(entry) = self.entries.get_mut(key) else {
            return 0;
        };
        if entry.state != DisposeState::Active {
            return 0;
        }
        entry.state = DisposeState::Disposing;

        // Dependents first: nothing may observe its dependency half-gone
        let mut count = 0;
        let dependents = self.entries[key].dependents.clone();
        for dependent in dependents {
            count += self.dispose(dependent);
        }

        let entry = &mut self.entries[key];
        let teardown = entry.teardown.take();
        let listeners = std::mem::take(&mut entry.listeners);
        let label = entry.label.clone();
        if let Some(teardown) = teardown {
            teardown();
        }
        for listener in listeners {
            if let Err(err) = listener() {
                log::warn!("Dispose listener for '{}' failed: {}", label, err);
            }
        }

        // Unlink from both edge directions
        let depends_on = std::mem::take(&mut self.entries[key].depends_on);
        for dependency in depends_on {
            if let Some(dep) = self.entries.get_mut(dependency) {
                dep.dependents.retain(|&k| k != key);
            }
        }
        let dependents = std::mem::take(&mut self.entries[key].dependents);
        for dependent in dependents {
            if let Some(dep) = self.entries.get_mut(dependent) {
                dep.depends_on.retain(|&k| k != key);
            }
        }

        self.entries[key].state = DisposeState::Disposed;
        log::debug!("Disposed '{}'", label);
        count + 1
    }

    /// Queue a disposable for a later [`process_pending`](Self::process_pending)
    pub fn mark_for_disposal(&mut self, key: DisposeKey) {
        if self.state(key) == Some(DisposeState::Active) && !self.pending.contains(&key) {
            self.pending.push(key);
        }
    }

    /// Dispose everything marked since the last drain. Cascades keep the
    /// dependency order (dependents before dependencies) regardless of mark
    /// order. Returns the total number of disposables torn down.
    pub fn process_pending(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let mut count = 0;
        for key in pending {
            count += self.dispose(key);
        }
        count
    }

    /// Number of marked, not yet processed disposables
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Current state, or `None` for a foreign key
    pub fn state(&self, key: DisposeKey) -> Option<DisposeState> {
        self.entries.get(key).map(|e| e.state)
    }

    /// Whether the disposable has been disposed
    pub fn is_disposed(&self, key: DisposeKey) -> bool {
        self.state(key) == Some(DisposeState::Disposed)
    }

    /// Debug label of a disposable
    pub fn label(&self, key: DisposeKey) -> Option<&str> {
        self.entries.get(key).map(|e| e.label.as_str())
    }

    /// Keys this disposable depends on
    pub fn dependencies(&self, key: DisposeKey) -> Option<&[DisposeKey]> {
        self.entries.get(key).map(|e| e.depends_on.as_slice())
    }

    /// Keys depending on this disposable
    pub fn dependents(&self, key: DisposeKey) -> Option<&[DisposeKey]> {
        self.entries.get(key).map(|e| e.dependents.as_slice())
    }
}

/// Aggregates disposables and disposes them together.
///
/// Once the composite itself is disposed, anything added later is disposed
/// immediately instead of being held.
#[derive(Default)]
pub struct CompositeDisposable {
    children: Vec<DisposeKey>,
    disposed: bool,
}

impl CompositeDisposable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a child, or dispose it on the spot if the composite is done
    pub fn add(&mut self, graph: &mut DisposalGraph, key: DisposeKey) {
        if self.disposed {
            graph.dispose(key);
        } else {
            self.children.push(key);
        }
    }

    /// Dispose all held children; idempotent
    pub fn dispose(&mut self, graph: &mut DisposalGraph) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        for key in self.children.drain(..) {
            graph.dispose(key);
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Holds at most one disposable; assigning a replacement disposes the
/// previous holding first.
#[derive(Default)]
pub struct SerialDisposable {
    current: Option<DisposeKey>,
    disposed: bool,
}

impl SerialDisposable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new disposable, disposing whatever was held before. If the
    /// container itself is already disposed, the newcomer is disposed
    /// immediately.
    pub fn set(&mut self, graph: &mut DisposalGraph, key: DisposeKey) {
        if self.disposed {
            graph.dispose(key);
            return;
        }
        if let Some(previous) = self.current.replace(key) {
            graph.dispose(previous);
        }
    }

    pub fn current(&self) -> Option<DisposeKey> {
        self.current
    }

    /// Dispose the container and its current holding; idempotent
    pub fn dispose(&mut self, graph: &mut DisposalGraph) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(key) = self.current.take() {
            graph.dispose(key);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Accepts exactly one assignment; a second is an error
#[derive(Default)]
pub struct SingleAssignmentDisposable {
    current: Option<DisposeKey>,
    disposed: bool,
}

impl SingleAssignmentDisposable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the held disposable. If the container was disposed before the
    /// assignment arrived, the disposable is disposed immediately.
    pub fn set(&mut self, graph: &mut DisposalGraph, key: DisposeKey) -> Result<(), DisposalError> {
        if self.current.is_some() {
            return Err(DisposalError::AlreadyAssigned);
        }
        self.current = Some(key);
        if self.disposed {
            graph.dispose(key);
        }
        Ok(())
    }

    pub fn current(&self) -> Option<DisposeKey> {
        self.current
    }

    /// Dispose the container and its holding, if any; idempotent
    pub fn dispose(&mut self, graph: &mut DisposalGraph) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(key) = self.current {
            graph.dispose(key);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
