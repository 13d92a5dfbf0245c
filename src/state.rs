//! Tracks per-body modification state between successive histogram
//! calculations (spec.md §4.2).
//!
//! The C++ original hands each `Body` a `shared_ptr<Signaller>` bound back to
//! the owning `StateManager`. Rust has no equivalently cheap shared-ownership
//! back-pointer without `Rc`/`Weak` overhead on a hot path, so we invert it:
//! `Signaller` is a plain `Copy` index token, and `Body` calls
//! `StateManager::external_change(token)` / `internal_change(token)`
//! directly instead of the manager being reached through the body. See
//! DESIGN.md for the tradeoff.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyState {
    Clean,
    InternalDirty,
    ExternalDirty,
}

/// A lightweight handle a `Body` holds to notify its owning `StateManager`
/// of changes, carrying only the body index (spec.md §9 "Cyclic body ↔
/// histogram-manager observation").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signaller {
    pub index: usize,
}

#[derive(Debug)]
pub struct StateManager {
    state: Vec<BodyState>,
    hydration_modified: bool,
}

impl StateManager {
    pub fn new(size: usize) -> Self {
        Self { state: vec![BodyState::ExternalDirty; size], hydration_modified: true }
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Resize the tracked body count, appending freshly-dirty entries or
    /// truncating; matches the Molecule invariant of spec.md §3 that
    /// add/remove resizes all tracking structures atomically.
    pub fn resize(&mut self, size: usize) {
        self.state.resize(size, BodyState::ExternalDirty);
    }

    pub fn signaller(&self, index: usize) -> Signaller {
        assert!(index < self.state.len(), "signaller index out of range");
        Signaller { index }
    }

    pub fn internal_change(&mut self, token: Signaller) {
        self.state[token.index] = BodyState::InternalDirty;
    }

    pub fn external_change(&mut self, token: Signaller) {
        if self.state[token.index] != BodyState::InternalDirty {
            self.state[token.index] = BodyState::ExternalDirty;
        }
    }

    pub fn internally_modified_all(&mut self) {
        self.state.fill(BodyState::InternalDirty);
    }

    pub fn externally_modified_all(&mut self) {
        for s in self.state.iter_mut() {
            if *s != BodyState::InternalDirty {
                *s = BodyState::ExternalDirty;
            }
        }
    }

    pub fn modified_hydration_layer(&mut self) {
        self.hydration_modified = true;
    }

    pub fn hydration_modified(&self) -> bool {
        self.hydration_modified
    }

    pub fn is_externally_modified(&self, i: usize) -> bool {
        matches!(self.state[i], BodyState::ExternalDirty | BodyState::InternalDirty)
    }

    pub fn is_internally_modified(&self, i: usize) -> bool {
        matches!(self.state[i], BodyState::InternalDirty)
    }

    pub fn externally_modified_bodies(&self) -> Vec<bool> {
        (0..self.state.len()).map(|i| self.is_externally_modified(i)).collect()
    }

    pub fn internally_modified_bodies(&self) -> Vec<bool> {
        (0..self.state.len()).map(|i| self.is_internally_modified(i)).collect()
    }

    /// Move every body to clean; called atomically at the end of a
    /// histogram calculation.
    pub fn reset(&mut self) {
        self.state.fill(BodyState::Clean);
        self.hydration_modified = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_manager_starts_fully_dirty() {
        let sm = StateManager::new(3);
        assert!(sm.externally_modified_bodies().iter().all(|&b| b));
    }

    #[test]
    fn internal_change_outranks_external_change() {
        let mut sm = StateManager::new(2);
        sm.reset();
        let t = sm.signaller(0);
        sm.internal_change(t);
        sm.external_change(t);
        assert!(sm.is_internally_modified(0));
    }

    #[test]
    fn reset_clears_all_marks() {
        let mut sm = StateManager::new(2);
        sm.reset();
        assert!(sm.externally_modified_bodies().iter().all(|&b| !b));
        assert!(!sm.hydration_modified());
    }
}
