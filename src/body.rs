//! `Body` and `Molecule` — the owned atom/water collections the histogram
//! pipeline operates over (spec.md §3).

use lin_alg::f32::Vec3;

use crate::atom::{Atom, Water};
use crate::coords::CompactCoordinates;
use crate::state::{Signaller, StateManager};

/// An owned sequence of atoms, an optional owned sequence of explicit
/// hydration waters, and the signaller it uses to notify its
/// `StateManager` of changes. A body's signaller is observed by exactly one
/// histogram manager (spec.md §3 invariant).
#[derive(Clone, Debug)]
pub struct Body {
    pub atoms: Vec<Atom>,
    pub waters: Option<Vec<Water>>,
    signaller: Option<Signaller>,
}

impl Body {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self { atoms, waters: None, signaller: None }
    }

    pub fn with_hydration(atoms: Vec<Atom>, waters: Vec<Water>) -> Self {
        Self { atoms, waters: Some(waters), signaller: None }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn register_signaller(&mut self, signaller: Signaller) {
        self.signaller = Some(signaller);
    }

    /// Add/remove/mutate the atom set directly: an internal-state change.
    /// Rigid transforms and atom-set mutations both go through `Molecule`,
    /// which owns the `StateManager` the `Signaller` reports to — see
    /// `Molecule::translate_body` / `Molecule::set_body_atoms`.
    pub fn set_atoms(&mut self, atoms: Vec<Atom>) {
        self.atoms = atoms;
    }

    pub fn signaller(&self) -> Option<Signaller> {
        self.signaller
    }
}

/// Ordered list of bodies plus a global hydration-water vector.
#[derive(Debug)]
pub struct Molecule {
    pub bodies: Vec<Body>,
    pub waters: Vec<Water>,
    state: StateManager,
}

impl Molecule {
    pub fn new(bodies: Vec<Body>) -> Self {
        let n = bodies.len();
        let mut state = StateManager::new(n);
        let mut bodies = bodies;
        for (i, body) in bodies.iter_mut().enumerate() {
            body.register_signaller(state.signaller(i));
        }
        state.externally_modified_all();
        Self { bodies, waters: Vec::new(), state }
    }

    pub fn with_waters(bodies: Vec<Body>, waters: Vec<Water>) -> Self {
        let mut m = Self::new(bodies);
        m.waters = waters;
        m
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateManager {
        &mut self.state
    }

    /// Total number of protein atoms across all bodies.
    pub fn atom_count(&self) -> usize {
        self.bodies.iter().map(Body::len).sum()
    }

    /// Rigidly translate body `i`; marks it externally dirty.
    pub fn translate_body(&mut self, i: usize, v: Vec3) {
        for a in self.bodies[i].atoms.iter_mut() {
            a.position = a.position + v;
        }
        if let Some(waters) = self.bodies[i].waters.as_mut() {
            for w in waters.iter_mut() {
                w.position = w.position + v;
            }
        }
        let token = self.state.signaller(i);
        self.state.external_change(token);
    }

    /// Replace body `i`'s atom set; marks it internally dirty.
    pub fn set_body_atoms(&mut self, i: usize, atoms: Vec<Atom>) {
        self.bodies[i].set_atoms(atoms);
        let token = self.state.signaller(i);
        self.state.internal_change(token);
    }

    /// Append a new body, resizing the state manager atomically (spec.md
    /// §3: "removing or adding a body resizes all tracking structures
    /// atomically").
    pub fn push_body(&mut self, mut body: Body) {
        let new_index = self.bodies.len();
        self.state.resize(new_index + 1);
        body.register_signaller(self.state.signaller(new_index));
        self.bodies.push(body);
    }

    pub fn remove_body(&mut self, i: usize) {
        self.bodies.remove(i);
        self.state.resize(self.bodies.len());
        for (idx, body) in self.bodies.iter_mut().enumerate() {
            body.register_signaller(self.state.signaller(idx));
        }
        self.state.internally_modified_all();
    }

    pub fn set_waters(&mut self, waters: Vec<Water>) {
        self.waters = waters;
        self.state.modified_hydration_layer();
    }

    /// Build the per-body `CompactCoordinates`, one per body plus one for
    /// the global hydration layer.
    pub fn compact_coordinates(&self) -> (Vec<CompactCoordinates>, CompactCoordinates) {
        let bodies = self.bodies.iter().map(|b| CompactCoordinates::from_atoms(&b.atoms)).collect();
        let waters = CompactCoordinates::from_waters(&self.waters);
        (bodies, waters)
    }
}
