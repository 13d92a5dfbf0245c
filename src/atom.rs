//! Atoms and waters — the leaf data of the molecule model (spec.md §3).

use lin_alg::f32::Vec3;

/// Closed set of form-factor types an atom can be tagged with. `NH3Plus` and
/// `NHGuanine` are carried per spec.md §9's third Open Question: present in
/// the lookup table, never emitted by a constructor in this crate (no
/// residue dictionary wires them up here, same as the examined C++ source).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FormFactorType {
    H,
    C,
    N,
    O,
    S,
    CH,
    CH2,
    CH3,
    NH,
    NH2,
    OH,
    SH,
    NH3Plus,
    NHGuanine,
    Other,
    ExcludedVolume,
    Water,
}

impl FormFactorType {
    /// Number of distinct form-factor types, including `ExcludedVolume` and `Water`.
    pub const COUNT: usize = 17;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Sixteen-byte packed record invariant, per spec.md §3 (`CompactCoordinatesData`
/// lives in `coords.rs`; `Atom`/`Water` are the friendlier, body-owned form).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Atom {
    pub position: Vec3,
    pub weight: f32,
    pub form_factor: FormFactorType,
}

impl Atom {
    pub fn new(position: Vec3, weight: f32, form_factor: FormFactorType) -> Self {
        Self { position, weight, form_factor }
    }
}

/// Identical layout to `Atom`, always tagged `FormFactorType::Water`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Water {
    pub position: Vec3,
    pub weight: f32,
}

impl Water {
    pub fn new(position: Vec3, weight: f32) -> Self {
        Self { position, weight }
    }

    pub fn as_atom(&self) -> Atom {
        Atom::new(self.position, self.weight, FormFactorType::Water)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn water_as_atom_tags_water_type() {
        let w = Water::new(Vec3::new(1.0, 2.0, 3.0), 1.0);
        let a = w.as_atom();
        assert_eq!(a.form_factor, FormFactorType::Water);
        assert_eq!(a.weight, 1.0);
    }
}
