//! Core small-angle X-ray scattering (SAXS) computation engine: builds
//! partial distance histograms from an atomic structure (plus optional
//! explicit hydration), transforms them into a theoretical scattering
//! profile via precomputed form-factor and sinc tables, and fits that
//! profile against an experimental (q, I, sigma) curve — either directly
//! or by scanning an EM density-map threshold.

pub mod atom;
pub mod axis;
pub mod body;
pub mod composite;
pub mod coords;
pub mod dataset;
pub mod debye;
pub mod distribution;
pub mod em;
pub mod error;
pub mod fitter;
pub mod form_factor;
pub mod grid;
pub mod histogram;
pub mod minimizer;
pub mod placement;
pub mod settings;
pub mod state;

pub use composite::{CompositeDistanceHistogram, ScatteringProfile};
pub use dataset::Dataset;
pub use error::{Result, SaxsError};
pub use histogram::HistogramManager;
pub use settings::Settings;
