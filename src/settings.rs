//! Explicit, process-free configuration (spec.md §9, "Global mutable
//! settings": replace the source's process-wide settings singleton with a
//! value threaded through fit and histogram constructors), plus the
//! `.dat` settings-file parser (spec.md §6 "Persisted state").

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, SaxsError};
use crate::placement::PlacementStrategy;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistogramManagerKind {
    /// `HistogramManager<Distribution1D>`.
    Unweighted,
    /// `HistogramManager<WeightedDistribution1D>`.
    Weighted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QUnit {
    Angstrom,
    Nanometer,
}

/// The full recognized-options table (spec.md §9), in place of the
/// original's process-wide mutable settings.
#[derive(Clone, Debug)]
pub struct Settings {
    pub placement_strategy: PlacementStrategy,
    pub histogram_manager: HistogramManagerKind,
    pub fit_excluded_volume: bool,
    pub q_min: f64,
    pub q_max: f64,
    pub grid_width: f64,
    pub threads: usize,
    pub output_dir: PathBuf,
    pub sample_frequency: usize,
    pub charge_levels: usize,
    pub hydration_on: bool,
    pub keep_hydrogens: bool,
    pub input_q_unit: QUnit,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            placement_strategy: PlacementStrategy::Axial,
            histogram_manager: HistogramManagerKind::Unweighted,
            fit_excluded_volume: false,
            q_min: 0.0,
            q_max: 0.5,
            grid_width: 1.0,
            threads: (std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2)).saturating_sub(1).max(1),
            output_dir: PathBuf::from("."),
            sample_frequency: 1,
            charge_levels: 50,
            hydration_on: true,
            keep_hydrogens: false,
            input_q_unit: QUnit::Angstrom,
        }
    }
}

impl Settings {
    /// Parse a `.dat` settings file: one `key value` line per recognized
    /// setting, `#`-prefixed lines and blank lines ignored.
    pub fn parse(text: &str) -> Result<Settings> {
        let mut settings = Settings::default();
        for (line_no, raw_line) in text.lines().enumerate() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            let key = parts.next().unwrap_or("").trim();
            let value = parts.next().unwrap_or("").trim();
            if value.is_empty() {
                return Err(SaxsError::Parse(format!("settings line {}: missing value for key '{key}'", line_no + 1)));
            }
            apply_setting(&mut settings, key, value, line_no + 1)?;
        }
        Ok(settings)
    }
}

fn parse_field<T: FromStr>(key: &str, value: &str, line_no: usize) -> Result<T> {
    value.parse::<T>().map_err(|_| SaxsError::Parse(format!("settings line {line_no}: invalid value for '{key}': '{value}'")))
}

fn apply_setting(settings: &mut Settings, key: &str, value: &str, line_no: usize) -> Result<()> {
    match key {
        "placement_strategy" => {
            settings.placement_strategy = match value {
                "axial" => PlacementStrategy::Axial,
                "radial" => PlacementStrategy::Radial { samples_per_atom: 12 },
                "no_hydration" => PlacementStrategy::NoHydration,
                "pepsi" => PlacementStrategy::Pepsi,
                other => return Err(SaxsError::Parse(format!("settings line {line_no}: unknown placement_strategy '{other}'"))),
            };
        }
        "histogram_manager" => {
            settings.histogram_manager = match value {
                "unweighted" => HistogramManagerKind::Unweighted,
                "weighted" => HistogramManagerKind::Weighted,
                other => return Err(SaxsError::Parse(format!("settings line {line_no}: unknown histogram_manager '{other}'"))),
            };
        }
        "fit_excluded_volume" => settings.fit_excluded_volume = parse_field("fit_excluded_volume", value, line_no)?,
        "q_min" => settings.q_min = parse_field("q_min", value, line_no)?,
        "q_max" => settings.q_max = parse_field("q_max", value, line_no)?,
        "grid_width" => settings.grid_width = parse_field("grid_width", value, line_no)?,
        "threads" => settings.threads = parse_field("threads", value, line_no)?,
        "output_dir" => settings.output_dir = PathBuf::from(value),
        "sample_frequency" => settings.sample_frequency = parse_field("sample_frequency", value, line_no)?,
        "charge_levels" => settings.charge_levels = parse_field("charge_levels", value, line_no)?,
        "hydration_on" => settings.hydration_on = parse_field("hydration_on", value, line_no)?,
        "keep_hydrogens" => settings.keep_hydrogens = parse_field("keep_hydrogens", value, line_no)?,
        "input_q_unit" => {
            settings.input_q_unit = match value {
                "A" => QUnit::Angstrom,
                "nm" => QUnit::Nanometer,
                other => return Err(SaxsError::Parse(format!("settings line {line_no}: unknown input_q_unit '{other}'"))),
            };
        }
        other => {
            log::warn!("settings line {line_no}: ignoring unrecognized key '{other}'");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert!(s.q_max > s.q_min);
        assert!(s.threads >= 1);
    }

    #[test]
    fn parses_recognized_keys() {
        let text = "# comment\nplacement_strategy radial\nq_min 0.01\nq_max 0.3\ncharge_levels 64\nhydration_on false\n";
        let s = Settings::parse(text).unwrap();
        assert_eq!(s.placement_strategy, PlacementStrategy::Radial { samples_per_atom: 12 });
        assert_eq!(s.q_min, 0.01);
        assert_eq!(s.q_max, 0.3);
        assert_eq!(s.charge_levels, 64);
        assert!(!s.hydration_on);
    }

    #[test]
    fn rejects_missing_value() {
        assert!(Settings::parse("q_min").is_err());
    }

    #[test]
    fn unrecognized_key_is_ignored_not_fatal() {
        let s = Settings::parse("made_up_key 42\nq_min 0.0\n").unwrap();
        assert_eq!(s.q_min, 0.0);
    }
}
