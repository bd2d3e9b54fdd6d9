use phf::{Map, phf_map};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Built-in 12-6 parameters per element: (radius in Å, well depth in kcal/mol).
static DEFAULT_VDW: Map<&'static str, (f64, f64)> = phf_map! {
    "H" => (2.886, 0.044),
    "He" => (2.362, 0.056),
    "C" => (3.851, 0.105),
    "N" => (3.660, 0.069),
    "O" => (3.500, 0.060),
    "F" => (3.364, 0.050),
    "Ne" => (3.243, 0.042),
    "Na" => (2.983, 0.030),
    "Si" => (4.295, 0.402),
    "P" => (4.147, 0.305),
    "S" => (4.035, 0.274),
    "Cl" => (3.947, 0.227),
    "Ar" => (3.868, 0.185),
    "Br" => (4.189, 0.251),
    "Kr" => (4.141, 0.220),
    "I" => (4.500, 0.339),
    "Xe" => (4.404, 0.332),
};

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct VdwParam {
    pub radius: f64,
    pub well_depth: f64,
}

/// Parameters for the Lennard-Jones evaluator: per-element overrides on top of the built-in
/// table and an optional interaction cutoff.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LennardJonesParams {
    #[serde(default)]
    pub cutoff: Option<f64>,
    #[serde(default)]
    pub vdw: HashMap<String, VdwParam>,
}

#[derive(Debug, Error)]
pub enum ParamLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

impl LennardJonesParams {
    /// Loads parameter overrides from a TOML file.
    ///
    /// ```toml
    /// cutoff = 12.0
    ///
    /// [vdw.C]
    /// radius = 3.85
    /// well_depth = 0.105
    /// ```
    pub fn load(path: &Path) -> Result<Self, ParamLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParamLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ParamLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    /// Looks up the parameters for `element`, preferring overrides over built-in values.
    ///
    /// Element symbols are matched case-insensitively ("CL", "cl" and "Cl" are the same).
    pub fn lookup(&self, element: &str) -> Option<VdwParam> {
        let symbol = normalize_symbol(element);
        self.vdw
            .get(&symbol)
            .or_else(|| self.vdw.get(element))
            .copied()
            .or_else(|| {
                DEFAULT_VDW
                    .get(symbol.as_str())
                    .map(|&(radius, well_depth)| VdwParam { radius, well_depth })
            })
    }
}

fn normalize_symbol(element: &str) -> String {
    let mut chars = element.trim().chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}
