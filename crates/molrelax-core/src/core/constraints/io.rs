use super::constraint::{Axis, Constraint};
use super::set::ConstraintSet;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConstraintLoadError {
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Invalid constraint on record {record} of '{path}': {reason}")]
    Record {
        path: String,
        record: usize,
        reason: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ConstraintKind {
    Ignore,
    Fixed,
    FixedX,
    FixedY,
    FixedZ,
    Distance,
    Angle,
}

#[derive(Debug, Deserialize)]
struct ConstraintRecord {
    kind: ConstraintKind,
    a: usize,
    b: Option<usize>,
    c: Option<usize>,
    target: Option<f64>,
}

impl ConstraintRecord {
    fn into_constraint(self) -> Result<Constraint, String> {
        let Self {
            kind,
            a,
            b,
            c,
            target,
        } = self;
        let need_b = || b.ok_or_else(|| "column 'b' is required".to_string());
        let need_target = || target.ok_or_else(|| "column 'target' is required".to_string());

        Ok(match kind {
            ConstraintKind::Ignore => Constraint::Ignore { particle: a },
            ConstraintKind::Fixed => Constraint::Fixed { particle: a },
            ConstraintKind::FixedX => Constraint::FixedAxis {
                particle: a,
                axis: Axis::X,
            },
            ConstraintKind::FixedY => Constraint::FixedAxis {
                particle: a,
                axis: Axis::Y,
            },
            ConstraintKind::FixedZ => Constraint::FixedAxis {
                particle: a,
                axis: Axis::Z,
            },
            ConstraintKind::Distance => Constraint::Distance {
                a,
                b: need_b()?,
                target: need_target()?,
            },
            ConstraintKind::Angle => Constraint::Angle {
                a,
                b: need_b()?,
                c: c.ok_or_else(|| "column 'c' is required".to_string())?,
                target: need_target()?,
            },
        })
    }
}

impl ConstraintSet {
    /// Loads a constraint set from a CSV file with a `kind,a,b,c,target` header.
    ///
    /// Unused columns may be left empty. Particle indices are zero-based. The result is not
    /// validated against any structure; call [`ConstraintSet::validate`] before running.
    pub fn load_csv(path: &Path) -> Result<Self, ConstraintLoadError> {
        let display = path.to_string_lossy().to_string();
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| ConstraintLoadError::Csv {
                path: display.clone(),
                source: e,
            })?;
        Self::read_records(reader, &display)
    }

    /// Reads a constraint set from any CSV source; `origin` names it in error messages.
    pub fn from_csv_reader<R: Read>(reader: R, origin: &str) -> Result<Self, ConstraintLoadError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        Self::read_records(reader, origin)
    }

    fn read_records<R: Read>(
        mut reader: csv::Reader<R>,
        origin: &str,
    ) -> Result<Self, ConstraintLoadError> {
        let mut set = ConstraintSet::new();
        for (record, result) in reader.deserialize::<ConstraintRecord>().enumerate() {
            let row = result.map_err(|e| ConstraintLoadError::Csv {
                path: origin.to_string(),
                source: e,
            })?;
            let constraint = row
                .into_constraint()
                .map_err(|reason| ConstraintLoadError::Record {
                    path: origin.to_string(),
                    record: record + 1,
                    reason,
                })?;
            set.add(constraint);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_csv_reads_every_constraint_kind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("constraints.csv");
        fs::write(
            &path,
            "kind,a,b,c,target\n\
             ignore,4,,,\n\
             fixed,0,,,\n\
             fixed-z,1,,,\n\
             distance,0,1,,1.54\n\
             angle,0,1,2,109.5\n",
        )
        .unwrap();

        let set = ConstraintSet::load_csv(&path).unwrap();
        assert_eq!(set.len(), 5);
        assert_eq!(set.get(0), Some(&Constraint::Ignore { particle: 4 }));
        assert_eq!(
            set.get(2),
            Some(&Constraint::FixedAxis {
                particle: 1,
                axis: Axis::Z
            })
        );
        assert_eq!(
            set.get(4),
            Some(&Constraint::Angle {
                a: 0,
                b: 1,
                c: 2,
                target: 109.5
            })
        );
    }

    #[test]
    fn missing_columns_for_measured_constraints_are_reported_with_record_number() {
        let data = "kind,a,b,c,target\nfixed,0,,,\ndistance,0,1,,\n";
        let err = ConstraintSet::from_csv_reader(data.as_bytes(), "inline").unwrap_err();
        match err {
            ConstraintLoadError::Record { record, reason, .. } => {
                assert_eq!(record, 2);
                assert!(reason.contains("target"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_a_csv_error() {
        let data = "kind,a,b,c,target\ndihedral,0,1,2,3\n";
        let err = ConstraintSet::from_csv_reader(data.as_bytes(), "inline").unwrap_err();
        assert!(matches!(err, ConstraintLoadError::Csv { .. }));
    }

    #[test]
    fn load_csv_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = ConstraintSet::load_csv(&dir.path().join("missing.csv"));
        assert!(matches!(result, Err(ConstraintLoadError::Csv { .. })));
    }
}
