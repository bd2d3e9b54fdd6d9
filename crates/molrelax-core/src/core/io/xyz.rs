use crate::core::io::traits::MolecularFile;
use crate::core::models::frame::Frame;
use crate::core::models::particle::Particle;
use nalgebra::Point3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },
    #[error("Particle count mismatch: header declares {declared}, found {found}")]
    CountMismatch { declared: usize, found: usize },
}

#[derive(Debug, Error, PartialEq)]
pub enum XyzParseErrorKind {
    #[error("Missing particle count line")]
    MissingCount,
    #[error("Invalid particle count '{0}'")]
    InvalidCount(String),
    #[error("Expected 'Element x y z', got {0} field(s)")]
    TooFewFields(usize),
    #[error("Invalid coordinate '{0}'")]
    InvalidFloat(String),
}

/// The plain XYZ format: a particle count line, a comment line, then one
/// `Element x y z` record per particle. Extra columns after `z` are ignored.
pub struct XyzFile;

fn parse_error(line: usize, kind: XyzParseErrorKind) -> XyzError {
    XyzError::Parse { line, kind }
}

impl MolecularFile for XyzFile {
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<Frame, Self::Error> {
        let mut lines = reader.lines().enumerate().map(|(i, l)| (i + 1, l));

        let declared = loop {
            match lines.next() {
                Some((line, text)) => {
                    let text = text?;
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    break trimmed.parse::<usize>().map_err(|_| {
                        parse_error(line, XyzParseErrorKind::InvalidCount(trimmed.to_string()))
                    })?;
                }
                None => return Err(parse_error(1, XyzParseErrorKind::MissingCount)),
            }
        };

        let comment = match lines.next() {
            Some((_, text)) => text?.trim_end().to_string(),
            None => String::new(),
        };

        let mut particles = Vec::with_capacity(declared);
        for (line, text) in lines {
            let text = text?;
            let fields: Vec<&str> = text.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if particles.len() == declared {
                return Err(XyzError::CountMismatch {
                    declared,
                    found: declared + 1,
                });
            }
            if fields.len() < 4 {
                return Err(parse_error(line, XyzParseErrorKind::TooFewFields(fields.len())));
            }
            let coord = |s: &str| {
                s.parse::<f64>()
                    .map_err(|_| parse_error(line, XyzParseErrorKind::InvalidFloat(s.to_string())))
            };
            let position = Point3::new(coord(fields[1])?, coord(fields[2])?, coord(fields[3])?);
            particles.push(Particle::new(fields[0], position));
        }

        if particles.len() != declared {
            return Err(XyzError::CountMismatch {
                declared,
                found: particles.len(),
            });
        }

        Ok(Frame::new(&comment, particles))
    }

    fn write_to(frame: &Frame, writer: &mut impl Write) -> Result<(), Self::Error> {
        writeln!(writer, "{}", frame.len())?;
        writeln!(writer, "{}", frame.comment.replace('\n', " "))?;
        for particle in &frame.particles {
            let p = &particle.position;
            writeln!(
                writer,
                "{:<3} {:>17.10} {:>17.10} {:>17.10}",
                particle.element, p.x, p.y, p.z
            )?;
        }
        Ok(())
    }
}
