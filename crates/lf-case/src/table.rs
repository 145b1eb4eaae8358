//! Numeric tables: outlet run records and impedance spectra.
//!
//! One header line of column names, then rows of numbers. Fields are split on
//! commas, or on whitespace when the header has none. Blank lines and lines
//! starting with `#` are skipped.

use crate::{CaseError, CaseResult};
use lf_models::ImpedanceSample;
use nalgebra::Complex;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl Table {
    pub fn parse(content: &str) -> CaseResult<Self> {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim()))
            .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'));

        let Some((_, header)) = lines.next() else {
            return Err(CaseError::Table {
                line: 0,
                what: "table has no header".to_string(),
            });
        };
        let comma = header.contains(',');
        let split = |l: &str| -> Vec<String> {
            if comma {
                l.split(',').map(|f| f.trim().to_string()).collect()
            } else {
                l.split_whitespace().map(str::to_string).collect()
            }
        };

        let columns = split(header);
        let mut rows = Vec::new();
        for (line, text) in lines {
            let fields = split(text);
            if fields.len() != columns.len() {
                return Err(CaseError::Table {
                    line,
                    what: format!("expected {} fields, found {}", columns.len(), fields.len()),
                });
            }
            let row = fields
                .iter()
                .map(|f| {
                    f.parse::<f64>().map_err(|_| CaseError::Table {
                        line,
                        what: format!("'{f}' is not a number"),
                    })
                })
                .collect::<CaseResult<Vec<_>>>()?;
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    /// Case-insensitive column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let j = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[j]).collect())
    }

    /// Like [`Self::column`], but a missing column is an error.
    pub fn require(&self, name: &str) -> CaseResult<Vec<f64>> {
        self.column(name).ok_or_else(|| CaseError::MissingColumn {
            name: name.to_string(),
        })
    }

    pub fn to_csv(&self) -> String {
        let mut csv = self.columns.join(",");
        csv.push('\n');
        for row in &self.rows {
            let fields: Vec<String> = row.iter().map(f64::to_string).collect();
            csv.push_str(&fields.join(","));
            csv.push('\n');
        }
        csv
    }
}

pub fn read_table(path: &Path) -> CaseResult<Table> {
    Table::parse(&std::fs::read_to_string(path)?)
}

/// Spectrum as `frequency, magnitude, phase, real, imag` (phase in radians).
pub fn impedance_table(samples: &[ImpedanceSample]) -> Table {
    Table {
        columns: ["frequency", "magnitude", "phase", "real", "imag"]
            .map(str::to_string)
            .to_vec(),
        rows: samples
            .iter()
            .map(|s| {
                vec![
                    s.freq_hz,
                    s.magnitude(),
                    s.phase_rad(),
                    s.value.re,
                    s.value.im,
                ]
            })
            .collect(),
    }
}

/// Read a spectrum back from a table.
///
/// The frequency column may be named `frequency`, `freq` or `freq_hz`. The
/// value comes from `real`/`imag` when present, else `magnitude`/`phase`
/// (radians), else a real-only `impedance` column.
pub fn impedance_samples(table: &Table) -> CaseResult<Vec<ImpedanceSample>> {
    let freqs = ["frequency", "freq", "freq_hz"]
        .iter()
        .find_map(|name| table.column(name))
        .ok_or_else(|| CaseError::MissingColumn {
            name: "frequency".to_string(),
        })?;

    let values: Vec<Complex<f64>> = if let (Some(re), Some(im)) =
        (table.column("real"), table.column("imag"))
    {
        re.into_iter().zip(im).map(|(r, i)| Complex::new(r, i)).collect()
    } else if let (Some(mag), Some(phase)) = (table.column("magnitude"), table.column("phase")) {
        mag.into_iter()
            .zip(phase)
            .map(|(m, p)| Complex::from_polar(m, p))
            .collect()
    } else {
        table
            .require("impedance")?
            .into_iter()
            .map(|z| Complex::new(z, 0.0))
            .collect()
    };

    Ok(freqs
        .into_iter()
        .zip(values)
        .map(|(freq_hz, value)| ImpedanceSample { freq_hz, value })
        .collect())
}
