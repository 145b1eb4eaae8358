//! Checkpoint stream encoding.
//!
//! A checkpoint is a [`Case`] whose boundary records carry the live state
//! (history, accumulators, `lastUpdateTime`). Two stream formats exist:
//!
//! - `Ascii`: plain YAML.
//! - `Binary`: every float scalar is stored as its IEEE-754 bit pattern
//!   (`"0x3ff0000000000000"`). Number lists such as `poles`, `residues`,
//!   `stateVariables` and face geometry stay plain decimal text.
//!
//! [`decode`] accepts either form for every scalar.

use crate::schema::Case;
use crate::validate::validate_case;
use crate::{CaseError, CaseResult};
use serde_yaml::{Mapping, Value};
use std::path::Path;
use std::str::FromStr;

/// Keys whose string values are names, never encoded floats.
const NAME_KEYS: &[&str] = &[
    "name",
    "type",
    "phi",
    "U",
    "couplingMode",
    "impedanceUnits",
    "mode",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFormat {
    #[default]
    Ascii,
    Binary,
}

impl FromStr for StreamFormat {
    type Err = CaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ascii" => Ok(StreamFormat::Ascii),
            "binary" => Ok(StreamFormat::Binary),
            other => Err(CaseError::Checkpoint {
                what: format!("unknown stream format '{other}'"),
            }),
        }
    }
}

pub fn encode_f64(v: f64) -> String {
    format!("0x{:016x}", v.to_bits())
}

/// Parse a `0x`-prefixed 16-digit bit pattern.
pub fn decode_f64(s: &str) -> Option<f64> {
    let hex = s.strip_prefix("0x")?;
    if hex.len() != 16 {
        return None;
    }
    u64::from_str_radix(hex, 16).ok().map(f64::from_bits)
}

/// Serialize `case` to a checkpoint stream.
pub fn encode(case: &Case, format: StreamFormat) -> CaseResult<String> {
    validate_case(case)?;
    match format {
        StreamFormat::Ascii => Ok(serde_yaml::to_string(case)?),
        StreamFormat::Binary => {
            let mut value = serde_yaml::to_value(case)?;
            map_scalars(&mut value, &hex_scalar);
            Ok(serde_yaml::to_string(&value)?)
        }
    }
}

/// Parse a checkpoint stream in either format.
pub fn decode(text: &str) -> CaseResult<Case> {
    let mut value: Value = serde_yaml::from_str(text)?;
    map_scalars(&mut value, &unhex_scalar);
    let case: Case = serde_yaml::from_value(value)?;
    validate_case(&case)?;
    Ok(case)
}

pub fn write_checkpoint(path: &Path, case: &Case, format: StreamFormat) -> CaseResult<()> {
    let content = encode(case, format)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn read_checkpoint(path: &Path) -> CaseResult<Case> {
    let content = std::fs::read_to_string(path)?;
    decode(&content)
}

fn hex_scalar(v: &mut Value) {
    if let Value::Number(n) = v {
        if n.is_f64() {
            if let Some(f) = n.as_f64() {
                *v = Value::String(encode_f64(f));
            }
        }
    }
}

fn unhex_scalar(v: &mut Value) {
    if let Value::String(s) = v {
        if let Some(f) = decode_f64(s) {
            *v = Value::Number(f.into());
        }
    }
}

/// Apply `f` to every mapping entry that is a scalar, leaving the members of
/// number lists untouched.
fn map_scalars(value: &mut Value, f: &dyn Fn(&mut Value)) {
    match value {
        Value::Mapping(map) => map_entries(map, f),
        Value::Sequence(items) => {
            for item in items {
                if let Value::Mapping(map) = item {
                    map_entries(map, f);
                }
            }
        }
        _ => {}
    }
}

fn map_entries(map: &mut Mapping, f: &dyn Fn(&mut Value)) {
    for (key, entry) in map.iter_mut() {
        let is_name = key.as_str().is_some_and(|k| NAME_KEYS.contains(&k));
        if matches!(entry, Value::Mapping(_) | Value::Sequence(_)) {
            map_scalars(entry, f);
        } else if !is_name {
            f(entry);
        }
    }
}
