//! lf-case: case file format, validation, checkpoint streams and numeric tables.

pub mod checkpoint;
pub mod schema;
pub mod table;
pub mod validate;

pub use checkpoint::{StreamFormat, decode, encode, read_checkpoint, write_checkpoint};
pub use schema::*;
pub use table::{Table, impedance_samples, impedance_table, read_table};
pub use validate::{ValidationError, validate_case};

pub type CaseResult<T> = Result<T, CaseError>;

#[derive(thiserror::Error, Debug)]
pub enum CaseError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Checkpoint error: {what}")]
    Checkpoint { what: String },

    #[error("Table error at line {line}: {what}")]
    Table { line: usize, what: String },

    #[error("Missing column '{name}'")]
    MissingColumn { name: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn load_yaml(path: &std::path::Path) -> CaseResult<Case> {
    let content = std::fs::read_to_string(path)?;
    let case: Case = serde_yaml::from_str(&content)?;
    validate_case(&case)?;
    Ok(case)
}

pub fn save_yaml(path: &std::path::Path, case: &Case) -> CaseResult<()> {
    validate_case(case)?;
    let content = serde_yaml::to_string(case)?;
    std::fs::write(path, content)?;
    Ok(())
}

pub fn load_json(path: &std::path::Path) -> CaseResult<Case> {
    let content = std::fs::read_to_string(path)?;
    let case: Case = serde_json::from_str(&content)?;
    validate_case(&case)?;
    Ok(case)
}

pub fn save_json(path: &std::path::Path, case: &Case) -> CaseResult<()> {
    validate_case(case)?;
    let content = serde_json::to_string_pretty(case)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Load a case or checkpoint by extension.
///
/// `.json` is read as JSON; anything else as a YAML stream in either
/// checkpoint format (a plain case file is a valid ASCII stream).
pub fn load(path: &std::path::Path) -> CaseResult<Case> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => load_json(path),
        _ => read_checkpoint(path),
    }
}
