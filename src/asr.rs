//! Speech-recognition corrections applied before user input reaches Teneo.

use crate::models::AsrCorrection;

/// Corrections every solution starts from
pub const DEFAULT_ASR_CORRECTIONS: &[(&str, &str)] = &[
    ("tenio", "teneo"),
    ("ten eo", "teneo"),
    ("artificial solutions", "Artificial Solutions"),
    ("e-mail", "email"),
];

pub fn default_corrections() -> Vec<AsrCorrection> {
    DEFAULT_ASR_CORRECTIONS
        .iter()
        .map(|(from, to)| [from.to_string(), to.to_string()])
        .collect()
}

/// Append the solution's `original|replacement` lines to the base table.
///
/// Blank lines are skipped. Lines that do not split into exactly two non-empty
/// parts are dropped.
pub fn merge_corrections(base: &[AsrCorrection], solution_text: Option<&str>) -> Vec<AsrCorrection> {
    let mut merged = base.to_vec();
    let Some(text) = solution_text else {
        return merged;
    };

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        match parts.as_slice() {
            [from, to] if !from.is_empty() && !to.is_empty() => {
                merged.push([from.to_string(), to.to_string()]);
            }
            _ => tracing::debug!("Ignoring malformed ASR correction line: {:?}", line),
        }
    }

    merged
}
