//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Success                                                        |
//! | 1    | General error (unspecified, or diagnose found problems)        |
//! | 2    | Usage error (bad arguments, required path not given)           |
//! | 3    | Fatal input: species CSV, metadata sheet or every input unusable |
//! | 4    | Invalid reconciliation config                                  |
//! | 5    | Output (or merged copy) could not be written                   |
//! | 6    | Partial: some input files were skipped (only with `--strict`)  |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// A required lookup (species CSV, metadata spreadsheet) is missing or
/// unreadable, or no input file could be loaded. Nothing was written.
pub const EXIT_FATAL_INPUT: u8 = 3;

/// The TOML config failed to parse or validate, or the dedup key names a
/// column the data does not have.
pub const EXIT_INVALID_CONFIG: u8 = 4;

/// Writing the output GeoPackage or the merged copy failed.
pub const EXIT_OUTPUT_WRITE: u8 = 5;

/// The output was written but at least one input was skipped, and `--strict`
/// was given.
pub const EXIT_PARTIAL: u8 = 6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_FATAL_INPUT,
            EXIT_INVALID_CONFIG,
            EXIT_OUTPUT_WRITE,
            EXIT_PARTIAL,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
