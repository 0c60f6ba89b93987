//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract: scripts rely on them.
//!
//! | Code | Meaning                                           |
//! |------|---------------------------------------------------|
//! | 0    | Success                                           |
//! | 1    | General error (unspecified, formula evaluation)   |
//! | 2    | CLI usage error (bad args, bad settings)          |
//! | 3    | Sheet file could not be read                      |
//! | 4    | Edit rejected (invalid name, bad formula, cycle)  |
//! | 5    | Sheet file could not be written                   |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Also used when a standalone formula evaluates to an error.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, malformed --var, unusable settings.
pub const EXIT_USAGE: u8 = 2;

/// Load error - missing file, malformed XML, or a cell that fails to replay.
pub const EXIT_LOAD: u8 = 3;

/// Rejected edit - invalid cell name, formula syntax error, or circular
/// dependency. The sheet file is left untouched.
pub const EXIT_REJECTED: u8 = 4;

/// Save error - the sheet could not be written.
pub const EXIT_SAVE: u8 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let codes = [EXIT_SUCCESS, EXIT_ERROR, EXIT_USAGE, EXIT_LOAD, EXIT_REJECTED, EXIT_SAVE];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
