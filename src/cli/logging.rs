//! Console output gating

/// How much the CLI prints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Errors only
    Quiet,
    /// Result lines
    Normal,
    /// Result lines plus paths, load details and the timing report
    Verbose,
}

impl LogLevel {
    /// `--quiet` wins over `--verbose`
    pub fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            LogLevel::Quiet
        } else if verbose {
            LogLevel::Verbose
        } else {
            LogLevel::Normal
        }
    }

    /// Whether a message logged at `required` is shown at this level
    pub fn shows(self, required: LogLevel) -> bool {
        self != LogLevel::Quiet && (self == required || required == LogLevel::Normal)
    }
}

/// Print `msg` if the current level permits it
pub fn log(level: LogLevel, required: LogLevel, msg: &str) {
    if level.shows(required) {
        println!("{msg}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(LogLevel::from_flags(true, true), LogLevel::Quiet);
        assert_eq!(LogLevel::from_flags(false, true), LogLevel::Verbose);
        assert_eq!(LogLevel::from_flags(false, false), LogLevel::Normal);
    }

    #[test]
    fn test_level_gating() {
        assert!(LogLevel::Normal.shows(LogLevel::Normal));
        assert!(!LogLevel::Normal.shows(LogLevel::Verbose));
        assert!(LogLevel::Verbose.shows(LogLevel::Normal));
        assert!(LogLevel::Verbose.shows(LogLevel::Verbose));
        assert!(!LogLevel::Quiet.shows(LogLevel::Normal));
    }
}
