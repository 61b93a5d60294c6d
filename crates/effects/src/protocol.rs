//! Stdout line protocol spoken by the external effect processors.
//!
//! The contract: zero or more `PROGRESS:<0-100 integer>` lines in
//! non-decreasing order, exactly one `COMPLETED` line before a normal
//! exit, exit code authoritative. Anything else is free-form log text.

/// One parsed stdout line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorLine {
    /// `PROGRESS:<n>` with `n` in `0..=100`.
    Progress(u8),
    /// The `COMPLETED` marker. Signals imminent success, but only the
    /// exit code decides the outcome.
    Completed,
    /// Any other line; informational only.
    Info(String),
}

/// Parse one stdout line. Malformed or out-of-range `PROGRESS` values
/// degrade to [`ProcessorLine::Info`] rather than failing the job.
pub fn parse_line(line: &str) -> ProcessorLine {
    let trimmed = line.trim_end();
    if trimmed == "COMPLETED" {
        return ProcessorLine::Completed;
    }
    if let Some(rest) = trimmed.strip_prefix("PROGRESS:") {
        if let Ok(value) = rest.trim().parse::<u8>() {
            if value <= 100 {
                return ProcessorLine::Progress(value);
            }
        }
    }
    ProcessorLine::Info(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_progress() {
        assert_eq!(parse_line("PROGRESS:0"), ProcessorLine::Progress(0));
        assert_eq!(parse_line("PROGRESS:42"), ProcessorLine::Progress(42));
        assert_eq!(parse_line("PROGRESS:100\n"), ProcessorLine::Progress(100));
    }

    #[test]
    fn parses_completed_marker() {
        assert_eq!(parse_line("COMPLETED"), ProcessorLine::Completed);
        assert_eq!(parse_line("COMPLETED\n"), ProcessorLine::Completed);
    }

    #[test]
    fn malformed_progress_is_informational() {
        assert_eq!(
            parse_line("PROGRESS:abc"),
            ProcessorLine::Info("PROGRESS:abc".into())
        );
        assert_eq!(
            parse_line("PROGRESS:150"),
            ProcessorLine::Info("PROGRESS:150".into())
        );
        assert_eq!(parse_line("PROGRESS:-5"), ProcessorLine::Info("PROGRESS:-5".into()));
    }

    #[test]
    fn free_form_lines_are_informational() {
        assert_eq!(
            parse_line("Input video: 1280x720, 24 FPS"),
            ProcessorLine::Info("Input video: 1280x720, 24 FPS".into())
        );
        // A completed marker with trailing text is not the marker.
        assert_eq!(
            parse_line("COMPLETED early"),
            ProcessorLine::Info("COMPLETED early".into())
        );
    }
}
