//! Helpers for presenting subprocess output.

/// Sanitize command output for inclusion in diagnostics.
///
/// Truncates long lines, limits the number of lines shown and caps the
/// total length so a noisy syntax checker cannot flood an operation result.
pub fn sanitize_output(output: &str, max_lines: usize) -> String {
    const MAX_LINE_LENGTH: usize = 200;
    const MAX_TOTAL_LENGTH: usize = 2000;

    let mut result = String::new();

    for line in output.lines().filter(|l| !l.trim().is_empty()).take(max_lines) {
        let truncated = if line.chars().count() > MAX_LINE_LENGTH {
            let head: String = line.chars().take(MAX_LINE_LENGTH).collect();
            format!("{}...", head)
        } else {
            line.to_string()
        };

        if result.len() + truncated.len() > MAX_TOTAL_LENGTH {
            result.push_str("...[truncated]");
            return result;
        }

        if !result.is_empty() {
            result.push('\n');
        }
        result.push_str(&truncated);
    }

    if output.lines().filter(|l| !l.trim().is_empty()).count() > max_lines {
        result.push_str("\n...[additional output truncated]");
    }

    result
}

/// Return the first marker that occurs in `output`, if any.
pub fn find_marker<'a>(output: &str, markers: &'a [String]) -> Option<&'a str> {
    markers
        .iter()
        .find(|marker| output.contains(marker.as_str()))
        .map(|s| s.as_str())
}
