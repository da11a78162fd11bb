//! Column-based parsing for tabular tool output (winget, scoop, snap).
//!
//! Column positions are detected once from the header line as character
//! indices, then applied to data rows with bounds-safe slicing. Character
//! indices (not bytes) keep Japanese headers aligned with ASCII data rows.

const PROGRESS_CHARS: [char; 5] = ['█', '▓', '▒', '░', '━'];

/// Whether the line carries terminal progress-bar glyphs that bled into
/// the captured byte stream.
#[must_use]
pub fn contains_progress_chars(line: &str) -> bool {
    line.chars().any(|c| PROGRESS_CHARS.contains(&c))
}

/// Split output into lines, dropping blank lines and progress-bar noise.
#[must_use]
pub fn split_lines(output: &str) -> Vec<&str> {
    output
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty() && !contains_progress_chars(line))
        .collect()
}

/// Whether the line consists solely of dashes (the winget separator).
/// The empty string qualifies vacuously.
#[must_use]
pub fn is_all_dashes(line: &str) -> bool {
    line.chars().all(|c| c == '-')
}

/// Whether the line is a winget summary rather than data:
/// `"<N> upgrades available"`, its Japanese counterpart, or the
/// no-upgrades notice.
#[must_use]
pub fn is_summary_line(line: &str) -> bool {
    line.contains("upgrades available")
        || line.contains("アップグレードを利用できます")
        || line.contains("No applicable upgrade")
}

/// Column start positions (character indices) from a header whose columns
/// are single tokens: every token start is a column.
#[must_use]
pub fn detect_column_positions(header: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut previous = ' ';
    for (index, c) in header.chars().enumerate() {
        if c != ' ' && previous == ' ' {
            positions.push(index);
        }
        previous = c;
    }
    positions
}

/// Column start positions for headers with multi-word column names
/// (scoop's `Installed Version`): a column starts at a token preceded by
/// two or more spaces, or at the start of the line.
#[must_use]
pub fn detect_wide_column_positions(header: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut previous = ' ';
    let mut before_previous = ' ';
    for (index, c) in header.chars().enumerate() {
        if c != ' ' && previous == ' ' && (index <= 1 || before_previous == ' ') {
            positions.push(index);
        }
        before_previous = previous;
        previous = c;
    }
    positions
}

/// Bounds-safe substring by character index.
#[must_use]
pub fn safe_substring(s: &str, start: usize, end: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    let end = end.min(chars.len());
    if start >= end {
        return String::new();
    }
    chars
        .get(start..end)
        .map(|slice| slice.iter().collect())
        .unwrap_or_default()
}

/// Slice a data row at the detected positions, trimming each cell.
#[must_use]
pub fn slice_columns(line: &str, positions: &[usize]) -> Vec<String> {
    let line_len = line.chars().count();
    positions
        .iter()
        .enumerate()
        .map(|(index, &start)| {
            let end = positions.get(index + 1).copied().unwrap_or(line_len);
            safe_substring(line, start, end).trim().to_string()
        })
        .collect()
}
