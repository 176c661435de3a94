use geoflow_core::error::Error::InvalidSelection;
use geoflow_core::error::Result;

/// Parse a line selection such as `1,3-5` into zero-based command indices.
///
/// Line numbers are 1-based and must lie within the `line_count` lines of
/// the command file. The result is sorted and free of duplicates.
///
/// # Errors
///
/// Returns an error for empty items, non-numeric bounds, reversed ranges
/// and lines outside the file.
///
/// # Examples
///
/// ```rust
/// use geoflow_cli::arguments::parse_selection;
///
/// assert_eq!(parse_selection("1,3-5", 6).unwrap(), vec![0, 2, 3, 4]);
/// ```
pub fn parse_selection(selection: &str, line_count: usize) -> Result<Vec<usize>> {
    let invalid = |reason: String| InvalidSelection(selection.to_string(), reason);
    let line = |text: &str| -> Result<usize> {
        let number = text
            .trim()
            .parse::<usize>()
            .map_err(|_| invalid(format!("`{}` is not a line number", text.trim())))?;
        if number == 0 || number > line_count {
            return Err(invalid(format!(
                "line {number} is outside 1-{line_count}"
            )));
        }
        Ok(number - 1)
    };

    let mut indices = Vec::new();
    for item in selection.split(',') {
        if item.trim().is_empty() {
            return Err(invalid("empty item".to_string()));
        }

        match item.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (line(start)?, line(end)?);
                if start > end {
                    return Err(invalid(format!("range `{}` is reversed", item.trim())));
                }
                indices.extend(start..=end);
            }
            None => indices.push(line(item)?),
        }
    }

    indices.sort_unstable();
    indices.dedup();
    Ok(indices)
}
