//! Local normalisation of raw OCR output.

/// Collapse whitespace runs, drop blank lines and lines with no letters or
/// digits (OCR noise such as `|||` or `~~`), and join the rest with newlines.
pub fn normalize_ocr_text(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| line.chars().any(char::is_alphanumeric))
        .collect::<Vec<_>>()
        .join("\n")
}
