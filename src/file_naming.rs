/// Sanitizes a string for use in filenames by replacing problematic characters
///
/// Replaces characters that are invalid or problematic in filenames across
/// platforms with a space:
/// - Path separators: / \
/// - Reserved characters: : * ? " < > |
/// - Dots, so names never clash with the extension
/// - Control characters
///
/// Leading and trailing whitespace is trimmed.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '.' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    sanitized.trim().to_string()
}
