use deunicode::deunicode;

/// Normalize arbitrary text into a filesystem- and URL-safe token.
///
/// Transliterates to the closest ASCII representation, drops everything
/// outside word characters, whitespace, and hyphens, then collapses
/// whitespace/hyphen runs into a single underscore and lowercases.
/// Always succeeds; the result may be empty.
pub fn sanitize(value: &str) -> String {
    let ascii = deunicode(value);
    let kept = ascii
        .chars()
        .filter(|ch| ch.is_alphanumeric() || *ch == '_' || ch.is_whitespace() || *ch == '-')
        .collect::<String>();

    let mut output = String::with_capacity(kept.len());
    let mut in_separator = false;
    for ch in kept.trim().chars() {
        if ch.is_whitespace() || ch == '-' {
            if !in_separator {
                output.push('_');
                in_separator = true;
            }
            continue;
        }
        output.extend(ch.to_lowercase());
        in_separator = false;
    }
    output
}
