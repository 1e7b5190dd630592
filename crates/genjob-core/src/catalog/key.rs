/// Canonical catalog key: trimmed, lowercased, internal whitespace runs collapsed
/// to one space. `" Nike "`, `"nike"` and `"NIKE"` share one entry.
pub fn normalize_key(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// File-system friendly form of a key (`"coca cola"` -> `"coca-cola"`).
pub fn slug(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in normalize_key(key).chars() {
        if c.is_alphanumeric() {
            out.push(c);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        "asset".to_string()
    } else {
        trimmed.to_string()
    }
}
