/// Canonical form used as the natural key for users and score records.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Cheap shape check for intake forms; delivery is never attempted here.
pub fn is_plausible_email(raw: &str) -> bool {
    let value = raw.trim();
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.contains(char::is_whitespace)
        && !domain.contains('@')
}
