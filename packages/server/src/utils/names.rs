use sha2::{Digest, Sha256};

/// Longest name accepted for applications, configurations and services.
pub const MAX_NAME_LEN: usize = 63;

/// Length of the hash suffix in generated resource names.
const HASH_LEN: usize = 40;

/// Reduce `name` to characters allowed in a DNS label.
///
/// Leading digits and dashes are dropped, `_` becomes `-`, everything is lowercased
/// and any other character is removed.
pub fn dns_label_safe(name: &str) -> String {
    let lowered: String = name
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .chars()
        .map(|c| if c == '_' { '-' } else { c.to_ascii_lowercase() })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect();
    lowered.trim_matches('-').to_string()
}

/// Build a resource name from `parts` that is a valid DNS label of at most 63
/// characters: a readable prefix followed by a hash of the joined parts.
pub fn resource_name(parts: &[&str]) -> String {
    let joined = parts.join("-");
    let sum = hex::encode(Sha256::digest(joined.as_bytes()));
    let sum = &sum[..HASH_LEN];

    let mut prefix = dns_label_safe(&joined);
    prefix.truncate(MAX_NAME_LEN - HASH_LEN - 1);
    let prefix = prefix.trim_end_matches('-');
    if prefix.is_empty() {
        sum.to_string()
    } else {
        format!("{prefix}-{sum}")
    }
}

/// Image reference a build run pushes to.
pub fn image_url(registry: &str, namespace: &str, app: &str, run_id: &str) -> String {
    format!(
        "{}/{}-{}:{}",
        registry.trim_end_matches('/'),
        namespace,
        app,
        run_id
    )
}

/// Check that `name` is usable as a resource name: 1-63 lowercase alphanumerics or `-`,
/// starting and ending with an alphanumeric.
pub fn validate_name(what: &str, name: &str) -> Result<(), String> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-');
    if valid {
        Ok(())
    } else {
        Err(format!(
            "{what} name '{name}' must be 1-{MAX_NAME_LEN} lowercase letters, digits or '-', \
             starting and ending with a letter or digit"
        ))
    }
}

/// Domain part of a route (`host[/path]`), lowercased.
pub fn route_domain(route: &str) -> String {
    let host = route
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    host.split('/').next().unwrap_or(host).to_ascii_lowercase()
}
