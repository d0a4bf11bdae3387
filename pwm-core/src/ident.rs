//! Identifier candidates for website hosts.
//!
//! A host such as `accounts.example.com` can be saved under its registrable
//! domain (`example.com`) or under the full host. Callers offer both, the
//! registrable one first.

/// Candidate identifiers for `host`: `[registrable, full]`.
///
/// Returns an empty list unless `host` consists of at least two
/// dot-separated labels made of ASCII letters, digits and `-`. For a
/// two-label host both candidates are the same string.
pub fn identifier_candidates(host: &str) -> Vec<String> {
    match registrable_domain(host) {
        Some(registrable) => vec![registrable.to_string(), host.to_string()],
        None => Vec::new(),
    }
}

/// The last two labels of `host`, if `host` is a well-formed domain.
pub fn registrable_domain(host: &str) -> Option<&str> {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 || !labels.iter().all(|label| is_label(label)) {
        return None;
    }

    let tail = labels[labels.len() - 2].len() + 1 + labels[labels.len() - 1].len();
    Some(&host[host.len() - tail..])
}

fn is_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
}
