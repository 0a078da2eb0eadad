/// Normalise a domain or origin for allow-list comparison.
///
/// Lower-cases the input and strips a URL scheme, any path, query or
/// fragment, a port, a leading `www.` and a trailing dot, so that
/// `https://WWW.Example.org:443/stories/` becomes `example.org`.
pub fn normalize_domain(domain: &str) -> String {
    let mut host = domain.trim().to_ascii_lowercase();

    if let Some(idx) = host.find("://") {
        host = host[idx + 3..].to_string();
    }
    if let Some(idx) = host.find(['/', '?', '#']) {
        host.truncate(idx);
    }
    // userinfo is never part of a registered domain
    if let Some(idx) = host.rfind('@') {
        host = host[idx + 1..].to_string();
    }
    if let Some(idx) = host.rfind(':') {
        if host[idx + 1..].chars().all(|c| c.is_ascii_digit()) {
            host.truncate(idx);
        }
    }
    while host.ends_with('.') {
        host.pop();
    }
    match host.strip_prefix("www.") {
        Some(stripped) => stripped.to_string(),
        None => host,
    }
}

/// Returns true when `calling_domain` equals an allow-list entry or is a
/// subdomain of one.
///
/// Suffix matches must fall on a label boundary: `cdn.example.org` matches
/// `example.org`, `badexample.org` does not. An empty allow-list allows every
/// caller.
///
/// # Arguments
///
/// * `allowed` - Registered allow-list entries (normalised on the fly)
/// * `calling_domain` - Domain or origin the request came from
pub fn domain_allowed<S: AsRef<str>>(allowed: &[S], calling_domain: &str) -> bool {
    if allowed.is_empty() {
        return true;
    }

    let caller = normalize_domain(calling_domain);
    if caller.is_empty() {
        return false;
    }

    allowed.iter().any(|entry| {
        let entry = normalize_domain(entry.as_ref());
        if entry.is_empty() {
            return false;
        }
        caller == entry
            || caller
                .strip_suffix(entry.as_str())
                .is_some_and(|rest| rest.ends_with('.'))
    })
}
