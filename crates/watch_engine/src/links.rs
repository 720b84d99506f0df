use url::Url;

/// Resolves an `href` found in the portal markup to an absolute URL.
///
/// Absolute references are kept as they are, relative ones are joined onto
/// `base`. Empty, fragment-only, query-only and `javascript:` references
/// carry no destination and resolve to `None`.
pub fn resolve_link(reference: &str, base: Option<&Url>) -> Option<String> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with('?') || lower.starts_with("javascript:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url.into());
    }
    base.and_then(|base| base.join(trimmed).ok())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::resolve_link;
    use url::Url;

    fn base() -> Url {
        Url::parse("https://tp.bitmesra.co.in/").unwrap()
    }

    #[test]
    fn relative_paths_join_onto_base() {
        assert_eq!(
            resolve_link("/j/1", Some(&base())).as_deref(),
            Some("https://tp.bitmesra.co.in/j/1")
        );
        assert_eq!(
            resolve_link("viewjob.html?id=7", Some(&base())).as_deref(),
            Some("https://tp.bitmesra.co.in/viewjob.html?id=7")
        );
    }

    #[test]
    fn absolute_links_are_kept() {
        assert_eq!(
            resolve_link(" https://elsewhere.example/x ", Some(&base())).as_deref(),
            Some("https://elsewhere.example/x")
        );
    }

    #[test]
    fn dead_references_resolve_to_none() {
        assert_eq!(resolve_link("", Some(&base())), None);
        assert_eq!(resolve_link("#top", Some(&base())), None);
        assert_eq!(resolve_link("javascript:void(0)", Some(&base())), None);
    }

    #[test]
    fn relative_link_without_base_is_dropped() {
        assert_eq!(resolve_link("/j/1", None), None);
    }
}
