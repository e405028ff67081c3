/// Sub-resource suffixes that only exist on the API side.
const API_SUFFIXES: &[&str] = &["/comments", "/reviews", "/review_comments"];

/// Map a subject's API locator to the web page a browser should open.
///
/// - `https://api.github.com/repos/o/r/...` becomes `https://github.com/o/r/...`
/// - `https://{host}/api/v3/repos/o/r/...` (Enterprise) becomes `https://{host}/o/r/...`
/// - the plural `/pulls/` segment becomes `/pull/`
/// - a trailing `/comments`, `/reviews` or `/review_comments` is dropped
///
/// URLs that match none of the rules come back unchanged.
pub fn web_url(api_url: &str) -> String {
    let mut url = api_url.replacen("api.github.com/repos/", "github.com/", 1);
    if let Some(idx) = url.find("/api/v3/repos/") {
        url.replace_range(idx..idx + "/api/v3/repos".len(), "");
    }
    let url = url.replacen("/pulls/", "/pull/", 1);

    for suffix in API_SUFFIXES {
        if let Some(stripped) = url.strip_suffix(suffix) {
            return stripped.to_owned();
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pull_review_listing_maps_to_pull_page() {
        assert_eq!(
            web_url("https://api.github.com/repos/o/r/pulls/7/reviews"),
            "https://github.com/o/r/pull/7"
        );
    }

    #[test]
    fn issue_comments_suffix_is_stripped() {
        assert_eq!(
            web_url("https://api.github.com/repos/o/r/issues/12/comments"),
            "https://github.com/o/r/issues/12"
        );
    }

    #[test]
    fn review_comments_suffix_is_stripped() {
        assert_eq!(
            web_url("https://api.github.com/repos/o/r/pulls/3/review_comments"),
            "https://github.com/o/r/pull/3"
        );
    }

    #[test]
    fn enterprise_host_is_kept() {
        assert_eq!(
            web_url("https://git.corp.example.com/api/v3/repos/team/proj/pulls/9"),
            "https://git.corp.example.com/team/proj/pull/9"
        );
    }

    #[test]
    fn release_url_passes_through_host_rewrite() {
        assert_eq!(
            web_url("https://api.github.com/repos/o/r/releases/100"),
            "https://github.com/o/r/releases/100"
        );
    }

    #[test]
    fn repo_named_pulls_is_not_mangled() {
        // Only the `/pulls/` path segment is rewritten.
        assert_eq!(
            web_url("https://api.github.com/repos/o/pullsy/issues/1"),
            "https://github.com/o/pullsy/issues/1"
        );
    }
}
