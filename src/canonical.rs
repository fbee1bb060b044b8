// sitecapture is a website capture engine.
// Copyright (C) 2026 sitecapture contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! URL canonicalization and scope matching.
//!
//! The canonical form is the scheduling identity of a page within a job:
//! two URLs differing only in scheme case, a
//! `www.` host prefix, default port, trailing slash, empty query, fragment,
//! or query-key ordering must canonicalize identically, and canonicalization
//! must be idempotent.

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeMode {
    #[default]
    Strict,
    Loose,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum CanonicalizeError {
    #[error("could not parse url: {0}")]
    Invalid(String),
    #[error("scheme is not http or https")]
    OutOfScheme,
}

/// A canonicalized, absolute http(s) URL. The wrapped string is always the
/// output of [`canonicalize`]; re-canonicalizing it is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parsed(&self) -> Url {
        Url::parse(&self.0).expect("canonical urls are always valid")
    }
}

impl std::fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runs the six-step canonicalization algorithm over any absolute URL string.
pub fn canonicalize(input: &str, stable_query: bool) -> Result<CanonicalUrl, CanonicalizeError> {
    let mut url =
        Url::parse(input).map_err(|e| CanonicalizeError::Invalid(format!("{input}: {e}")))?;

    // Step 1: scheme is already lowercased by `url::Url::parse`; just check it.
    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(CanonicalizeError::OutOfScheme),
    }

    // Step 2: strip `www.` prefix. Host case and default-port stripping are
    // already normalized by the WHATWG URL parser used by the `url` crate.
    if let Some(host) = url.host_str() {
        if let Some(stripped) = host.strip_prefix("www.") {
            let stripped = stripped.to_string();
            // set_host fails for cannot-be-a-base URLs; http(s) is always one.
            let _ = url.set_host(Some(&stripped));
        }
    }

    // Step 3: drop the fragment entirely.
    url.set_fragment(None);

    // Step 4: query normalization.
    normalize_query(&mut url, stable_query);

    // Step 5: path normalization.
    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    Ok(CanonicalUrl(url.to_string()))
}

fn normalize_query(url: &mut Url, stable_query: bool) {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(_, value)| !value.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    if pairs.is_empty() {
        url.set_query(None);
        return;
    }

    let ordered: Vec<(String, String)> = if stable_query {
        // stable sort by key only, preserving relative order of equal keys
        let mut indexed: Vec<(usize, (String, String))> =
            pairs.into_iter().enumerate().collect();
        indexed.sort_by(|a, b| a.1.0.cmp(&b.1.0).then(a.0.cmp(&b.0)));
        indexed.into_iter().map(|(_, kv)| kv).collect()
    } else {
        pairs
    };

    url.query_pairs_mut().clear().extend_pairs(&ordered);
}

/// Fully decodes each path segment, resolves `.`/`..`, collapses repeated
/// slashes, and hands the result to `url::Url::set_path` for re-encoding —
/// the `url` crate's encoder is canonical and idempotent, so decode-then-set
/// is enough to normalize percent-encoding (step 5).
fn normalize_path(path: &str) -> String {
    let mut stack: Vec<String> = Vec::new();

    for raw_segment in path.split('/') {
        if raw_segment.is_empty() {
            continue;
        }

        let decoded = percent_encoding::percent_decode_str(raw_segment)
            .decode_utf8_lossy()
            .into_owned();

        match decoded.as_str() {
            "." => {}
            ".." => {
                stack.pop();
            }
            _ => stack.push(decoded),
        }
    }

    if stack.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", stack.join("/"))
    }
}

/// Scope match. `seed` and `candidate` must both already be canonical.
pub fn in_scope(candidate: &CanonicalUrl, seed: &CanonicalUrl, mode: ScopeMode) -> bool {
    let c = candidate.parsed();
    let s = seed.parsed();

    if c.host_str() != s.host_str() {
        return false;
    }

    let seed_path = s.path();
    let candidate_path = c.path();

    match mode {
        ScopeMode::Strict => {
            candidate_path == seed_path
                || candidate_path.starts_with(&format!(
                    "{}/",
                    seed_path.strip_suffix('/').unwrap_or(seed_path)
                ))
        }
        ScopeMode::Loose => candidate_path.starts_with(seed_path),
    }
}

/// Returns the index of the first seed (in iteration order) that `candidate`
/// falls in scope of, implementing the "earliest matching seed wins"
/// attribution rule.
pub fn first_matching_seed(
    candidate: &CanonicalUrl,
    seeds: &[CanonicalUrl],
    mode: ScopeMode,
) -> Option<usize> {
    seeds.iter().position(|seed| in_scope(candidate, seed, mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(s: &str) -> CanonicalUrl {
        canonicalize(s, true).unwrap()
    }

    #[test]
    fn scheme_and_host_case() {
        assert_eq!(c("HTTP://Example.com/"), c("http://example.com/"));
    }

    #[test]
    fn www_prefix_stripped() {
        assert_eq!(c("https://www.example.com/docs"), c("https://example.com/docs"));
    }

    #[test]
    fn default_port_stripped() {
        assert_eq!(c("http://example.com:80/docs"), c("http://example.com/docs"));
        assert_eq!(
            c("https://example.com:443/docs"),
            c("https://example.com/docs")
        );
    }

    #[test]
    fn trailing_slash_stripped_unless_root() {
        assert_eq!(c("https://example.com/docs/"), c("https://example.com/docs"));
        assert_eq!(c("https://example.com/").as_str(), "https://example.com/");
    }

    #[test]
    fn fragment_removed() {
        assert_eq!(
            c("https://example.com/docs#section"),
            c("https://example.com/docs")
        );
    }

    #[test]
    fn empty_query_dropped() {
        assert_eq!(c("https://example.com/docs?"), c("https://example.com/docs"));
        assert_eq!(
            c("https://example.com/docs?a="),
            c("https://example.com/docs")
        );
    }

    #[test]
    fn query_keys_sorted_when_stable() {
        assert_eq!(
            canonicalize("https://example.com/docs?b=2&a=1", true).unwrap(),
            canonicalize("https://example.com/docs?a=1&b=2", true).unwrap()
        );
    }

    #[test]
    fn dot_segments_resolved() {
        assert_eq!(
            c("https://example.com/a/../b/./c"),
            c("https://example.com/b/c")
        );
    }

    #[test]
    fn repeated_slashes_collapsed() {
        assert_eq!(
            c("https://example.com/a//b///c"),
            c("https://example.com/a/b/c")
        );
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert_eq!(
            canonicalize("ftp://example.com/", true),
            Err(CanonicalizeError::OutOfScheme)
        );
    }

    #[test]
    fn idempotent() {
        let once = canonicalize("HTTP://WWW.Example.com:80/a/../b/?z=1&a=2#frag", true).unwrap();
        let twice = canonicalize(once.as_str(), true).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn strict_scope_rejects_sibling_prefix() {
        let seed = c("https://example.com/api");
        assert!(in_scope(&c("https://example.com/api/v1"), &seed, ScopeMode::Strict));
        assert!(!in_scope(&c("https://example.com/api-docs"), &seed, ScopeMode::Strict));
    }

    #[test]
    fn loose_scope_allows_sibling_prefix() {
        let seed = c("https://example.com/api");
        assert!(in_scope(&c("https://example.com/api-docs"), &seed, ScopeMode::Loose));
    }

    #[test]
    fn scope_requires_same_host() {
        let seed = c("https://example.com/docs");
        assert!(!in_scope(&c("https://other.com/docs"), &seed, ScopeMode::Strict));
    }

    #[test]
    fn earliest_matching_seed_wins() {
        let seeds = vec![c("https://example.com/"), c("https://example.com/docs")];
        let idx = first_matching_seed(&c("https://example.com/docs/page"), &seeds, ScopeMode::Strict);
        assert_eq!(idx, Some(0));
    }
}
