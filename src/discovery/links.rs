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

//! Link filtering and resolution for Phase B harvesting.

use url::Url;

/// File extensions that are never worth rendering as a page: documents,
/// archives, media. A link ending in one of these is discarded before it
/// ever reaches canonicalization.
pub const IGNORED_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp", "rtf", "csv", "zip",
    "tar", "gz", "bz2", "7z", "rar", "xz", "jpg", "jpeg", "png", "gif", "bmp", "svg", "webp",
    "ico", "tiff", "mp3", "wav", "ogg", "flac", "aac", "mp4", "avi", "mov", "wmv", "mkv", "webm",
    "exe", "dmg", "pkg", "deb", "rpm", "apk", "iso", "woff", "woff2", "ttf", "eot", "json", "xml",
    "css", "js",
];

/// Returns whether `path`'s extension is in [`IGNORED_EXTENSIONS`], matched
/// case-insensitively on the final path segment.
pub fn has_ignored_extension(path: &str) -> bool {
    let Some(last_segment) = path.rsplit('/').next() else {
        return false;
    };

    let Some((_, ext)) = last_segment.rsplit_once('.') else {
        return false;
    };

    IGNORED_EXTENSIONS
        .iter()
        .any(|ignored| ignored.eq_ignore_ascii_case(ext))
}

/// Resolves `raw` against `base` and returns it if it's a candidate worth
/// queuing: an absolute http(s) URL with no ignored extension. Anything else
/// (mailto:, javascript:, tel:, unresolvable relative refs, asset links) is
/// silently dropped, matching Phase B's filter list.
pub fn resolve_candidate(raw: &str, base: &Url) -> Option<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let resolved = base.join(trimmed).ok()?;

    match resolved.scheme() {
        "http" | "https" => {}
        _ => return None,
    }

    if has_ignored_extension(resolved.path()) {
        return None;
    }

    Some(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/docs/").unwrap()
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(resolve_candidate("mailto:a@example.com", &base()).is_none());
        assert!(resolve_candidate("javascript:void(0)", &base()).is_none());
        assert!(resolve_candidate("tel:+15551234567", &base()).is_none());
    }

    #[test]
    fn rejects_ignored_extensions() {
        assert!(resolve_candidate("/report.pdf", &base()).is_none());
        assert!(resolve_candidate("/archive.tar.gz", &base()).is_none());
        assert!(resolve_candidate("/styles.CSS", &base()).is_none());
    }

    #[test]
    fn accepts_plain_pages() {
        let resolved = resolve_candidate("page", &base()).unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/docs/page");
    }

    #[test]
    fn resolves_relative_against_base() {
        let resolved = resolve_candidate("../other", &base()).unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/other");
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert!(has_ignored_extension("/a/b.PDF"));
        assert!(!has_ignored_extension("/a/b.html"));
        assert!(!has_ignored_extension("/a/b"));
    }
}
