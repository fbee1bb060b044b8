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

//! Content hashing and dedup. The hash is computed over
//! whitespace-normalized text so that two pages differing only in trailing
//! spaces or blank-line runs collapse to the same identity.

use base64::Engine;
use sha2::{Digest, Sha256};

/// Strips trailing whitespace from every line, then collapses runs of three
/// or more blank lines down to two, before hashing, so two renders of the
/// same content always hash equal even if a renderer's whitespace output
/// jitters slightly between calls.
pub fn normalize_text(text: &str) -> String {
    let trimmed_lines: Vec<&str> = text.lines().map(|line| line.trim_end()).collect();

    let mut out = Vec::with_capacity(trimmed_lines.len());
    let mut blank_run = 0usize;

    for line in trimmed_lines {
        if line.is_empty() {
            blank_run += 1;
            if blank_run <= 2 {
                out.push(line);
            }
        } else {
            blank_run = 0;
            out.push(line);
        }
    }

    out.join("\n")
}

/// SHA-256 over the normalized text, base64url-encoded (no padding).
pub fn content_hash(text: &str) -> String {
    let normalized = normalize_text(text);
    let digest = Sha256::digest(normalized.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_whitespace_per_line() {
        let a = normalize_text("hello \nworld\t\n");
        let b = normalize_text("hello\nworld\n");
        assert_eq!(a, b);
    }

    #[test]
    fn collapses_long_blank_runs() {
        let normalized = normalize_text("a\n\n\n\n\nb");
        assert_eq!(normalized, "a\n\n\nb");
    }

    #[test]
    fn keeps_up_to_two_blank_lines() {
        let normalized = normalize_text("a\n\n\nb");
        assert_eq!(normalized, "a\n\n\nb");
    }

    #[test]
    fn identical_normalized_text_hashes_equal() {
        let h1 = content_hash("Line one. \nLine two.\n\n\n\nLine three.");
        let h2 = content_hash("Line one.\nLine two.\n\nLine three.");
        assert_eq!(h1, h2);
    }

    #[test]
    fn different_text_hashes_differ() {
        assert_ne!(content_hash("a"), content_hash("b"));
    }

    #[test]
    fn hash_is_url_safe_base64() {
        let h = content_hash("anything");
        assert!(h.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
