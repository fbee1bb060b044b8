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

//! Sitemap XML parsing (Phase A). Pure and synchronous; fetching
//! and recursion-depth bookkeeping live in `discovery`.

use quick_xml::events::Event;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapEntry {
    Url(Url),
    Sitemap(Url),
}

/// Parses `<urlset>` or `<sitemapindex>` documents, ignoring everything
/// malformed rather than failing the whole document: a sitemap with one bad
/// `<loc>` still yields every other entry.
pub fn parse_sitemap(s: &str) -> Vec<SitemapEntry> {
    let mut reader = quick_xml::Reader::from_str(s);

    let mut res = vec![];

    let mut in_sitemap = false;
    let mut in_url = false;
    let mut in_loc = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                if e.name().as_ref() == b"sitemap" {
                    in_sitemap = true;
                } else if e.name().as_ref() == b"url" {
                    in_url = true;
                } else if e.name().as_ref() == b"loc" {
                    in_loc = true;
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"sitemap" {
                    in_sitemap = false;
                } else if e.name().as_ref() == b"url" {
                    in_url = false;
                } else if e.name().as_ref() == b"loc" {
                    in_loc = false;
                }
            }
            Ok(Event::Text(e)) => {
                let Ok(text) = e.unescape() else { continue };
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    continue;
                }

                if in_sitemap && in_loc {
                    if let Ok(url) = Url::parse(trimmed) {
                        res.push(SitemapEntry::Sitemap(url));
                    }
                } else if in_url && in_loc {
                    if let Ok(url) = Url::parse(trimmed) {
                        res.push(SitemapEntry::Url(url));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!("failed to parse sitemap: {}", e);
                break;
            }
            _ => (),
        }
    }

    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sitemap_index() {
        let doc = r#"<sitemapindex>
        <sitemap>
        <loc>https://example.com/sitemap.a.xml</loc>
        </sitemap>
        <sitemap>
        <loc>
        https://example.com/sitemap.b.xml
        </loc>
        </sitemap>
        </sitemapindex>"#;

        let entries = parse_sitemap(doc);
        assert_eq!(
            entries,
            vec![
                SitemapEntry::Sitemap(Url::parse("https://example.com/sitemap.a.xml").unwrap()),
                SitemapEntry::Sitemap(Url::parse("https://example.com/sitemap.b.xml").unwrap()),
            ]
        );
    }

    #[test]
    fn parses_urlset() {
        let doc = r#"<urlset>
        <url><loc>https://example.com/docs</loc></url>
        <url><loc>https://example.com/docs/a</loc></url>
        </urlset>"#;

        let entries = parse_sitemap(doc);
        assert_eq!(
            entries,
            vec![
                SitemapEntry::Url(Url::parse("https://example.com/docs").unwrap()),
                SitemapEntry::Url(Url::parse("https://example.com/docs/a").unwrap()),
            ]
        );
    }

    #[test]
    fn ignores_malformed_loc_but_keeps_others() {
        let doc = r#"<urlset>
        <url><loc>not a url</loc></url>
        <url><loc>https://example.com/ok</loc></url>
        </urlset>"#;

        let entries = parse_sitemap(doc);
        assert_eq!(
            entries,
            vec![SitemapEntry::Url(Url::parse("https://example.com/ok").unwrap())]
        );
    }

    #[test]
    fn truncated_document_yields_partial_results() {
        let doc = r#"<urlset><url><loc>https://example.com/a</loc></url><url><loc"#;
        let entries = parse_sitemap(doc);
        assert_eq!(
            entries,
            vec![SitemapEntry::Url(Url::parse("https://example.com/a").unwrap())]
        );
    }
}
