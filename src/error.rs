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

/// Crate-wide error kinds. Per-URL failures (`RenderFailed`,
/// `StoreFailed`) never propagate out of the worker loop as `Error` — they
/// are logged and counted. This enum is for errors that cross a component
/// boundary as a typed value: job setup, canonicalization, and capability
/// calls.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("url could not be canonicalized: {0}")]
    Invalid(String),

    #[error("url scheme not http/https")]
    OutOfScheme,

    #[error("url host does not match seed")]
    OutOfHost,

    #[error("url path out of seed scope")]
    OutOfPath,

    #[error("sitemap fetch failed: {0}")]
    SitemapFetchFailed(String),

    #[error("render failed: {0}")]
    RenderFailed(#[from] crate::render::RenderError),

    #[error("store operation failed: {0}")]
    StoreFailed(String),

    #[error("render slot pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("a capture job is already active")]
    AlreadyActive,

    #[error("no job found with id {0}")]
    JobNotFound(String),

    #[error("operation was cancelled")]
    Cancelled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
