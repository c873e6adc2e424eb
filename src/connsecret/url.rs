//! # Connection URL Credentials
//!
//! Splices percent-encoded `username:password` user-info into MongoDB
//! connection strings.
//!
//! Connection strings are not generic URLs: `mongodb://` strings carry a
//! comma-separated host list (`h1:27017,h2:27017`) that URL parsers reject,
//! so only the authority is located and rewritten. Everything after it
//! (path, query, fragment) is kept verbatim.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;

/// RFC 3986 unreserved characters stay literal, everything else is escaped
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("connection string has no scheme: {0}")]
    MissingScheme(String),
    #[error("connection string has no host: {0}")]
    MissingHost(String),
}

struct Parts<'a> {
    scheme: &'a str,
    userinfo: Option<&'a str>,
    hosts: &'a str,
    tail: &'a str,
}

fn split(url: &str) -> Option<Parts<'_>> {
    let (scheme, rest) = url.split_once("://")?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(end);
    // passwords may legally contain '@' once escaped, the last one delimits
    let (userinfo, hosts) = match authority.rfind('@') {
        Some(at) => (Some(&authority[..at]), &authority[at + 1..]),
        None => (None, authority),
    };
    Some(Parts {
        scheme,
        userinfo,
        hosts,
        tail,
    })
}

/// Return `url` with `username`/`password` set as its user-info, replacing
/// any user-info already present. An empty `url` stays empty (the endpoint
/// variant does not exist).
///
/// # Errors
/// Returns an error if `url` has no scheme or no host
pub fn embed_credentials(url: &str, username: &str, password: &str) -> Result<String, UrlError> {
    if url.is_empty() {
        return Ok(String::new());
    }
    let parts = split(url).ok_or_else(|| UrlError::MissingScheme(strip_credentials(url)))?;
    if parts.hosts.is_empty() {
        return Err(UrlError::MissingHost(strip_credentials(url)));
    }
    Ok(format!(
        "{}://{}:{}@{}{}",
        parts.scheme,
        utf8_percent_encode(username, USERINFO),
        utf8_percent_encode(password, USERINFO),
        parts.hosts,
        parts.tail
    ))
}

/// Remove user-info from `url`. Strings without a scheme are returned as is.
#[must_use]
pub fn strip_credentials(url: &str) -> String {
    match split(url) {
        Some(parts) => format!("{}://{}{}", parts.scheme, parts.hosts, parts.tail),
        None => url.to_string(),
    }
}

/// Decoded `(username, password)` of a connection string, if any
#[must_use]
pub fn credentials_of(url: &str) -> Option<(String, String)> {
    let userinfo = split(url)?.userinfo?;
    let (user, password) = userinfo.split_once(':').unwrap_or((userinfo, ""));
    Some((
        percent_decode_str(user).decode_utf8_lossy().into_owned(),
        percent_decode_str(password).decode_utf8_lossy().into_owned(),
    ))
}
