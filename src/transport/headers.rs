//! HTTP header parsing: Link relations, Retry-After, HTTP dates

use jiff::fmt::rfc2822;
use jiff::{SignedDuration, Timestamp};
use reqwest::header::{DATE, EXPIRES, HeaderMap, LAST_MODIFIED, LINK, RETRY_AFTER};
use url::Url;

/// Parse an HTTP date (IMF-fixdate and the RFC 2822 obsolete forms)
pub(crate) fn http_date(value: &str) -> Option<Timestamp> {
    static PARSER: rfc2822::DateTimeParser = rfc2822::DateTimeParser::new();
    PARSER.parse_timestamp(value.trim()).ok()
}

/// Format a timestamp as an IMF-fixdate for request headers
pub(crate) fn format_http_date(timestamp: Timestamp) -> String {
    timestamp.strftime("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: reqwest::header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Resolve `Retry-After` to an absolute instant. Delta-seconds count from
/// now; an HTTP-date is taken relative to the server's `Date` header.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Timestamp> {
    let raw = header_str(headers, RETRY_AFTER)?;
    let now = Timestamp::now();
    if let Ok(seconds) = raw.trim().parse::<i64>() {
        return now.checked_add(SignedDuration::from_secs(seconds)).ok();
    }
    let target = http_date(raw)?;
    let reference = header_str(headers, DATE).and_then(http_date).unwrap_or(now);
    let mut delta = target.duration_since(reference);
    if delta.is_negative() {
        delta = SignedDuration::ZERO;
    }
    now.checked_add(delta).ok()
}

/// Parse the `Last-Modified` header
pub(crate) fn last_modified(headers: &HeaderMap) -> Option<Timestamp> {
    header_str(headers, LAST_MODIFIED).and_then(http_date)
}

/// Parse the `Expires` header
pub(crate) fn expires(headers: &HeaderMap) -> Option<Timestamp> {
    header_str(headers, EXPIRES).and_then(http_date)
}

/// Collect all `Link` targets with the given relation, resolved against
/// the request URL
pub(crate) fn links(headers: &HeaderMap, base: &Url, rel: &str) -> Vec<Url> {
    let mut out = Vec::new();
    for value in headers.get_all(LINK) {
        let Ok(value) = value.to_str() else { continue };
        for (target, rels) in parse_link_header(value) {
            if rels.iter().any(|r| r == rel)
                && let Ok(url) = base.join(&target)
            {
                out.push(url);
            }
        }
    }
    out
}

/// Split an RFC 8288 `Link` header value into (target, relations) pairs.
/// Commas inside angle brackets and quoted parameters do not separate
/// links.
fn parse_link_header(value: &str) -> Vec<(String, Vec<String>)> {
    let mut result = Vec::new();
    let mut rest = value;
    while let Some(start) = rest.find('<') {
        let Some(end) = rest[start..].find('>') else {
            break;
        };
        let target = rest[start + 1..start + end].to_string();
        rest = &rest[start + end + 1..];

        // parameters run up to the next unquoted comma
        let mut in_quotes = false;
        let mut cut = rest.len();
        for (i, c) in rest.char_indices() {
            match c {
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => {
                    cut = i;
                    break;
                }
                _ => {}
            }
        }
        let params = &rest[..cut];
        rest = rest.get(cut + 1..).unwrap_or("");

        let mut rels = Vec::new();
        for param in params.split(';') {
            if let Some(v) = param.trim().strip_prefix("rel=") {
                let v = v.trim().trim_matches('"');
                rels.extend(v.split_ascii_whitespace().map(str::to_string));
            }
        }
        result.push((target, rels));
    }
    result
}
