//! Allowlist for remotely loaded images.
//!
//! Patterns use the framework's glob rules: in a hostname `*` matches one
//! label and `**` matches one or more; in a path `*` matches one segment and
//! `**` matches any number. A URL is allowed only if some pattern matches its
//! scheme, host, port and path.

use reqwest::Url;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePattern {
    pub protocol: &'static str,
    pub hostname: &'static str,
    /// Empty means the scheme's default port only.
    pub port: &'static str,
    pub pathname: &'static str,
}

/// Storage buckets on any project subdomain, and generated avatars.
pub const REMOTE_IMAGE_PATTERNS: &[RemotePattern] = &[
    RemotePattern {
        protocol: "https",
        hostname: "**.supabase.co",
        port: "",
        pathname: "/**",
    },
    RemotePattern {
        protocol: "https",
        hostname: "ui-avatars.com",
        port: "",
        pathname: "/**",
    },
];

impl RemotePattern {
    pub fn matches(&self, url: &Url) -> bool {
        if url.scheme() != self.protocol {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        let port_ok = match (self.port, url.port()) {
            ("", None) => true,
            ("", Some(_)) => false,
            (expected, Some(port)) => expected == port.to_string(),
            (_, None) => false,
        };
        port_ok
            && glob_match(&labels(self.hostname, '.'), &labels(host, '.'), true)
            && glob_match(&labels(self.pathname, '/'), &labels(url.path(), '/'), false)
    }
}

fn labels(text: &str, sep: char) -> Vec<&str> {
    text.split(sep).filter(|s| !s.is_empty()).collect()
}

/// Segment-wise glob. `double_needs_one` makes `**` require at least one
/// segment (hostnames) instead of zero (paths).
fn glob_match(pattern: &[&str], input: &[&str], double_needs_one: bool) -> bool {
    match pattern.split_first() {
        None => input.is_empty(),
        Some((&"**", rest)) => {
            let min = usize::from(double_needs_one);
            (min..=input.len()).any(|skip| glob_match(rest, &input[skip..], double_needs_one))
        }
        Some((&"*", rest)) => {
            !input.is_empty() && glob_match(rest, &input[1..], double_needs_one)
        }
        Some((head, rest)) => match input.split_first() {
            Some((first, tail)) => {
                head.eq_ignore_ascii_case(first) && glob_match(rest, tail, double_needs_one)
            }
            None => false,
        },
    }
}

pub fn is_allowed_remote_image(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => REMOTE_IMAGE_PATTERNS.iter().any(|p| p.matches(&parsed)),
        Err(e) => {
            tracing::debug!(url, error = %e, "unparseable image url");
            false
        }
    }
}
