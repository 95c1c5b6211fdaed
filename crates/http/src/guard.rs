//! Defensive URL checking.
//!
//! Webhook URLs are tenant-authored configuration, so every outbound URL
//! is screened before a connection is attempted: http(s) schemes only,
//! and no loopback / link-local / private-range targets unless the
//! deployment explicitly allows them.

use std::net::IpAddr;

use url::{Host, Url};

use crate::error::HttpError;

/// Validate an outbound URL. Returns the parsed URL on success.
pub fn check_url(raw: &str, allow_private: bool) -> Result<Url, HttpError> {
    let url = Url::parse(raw).map_err(|e| HttpError::InvalidUrl(format!("{raw}: {e}")))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(HttpError::BlockedUrl(format!(
                "scheme {other:?} is not allowed"
            )));
        }
    }

    if allow_private {
        return Ok(url);
    }

    match url.host() {
        None => Err(HttpError::BlockedUrl("url has no host".into())),
        Some(Host::Domain(domain)) => {
            let lowered = domain.to_ascii_lowercase();
            if lowered == "localhost" || lowered.ends_with(".localhost") {
                return Err(HttpError::BlockedUrl(format!("{domain} is loopback")));
            }
            Ok(url)
        }
        Some(Host::Ipv4(ip)) => {
            if is_private_ip(IpAddr::V4(ip)) {
                return Err(HttpError::BlockedUrl(format!("{ip} is a private address")));
            }
            Ok(url)
        }
        Some(Host::Ipv6(ip)) => {
            if is_private_ip(IpAddr::V6(ip)) {
                return Err(HttpError::BlockedUrl(format!("{ip} is a private address")));
            }
            Ok(url)
        }
    }
}

/// Loopback, link-local, RFC1918, and v6 unique-local ranges.
fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique-local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link-local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://hooks.example.com/notify")]
    #[case("http://203.0.113.7:8080/hook")]
    #[case("https://api.example.com/v1/tickets?project=OPS")]
    fn public_urls_pass(#[case] raw: &str) {
        assert!(check_url(raw, false).is_ok());
    }

    #[rstest]
    #[case("ftp://example.com/file")]
    #[case("file:///etc/passwd")]
    #[case("gopher://example.com")]
    fn non_http_schemes_are_blocked(#[case] raw: &str) {
        assert!(matches!(check_url(raw, false), Err(HttpError::BlockedUrl(_))));
    }

    #[rstest]
    #[case("http://localhost:8080/internal")]
    #[case("http://admin.localhost/panel")]
    #[case("http://127.0.0.1/metadata")]
    #[case("http://10.0.0.4/admin")]
    #[case("http://172.16.3.2/")]
    #[case("http://192.168.1.1/router")]
    #[case("http://169.254.169.254/latest/meta-data")]
    #[case("http://[::1]/")]
    #[case("http://[fd00::1]/")]
    fn private_targets_are_blocked(#[case] raw: &str) {
        assert!(matches!(check_url(raw, false), Err(HttpError::BlockedUrl(_))));
    }

    #[test]
    fn allow_flag_admits_private_targets() {
        assert!(check_url("http://127.0.0.1:9000/hook", true).is_ok());
        assert!(check_url("http://10.1.2.3/hook", true).is_ok());
    }

    #[test]
    fn garbage_is_invalid_not_blocked() {
        assert!(matches!(
            check_url("not a url at all", false),
            Err(HttpError::InvalidUrl(_))
        ));
    }
}
