//! The CORS engine.
//!
//! Validates CORS configurations on ingestion and matches preflight and
//! simple requests against a bucket's rules. Rules are evaluated in order;
//! the first match wins.

use regex::Regex;

use barrel_model::types::{CorsConfiguration, CorsRule};
use barrel_model::{S3Error, S3ErrorCode};

/// Methods a CORS rule is allowed to name.
const SUPPORTED_METHODS: [&str; 5] = ["GET", "PUT", "POST", "DELETE", "HEAD"];

/// Validate a CORS configuration at ingestion time.
///
/// # Errors
///
/// - `MalformedXML` when a rule misses its required origin or method set.
/// - `InvalidRequest` for unsupported methods or multi-wildcard origins,
///   with the exact messages S3 emits.
pub fn validate_config(config: &CorsConfiguration) -> Result<(), S3Error> {
    if config.rules.is_empty() {
        return Err(S3Error::new(S3ErrorCode::MalformedXML));
    }
    for rule in &config.rules {
        if rule.allowed_origins.is_empty() || rule.allowed_methods.is_empty() {
            return Err(S3Error::new(S3ErrorCode::MalformedXML));
        }
        for method in &rule.allowed_methods {
            if !SUPPORTED_METHODS.contains(&method.as_str()) {
                return Err(S3Error::with_message(
                    S3ErrorCode::InvalidRequest,
                    format!(
                        "Found unsupported HTTP method in CORS config. Unsupported method is {method}"
                    ),
                ));
            }
        }
        for origin in &rule.allowed_origins {
            if origin.matches('*').count() > 1 {
                return Err(S3Error::with_message(
                    S3ErrorCode::InvalidRequest,
                    format!("AllowedOrigin \"{origin}\" can not have more than one wildcard."),
                ));
            }
        }
    }
    Ok(())
}

/// The header values a successful preflight produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightMatch {
    /// `Access-Control-Allow-Origin`: `*` when the rule's origin carried a
    /// wildcard, otherwise an echo of the request origin.
    pub allow_origin: String,
    /// `Access-Control-Allow-Methods`.
    pub allow_methods: Vec<String>,
    /// `Access-Control-Allow-Headers`: the requested headers, lowercased.
    pub allow_headers: Vec<String>,
    /// `Access-Control-Max-Age`.
    pub max_age_seconds: Option<i32>,
}

/// The header values a matched simple (non-preflight) request produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleMatch {
    /// `Access-Control-Allow-Origin`.
    pub allow_origin: String,
    /// Rule-declared `Access-Control-Expose-Headers`.
    pub expose_headers: Vec<String>,
}

/// Match a preflight request against a configuration.
///
/// The first rule whose origin matches, whose method set contains the
/// requested method, and whose allowed headers cover every requested header
/// (case-insensitively) wins.
#[must_use]
pub fn match_preflight(
    config: &CorsConfiguration,
    origin: &str,
    request_method: &str,
    request_headers: &[String],
) -> Option<PreflightMatch> {
    config
        .rules
        .iter()
        .find_map(|rule| preflight_rule_match(rule, origin, request_method, request_headers))
}

fn preflight_rule_match(
    rule: &CorsRule,
    origin: &str,
    request_method: &str,
    request_headers: &[String],
) -> Option<PreflightMatch> {
    let matched_origin = rule
        .allowed_origins
        .iter()
        .find(|pattern| origin_matches(pattern, origin))?;
    if !rule.allowed_methods.iter().any(|m| m == request_method) {
        return None;
    }
    let covered = request_headers.iter().all(|requested| {
        rule.allowed_headers
            .iter()
            .any(|allowed| header_matches(allowed, requested))
    });
    if !covered {
        return None;
    }

    Some(PreflightMatch {
        allow_origin: resolve_allow_origin(matched_origin, origin),
        allow_methods: rule.allowed_methods.clone(),
        allow_headers: request_headers
            .iter()
            .map(|h| h.to_ascii_lowercase())
            .collect(),
        max_age_seconds: rule.max_age_seconds,
    })
}

/// Match a simple request (origin + actual method) against a configuration.
#[must_use]
pub fn match_simple(config: &CorsConfiguration, origin: &str, method: &str) -> Option<SimpleMatch> {
    config.rules.iter().find_map(|rule| {
        let matched_origin = rule
            .allowed_origins
            .iter()
            .find(|pattern| origin_matches(pattern, origin))?;
        if !rule.allowed_methods.iter().any(|m| m == method) {
            return None;
        }
        Some(SimpleMatch {
            allow_origin: resolve_allow_origin(matched_origin, origin),
            expose_headers: rule.expose_headers.clone(),
        })
    })
}

fn resolve_allow_origin(pattern: &str, origin: &str) -> String {
    if pattern.contains('*') {
        "*".to_owned()
    } else {
        origin.to_owned()
    }
}

/// Whether an origin pattern (with at most one `*` wildcard) matches an
/// origin. The non-wildcard remainder is regex-escaped before expansion.
fn origin_matches(pattern: &str, origin: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == origin;
    }
    let expanded = format!("^{}$", regex::escape(pattern).replace("\\*", ".*"));
    Regex::new(&expanded).is_ok_and(|re| re.is_match(origin))
}

/// Case-insensitive allowed-header match, supporting a `*` wildcard.
fn header_matches(allowed: &str, requested: &str) -> bool {
    let allowed = allowed.to_ascii_lowercase();
    let requested = requested.to_ascii_lowercase();
    if !allowed.contains('*') {
        return allowed == requested;
    }
    let expanded = format!("^{}$", regex::escape(&allowed).replace("\\*", ".*"));
    Regex::new(&expanded).is_ok_and(|re| re.is_match(&requested))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(origins: &[&str], methods: &[&str], headers: &[&str]) -> CorsRule {
        CorsRule {
            allowed_origins: origins.iter().map(|s| (*s).to_owned()).collect(),
            allowed_methods: methods.iter().map(|s| (*s).to_owned()).collect(),
            allowed_headers: headers.iter().map(|s| (*s).to_owned()).collect(),
            expose_headers: Vec::new(),
            max_age_seconds: None,
        }
    }

    fn config(rules: Vec<CorsRule>) -> CorsConfiguration {
        CorsConfiguration { rules }
    }

    #[test]
    fn test_should_match_wildcard_origin_and_answer_star() {
        let config = config(vec![rule(
            &["http://*.bar.com"],
            &["GET"],
            &["Range", "Authorization"],
        )]);
        let headers = vec!["Range".to_owned(), "Authorization".to_owned()];
        let matched = match_preflight(&config, "http://foo.bar.com", "GET", &headers)
            .expect("rule should match");
        assert_eq!(matched.allow_origin, "*");
        assert_eq!(matched.allow_methods, vec!["GET"]);
        assert_eq!(matched.allow_headers, vec!["range", "authorization"]);
    }

    #[test]
    fn test_should_reject_preflight_with_uncovered_header() {
        let config = config(vec![rule(
            &["http://*.example.com"],
            &["GET"],
            &["Range"],
        )]);
        let headers = vec!["Range".to_owned(), "Authorization".to_owned()];
        assert!(match_preflight(&config, "http://a-test.example.com", "GET", &headers).is_none());
    }

    #[test]
    fn test_should_echo_origin_for_exact_rule() {
        let config = config(vec![rule(&["http://app.example.com"], &["PUT"], &[])]);
        let matched = match_preflight(&config, "http://app.example.com", "PUT", &[])
            .expect("rule should match");
        assert_eq!(matched.allow_origin, "http://app.example.com");
    }

    #[test]
    fn test_should_not_match_different_method() {
        let config = config(vec![rule(&["*"], &["GET"], &[])]);
        assert!(match_preflight(&config, "http://any", "DELETE", &[]).is_none());
    }

    #[test]
    fn test_should_regex_escape_pattern_remainder() {
        // The dot in the pattern must not act as a regex metacharacter.
        let config = config(vec![rule(&["http://*.bar.com"], &["GET"], &[])]);
        assert!(match_preflight(&config, "http://fooXbarXcom", "GET", &[]).is_none());
    }

    #[test]
    fn test_should_match_simple_request() {
        let mut r = rule(&["*"], &["GET"], &[]);
        r.expose_headers = vec!["ETag".to_owned()];
        let config = config(vec![r]);
        let matched = match_simple(&config, "http://any.origin", "GET").expect("match");
        assert_eq!(matched.allow_origin, "*");
        assert_eq!(matched.expose_headers, vec!["ETag"]);
    }

    #[test]
    fn test_should_take_first_matching_rule() {
        let config = config(vec![
            rule(&["http://one.example.com"], &["GET"], &[]),
            rule(&["*"], &["GET"], &[]),
        ]);
        let matched = match_simple(&config, "http://one.example.com", "GET").expect("match");
        assert_eq!(matched.allow_origin, "http://one.example.com");
    }

    #[test]
    fn test_should_validate_unsupported_method() {
        let config = config(vec![rule(&["*"], &["PATCH"], &[])]);
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidRequest);
        assert!(err.message.contains("Found unsupported HTTP method in CORS config."));
        assert!(err.message.contains("PATCH"));
    }

    #[test]
    fn test_should_validate_multiple_wildcards() {
        let config = config(vec![rule(&["http://*.*.com"], &["GET"], &[])]);
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::InvalidRequest);
        assert!(err.message.contains("can not have more than one wildcard."));
    }

    #[test]
    fn test_should_validate_missing_required_elements() {
        let err = validate_config(&config(vec![])).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MalformedXML);

        let err = validate_config(&config(vec![rule(&[], &["GET"], &[])])).unwrap_err();
        assert_eq!(err.code, S3ErrorCode::MalformedXML);
    }

    #[test]
    fn test_should_support_wildcard_allowed_headers() {
        let config = config(vec![rule(&["*"], &["GET"], &["x-amz-*"])]);
        let headers = vec!["x-amz-date".to_owned()];
        assert!(match_preflight(&config, "http://any", "GET", &headers).is_some());

        let headers = vec!["content-type".to_owned()];
        assert!(match_preflight(&config, "http://any", "GET", &headers).is_none());
    }
}
