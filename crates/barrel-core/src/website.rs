//! The static-website engine.
//!
//! Resolves a website-service request against a bucket's website
//! configuration: index-document resolution, index redirects for extensionless
//! directory requests, routing-rule evaluation, and error-document fallback.
//! Per-object redirect metadata (`x-amz-website-redirect-location`) is applied
//! by the HTTP layer after the object is fetched.

use http::StatusCode;

use barrel_model::types::{RoutingRule, WebsiteConfiguration};
use barrel_model::{S3Error, S3ErrorCode};

use crate::error::StoreResult;
use crate::store::FilesystemStore;

/// Validate a website configuration at ingestion time.
///
/// # Errors
///
/// - `MalformedXML` when the index document is missing or a rule names both
///   key-replacement forms.
/// - `InvalidArgument` for an ill-formed index suffix.
pub fn validate_config(config: &WebsiteConfiguration) -> Result<(), S3Error> {
    let Some(index) = &config.index_document else {
        return Err(S3Error::new(S3ErrorCode::MalformedXML));
    };
    if index.suffix.is_empty() || index.suffix.contains('/') {
        return Err(S3Error::invalid_argument(
            "The IndexDocument Suffix is not well formed",
            "IndexDocument",
            &index.suffix,
        ));
    }
    for rule in &config.routing_rules {
        if rule.redirect.replace_key_prefix_with.is_some()
            && rule.redirect.replace_key_with.is_some()
        {
            return Err(S3Error::with_message(
                S3ErrorCode::MalformedXML,
                "ReplaceKeyPrefixWith and ReplaceKeyWith are mutually exclusive",
            ));
        }
    }
    Ok(())
}

/// Request context the engine needs to build redirect locations.
#[derive(Debug, Clone, Copy)]
pub struct WebsiteRequest<'a> {
    /// The resolved bucket.
    pub bucket: &'a str,
    /// The requested key; empty for the site root.
    pub key: &'a str,
    /// `http` or `https`, from the listener.
    pub scheme: &'a str,
    /// The request `Host` header value.
    pub host: &'a str,
    /// Whether the bucket was addressed in the path (vs a website vhost).
    pub path_style: bool,
}

/// What the website engine decided to do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebsiteOutcome {
    /// Serve the named object with the given status (200, or an error
    /// status when serving the error document).
    Serve { key: String, status: StatusCode },
    /// Redirect the browser.
    Redirect { location: String, status: StatusCode },
    /// Render the HTML error page for this code.
    Error {
        status: StatusCode,
        code: S3ErrorCode,
        key: Option<String>,
    },
}

/// Resolve a website request against the bucket's configuration.
///
/// # Errors
///
/// Propagates store failures; absence of objects is not an error at this
/// level.
pub async fn resolve_request(
    store: &FilesystemStore,
    config: &WebsiteConfiguration,
    request: WebsiteRequest<'_>,
) -> StoreResult<WebsiteOutcome> {
    let suffix = config.index_document.as_ref().map(|d| d.suffix.as_str());

    let tentative = initial_outcome(store, request, suffix).await?;

    // Index-page redirects bypass routing rules.
    if let WebsiteOutcome::Redirect { .. } = tentative {
        return Ok(tentative);
    }

    let status = match &tentative {
        WebsiteOutcome::Serve { status, .. } | WebsiteOutcome::Error { status, .. } => *status,
        WebsiteOutcome::Redirect { .. } => unreachable!("handled above"),
    };

    for rule in &config.routing_rules {
        if rule_matches(rule, request.key, status) {
            return Ok(apply_rule(rule, request));
        }
    }

    // Error-document fallback for 404/403 with no matching rule.
    if let WebsiteOutcome::Error { status, .. } = &tentative {
        if matches!(*status, StatusCode::NOT_FOUND | StatusCode::FORBIDDEN) {
            if let Some(error_doc) = &config.error_document {
                if store.head_object(request.bucket, &error_doc.key).await?.is_some() {
                    return Ok(WebsiteOutcome::Serve {
                        key: error_doc.key.clone(),
                        status: *status,
                    });
                }
            }
        }
    }

    Ok(tentative)
}

/// Steps 1–3: index resolution and direct fetch, before rules run.
async fn initial_outcome(
    store: &FilesystemStore,
    request: WebsiteRequest<'_>,
    suffix: Option<&str>,
) -> StoreResult<WebsiteOutcome> {
    let key = request.key;

    // Directory-style request: resolve the index document.
    if key.is_empty() || key.ends_with('/') {
        let Some(suffix) = suffix else {
            return Ok(not_found(Some(key.to_owned())));
        };
        let candidate = format!("{key}{suffix}");
        if store.head_object(request.bucket, &candidate).await?.is_some() {
            return Ok(WebsiteOutcome::Serve {
                key: candidate,
                status: StatusCode::OK,
            });
        }
        return Ok(not_found(Some(candidate)));
    }

    // Direct object fetch.
    if store.head_object(request.bucket, key).await?.is_some() {
        return Ok(WebsiteOutcome::Serve {
            key: key.to_owned(),
            status: StatusCode::OK,
        });
    }

    // Extensionless directory request: redirect to the slash form when the
    // index document exists underneath it.
    if let Some(suffix) = suffix {
        let candidate = format!("{key}/{suffix}");
        if store.head_object(request.bucket, &candidate).await?.is_some() {
            let location = if request.path_style {
                format!("/{}/{key}/", request.bucket)
            } else {
                format!("/{key}/")
            };
            return Ok(WebsiteOutcome::Redirect {
                location,
                status: StatusCode::FOUND,
            });
        }
    }

    Ok(not_found(Some(key.to_owned())))
}

fn not_found(key: Option<String>) -> WebsiteOutcome {
    WebsiteOutcome::Error {
        status: StatusCode::NOT_FOUND,
        code: S3ErrorCode::NoSuchKey,
        key,
    }
}

/// Whether a rule's condition holds for the request key and computed status.
/// A rule with no condition matches everything.
fn rule_matches(rule: &RoutingRule, key: &str, status: StatusCode) -> bool {
    let Some(condition) = &rule.condition else {
        return true;
    };
    if let Some(prefix) = &condition.key_prefix_equals {
        if !key.starts_with(prefix.as_str()) {
            return false;
        }
    }
    if let Some(code) = condition.http_error_code_returned_equals {
        if status.as_u16() != code {
            return false;
        }
    }
    true
}

/// Build the redirect a matched rule produces.
fn apply_rule(rule: &RoutingRule, request: WebsiteRequest<'_>) -> WebsiteOutcome {
    let redirect = &rule.redirect;

    let replaced_key = if let Some(replacement) = &redirect.replace_key_with {
        replacement.clone()
    } else if let Some(with) = &redirect.replace_key_prefix_with {
        let prefix = rule
            .condition
            .as_ref()
            .and_then(|c| c.key_prefix_equals.as_deref())
            .unwrap_or("");
        format!("{with}{}", &request.key[prefix.len()..])
    } else {
        request.key.to_owned()
    };

    let status = redirect
        .http_redirect_code
        .and_then(|code| StatusCode::from_u16(code).ok())
        .unwrap_or(StatusCode::MOVED_PERMANENTLY);

    let scheme = redirect.protocol.as_deref().unwrap_or(request.scheme);
    let location = match &redirect.host_name {
        // An explicit host addresses the target site directly.
        Some(host) => format!("{scheme}://{host}/{replaced_key}"),
        None if request.path_style => {
            format!("{scheme}://{}/{}/{replaced_key}", request.host, request.bucket)
        }
        None => format!("{scheme}://{}/{replaced_key}", request.host),
    };

    WebsiteOutcome::Redirect { location, status }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tempfile::TempDir;

    use barrel_model::types::{
        ErrorDocument, IndexDocument, Redirect, RoutingRuleCondition,
    };

    use crate::store::ObjectMetadata;

    use super::*;

    async fn store_with(bucket: &str, keys: &[&str]) -> (TempDir, FilesystemStore) {
        let dir = TempDir::new().expect("temp dir");
        let store = FilesystemStore::open(dir.path()).await.expect("open store");
        store.create_bucket(bucket).await.expect("create bucket");
        for key in keys {
            store
                .put_object(bucket, key, &Bytes::from_static(b"<html/>"), ObjectMetadata::default())
                .await
                .expect("put");
        }
        (dir, store)
    }

    fn config_with_index() -> WebsiteConfiguration {
        WebsiteConfiguration {
            index_document: Some(IndexDocument {
                suffix: "index.html".to_owned(),
            }),
            error_document: None,
            routing_rules: Vec::new(),
        }
    }

    fn request<'a>(bucket: &'a str, key: &'a str) -> WebsiteRequest<'a> {
        WebsiteRequest {
            bucket,
            key,
            scheme: "http",
            host: "localhost:4568",
            path_style: true,
        }
    }

    #[tokio::test]
    async fn test_should_resolve_index_for_trailing_slash() {
        let (_dir, store) = store_with("website0", &["page/index.html"]).await;
        let outcome = resolve_request(&store, &config_with_index(), request("website0", "page/"))
            .await
            .expect("resolve");
        assert_eq!(
            outcome,
            WebsiteOutcome::Serve {
                key: "page/index.html".to_owned(),
                status: StatusCode::OK,
            }
        );
    }

    #[tokio::test]
    async fn test_should_redirect_extensionless_directory_request() {
        let (_dir, store) = store_with("website0", &["page/index.html"]).await;
        let outcome = resolve_request(&store, &config_with_index(), request("website0", "page"))
            .await
            .expect("resolve");
        assert_eq!(
            outcome,
            WebsiteOutcome::Redirect {
                location: "/website0/page/".to_owned(),
                status: StatusCode::FOUND,
            }
        );
    }

    #[tokio::test]
    async fn test_should_redirect_relative_to_vhost_root_for_vhost_requests() {
        let (_dir, store) = store_with("website0", &["page/index.html"]).await;
        let mut req = request("website0", "page");
        req.path_style = false;
        let outcome = resolve_request(&store, &config_with_index(), req)
            .await
            .expect("resolve");
        assert_eq!(
            outcome,
            WebsiteOutcome::Redirect {
                location: "/page/".to_owned(),
                status: StatusCode::FOUND,
            }
        );
    }

    #[tokio::test]
    async fn test_should_404_when_index_missing() {
        let (_dir, store) = store_with("website0", &[]).await;
        let outcome = resolve_request(&store, &config_with_index(), request("website0", "page/"))
            .await
            .expect("resolve");
        assert!(matches!(
            outcome,
            WebsiteOutcome::Error {
                status: StatusCode::NOT_FOUND,
                code: S3ErrorCode::NoSuchKey,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_should_apply_prefix_replacement_rule() {
        let (_dir, store) = store_with("website2", &[]).await;
        let mut config = config_with_index();
        config.routing_rules = vec![RoutingRule {
            condition: Some(RoutingRuleCondition {
                key_prefix_equals: Some("test/".to_owned()),
                http_error_code_returned_equals: None,
            }),
            redirect: Redirect {
                replace_key_prefix_with: Some("replacement/".to_owned()),
                ..Redirect::default()
            },
        }];

        let outcome = resolve_request(&store, &config, request("website2", "test/key/"))
            .await
            .expect("resolve");
        assert_eq!(
            outcome,
            WebsiteOutcome::Redirect {
                location: "http://localhost:4568/website2/replacement/key/".to_owned(),
                status: StatusCode::MOVED_PERMANENTLY,
            }
        );
    }

    #[tokio::test]
    async fn test_should_apply_complex_rule_with_protocol_host_and_code() {
        let (_dir, store) = store_with("website3", &[]).await;
        let mut config = config_with_index();
        config.routing_rules = vec![RoutingRule {
            condition: Some(RoutingRuleCondition {
                key_prefix_equals: Some("complex/".to_owned()),
                http_error_code_returned_equals: None,
            }),
            redirect: Redirect {
                protocol: Some("https".to_owned()),
                host_name: Some("custom".to_owned()),
                replace_key_with: Some("replacement".to_owned()),
                http_redirect_code: Some(307),
                ..Redirect::default()
            },
        }];

        let outcome = resolve_request(&store, &config, request("website3", "complex/key"))
            .await
            .expect("resolve");
        assert_eq!(
            outcome,
            WebsiteOutcome::Redirect {
                location: "https://custom/replacement".to_owned(),
                status: StatusCode::TEMPORARY_REDIRECT,
            }
        );
    }

    #[tokio::test]
    async fn test_should_match_error_code_condition_only_on_that_status() {
        let (_dir, store) = store_with("website4", &["present.html"]).await;
        let mut config = config_with_index();
        config.routing_rules = vec![RoutingRule {
            condition: Some(RoutingRuleCondition {
                key_prefix_equals: None,
                http_error_code_returned_equals: Some(404),
            }),
            redirect: Redirect {
                replace_key_with: Some("error.html".to_owned()),
                ..Redirect::default()
            },
        }];

        // 200 response: the rule must not fire.
        let outcome = resolve_request(&store, &config, request("website4", "present.html"))
            .await
            .expect("resolve");
        assert!(matches!(outcome, WebsiteOutcome::Serve { status: StatusCode::OK, .. }));

        // 404 response: the rule fires.
        let outcome = resolve_request(&store, &config, request("website4", "absent.html"))
            .await
            .expect("resolve");
        assert!(matches!(outcome, WebsiteOutcome::Redirect { .. }));
    }

    #[tokio::test]
    async fn test_should_serve_error_document_on_unmatched_404() {
        let (_dir, store) = store_with("website5", &["error.html"]).await;
        let mut config = config_with_index();
        config.error_document = Some(ErrorDocument {
            key: "error.html".to_owned(),
        });

        let outcome = resolve_request(&store, &config, request("website5", "missing"))
            .await
            .expect("resolve");
        assert_eq!(
            outcome,
            WebsiteOutcome::Serve {
                key: "error.html".to_owned(),
                status: StatusCode::NOT_FOUND,
            }
        );
    }

    #[tokio::test]
    async fn test_should_bypass_rules_for_index_redirects() {
        let (_dir, store) = store_with("website6", &["page/index.html"]).await;
        let mut config = config_with_index();
        // A catch-all rule that would otherwise redirect everything away.
        config.routing_rules = vec![RoutingRule {
            condition: None,
            redirect: Redirect {
                host_name: Some("elsewhere".to_owned()),
                ..Redirect::default()
            },
        }];

        let outcome = resolve_request(&store, &config, request("website6", "page"))
            .await
            .expect("resolve");
        assert_eq!(
            outcome,
            WebsiteOutcome::Redirect {
                location: "/website6/page/".to_owned(),
                status: StatusCode::FOUND,
            }
        );
    }
}
