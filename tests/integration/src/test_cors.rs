//! CORS configuration integration tests.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::types::{CorsConfiguration, CorsRule};

    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    fn wildcard_rule() -> CorsRule {
        CorsRule::builder()
            .allowed_origins("http://*.bar.com")
            .allowed_methods("GET")
            .allowed_headers("Range")
            .allowed_headers("Authorization")
            .max_age_seconds(3000)
            .build()
            .expect("cors rule")
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_round_trip_cors_configuration() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "cors").await;

        let config = CorsConfiguration::builder()
            .cors_rules(wildcard_rule())
            .build()
            .expect("cors config");
        client
            .put_bucket_cors()
            .bucket(&bucket)
            .cors_configuration(config)
            .send()
            .await
            .expect("put_bucket_cors");

        let resp = client
            .get_bucket_cors()
            .bucket(&bucket)
            .send()
            .await
            .expect("get_bucket_cors");
        let rules = resp.cors_rules();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].allowed_origins(), ["http://*.bar.com"]);
        assert_eq!(rules[0].allowed_methods(), ["GET"]);
        assert_eq!(rules[0].max_age_seconds(), Some(3000));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_404_after_deleting_cors_configuration() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "corsdel").await;

        let config = CorsConfiguration::builder()
            .cors_rules(wildcard_rule())
            .build()
            .expect("cors config");
        client
            .put_bucket_cors()
            .bucket(&bucket)
            .cors_configuration(config)
            .send()
            .await
            .expect("put_bucket_cors");

        client
            .delete_bucket_cors()
            .bucket(&bucket)
            .send()
            .await
            .expect("delete_bucket_cors");

        let err = client
            .get_bucket_cors()
            .bucket(&bucket)
            .send()
            .await
            .expect_err("config should be gone");
        assert_eq!(
            err.into_service_error().meta().code(),
            Some("NoSuchCORSConfiguration")
        );

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_multi_wildcard_origin() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "corsbad").await;

        let rule = CorsRule::builder()
            .allowed_origins("http://*.*.com")
            .allowed_methods("GET")
            .build()
            .expect("cors rule");
        let config = CorsConfiguration::builder()
            .cors_rules(rule)
            .build()
            .expect("cors config");

        let err = client
            .put_bucket_cors()
            .bucket(&bucket)
            .cors_configuration(config)
            .send()
            .await
            .expect_err("multi-wildcard origin should be rejected");
        assert_eq!(err.into_service_error().meta().code(), Some("InvalidRequest"));

        cleanup_bucket(&client, &bucket).await;
    }
}
