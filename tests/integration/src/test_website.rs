//! Website configuration integration tests.
//!
//! These exercise the `?website` subresource through the SDK; the website
//! *serving* endpoints are covered by the in-process pipeline tests, since
//! the SDK cannot speak to the `s3-website` host family.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::types::{ErrorDocument, IndexDocument, WebsiteConfiguration};

    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    /// A minimal index+error website configuration.
    fn basic_config() -> WebsiteConfiguration {
        WebsiteConfiguration::builder()
            .index_document(
                IndexDocument::builder()
                    .suffix("index.html")
                    .build()
                    .expect("index document"),
            )
            .error_document(
                ErrorDocument::builder()
                    .key("error.html")
                    .build()
                    .expect("error document"),
            )
            .build()
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_round_trip_website_configuration() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "web").await;

        client
            .put_bucket_website()
            .bucket(&bucket)
            .website_configuration(basic_config())
            .send()
            .await
            .expect("put_bucket_website");

        let resp = client
            .get_bucket_website()
            .bucket(&bucket)
            .send()
            .await
            .expect("get_bucket_website");
        assert_eq!(
            resp.index_document().map(|d| d.suffix()),
            Some("index.html")
        );
        assert_eq!(resp.error_document().map(|d| d.key()), Some("error.html"));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_404_for_missing_website_configuration() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "webnone").await;

        let err = client
            .get_bucket_website()
            .bucket(&bucket)
            .send()
            .await
            .expect_err("no config stored yet");
        assert_eq!(
            err.into_service_error().meta().code(),
            Some("NoSuchWebsiteConfiguration")
        );

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_delete_website_configuration() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "webdel").await;

        client
            .put_bucket_website()
            .bucket(&bucket)
            .website_configuration(basic_config())
            .send()
            .await
            .expect("put_bucket_website");

        client
            .delete_bucket_website()
            .bucket(&bucket)
            .send()
            .await
            .expect("delete_bucket_website");

        let err = client
            .get_bucket_website()
            .bucket(&bucket)
            .send()
            .await
            .expect_err("config should be gone");
        assert_eq!(
            err.into_service_error().meta().code(),
            Some("NoSuchWebsiteConfiguration")
        );

        cleanup_bucket(&client, &bucket).await;
    }
}
