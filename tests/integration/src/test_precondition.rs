//! Conditional request integration tests (If-Match / If-None-Match /
//! If-Modified-Since).

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;

    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    async fn put_conditional_fixture(client: &aws_sdk_s3::Client, bucket: &str) -> String {
        let put = client
            .put_object()
            .bucket(bucket)
            .key("cond.txt")
            .body(ByteStream::from_static(b"conditional data"))
            .send()
            .await
            .expect("put fixture");
        put.e_tag().expect("etag").to_owned()
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_honor_if_match() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "ifmatch").await;
        let etag = put_conditional_fixture(&client, &bucket).await;

        // The matching tag serves the object; a stale one fails with 412.
        let hit = client
            .get_object()
            .bucket(&bucket)
            .key("cond.txt")
            .if_match(&etag)
            .send()
            .await;
        assert!(hit.is_ok(), "matching If-Match should serve the object");

        let miss = client
            .get_object()
            .bucket(&bucket)
            .key("cond.txt")
            .if_match("\"0123456789abcdef0123456789abcdef\"")
            .send()
            .await;
        assert!(miss.is_err(), "stale If-Match should fail with 412");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_honor_if_none_match() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "ifnone").await;
        let etag = put_conditional_fixture(&client, &bucket).await;

        let fresh = client
            .get_object()
            .bucket(&bucket)
            .key("cond.txt")
            .if_none_match("\"0123456789abcdef0123456789abcdef\"")
            .send()
            .await;
        assert!(
            fresh.is_ok(),
            "non-matching If-None-Match should serve the object"
        );

        // The current tag yields 304, which the SDK surfaces as an error.
        let cached = client
            .get_object()
            .bucket(&bucket)
            .key("cond.txt")
            .if_none_match(&etag)
            .send()
            .await;
        assert!(cached.is_err(), "matching If-None-Match should yield 304");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_honor_if_modified_since() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "ifmod").await;
        put_conditional_fixture(&client, &bucket).await;

        // A threshold in the future means the object is unmodified: 304.
        let future = aws_sdk_s3::primitives::DateTime::from_secs(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock")
                .as_secs() as i64
                + 3600,
        );
        let cached = client
            .get_object()
            .bucket(&bucket)
            .key("cond.txt")
            .if_modified_since(future)
            .send()
            .await;
        assert!(cached.is_err(), "unmodified object should yield 304");

        // A threshold far in the past serves the object.
        let past = aws_sdk_s3::primitives::DateTime::from_secs(0);
        let fresh = client
            .get_object()
            .bucket(&bucket)
            .key("cond.txt")
            .if_modified_since(past)
            .send()
            .await;
        assert!(fresh.is_ok(), "modified object should be served");

        cleanup_bucket(&client, &bucket).await;
    }
}
