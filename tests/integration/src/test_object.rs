//! Object CRUD integration tests.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;
    use md5::Digest;

    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_put_and_get_object_with_md5_etag() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "putget").await;

        let body = b"hello, barrel!";
        let put = client
            .put_object()
            .bucket(&bucket)
            .key("greeting.txt")
            .body(ByteStream::from_static(body))
            .content_type("text/plain")
            .send()
            .await
            .expect("put_object");
        let expected_etag = format!("\"{}\"", hex::encode(md5::Md5::digest(body)));
        assert_eq!(put.e_tag(), Some(expected_etag.as_str()));

        let resp = client
            .get_object()
            .bucket(&bucket)
            .key("greeting.txt")
            .send()
            .await
            .expect("get_object");
        assert_eq!(resp.content_type(), Some("text/plain"));
        assert_eq!(resp.content_length(), Some(body.len() as i64));

        let data = resp.body.collect().await.expect("collect body").into_bytes();
        assert_eq!(data.as_ref(), body);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_keep_trailing_slash_keys_distinct() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "slash").await;

        client
            .put_object()
            .bucket(&bucket)
            .key("foo")
            .body(ByteStream::from_static(b"X"))
            .send()
            .await
            .expect("put foo");
        client
            .put_object()
            .bucket(&bucket)
            .key("foo/")
            .body(ByteStream::from_static(b"Y"))
            .send()
            .await
            .expect("put foo/");

        let plain = client
            .get_object()
            .bucket(&bucket)
            .key("foo")
            .send()
            .await
            .expect("get foo");
        assert_eq!(
            plain.body.collect().await.expect("body").into_bytes().as_ref(),
            b"X"
        );

        let slashed = client
            .get_object()
            .bucket(&bucket)
            .key("foo/")
            .send()
            .await
            .expect("get foo/");
        assert_eq!(
            slashed.body.collect().await.expect("body").into_bytes().as_ref(),
            b"Y"
        );

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_serve_byte_ranges() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "range").await;

        client
            .put_object()
            .bucket(&bucket)
            .key("data.bin")
            .body(ByteStream::from_static(b"0123456789"))
            .send()
            .await
            .expect("put_object");

        let resp = client
            .get_object()
            .bucket(&bucket)
            .key("data.bin")
            .range("bytes=2-5")
            .send()
            .await
            .expect("ranged get");
        assert_eq!(resp.content_range(), Some("bytes 2-5/10"));
        assert_eq!(
            resp.body.collect().await.expect("body").into_bytes().as_ref(),
            b"2345"
        );

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_round_trip_user_metadata() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "meta").await;

        client
            .put_object()
            .bucket(&bucket)
            .key("tagged.bin")
            .body(ByteStream::from_static(b"x"))
            .metadata("owner", "integration test")
            .send()
            .await
            .expect("put_object");

        let head = client
            .head_object()
            .bucket(&bucket)
            .key("tagged.bin")
            .send()
            .await
            .expect("head_object");
        assert_eq!(
            head.metadata().and_then(|m| m.get("owner")).map(String::as_str),
            Some("integration test")
        );

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_copy_object_preserving_metadata() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "copy").await;

        client
            .put_object()
            .bucket(&bucket)
            .key("source.txt")
            .body(ByteStream::from_static(b"copy me"))
            .content_type("text/plain")
            .send()
            .await
            .expect("put source");

        client
            .copy_object()
            .bucket(&bucket)
            .key("destination.txt")
            .copy_source(format!("{bucket}/source.txt"))
            .send()
            .await
            .expect("copy_object");

        let copied = client
            .get_object()
            .bucket(&bucket)
            .key("destination.txt")
            .send()
            .await
            .expect("get copy");
        assert_eq!(copied.content_type(), Some("text/plain"));
        assert_eq!(
            copied.body.collect().await.expect("body").into_bytes().as_ref(),
            b"copy me"
        );

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_delete_object() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "del").await;

        client
            .put_object()
            .bucket(&bucket)
            .key("delete-me.txt")
            .body(ByteStream::from_static(b"temp"))
            .send()
            .await
            .expect("put_object");

        client
            .delete_object()
            .bucket(&bucket)
            .key("delete-me.txt")
            .send()
            .await
            .expect("delete_object");

        let err = client
            .get_object()
            .bucket(&bucket)
            .key("delete-me.txt")
            .send()
            .await
            .expect_err("object should be gone");
        assert!(err.into_service_error().is_no_such_key());

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_bulk_delete_including_nonexistent_keys() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "bulk").await;

        client
            .put_object()
            .bucket(&bucket)
            .key("exists")
            .body(ByteStream::from_static(b"x"))
            .send()
            .await
            .expect("put_object");

        let delete = aws_sdk_s3::types::Delete::builder()
            .objects(
                aws_sdk_s3::types::ObjectIdentifier::builder()
                    .key("exists")
                    .build()
                    .expect("identifier"),
            )
            .objects(
                aws_sdk_s3::types::ObjectIdentifier::builder()
                    .key("never-existed")
                    .build()
                    .expect("identifier"),
            )
            .build()
            .expect("delete request");

        let resp = client
            .delete_objects()
            .bucket(&bucket)
            .delete(delete)
            .send()
            .await
            .expect("delete_objects");
        assert_eq!(resp.deleted().len(), 2);
        assert!(resp.errors().is_empty());

        cleanup_bucket(&client, &bucket).await;
    }
}
