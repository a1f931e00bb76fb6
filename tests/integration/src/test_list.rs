//! List objects integration tests.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;

    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    async fn put_keys(client: &aws_sdk_s3::Client, bucket: &str, keys: &[&str]) {
        for key in keys {
            client
                .put_object()
                .bucket(bucket)
                .key(*key)
                .body(ByteStream::from_static(b"x"))
                .send()
                .await
                .unwrap_or_else(|e| panic!("put {key}: {e}"));
        }
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_list_v2_with_delimiter() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "listv2").await;
        put_keys(
            &client,
            &bucket,
            &["akey1", "akey2", "akey3", "key/key1", "key1", "key2", "key3"],
        )
        .await;

        let resp = client
            .list_objects_v2()
            .bucket(&bucket)
            .delimiter("/")
            .send()
            .await
            .expect("list_objects_v2");

        assert_eq!(resp.contents().len(), 6);
        let prefixes: Vec<&str> = resp
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .collect();
        assert_eq!(prefixes, vec!["key/"]);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_treat_start_after_as_exclusive() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "after").await;
        put_keys(&client, &bucket, &["prefix.foo", "prefix/foo"]).await;

        let resp = client
            .list_objects_v2()
            .bucket(&bucket)
            .delimiter("/")
            .start_after("prefix.foo")
            .send()
            .await
            .expect("list_objects_v2");

        assert!(resp.contents().is_empty());
        let prefixes: Vec<&str> = resp
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix())
            .collect();
        assert_eq!(prefixes, vec!["prefix/"]);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_paginate_with_continuation_tokens_in_order() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "paging").await;
        let keys: Vec<String> = (0..25).map(|i| format!("key{i:03}")).collect();
        for key in &keys {
            client
                .put_object()
                .bucket(&bucket)
                .key(key)
                .body(ByteStream::from_static(b"x"))
                .send()
                .await
                .expect("put_object");
        }

        let mut collected = Vec::new();
        let mut token = None;
        loop {
            let mut req = client.list_objects_v2().bucket(&bucket).max_keys(10);
            if let Some(t) = token.take() {
                req = req.continuation_token(t);
            }
            let resp = req.send().await.expect("list page");
            collected.extend(resp.contents().iter().filter_map(|o| o.key()).map(str::to_owned));
            if resp.is_truncated() == Some(true) {
                token = resp.next_continuation_token().map(ToOwned::to_owned);
            } else {
                break;
            }
        }

        // Strictly increasing across pages, covering every key.
        assert_eq!(collected.len(), keys.len());
        assert!(collected.windows(2).all(|w| w[0] < w[1]));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_return_v1_next_marker_for_delimited_listing() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "markers").await;
        for i in 0..200 {
            client
                .put_object()
                .bucket(&bucket)
                .key(format!("key{i:03}"))
                .body(ByteStream::from_static(b"x"))
                .send()
                .await
                .expect("put_object");
        }

        let resp = client
            .list_objects()
            .bucket(&bucket)
            .max_keys(100)
            .delimiter("/")
            .send()
            .await
            .expect("list_objects");
        assert_eq!(resp.is_truncated(), Some(true));
        assert_eq!(resp.next_marker(), Some("key099"));

        cleanup_bucket(&client, &bucket).await;
    }
}
