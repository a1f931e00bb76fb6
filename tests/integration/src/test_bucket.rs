//! Bucket CRUD integration tests.

#[cfg(test)]
mod tests {
    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_create_and_delete_bucket() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "create").await;

        let head = client.head_bucket().bucket(&bucket).send().await;
        assert!(head.is_ok(), "head_bucket should succeed");

        cleanup_bucket(&client, &bucket).await;

        let head = client.head_bucket().bucket(&bucket).send().await;
        assert!(head.is_err(), "head_bucket should fail after delete");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_list_buckets() {
        let client = s3_client();
        let b1 = create_test_bucket(&client, "list1").await;
        let b2 = create_test_bucket(&client, "list2").await;

        let resp = client.list_buckets().send().await.expect("list_buckets");
        let names: Vec<&str> = resp.buckets().iter().filter_map(|b| b.name()).collect();

        assert!(names.contains(&b1.as_str()), "should contain {b1}");
        assert!(names.contains(&b2.as_str()), "should contain {b2}");

        cleanup_bucket(&client, &b1).await;
        cleanup_bucket(&client, &b2).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_deleting_non_empty_bucket() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "nonempty").await;

        client
            .put_object()
            .bucket(&bucket)
            .key("blocker.txt")
            .body(aws_sdk_s3::primitives::ByteStream::from_static(b"x"))
            .send()
            .await
            .expect("put_object");

        let err = client
            .delete_bucket()
            .bucket(&bucket)
            .send()
            .await
            .expect_err("delete of non-empty bucket should fail");
        assert_eq!(err.into_service_error().meta().code(), Some("BucketNotEmpty"));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_invalid_bucket_name() {
        let client = s3_client();
        let err = client
            .create_bucket()
            .bucket("ab")
            .send()
            .await
            .expect_err("invalid name should be rejected");
        assert_eq!(
            err.into_service_error().meta().code(),
            Some("InvalidBucketName")
        );
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_return_empty_location_constraint() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "location").await;

        let resp = client
            .get_bucket_location()
            .bucket(&bucket)
            .send()
            .await
            .expect("get_bucket_location");
        // us-east-1 is represented by the empty constraint.
        assert!(resp.location_constraint().is_none());

        cleanup_bucket(&client, &bucket).await;
    }
}
