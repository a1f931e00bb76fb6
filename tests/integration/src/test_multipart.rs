//! Multipart upload integration tests.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};

    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    const PART_SIZE: usize = 5 * 1024 * 1024;

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_assemble_multipart_upload() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "mp").await;

        let initiate = client
            .create_multipart_upload()
            .bucket(&bucket)
            .key("big.bin")
            .send()
            .await
            .expect("create_multipart_upload");
        let upload_id = initiate.upload_id().expect("upload id").to_owned();

        let part1_data = vec![b'a'; PART_SIZE];
        let part2_data = b"tail".to_vec();

        let part1 = client
            .upload_part()
            .bucket(&bucket)
            .key("big.bin")
            .upload_id(&upload_id)
            .part_number(1)
            .body(ByteStream::from(part1_data.clone()))
            .send()
            .await
            .expect("upload part 1");
        let part2 = client
            .upload_part()
            .bucket(&bucket)
            .key("big.bin")
            .upload_id(&upload_id)
            .part_number(2)
            .body(ByteStream::from(part2_data.clone()))
            .send()
            .await
            .expect("upload part 2");

        let completed = CompletedMultipartUpload::builder()
            .parts(
                CompletedPart::builder()
                    .part_number(1)
                    .e_tag(part1.e_tag().expect("etag 1"))
                    .build(),
            )
            .parts(
                CompletedPart::builder()
                    .part_number(2)
                    .e_tag(part2.e_tag().expect("etag 2"))
                    .build(),
            )
            .build();

        let complete = client
            .complete_multipart_upload()
            .bucket(&bucket)
            .key("big.bin")
            .upload_id(&upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .expect("complete_multipart_upload");
        assert!(
            complete.e_tag().expect("composite etag").contains("-2"),
            "composite etag should carry the part count"
        );

        let resp = client
            .get_object()
            .bucket(&bucket)
            .key("big.bin")
            .send()
            .await
            .expect("get_object");
        let data = resp.body.collect().await.expect("body").into_bytes();
        assert_eq!(data.len(), part1_data.len() + part2_data.len());
        assert_eq!(&data[part1_data.len()..], b"tail");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_undersized_part() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "small").await;

        let initiate = client
            .create_multipart_upload()
            .bucket(&bucket)
            .key("k")
            .send()
            .await
            .expect("create_multipart_upload");
        let upload_id = initiate.upload_id().expect("upload id").to_owned();

        let part1 = client
            .upload_part()
            .bucket(&bucket)
            .key("k")
            .upload_id(&upload_id)
            .part_number(1)
            .body(ByteStream::from_static(b"tiny"))
            .send()
            .await
            .expect("upload part 1");
        let part2 = client
            .upload_part()
            .bucket(&bucket)
            .key("k")
            .upload_id(&upload_id)
            .part_number(2)
            .body(ByteStream::from_static(b"tail"))
            .send()
            .await
            .expect("upload part 2");

        let completed = CompletedMultipartUpload::builder()
            .parts(
                CompletedPart::builder()
                    .part_number(1)
                    .e_tag(part1.e_tag().expect("etag 1"))
                    .build(),
            )
            .parts(
                CompletedPart::builder()
                    .part_number(2)
                    .e_tag(part2.e_tag().expect("etag 2"))
                    .build(),
            )
            .build();

        let err = client
            .complete_multipart_upload()
            .bucket(&bucket)
            .key("k")
            .upload_id(&upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .expect_err("undersized non-final part should be rejected");
        assert_eq!(err.into_service_error().meta().code(), Some("EntityTooSmall"));

        let _ = client
            .abort_multipart_upload()
            .bucket(&bucket)
            .key("k")
            .upload_id(&upload_id)
            .send()
            .await;
        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_abort_upload_and_unblock_bucket_deletion() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "abort").await;

        let initiate = client
            .create_multipart_upload()
            .bucket(&bucket)
            .key("k")
            .send()
            .await
            .expect("create_multipart_upload");
        let upload_id = initiate.upload_id().expect("upload id").to_owned();

        // An in-flight upload blocks bucket deletion.
        let err = client
            .delete_bucket()
            .bucket(&bucket)
            .send()
            .await
            .expect_err("bucket with pending upload should not delete");
        assert_eq!(err.into_service_error().meta().code(), Some("BucketNotEmpty"));

        client
            .abort_multipart_upload()
            .bucket(&bucket)
            .key("k")
            .upload_id(&upload_id)
            .send()
            .await
            .expect("abort_multipart_upload");

        client
            .delete_bucket()
            .bucket(&bucket)
            .send()
            .await
            .expect("delete after abort");
    }
}
