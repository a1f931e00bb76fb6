//! Object lifecycle event records.
//!
//! Every object mutation publishes a single record envelope mirroring the
//! S3 notification format. Delivery is best-effort over a broadcast channel:
//! a full or receiver-less channel never fails the originating request.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

/// The event names the emulator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Put,
    Post,
    Copy,
    CompleteMultipartUpload,
    Delete,
}

impl EventKind {
    /// The wire event name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Put => "ObjectCreated:Put",
            Self::Post => "ObjectCreated:Post",
            Self::Copy => "ObjectCreated:Copy",
            Self::CompleteMultipartUpload => "ObjectCreated:CompleteMultipartUpload",
            Self::Delete => "ObjectRemoved:Delete",
        }
    }
}

/// The facts a handler supplies about a mutation.
#[derive(Debug, Clone)]
pub struct ObjectEvent {
    pub kind: EventKind,
    pub bucket: String,
    pub key: String,
    /// Object size; absent for deletions.
    pub size: Option<u64>,
    /// Bare ETag; absent for deletions.
    pub etag: Option<String>,
    pub source_ip: String,
    pub request_id: String,
}

/// The published envelope: `{ "Records": [ … ] }`.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    #[serde(rename = "Records")]
    pub records: Vec<EventRecord>,
}

/// One S3 notification record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub event_version: String,
    pub event_source: String,
    pub aws_region: String,
    pub event_time: String,
    pub event_name: String,
    pub user_identity: UserIdentity,
    pub request_parameters: RequestParameters,
    pub response_elements: ResponseElements,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub principal_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestParameters {
    #[serde(rename = "sourceIPAddress")]
    pub source_ip_address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseElements {
    #[serde(rename = "x-amz-request-id")]
    pub request_id: String,
    #[serde(rename = "x-amz-id-2")]
    pub id_2: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Entity {
    pub s3_schema_version: String,
    pub configuration_id: String,
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketEntity {
    pub name: String,
    pub owner_identity: UserIdentity,
    pub arn: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEntity {
    pub key: String,
    pub sequencer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(rename = "eTag", skip_serializing_if = "Option::is_none")]
    pub e_tag: Option<String>,
}

/// Broadcast-based event emitter.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    region: String,
    tx: broadcast::Sender<Arc<EventEnvelope>>,
}

impl EventEmitter {
    /// Create an emitter buffering up to `capacity` undelivered envelopes
    /// per receiver.
    #[must_use]
    pub fn new(region: impl Into<String>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            region: region.into(),
            tx,
        }
    }

    /// Subscribe to future envelopes.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<EventEnvelope>> {
        self.tx.subscribe()
    }

    /// Build and publish the envelope for a mutation.
    ///
    /// Never fails: delivery problems are logged at trace level and
    /// swallowed.
    pub fn emit(&self, event: &ObjectEvent) {
        let envelope = Arc::new(self.envelope_for(event));
        if let Err(err) = self.tx.send(Arc::clone(&envelope)) {
            trace!(error = %err, "no event receivers; dropping envelope");
        }
    }

    /// Build the envelope for a mutation without publishing it.
    #[must_use]
    pub fn envelope_for(&self, event: &ObjectEvent) -> EventEnvelope {
        let now = Utc::now();
        EventEnvelope {
            records: vec![EventRecord {
                event_version: "2.0".to_owned(),
                event_source: "aws:s3".to_owned(),
                aws_region: self.region.clone(),
                event_time: now.to_rfc3339_opts(SecondsFormat::Millis, true),
                event_name: event.kind.as_str().to_owned(),
                user_identity: UserIdentity {
                    principal_id: format!("AWS:{}", random_hex(21)),
                },
                request_parameters: RequestParameters {
                    source_ip_address: event.source_ip.clone(),
                },
                response_elements: ResponseElements {
                    request_id: event.request_id.clone(),
                    id_2: event.request_id.clone(),
                },
                s3: S3Entity {
                    s3_schema_version: "1.0".to_owned(),
                    configuration_id: "testConfigId".to_owned(),
                    bucket: BucketEntity {
                        name: event.bucket.clone(),
                        owner_identity: UserIdentity {
                            principal_id: random_hex(14),
                        },
                        arn: format!("arn:aws:s3:::{}", event.bucket),
                    },
                    object: ObjectEntity {
                        key: event.key.clone(),
                        sequencer: format!("{:X}", now.timestamp_millis()),
                        size: event.size,
                        e_tag: event.etag.clone(),
                    },
                },
            }],
        }
    }
}

fn random_hex(len: usize) -> String {
    const HEX: &[u8] = b"0123456789ABCDEF";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> ObjectEvent {
        ObjectEvent {
            kind: EventKind::Put,
            bucket: "bucket-a".to_owned(),
            key: "path/to/object".to_owned(),
            size: Some(42),
            etag: Some("abc123".to_owned()),
            source_ip: "127.0.0.1".to_owned(),
            request_id: "req-1".to_owned(),
        }
    }

    #[test]
    fn test_should_build_record_envelope_shape() {
        let emitter = EventEmitter::new("us-east-1", 16);
        let envelope = emitter.envelope_for(&sample_event());
        let json = serde_json::to_value(&envelope).expect("serialize");

        let record = &json["Records"][0];
        assert_eq!(record["eventVersion"], "2.0");
        assert_eq!(record["eventSource"], "aws:s3");
        assert_eq!(record["awsRegion"], "us-east-1");
        assert_eq!(record["eventName"], "ObjectCreated:Put");
        assert_eq!(record["requestParameters"]["sourceIPAddress"], "127.0.0.1");
        assert_eq!(record["responseElements"]["x-amz-request-id"], "req-1");
        assert_eq!(record["s3"]["s3SchemaVersion"], "1.0");
        assert_eq!(record["s3"]["configurationId"], "testConfigId");
        assert_eq!(record["s3"]["bucket"]["arn"], "arn:aws:s3:::bucket-a");
        assert_eq!(record["s3"]["object"]["key"], "path/to/object");
        assert_eq!(record["s3"]["object"]["size"], 42);
        assert_eq!(record["s3"]["object"]["eTag"], "abc123");

        let principal = record["userIdentity"]["principalId"]
            .as_str()
            .expect("principal id");
        assert!(principal.starts_with("AWS:"));
        assert_eq!(principal.len(), 4 + 21);
    }

    #[test]
    fn test_should_omit_size_and_etag_for_deletions() {
        let emitter = EventEmitter::new("us-east-1", 16);
        let mut event = sample_event();
        event.kind = EventKind::Delete;
        event.size = None;
        event.etag = None;

        let json = serde_json::to_value(emitter.envelope_for(&event)).expect("serialize");
        let object = &json["Records"][0]["s3"]["object"];
        assert_eq!(json["Records"][0]["eventName"], "ObjectRemoved:Delete");
        assert!(object.get("size").is_none());
        assert!(object.get("eTag").is_none());
    }

    #[tokio::test]
    async fn test_should_deliver_to_subscribers() {
        let emitter = EventEmitter::new("us-east-1", 16);
        let mut rx = emitter.subscribe();
        emitter.emit(&sample_event());
        let envelope = rx.recv().await.expect("envelope delivered");
        assert_eq!(envelope.records.len(), 1);
    }

    #[test]
    fn test_should_not_fail_without_subscribers() {
        let emitter = EventEmitter::new("us-east-1", 16);
        emitter.emit(&sample_event());
    }
}
