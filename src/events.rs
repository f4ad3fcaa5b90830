//! Invocation payloads.
//!
//! Object notifications follow the S3 event layout; queue events wrap one
//! notification per message body as a JSON string.

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::ObjectUri;

const TEST_EVENT: &str = "s3:TestEvent";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<ObjectRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}

impl ObjectRecord {
    pub fn uri(&self) -> Result<ObjectUri> {
        ObjectUri::new(self.s3.bucket.name.clone(), self.s3.object.key.clone())
            .map_err(|err| Error::InvalidEvent(err.to_string()))
    }
}

impl ObjectEvent {
    /// Notification for a single object.
    pub fn for_object(uri: &ObjectUri) -> Self {
        Self {
            records: vec![ObjectRecord {
                s3: S3Entity {
                    bucket: BucketRef {
                        name: uri.bucket().to_string(),
                    },
                    object: ObjectRef {
                        key: uri.key().to_string(),
                    },
                },
            }],
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|err| Error::InvalidEvent(err.to_string()))
    }

    /// Object named by the first record. Later records are ignored.
    pub fn first_object(&self) -> Result<ObjectUri> {
        self.records
            .first()
            .ok_or_else(|| Error::InvalidEvent("notification carries no records".to_string()))?
            .uri()
    }

    pub fn objects(&self) -> Result<Vec<ObjectUri>> {
        self.records.iter().map(ObjectRecord::uri).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<QueueMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub body: String,
}

/// A decoded queue message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Notification(ObjectEvent),
    Test,
}

impl QueueMessage {
    pub fn decode(&self) -> Result<MessageBody> {
        let value: serde_json::Value = serde_json::from_str(&self.body)
            .map_err(|err| Error::InvalidEvent(format!("message body: {err}")))?;
        if value.get("Event").and_then(|event| event.as_str()) == Some(TEST_EVENT) {
            return Ok(MessageBody::Test);
        }
        serde_json::from_value(value)
            .map(MessageBody::Notification)
            .map_err(|err| Error::InvalidEvent(format!("message body: {err}")))
    }
}

impl QueueEvent {
    /// Wrap notifications one per message.
    pub fn wrap(notifications: &[ObjectEvent]) -> Result<Self> {
        let records = notifications
            .iter()
            .map(|event| {
                Ok(QueueMessage {
                    body: serde_json::to_string(event)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { records })
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|err| Error::InvalidEvent(err.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every object referenced by the queued notifications, in message
    /// order. Test events are skipped.
    pub fn objects(&self) -> Result<Vec<ObjectUri>> {
        let mut objects = Vec::new();
        for message in &self.records {
            match message.decode()? {
                MessageBody::Test => info!("Skipping s3:TestEvent"),
                MessageBody::Notification(event) => objects.extend(event.objects()?),
            }
        }
        Ok(objects)
    }
}
