use super::{into_chrono, into_item, Item};

use aws_sdk_dynamodbstreams::types;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StreamEvent {
    Insert,
    Modify,
    Remove,
}

/// One change event read from a source shard. `REMOVE` events delete the
/// destination item by key; everything else replays the new image as a put.
#[derive(Debug, Clone)]
pub struct StreamRecord {
    event: StreamEvent,
    keys: Item,
    new_image: Item,
    approximate_creation: Option<DateTime<Utc>>,
}

impl StreamRecord {
    pub fn new(
        event: StreamEvent,
        keys: Item,
        new_image: Item,
        approximate_creation: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            event,
            keys,
            new_image,
            approximate_creation,
        }
    }

    pub fn event(&self) -> StreamEvent {
        self.event
    }

    pub fn approximate_creation(&self) -> Option<DateTime<Utc>> {
        self.approximate_creation
    }

    pub fn into_keys(self) -> Item {
        self.keys
    }

    pub fn into_new_image(self) -> Item {
        self.new_image
    }
}

impl From<types::Record> for StreamRecord {
    fn from(value: types::Record) -> StreamRecord {
        let event = match value.event_name {
            Some(types::OperationType::Insert) => StreamEvent::Insert,
            Some(types::OperationType::Remove) => StreamEvent::Remove,
            // Unrecognized operations degrade to a put of the new image.
            _ => StreamEvent::Modify,
        };

        let (keys, new_image, approximate_creation) = match value.dynamodb {
            Some(record) => (
                record.keys.map(into_item).unwrap_or_default(),
                record.new_image.map(into_item).unwrap_or_default(),
                record.approximate_creation_date_time.and_then(into_chrono),
            ),
            None => (Item::default(), Item::default(), None),
        };

        StreamRecord {
            event,
            keys,
            new_image,
            approximate_creation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodbstreams::primitives;

    #[test]
    fn it_converts_a_remove_record() {
        let record = types::Record::builder()
            .event_name(types::OperationType::Remove)
            .dynamodb(
                types::StreamRecord::builder()
                    .keys("pk", types::AttributeValue::S("user-1".into()))
                    .approximate_creation_date_time(primitives::DateTime::from_secs(1_700_000_000))
                    .build(),
            )
            .build();

        let converted = StreamRecord::from(record);
        assert_eq!(converted.event(), StreamEvent::Remove);
        assert!(converted.approximate_creation().is_some());

        let keys = converted.into_keys();
        assert!(keys.contains_key("pk"));
    }

    #[test]
    fn it_converts_an_insert_record_with_a_new_image() {
        let record = types::Record::builder()
            .event_name(types::OperationType::Insert)
            .dynamodb(
                types::StreamRecord::builder()
                    .keys("pk", types::AttributeValue::S("user-1".into()))
                    .new_image("pk", types::AttributeValue::S("user-1".into()))
                    .new_image("name", types::AttributeValue::S("Joe".into()))
                    .build(),
            )
            .build();

        let converted = StreamRecord::from(record);
        assert_eq!(converted.event(), StreamEvent::Insert);

        let image = converted.into_new_image();
        assert_eq!(image.len(), 2);
    }

    #[test]
    fn it_defaults_unknown_operations_to_modify() {
        let record = types::Record::builder().build();
        let converted = StreamRecord::from(record);
        assert_eq!(converted.event(), StreamEvent::Modify);
        assert!(converted.approximate_creation().is_none());
    }
}
