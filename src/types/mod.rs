mod record;
mod stream_status;
mod stream_view_type;
mod table_status;

pub use record::{StreamEvent, StreamRecord};
pub use stream_status::StreamStatus;
pub use stream_view_type::StreamViewType;
pub use table_status::TableStatus;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodbstreams::{primitives, types as stream_types};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One table item: an unordered mapping of attribute name to typed value.
/// Items travel from scan pages and stream records to destination writes.
pub type Item = HashMap<String, AttributeValue>;

pub(crate) fn into_chrono(datetime: primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(datetime.secs(), datetime.subsec_nanos())
}

/// Rehome a stream-side item onto the DynamoDB client's attribute type so it
/// can be replayed against the destination table.
pub(crate) fn into_item(value: HashMap<String, stream_types::AttributeValue>) -> Item {
    value
        .into_iter()
        .map(|(key, val)| (key, into_attribute_value(val)))
        .collect()
}

fn into_attribute_value(value: stream_types::AttributeValue) -> AttributeValue {
    match value {
        stream_types::AttributeValue::B(v) => AttributeValue::B(Blob::new(v.into_inner())),
        stream_types::AttributeValue::Bool(v) => AttributeValue::Bool(v),
        stream_types::AttributeValue::Bs(v) => AttributeValue::Bs(
            v.into_iter()
                .map(|blob| Blob::new(blob.into_inner()))
                .collect(),
        ),
        stream_types::AttributeValue::L(v) => {
            AttributeValue::L(v.into_iter().map(into_attribute_value).collect())
        }
        stream_types::AttributeValue::M(v) => AttributeValue::M(into_item(v)),
        stream_types::AttributeValue::N(v) => AttributeValue::N(v),
        stream_types::AttributeValue::Ns(v) => AttributeValue::Ns(v),
        stream_types::AttributeValue::Null(v) => AttributeValue::Null(v),
        stream_types::AttributeValue::S(v) => AttributeValue::S(v),
        stream_types::AttributeValue::Ss(v) => AttributeValue::Ss(v),
        _ => AttributeValue::Null(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(val: &str) -> primitives::Blob {
        primitives::Blob::new(val.as_bytes().to_vec())
    }

    #[test]
    fn it_transforms_crate_datetime_into_chrono_datetime() {
        let org = primitives::DateTime::from_secs_and_nanos(946_713_600, 500_000_000u32);
        let dt = into_chrono(org).unwrap();
        let expected = DateTime::<Utc>::from_timestamp(946_713_600, 500_000_000u32).unwrap();
        assert_eq!(dt, expected);
    }

    #[test]
    fn it_rehomes_scalar_attributes() {
        let mut stream_map: HashMap<String, stream_types::AttributeValue> = HashMap::new();
        stream_map.insert("Name".into(), stream_types::AttributeValue::S("Joe".into()));
        stream_map.insert("Age".into(), stream_types::AttributeValue::N("35".into()));
        stream_map.insert("Admin".into(), stream_types::AttributeValue::Bool(true));

        let item = into_item(stream_map);
        assert_eq!(item.get("Name"), Some(&AttributeValue::S("Joe".into())));
        assert_eq!(item.get("Age"), Some(&AttributeValue::N("35".into())));
        assert_eq!(item.get("Admin"), Some(&AttributeValue::Bool(true)));
    }

    #[test]
    fn it_rehomes_nested_attributes() {
        let mut inner: HashMap<String, stream_types::AttributeValue> = HashMap::new();
        inner.insert("City".into(), stream_types::AttributeValue::S("Kyoto".into()));

        let mut stream_map: HashMap<String, stream_types::AttributeValue> = HashMap::new();
        stream_map.insert(
            "Address".into(),
            stream_types::AttributeValue::M(inner),
        );
        stream_map.insert(
            "Tags".into(),
            stream_types::AttributeValue::L(vec![stream_types::AttributeValue::S(
                "travel".into(),
            )]),
        );

        let item = into_item(stream_map);
        match item.get("Address") {
            Some(AttributeValue::M(map)) => {
                assert_eq!(map.get("City"), Some(&AttributeValue::S("Kyoto".into())));
            }
            other => panic!("unexpected address attribute: {other:?}"),
        }
        match item.get("Tags") {
            Some(AttributeValue::L(list)) => {
                assert_eq!(list, &vec![AttributeValue::S("travel".into())]);
            }
            other => panic!("unexpected tags attribute: {other:?}"),
        }
    }

    #[test]
    fn it_preserves_binary_attributes() {
        let mut stream_map: HashMap<String, stream_types::AttributeValue> = HashMap::new();
        stream_map.insert("Payload".into(), stream_types::AttributeValue::B(blob("hi")));

        let item = into_item(stream_map);
        assert_eq!(
            item.get("Payload"),
            Some(&AttributeValue::B(Blob::new("hi".as_bytes().to_vec())))
        );
    }
}
