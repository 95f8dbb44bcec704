use aws_sdk_dynamodbstreams::types;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StreamStatus {
    Enabling,
    Enabled,
    Disabling,
    Disabled,
    Unknown,
}

impl From<types::StreamStatus> for StreamStatus {
    fn from(value: types::StreamStatus) -> StreamStatus {
        match value {
            types::StreamStatus::Enabling => StreamStatus::Enabling,
            types::StreamStatus::Enabled => StreamStatus::Enabled,
            types::StreamStatus::Disabling => StreamStatus::Disabling,
            types::StreamStatus::Disabled => StreamStatus::Disabled,
            _ => StreamStatus::Unknown,
        }
    }
}
