use aws_sdk_dynamodb::types;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StreamViewType {
    KeysOnly,
    NewAndOldImages,
    NewImage,
    OldImage,
    Unknown,
}

impl StreamViewType {
    /// Whether records carry the full new item image, which replication
    /// needs to replay puts against the destination.
    pub fn has_new_image(&self) -> bool {
        matches!(self, StreamViewType::NewImage | StreamViewType::NewAndOldImages)
    }
}

impl From<types::StreamViewType> for StreamViewType {
    fn from(value: types::StreamViewType) -> StreamViewType {
        match value {
            types::StreamViewType::KeysOnly => StreamViewType::KeysOnly,
            types::StreamViewType::NewAndOldImages => StreamViewType::NewAndOldImages,
            types::StreamViewType::NewImage => StreamViewType::NewImage,
            types::StreamViewType::OldImage => StreamViewType::OldImage,
            _ => StreamViewType::Unknown,
        }
    }
}
