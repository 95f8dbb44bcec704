use aws_sdk_dynamodb::types;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TableStatus {
    Active,
    Creating,
    Updating,
    Deleting,
    Unknown,
}

impl From<types::TableStatus> for TableStatus {
    fn from(value: types::TableStatus) -> TableStatus {
        match value {
            types::TableStatus::Active => TableStatus::Active,
            types::TableStatus::Creating => TableStatus::Creating,
            types::TableStatus::Updating => TableStatus::Updating,
            types::TableStatus::Deleting => TableStatus::Deleting,
            _ => TableStatus::Unknown,
        }
    }
}
