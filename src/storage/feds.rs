//! Federation chats the operator has joined.

use serde::{Deserialize, Serialize};

use super::store::Record;
use crate::telegram::ChatId;

/// Collection name of the fed list.
pub const FED_COLLECTION: &str = "FED_LIST";

/// One federation chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FedRecord {
    #[serde(rename = "_id")]
    pub chat_id: ChatId,
    pub name: String,
}

impl Record for FedRecord {
    type Key = ChatId;

    fn key(&self) -> &ChatId {
        &self.chat_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fed_record_uses_id_field() {
        let record: FedRecord =
            serde_json::from_str(r#"{"_id": -1001234, "name": "Main Fed"}"#).unwrap();
        assert_eq!(record.chat_id, -1_001_234);
        assert_eq!(record.name, "Main Fed");
    }
}
