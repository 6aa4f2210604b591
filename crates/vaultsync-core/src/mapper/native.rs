//! Wire schemas of the item store (`bw serve`)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Item type code for a login item.
pub const LOGIN_ITEM_TYPE: u8 = 1;

/// An item as returned by `GET /list/object/items`
///
/// Fields the sync does not manage (notes, URIs, custom fields and so on)
/// are kept in `extra` and sent back unchanged on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeItem {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, rename = "type")]
    pub item_type: Option<u8>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub login: Option<NativeLogin>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Login section of an item
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeLogin {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl std::fmt::Debug for NativeLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLogin")
            .field("username", &self.username.as_ref().map(|_| "<set>"))
            .field("password", &self.password.as_ref().map(|_| "<set>"))
            .finish()
    }
}

/// Body of `POST /object/item` and `PUT /object/item/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRequest {
    pub folder_id: Option<String>,
    #[serde(rename = "type")]
    pub item_type: u8,
    pub name: String,
    pub login: NativeLogin,
}
