use serde::{Deserialize, Serialize};

/// One live channel as reported by `GET /helix/streams`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StreamRecord {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_login: String,
    pub user_name: String,
    #[serde(default)]
    pub game_id: String,
    #[serde(default)]
    pub game_name: String,
    #[serde(rename = "type", default)]
    pub stream_type: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub viewer_count: u64,
    #[serde(default)]
    pub started_at: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub is_mature: bool,
    /// Helix fields not named above (e.g. `tag_ids`), forwarded untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StreamRecord {
    /// Fill the `{width}` and `{height}` placeholders of the thumbnail template.
    pub fn thumbnail_url(&self, width: u32, height: u32) -> String {
        self.thumbnail_url
            .replace("{width}", &width.to_string())
            .replace("{height}", &height.to_string())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// One page of the upstream stream listing, forwarded verbatim by the proxy.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Page {
    #[serde(default)]
    pub data: Vec<StreamRecord>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl Page {
    /// Cursor for the following page. Helix sends `{}` or an empty cursor on the last page.
    pub fn next_cursor(&self) -> Option<&str> {
        self.pagination
            .cursor
            .as_deref()
            .filter(|cursor| !cursor.is_empty())
    }
}
