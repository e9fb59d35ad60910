use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: i64,
    pub short_code: String,
    pub destination_url: String,
    pub owner_id: String,
    /// Cached click total. The clicks table is the authoritative count;
    /// this column trails it while increments sit in the write buffer.
    pub clicks: i64,
    pub created_at: i64,
}

/// A single recorded resolution of a link. Rows are immutable and are only
/// ever removed by the cascade when their link is deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Click {
    pub id: i64,
    pub link_id: i64,
    pub timestamp: i64,
    /// Empty string means the request carried no Referer header.
    pub referrer: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub url: String,
    pub custom_code: Option<String>,
}
