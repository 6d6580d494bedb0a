//! Settings endpoints

use serde::de::IgnoredAny;

use super::client::{ApiClient, ApiResponse};
use crate::store::GlobalSettings;

/// Fetch global settings
pub async fn get(client: &ApiClient) -> ApiResponse<GlobalSettings> {
    client.get("/settings").await
}

/// Replace global settings; the backend answers without a body
pub async fn save(client: &ApiClient, settings: &GlobalSettings) -> ApiResponse<()> {
    client
        .post::<IgnoredAny, _>("/settings", settings)
        .await
        .map(|_| ())
}
