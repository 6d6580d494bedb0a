//! Interface statistics endpoints

use super::client::{ApiClient, ApiResponse};
use crate::store::{InterfaceStats, StatsHistoryPoint};

/// Fetch current interface statistics
pub async fn get(client: &ApiClient) -> ApiResponse<InterfaceStats> {
    client.get("/stats").await
}

/// Fetch the recorded traffic history, oldest first
pub async fn history(client: &ApiClient) -> ApiResponse<Vec<StatsHistoryPoint>> {
    client.get("/stats/history").await
}
