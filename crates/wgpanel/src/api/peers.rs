//! Peer endpoints

use bytes::Bytes;
use reqwest::Method;
use serde::de::IgnoredAny;

use super::client::{encode_segment, ApiClient, ApiResponse};
use crate::peer::{Peer, PeerCreateResponse, PeerFormData, PeerUpdate};

/// List all peers
pub async fn list(client: &ApiClient) -> ApiResponse<Vec<Peer>> {
    client.get("/peers").await
}

/// Create a peer
pub async fn create(client: &ApiClient, form: &PeerFormData) -> ApiResponse<PeerCreateResponse> {
    client.post("/peers", form).await
}

/// Update the given fields of a peer
pub async fn update(client: &ApiClient, id: &str, update: &PeerUpdate) -> ApiResponse<Peer> {
    client
        .patch(&format!("/peers/{}", encode_segment(id)), update)
        .await
}

/// Delete a peer; any response body is ignored
pub async fn remove(client: &ApiClient, id: &str) -> ApiResponse<()> {
    client
        .delete::<IgnoredAny>(&format!("/peers/{}", encode_segment(id)))
        .await
        .map(|_| ())
}

/// Replace a peer's keys; the response carries the new client config
pub async fn regenerate_keys(client: &ApiClient, id: &str) -> ApiResponse<PeerCreateResponse> {
    client
        .request::<_, ()>(
            Method::POST,
            &format!("/peers/regenerate-keys/{}", encode_segment(id)),
            None,
        )
        .await
}

/// Fetch a peer's client configuration file as text
pub async fn config(client: &ApiClient, id: &str) -> ApiResponse<String> {
    client
        .get_text(&format!("/peers/config/{}", encode_segment(id)))
        .await
}

/// Fetch a PNG QR code of a peer's client configuration
pub async fn qr(client: &ApiClient, id: &str) -> ApiResponse<Bytes> {
    client
        .get_bytes(&format!("/peers/qr/{}", encode_segment(id)))
        .await
}
