//! Request layer for the management backend
//!
//! [`client`] turns every HTTP exchange into an [`ApiResponse`]; the endpoint
//! modules wrap the individual REST routes:
//!
//! | Route | Function |
//! |---|---|
//! | `GET /peers` | [`peers::list`] |
//! | `POST /peers` | [`peers::create`] |
//! | `PATCH /peers/{id}` | [`peers::update`] |
//! | `DELETE /peers/{id}` | [`peers::remove`] |
//! | `POST /peers/regenerate-keys/{id}` | [`peers::regenerate_keys`] |
//! | `GET /peers/config/{id}` | [`peers::config`] |
//! | `GET /peers/qr/{id}` | [`peers::qr`] |
//! | `GET /settings` | [`settings::get`] |
//! | `POST /settings` | [`settings::save`] |
//! | `GET /stats` | [`stats::get`] |
//! | `GET /stats/history` | [`stats::history`] |

pub mod client;
pub mod peers;
pub mod settings;
pub mod stats;

pub use client::{encode_segment, ApiClient, ApiError, ApiResponse};
