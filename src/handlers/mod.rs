//! C12: thin HTTP handlers composing C3–C11. Each handler parses query
//! params/bodies, calls into the relevant component, and serializes a
//! response; `ApiError` carries the status-code policy from the error
//! handling design.

pub mod alerts;
pub mod bridge;
pub mod devices;
pub mod health;
pub mod internet;
pub mod investigations;
pub mod risk;
pub mod schedules;
pub mod storage;
pub mod system;
pub mod traffic;
pub mod tshark;

use serde::Deserialize;

/// Common `from`/`to`/pagination query params shared by most list endpoints.
#[derive(Debug, Deserialize, Default)]
pub struct RangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub limit: Option<u32>,
}

impl ListQuery {
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn size(&self) -> u32 {
        self.size.unwrap_or(50).clamp(1, 200)
    }

    pub fn limit(&self, default: u32, max: u32) -> u32 {
        self.limit.unwrap_or(default).clamp(1, max)
    }
}
