//! C1: a typed wrapper over the OpenSearch HTTP API.
//!
//! Every query body is built via [`crate::query_builder`] typed fragments and
//! handed to `reqwest` as JSON; nothing here hand-assembles query strings.

use serde_json::Value;
use std::time::Duration;

use crate::error::NetTapError;
use crate::query_builder::SearchBody;

#[derive(Debug, Clone)]
pub struct IndicesEntry {
    pub index: String,
    pub store_size_bytes: u64,
}

#[derive(Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
}

impl SearchClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client builds");
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// `Search(index, body) -> result`. Returns the raw JSON response; callers
    /// pull out `hits` or `aggregations` as needed.
    pub async fn search(&self, index: &str, body: &SearchBody) -> Result<Value, NetTapError> {
        let url = format!("{}/{}/_search", self.base_url, index);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| NetTapError::Downstream(format!("search {index}: {e}")))?;
        if !resp.status().is_success() {
            return Err(NetTapError::Downstream(format!(
                "search {index}: HTTP {}",
                resp.status()
            )));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| NetTapError::Downstream(format!("search {index} decode: {e}")))
    }

    /// `CatIndices() -> entries`, mapping to `GET _cat/indices?format=json`.
    pub async fn cat_indices(&self) -> Result<Vec<IndicesEntry>, NetTapError> {
        let url = format!(
            "{}/_cat/indices?format=json&h=index,store.size",
            self.base_url
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| NetTapError::Downstream(format!("cat_indices: {e}")))?;
        if !resp.status().is_success() {
            return Err(NetTapError::Downstream(format!(
                "cat_indices: HTTP {}",
                resp.status()
            )));
        }
        let rows: Vec<Value> = resp
            .json()
            .await
            .map_err(|e| NetTapError::Downstream(format!("cat_indices decode: {e}")))?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let index = row.get("index")?.as_str()?.to_string();
                let store_size_bytes = row
                    .get("store.size")
                    .and_then(|v| v.as_str())
                    .map(parse_human_size)
                    .unwrap_or(0);
                Some(IndicesEntry {
                    index,
                    store_size_bytes,
                })
            })
            .collect())
    }

    /// `DeleteIndex(name)`.
    pub async fn delete_index(&self, name: &str) -> Result<(), NetTapError> {
        let url = format!("{}/{}", self.base_url, name);
        let resp = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|e| NetTapError::Downstream(format!("delete_index {name}: {e}")))?;
        if !resp.status().is_success() {
            return Err(NetTapError::Downstream(format!(
                "delete_index {name}: HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }

    /// `Info() -> cluster/version info`, used both for health checks and as
    /// the version-manager's database-version source for OpenSearch itself.
    pub async fn info(&self) -> Result<Value, NetTapError> {
        let resp = self
            .http
            .get(&self.base_url)
            .send()
            .await
            .map_err(|e| NetTapError::Downstream(format!("info: {e}")))?;
        if !resp.status().is_success() {
            return Err(NetTapError::Downstream(format!("info: HTTP {}", resp.status())));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| NetTapError::Downstream(format!("info decode: {e}")))
    }
}

/// OpenSearch's `_cat` API reports sizes like `1.2gb`/`512mb`/`0`. Parse
/// defensively; unparseable values degrade to 0 rather than failing listing.
fn parse_human_size(s: &str) -> u64 {
    let s = s.trim();
    if s.is_empty() {
        return 0;
    }
    let (num_part, unit) = s.split_at(
        s.find(|c: char| c.is_alphabetic())
            .unwrap_or(s.len()),
    );
    let num: f64 = match num_part.parse() {
        Ok(n) => n,
        Err(_) => return 0,
    };
    let mult: f64 = match unit.to_lowercase().as_str() {
        "kb" => 1024.0,
        "mb" => 1024.0 * 1024.0,
        "gb" => 1024.0 * 1024.0 * 1024.0,
        "tb" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    };
    (num * mult) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_human_readable_sizes() {
        assert_eq!(parse_human_size("512"), 512);
        assert_eq!(parse_human_size("1kb"), 1024);
        assert_eq!(parse_human_size("2gb"), 2 * 1024 * 1024 * 1024);
        assert_eq!(parse_human_size(""), 0);
        assert_eq!(parse_human_size("garbage"), 0);
    }
}
