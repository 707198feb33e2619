//! etcd v3 client over the JSON gateway
//!
//! Uses the gateway's `/v3/kv/*` endpoints: keys and values travel base64
//! encoded, 64-bit integers travel as JSON strings.

use super::{prefix_range_end, KeyValue, KvStore};
use crate::common::{Error, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct RangeRequest {
    key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    range_end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RangeResponse {
    #[serde(default)]
    kvs: Vec<RawKeyValue>,
}

#[derive(Debug, Deserialize)]
struct RawKeyValue {
    key: String,
    #[serde(default)]
    value: String,
    #[serde(default, deserialize_with = "de_i64")]
    mod_revision: i64,
}

#[derive(Debug, Serialize)]
struct PutRequest {
    key: String,
    value: String,
}

#[derive(Debug, Default, Deserialize)]
struct PutResponse {}

#[derive(Debug, Serialize)]
struct DeleteRangeRequest {
    key: String,
}

#[derive(Debug, Default, Deserialize)]
struct DeleteRangeResponse {
    #[serde(default, deserialize_with = "de_i64")]
    deleted: i64,
}

/// Gateway error body
#[derive(Debug, Default, Deserialize)]
struct GatewayError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    error: String,
}

/// int64 fields come as strings from the gateway; accept plain numbers too
fn de_i64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// etcd client speaking the v3 JSON gateway
#[derive(Clone)]
pub struct EtcdClient {
    http: reqwest::Client,
    endpoints: Vec<String>,
}

impl EtcdClient {
    /// Create a client for the given client URLs, tried in order.
    pub fn new(endpoints: Vec<String>, request_timeout: Duration) -> Result<Self> {
        let endpoints: Vec<String> = endpoints
            .into_iter()
            .map(|e| e.trim().trim_end_matches('/').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        if endpoints.is_empty() {
            return Err(Error::InvalidConfig("no coordination store endpoints".into()));
        }

        let http = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { http, endpoints })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// POST `body` to `path` on the first endpoint that answers.
    async fn call<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Default,
    {
        let mut last_err = None;

        for endpoint in &self.endpoints {
            let url = format!("{}{}", endpoint, path);
            match self.call_one(&url, body).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    tracing::debug!(url = %url, error = %e, "Coordination store request failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::StoreTransport("no endpoints".into())))
    }

    async fn call_one<Req, Resp>(&self, url: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Default,
    {
        let resp = self.http.post(url).json(body).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        if !status.is_success() {
            let err: GatewayError = serde_json::from_slice(&bytes).unwrap_or_default();
            let message = if !err.message.is_empty() {
                err.message
            } else if !err.error.is_empty() {
                err.error
            } else {
                String::from_utf8_lossy(&bytes).into_owned()
            };
            return Err(Error::StoreTransport(format!("{}: {}", status, message)));
        }

        // The gateway omits every default-valued field, including the whole body.
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Resp::default());
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| Error::StoreTransport(format!("malformed response from {}: {}", url, e)))
    }

    async fn range(&self, key: &str, range_end: Option<Vec<u8>>) -> Result<Vec<KeyValue>> {
        let request = RangeRequest {
            key: BASE64.encode(key),
            range_end: range_end.map(|end| BASE64.encode(end)),
        };
        let response: RangeResponse = self.call("/v3/kv/range", &request).await?;

        response
            .kvs
            .into_iter()
            .map(|raw| {
                let key = BASE64
                    .decode(&raw.key)
                    .ok()
                    .and_then(|k| String::from_utf8(k).ok())
                    .ok_or_else(|| Error::StoreTransport("malformed key in range response".into()))?;
                let value = BASE64.decode(&raw.value).map_err(|e| {
                    Error::StoreTransport(format!("malformed value for {}: {}", key, e))
                })?;
                Ok(KeyValue {
                    key,
                    value,
                    mod_revision: raw.mod_revision,
                })
            })
            .collect()
    }
}

#[async_trait]
impl KvStore for EtcdClient {
    async fn get(&self, key: &str) -> Result<Vec<KeyValue>> {
        self.range(key, None).await
    }

    async fn get_prefix(&self, prefix: &str) -> Result<Vec<KeyValue>> {
        self.range(prefix, Some(prefix_range_end(prefix.as_bytes())))
            .await
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let request = PutRequest {
            key: BASE64.encode(key),
            value: BASE64.encode(value),
        };
        let _: PutResponse = self.call("/v3/kv/put", &request).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let request = DeleteRangeRequest {
            key: BASE64.encode(key),
        };
        let response: DeleteRangeResponse = self.call("/v3/kv/deleterange", &request).await?;
        Ok(response.deleted.max(0) as u64)
    }
}
