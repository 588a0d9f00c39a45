//! Inbound HTTP request → invocation event.

use std::collections::BTreeMap;

use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Body;
use hyper::Request;
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::error::{GatewayError, Result};
use crate::routing::Route;

/// Generic API event delivered to the function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    /// Declared route path.
    pub resource: String,
    /// Decoded request path.
    pub path: String,
    pub http_method: String,
    /// First value of each header.
    pub headers: BTreeMap<String, String>,
    pub multi_value_headers: BTreeMap<String, Vec<String>>,
    /// Last value of each query parameter.
    pub query_string_parameters: BTreeMap<String, String>,
    pub multi_value_query_string_parameters: BTreeMap<String, Vec<String>>,
    pub path_parameters: BTreeMap<String, String>,
    pub body: String,
}

impl ApiEvent {
    /// Build the event for a request matched to `route`, reading at most
    /// `max_body_size` bytes of body.
    pub async fn from_request<B>(
        req: Request<B>,
        route: &Route,
        params: &BTreeMap<String, String>,
        max_body_size: usize,
    ) -> Result<Self>
    where
        B: Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();

        let body = Limited::new(body, max_body_size)
            .collect()
            .await
            .map_err(|e| GatewayError::BodyRead(e.to_string()))?
            .to_bytes();

        let mut event = ApiEvent {
            resource: route.path.clone(),
            path: percent_decode_str(parts.uri.path())
                .decode_utf8_lossy()
                .into_owned(),
            http_method: parts.method.as_str().to_string(),
            body: String::from_utf8_lossy(&body).into_owned(),
            ..Default::default()
        };

        for name in parts.headers.keys() {
            let values: Vec<String> = parts
                .headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            let key = canonical_header_key(name.as_str());
            if let Some(first) = values.first() {
                event.headers.insert(key.clone(), first.clone());
            }
            event.multi_value_headers.insert(key, values);
        }

        if let Some(query) = parts.uri.query() {
            for (key, value) in form_urlencoded::parse(query.as_bytes()) {
                event
                    .query_string_parameters
                    .insert(key.to_string(), value.to_string());
                event
                    .multi_value_query_string_parameters
                    .entry(key.into_owned())
                    .or_default()
                    .push(value.into_owned());
            }
        }

        event.path_parameters = params
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(event)
    }

    /// Serialize to the bytes sent as the invocation payload.
    pub fn to_payload(&self) -> Result<Bytes> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(GatewayError::Marshal)
    }
}

/// `content-type` → `Content-Type`.
pub fn canonical_header_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}
