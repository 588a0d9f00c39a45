//! Function reply → HTTP response.

use std::collections::BTreeMap;

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::error::{GatewayError, Result};
use crate::invoke::InvokeResponse;

/// Proxy-integration reply produced by the function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReply {
    #[serde(default, alias = "StatusCode", deserialize_with = "null_default")]
    pub status_code: i64,
    #[serde(default, alias = "Headers", deserialize_with = "null_default")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, alias = "MultiValueHeaders", deserialize_with = "null_default")]
    pub multi_value_headers: BTreeMap<String, Vec<String>>,
    #[serde(default, alias = "Body", deserialize_with = "null_default")]
    pub body: String,
    #[serde(default, alias = "IsBase64Encoded", skip_serializing_if = "Option::is_none")]
    pub is_base64_encoded: Option<bool>,
}

fn null_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ApiReply {
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(GatewayError::ResponseMalformed)
    }

    /// Status to send: absent becomes 500, and so does anything out of range.
    pub fn status(&self) -> StatusCode {
        if self.status_code == 0 {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        u16::try_from(self.status_code)
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or_else(|| {
                warn!(
                    "Invalid status code {}, falling back to 500 Internal Server Error",
                    self.status_code
                );
                StatusCode::INTERNAL_SERVER_ERROR
            })
    }

    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        if let Some(encoded) = self.is_base64_encoded {
            info!(is_base64_encoded = encoded, "body written verbatim");
        }

        let mut response = Response::new(Full::new(Bytes::from(self.body)));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            if let Some((name, value)) = header_pair(&name, &value) {
                headers.insert(name, value);
            }
        }
        for (name, values) in self.multi_value_headers {
            for value in values {
                if let Some((name, value)) = header_pair(&name, &value) {
                    headers.append(name, value);
                }
            }
        }
        response
    }
}

fn header_pair(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
        (Ok(name), Ok(value)) => Some((name, value)),
        _ => {
            warn!(header = %name, "dropping invalid reply header");
            None
        }
    }
}

/// Turn an invocation result into the HTTP response. A remote error is
/// answered with 500 and its message.
pub fn translate(response: &InvokeResponse) -> Result<Response<Full<Bytes>>> {
    if let Some(error) = &response.error {
        return Ok(text_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            error.message.clone(),
        ));
    }
    Ok(ApiReply::from_payload(&response.payload)?.into_response())
}

/// Plain-text response with the given status.
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Response for a failed stage, body is the status reason.
pub fn error_response(status: StatusCode) -> Response<Full<Bytes>> {
    let reason = status.canonical_reason().unwrap_or("Error");
    text_response(status, format!("{reason}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::InvokeResponseError;
    use http_body_util::BodyExt;

    async fn body_of(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_reply_translation() {
        let payload =
            br#"{"statusCode":200,"headers":{"Content-Type":"application/json"},"body":"{\"m\":\"hi\"}"}"#;
        let response = translate(&InvokeResponse::with_payload(&payload[..])).unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(body_of(response).await, r#"{"m":"hi"}"#);
    }

    #[tokio::test]
    async fn test_missing_status_is_500() {
        let payload = br#"{"headers":{"X-A":"1"},"body":"oops"}"#;
        let response = translate(&InvokeResponse::with_payload(&payload[..])).unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()["x-a"], "1");
        assert_eq!(body_of(response).await, "oops");
    }

    #[test]
    fn test_pascal_case_and_nulls() {
        let reply =
            ApiReply::from_payload(br#"{"StatusCode":201,"Headers":null,"Body":null}"#).unwrap();
        assert_eq!(reply.status_code, 201);
        assert!(reply.headers.is_empty());
        assert!(reply.body.is_empty());
    }

    #[test]
    fn test_out_of_range_status_falls_back() {
        let reply = ApiReply {
            status_code: 70000,
            ..Default::default()
        };
        assert_eq!(reply.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let reply = ApiReply {
            status_code: 42,
            ..Default::default()
        };
        assert_eq!(reply.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_multi_value_headers_appended() {
        let reply = ApiReply {
            status_code: 204,
            headers: BTreeMap::from([("Set-Cookie".to_string(), "a=1".to_string())]),
            multi_value_headers: BTreeMap::from([(
                "Set-Cookie".to_string(),
                vec!["b=2".to_string(), "c=3".to_string()],
            )]),
            ..Default::default()
        };
        let response = reply.into_response();
        let cookies: Vec<&str> = response
            .headers()
            .get_all("set-cookie")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert_eq!(cookies, vec!["a=1", "b=2", "c=3"]);
    }

    #[tokio::test]
    async fn test_remote_error_is_500_with_message() {
        let response = InvokeResponse::with_error(InvokeResponseError::new("boom", "errorString"));
        let response = translate(&response).unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await, "boom");
    }

    #[test]
    fn test_malformed_payload() {
        let err = translate(&InvokeResponse::with_payload(&b"not json"[..])).unwrap_err();
        assert!(matches!(err, GatewayError::ResponseMalformed(_)));
    }
}
