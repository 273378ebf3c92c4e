//! Response body capture policy

use axum::{
    body::Body,
    http::{HeaderMap, header::CONTENT_TYPE},
    response::Response,
};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use movie_core::LARGE_CONTENT_PLACEHOLDER;

use super::TrackingError;

/// What to store as `response_data`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// No response available; store an empty string
    Nothing,
    /// Buffer and store the whole body
    Full,
    /// Store the placeholder and leave the body untouched
    Placeholder,
}

/// Decide how to capture a response from its headers.
///
/// Any `Content-Type` header, whatever its value, selects full capture. The
/// JSON check after it is kept even though the first check already covers it.
pub fn capture_policy(headers: Option<&HeaderMap>) -> Capture {
    let Some(headers) = headers else {
        return Capture::Nothing;
    };

    if headers.contains_key(CONTENT_TYPE) {
        return Capture::Full;
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if content_type.contains("json") {
        return Capture::Full;
    }

    Capture::Placeholder
}

/// A body stream that failed part way through
#[derive(Debug)]
pub struct BodyFailure {
    /// Bytes read before the error
    pub received: Bytes,
    pub error: axum::Error,
}

impl BodyFailure {
    /// Body yielding the bytes read so far, then the original error
    pub fn into_body(self) -> Body {
        let mut chunks = Vec::with_capacity(2);
        if !self.received.is_empty() {
            chunks.push(Ok(self.received));
        }
        chunks.push(Err(self.error));
        Body::from_stream(futures::stream::iter(chunks))
    }
}

/// Read a whole body, keeping what arrived if the stream fails
pub async fn buffer_body(body: Body) -> Result<Bytes, BodyFailure> {
    let mut stream = body.into_data_stream();
    let mut received = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => received.extend_from_slice(&bytes),
            Err(error) => {
                return Err(BodyFailure {
                    received: received.freeze(),
                    error,
                });
            }
        }
    }
    Ok(received.freeze())
}

/// Capture `response_data` and hand back an equivalent response.
///
/// A body that fails to read is recorded as an empty string; the client
/// still receives the bytes read and then the same failure.
pub async fn capture_response(response: Response) -> (Response, String) {
    match capture_policy(Some(response.headers())) {
        Capture::Nothing => (response, String::new()),
        Capture::Placeholder => (response, LARGE_CONTENT_PLACEHOLDER.to_string()),
        Capture::Full => {
            let (parts, body) = response.into_parts();
            match buffer_body(body).await {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    (Response::from_parts(parts, Body::from(bytes)), text)
                }
                Err(failure) => {
                    let err = TrackingError::Capture(failure.error.to_string());
                    tracing::error!(target: "tracking", error = %err, "Failed to read response body");
                    (Response::from_parts(parts, failure.into_body()), String::new())
                }
            }
        }
    }
}
