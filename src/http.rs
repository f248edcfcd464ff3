// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tracing::debug;
use url::Url;

use crate::error::RequestError;

/// Upper bound on redirect hops before a request is abandoned
pub const MAX_REDIRECTS: usize = 20;

/// A streaming response body
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// HTTP response with status, redirect target, content length, and body stream
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw `Location` header, present on redirects
    pub location: Option<String>,
    /// Content-Length header value, if present
    pub content_length: Option<u64>,
    /// Response body as a stream of bytes
    pub body: ByteStream,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// Drain the body into memory
    pub async fn collect(self) -> Result<Bytes, reqwest::Error> {
        let mut buffer = Vec::new();
        let mut stream = self.body;
        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(buffer))
    }
}

/// HTTP client abstraction for feed, asset and artwork retrieval.
///
/// Implementations must NOT follow redirects themselves; callers inspect
/// [`HttpResponse::location`] and decide.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Issue a GET and return the response head plus a body stream
    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error>;
}

/// Default HTTP client implementation using reqwest
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Create a client with redirect following disabled
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("podstation/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Create a new ReqwestClient with a custom reqwest::Client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get_stream(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_length = response.content_length();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(String::from);

        let body: ByteStream = Box::pin(response.bytes_stream());

        Ok(HttpResponse {
            status,
            location,
            content_length,
            body,
        })
    }
}

/// GET `url`, walking 301/302/303/307/308 responses until a non-redirect
/// answer. Relative `Location` values resolve against the current URL.
///
/// The walk stops after [`MAX_REDIRECTS`] hops with
/// [`RequestError::TooManyRedirects`] instead of following an unbounded
/// chain.
pub async fn get_following_redirects<C: HttpClient + ?Sized>(
    client: &C,
    url: &Url,
) -> Result<(Url, HttpResponse), RequestError> {
    let mut current = url.clone();

    for hop in 0..=MAX_REDIRECTS {
        let response = client
            .get_stream(current.as_str())
            .await
            .map_err(|e| RequestError::Send {
                url: current.to_string(),
                source: e,
            })?;

        if !response.is_redirect() {
            return Ok((current, response));
        }

        let next = response
            .location
            .as_deref()
            .and_then(|location| current.join(location).ok())
            .ok_or_else(|| RequestError::BadRedirect {
                url: current.to_string(),
            })?;
        debug!(from = %current, to = %next, hop, "following redirect");
        current = next;
    }

    Err(RequestError::TooManyRedirects {
        url: url.to_string(),
        hops: MAX_REDIRECTS,
    })
}
