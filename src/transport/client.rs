use std::time::Duration;
use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Client};
use tracing::debug;
use crate::core::{HttpRequest, HttpResponse, RequestBody, Transport, TransportError};

/// [`Transport`] over a shared `reqwest` client.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let HttpRequest {
            method,
            url,
            headers,
            basic_auth,
            body,
        } = request;

        debug!("{} {}", method, url);

        let mut builder = self.client.request(method, &url);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(auth) = basic_auth {
            builder = builder.basic_auth(auth.username, Some(auth.password));
        }

        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Text(text) => builder.body(text),
            RequestBody::Form(pairs) => builder.form(&pairs),
            RequestBody::Stream { stream, length } => builder
                .header(CONTENT_LENGTH, length)
                .body(Body::wrap_stream(stream)),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse::new(status, body))
    }
}
