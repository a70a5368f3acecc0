use super::{HttpClient, TransportError};
use crate::{
    body::RequestBody,
    content::{RequestInfo, ResponseContent},
};
use http::{
    HeaderValue,
    header::{CONTENT_TYPE, USER_AGENT},
};
use std::{fmt, time::Duration};
use tracing::trace;
use ureq::Agent;

const DEFAULT_USER_AGENT: &str = concat!("tether/", env!("CARGO_PKG_VERSION"));

/// A blocking [`HttpClient`] backed by a shared `ureq` agent.
///
/// Non-2xx responses are returned as regular responses; interpreting the status is left
/// to the caller.
#[derive(Clone)]
pub struct UreqClient {
    agent: Agent,
    user_agent: HeaderValue,
}

impl fmt::Debug for UreqClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqClient")
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl Default for UreqClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqClient {
    /// A client without timeouts and with the default user agent.
    pub fn new() -> Self {
        Self {
            agent: agent(None),
            user_agent: HeaderValue::from_static(DEFAULT_USER_AGENT),
        }
    }

    pub fn builder() -> UreqClientBuilder {
        UreqClientBuilder::default()
    }
}

fn agent(timeout: Option<Duration>) -> Agent {
    Agent::config_builder()
        .http_status_as_error(false)
        .allow_non_standard_methods(true)
        .timeout_global(timeout)
        .build()
        .new_agent()
}

#[derive(Debug, Clone, Default)]
pub struct UreqClientBuilder {
    timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl UreqClientBuilder {
    /// Upper bound for the whole call: connecting, sending and reading the response.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn build(self) -> Result<UreqClient, TransportError> {
        let user_agent = match self.user_agent {
            Some(user_agent) => HeaderValue::from_str(&user_agent).map_err(http::Error::from)?,
            None => HeaderValue::from_static(DEFAULT_USER_AGENT),
        };

        Ok(UreqClient {
            agent: agent(self.timeout),
            user_agent,
        })
    }
}

impl HttpClient for UreqClient {
    fn call(
        &self,
        request: &RequestInfo,
        body: &RequestBody,
    ) -> Result<ResponseContent, TransportError> {
        let mut headers = request.headers.clone();
        if !headers.contains_key(USER_AGENT) {
            headers.insert(USER_AGENT, self.user_agent.clone());
        }

        let content = body.encode();
        if let Some(content) = &content {
            let value = HeaderValue::from_str(&content.content_type()).map_err(http::Error::from)?;
            headers.insert(CONTENT_TYPE, value);
        }

        let builder = http::Request::builder()
            .method(request.method.clone())
            .uri(request.url.as_str());

        let result = match &content {
            Some(content) => {
                let mut req = builder.body(&content.bytes[..])?;
                *req.headers_mut() = headers;
                self.agent.run(req)
            }
            None => {
                let mut req = builder.body(())?;
                *req.headers_mut() = headers;
                self.agent.run(req)
            }
        };

        let (parts, mut response_body) = result.map_err(into_transport_error)?.into_parts();
        let bytes = response_body
            .read_to_vec()
            .map_err(into_transport_error)?;

        trace!(
            method = %request.method,
            url = %request.url,
            status = %parts.status,
            len = bytes.len(),
            "received response"
        );

        Ok(ResponseContent::new(parts.status, parts.headers, bytes))
    }
}

fn into_transport_error(error: ureq::Error) -> TransportError {
    match error {
        ureq::Error::Io(source) => TransportError::Io(source),
        ureq::Error::Timeout(_) => TransportError::Timeout,
        other => TransportError::Other(Box::new(other)),
    }
}
