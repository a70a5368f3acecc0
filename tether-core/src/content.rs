//! # Wire shapes
//!
//! Plain data describing what goes over the wire: the assembled [`RequestInfo`], request
//! [`BodyContent`], pre-typed [`RawContent`] supplied by the caller, and the
//! [`ResponseContent`] handed back by the transport.
//!
//! All of these are created fresh for every call and dropped when the call completes.
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, header::CONTENT_TYPE};

/// The assembled request line and headers.
///
/// The `Content-Type` of the body is not part of `headers`; transports take it from the
/// body itself.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
}

/// An encoded request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyContent {
    pub media_type: String,
    pub charset: Option<String>,
    pub bytes: Bytes,
}

impl BodyContent {
    pub fn new(media_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            media_type: media_type.into(),
            charset: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// UTF-8 `text/plain`.
    pub fn text(text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self::new("text/plain", text).with_charset("UTF-8")
    }

    /// UTF-8 `application/json`.
    pub fn json(bytes: impl Into<Bytes>) -> Self {
        Self::new("application/json", bytes).with_charset("UTF-8")
    }

    /// The `Content-Type` header value for this body.
    pub fn content_type(&self) -> String {
        format_content_type(&self.media_type, self.charset.as_deref())
    }

    /// Replaces media type and charset with the ones carried by a `Content-Type` value.
    pub(crate) fn override_content_type(&mut self, content_type: &str) {
        let (media_type, charset) = parse_content_type(content_type);
        self.media_type = media_type;
        self.charset = charset;
    }
}

/// Pre-typed raw content supplied directly by the caller, e.g. an in-memory file.
///
/// Raw content bypasses converter lookup: its bytes and media type are copied as they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawContent {
    pub media_type: String,
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

impl RawContent {
    pub fn new(media_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            media_type: media_type.into(),
            file_name: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub(crate) fn to_body(&self) -> BodyContent {
        let (media_type, charset) = parse_content_type(&self.media_type);
        BodyContent {
            media_type,
            charset,
            bytes: self.bytes.clone(),
        }
    }
}

/// A response as handed back by the transport.
#[derive(Debug, Clone)]
pub struct ResponseContent {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub content_type: Option<String>,
    pub charset: Option<String>,
    pub bytes: Bytes,
}

impl ResponseContent {
    /// Builds a response, reading media type and charset from the `Content-Type` header.
    pub fn new(status: StatusCode, headers: HeaderMap, bytes: impl Into<Bytes>) -> Self {
        let (content_type, charset) = match headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            Some(value) => {
                let (media_type, charset) = parse_content_type(value);
                (Some(media_type), charset)
            }
            None => (None, None),
        };

        Self {
            status,
            headers,
            content_type,
            charset,
            bytes: bytes.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// `204 No Content` and `205 Reset Content` never carry a body worth converting.
    pub fn is_empty_status(&self) -> bool {
        self.status == StatusCode::NO_CONTENT || self.status == StatusCode::RESET_CONTENT
    }
}

/// `mediaType` alone when there is no charset, `mediaType;charset=<name>` otherwise.
pub fn format_content_type(media_type: &str, charset: Option<&str>) -> String {
    match charset {
        Some(charset) => format!("{media_type};charset={charset}"),
        None => media_type.to_string(),
    }
}

/// Splits a `Content-Type` value into its media type and optional charset.
///
/// Parameters other than `charset` (e.g. a multipart `boundary`) stay on the media type.
pub fn parse_content_type(value: &str) -> (String, Option<String>) {
    let mut media_type = Vec::new();
    let mut charset = None;

    for (i, piece) in value.split(';').enumerate() {
        let piece = piece.trim();
        if i > 0
            && let Some((key, val)) = piece.split_once('=')
            && key.trim().eq_ignore_ascii_case("charset")
        {
            charset = Some(val.trim().trim_matches('"').to_string());
            continue;
        }
        if !piece.is_empty() {
            media_type.push(piece);
        }
    }

    (media_type.join("; "), charset)
}
