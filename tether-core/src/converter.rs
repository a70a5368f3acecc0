//! # Converters
//!
//! A converter is a pure function between a logical value and its wire form. There are three
//! families, one per direction:
//!
//! * **[`UrlConverter`]**: value -> `String`, for path segments, query values, form fields and headers.
//! * **[`RequestConverter`]**: value -> [`BodyContent`], for discrete bodies and multipart parts.
//! * **[`ResponseConverter`]**: [`ResponseContent`] -> value.
//!
//! Converters are produced by a [`ConverterFactory`] and cached per type by the
//! [`ConverterRegistry`], so converters holding expensive state pay for it once.
//! [`StandardConverters`] is the default factory.
mod registry;
mod standard;

pub use registry::ConverterRegistry;
pub use standard::StandardConverters;

use crate::{
    content::{BodyContent, ResponseContent},
    meta::TypeRef,
};
use std::{fmt, sync::Arc};

/// Which converter family a lookup is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConverterRole {
    Url,
    Request,
    Response,
}

impl fmt::Display for ConverterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConverterRole::Url => write!(f, "url"),
            ConverterRole::Request => write!(f, "request"),
            ConverterRole::Response => write!(f, "response"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("No {role} converter available for type '{ty}'")]
    Unsupported { role: ConverterRole, ty: TypeRef },
    #[error("Value '{value}' cannot be converted as '{ty}'")]
    InvalidValue { ty: TypeRef, value: String },
    #[error("Response body '{body}' cannot be read as '{ty}'")]
    InvalidBody { ty: TypeRef, body: String },
    #[error("Unsupported charset '{0}'")]
    UnsupportedCharset(String),
    #[error("Body is not valid UTF-8: '{0}'")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("JSON conversion failed: '{0}'")]
    Json(#[from] serde_json::Error),
    #[error("Failed to read file '{path}': '{source}'")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait UrlConverter: Send + Sync {
    fn convert(&self, value: &serde_json::Value) -> Result<String, ConversionError>;
}

pub trait RequestConverter: Send + Sync {
    fn convert(&self, value: &serde_json::Value) -> Result<BodyContent, ConversionError>;
}

pub trait ResponseConverter: Send + Sync {
    fn convert(&self, response: &ResponseContent) -> Result<serde_json::Value, ConversionError>;
}

/// Produces converters for logical types. `None` means the type is not supported.
pub trait ConverterFactory: Send + Sync {
    fn url_converter(&self, ty: &TypeRef) -> Option<Arc<dyn UrlConverter>>;

    fn request_converter(&self, ty: &TypeRef) -> Option<Arc<dyn RequestConverter>>;

    fn response_converter(&self, ty: &TypeRef) -> Option<Arc<dyn ResponseConverter>>;
}
