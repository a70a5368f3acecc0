//! # Tether Core
//!
//! `tether-core` turns declarative descriptions of an HTTP API into working calls. A service
//! is described as plain data ([`meta`]): methods with an HTTP verb, a URL template, static
//! headers, a body encoding and typed parameters, each parameter carrying one role (path,
//! query, header, body, form field, multipart part, ...).
//!
//! ## Key Components
//!
//! * **[`Service`]:** The main entry point. Built once from a [`ServiceMeta`], it validates
//!   every method and exposes one call-site per method.
//! * **[`MethodDescriptor`]:** The immutable, validated form of one method. Every structural
//!   mistake (missing URL, unmatched placeholders, illegal role combinations) is reported as a
//!   [`DescriptorError`] before any call can be made.
//! * **[`ConverterRegistry`]:** Caches one converter per type and direction, produced by a
//!   pluggable [`ConverterFactory`].
//! * **[`HttpClient`]:** The transport seam. [`UreqClient`] is the blocking default.
//!
//! ## Return styles
//!
//! A method returns its result directly, through a callback argument, or as a deferred
//! single-element stream. Whatever the style, failures arrive as one [`CallError`].
//!
//! See the README.md for more details about usage.
pub mod assemble;
pub mod body;
pub mod content;
pub mod converter;
pub mod descriptor;
pub mod dispatch;
pub mod meta;
pub mod service;
pub mod transport;

pub use assemble::{Arg, ArgumentError};
pub use converter::{ConversionError, ConverterFactory, ConverterRegistry, StandardConverters};
pub use descriptor::{DescriptorError, DescriptorErrorKind, MethodDescriptor};
pub use dispatch::{CallError, CallFailure, HttpInfo, Invocation, Reply, ReplyStream};
pub use meta::{MethodMeta, ParamAnnotation, ParamMeta, ServiceMeta, TypeRef};
pub use service::{Service, ServiceBuilder};
pub use transport::{HttpClient, TransportError, UreqClient};

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
