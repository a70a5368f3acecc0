//! # Method Descriptors
//!
//! A [`MethodDescriptor`] is the immutable, validated form of one declared method. It is
//! built once from a [`MethodMeta`](crate::meta::MethodMeta) and reused by every call.
//!
//! Building reconciles the independent per-parameter annotations into one model:
//!
//! * **URL**: the method URL is split into a [`UrlTemplate`] whose placeholders must match
//!   the `Path` bindings exactly.
//! * **Headers**: static header lines plus header bindings form a [`HeaderSpec`].
//! * **Body**: exactly one [`BodyStrategy`] per method; field and part bindings are only legal
//!   under their own encoding.
//! * **Result**: exactly one [`ReturnStrategy`], derived from the declared return shape and
//!   the presence of a callback parameter.
//!
//! Any inconsistency is reported as a [`DescriptorError`] before a single call can be made.
mod builder;
mod headers;
mod url_template;

pub use headers::{HeaderLineError, HeaderSpec, parse_header_line};
pub use url_template::{Segment, TemplateError, UrlTemplate};

use crate::{
    converter::ConverterRole,
    meta::{StreamKind, TypeRef},
};
use http::Method;
use std::fmt;

/// The validated role of one method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterBinding {
    Path { name: String, encoded: bool },
    Query { name: String, encoded: bool },
    QueryMap { encoded: bool },
    Header { name: String },
    HeaderMap,
    Field { name: String, encoded: bool },
    FieldMap { encoded: bool },
    Part { name: String, media_type: Option<String> },
    PartMap,
    Body,
    UrlOverride,
    Callback,
}

impl ParameterBinding {
    pub fn role(&self) -> &'static str {
        match self {
            ParameterBinding::Path { .. } => "path",
            ParameterBinding::Query { .. } => "query",
            ParameterBinding::QueryMap { .. } => "query map",
            ParameterBinding::Header { .. } => "header",
            ParameterBinding::HeaderMap => "header map",
            ParameterBinding::Field { .. } => "field",
            ParameterBinding::FieldMap { .. } => "field map",
            ParameterBinding::Part { .. } => "part",
            ParameterBinding::PartMap => "part map",
            ParameterBinding::Body => "body",
            ParameterBinding::UrlOverride => "url",
            ParameterBinding::Callback => "callback",
        }
    }
}

/// A binding together with the parameter it is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundParam {
    /// Position of the parameter, which is also the position of its argument.
    pub index: usize,
    pub name: String,
    pub ty: TypeRef,
    pub binding: ParameterBinding,
}

/// Where the base URL of a call comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseUrlPolicy {
    /// The service base URL.
    Fixed(String),
    /// Taken from the `Url` argument of every call.
    Overridden { param: BoundParam },
    /// The method URL is complete on its own.
    None,
}

/// How the request body is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStrategy {
    /// A single converted value, or no body at all.
    Discrete { body: Option<BoundParam> },
    /// `Field` and `FieldMap` bindings in declaration order.
    FormEncoded { fields: Vec<BoundParam> },
    /// `Part` and `PartMap` bindings in declaration order.
    Multipart { parts: Vec<BoundParam> },
}

impl BodyStrategy {
    pub fn kind(&self) -> &'static str {
        match self {
            BodyStrategy::Discrete { .. } => "discrete",
            BodyStrategy::FormEncoded { .. } => "form-urlencoded",
            BodyStrategy::Multipart { .. } => "multipart",
        }
    }
}

static VOID: TypeRef = TypeRef::Void;

/// How the result of a call reaches the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnStrategy {
    /// The call blocks and returns the converted value.
    Direct { result: TypeRef },
    /// The call is handed to the transport; the callback argument at `param`, declared as
    /// `name`, receives the result.
    Callback {
        param: usize,
        name: String,
        result: TypeRef,
    },
    /// A deferred stream producing exactly one value or one error.
    ReactiveSingle { wrapper: StreamKind, result: TypeRef },
    /// A deferred stream signalling success or failure only.
    ReactiveCompletion { wrapper: StreamKind },
}

impl ReturnStrategy {
    /// The type the response converter is resolved for.
    pub fn result_type(&self) -> &TypeRef {
        match self {
            ReturnStrategy::Direct { result }
            | ReturnStrategy::Callback { result, .. }
            | ReturnStrategy::ReactiveSingle { result, .. } => result,
            ReturnStrategy::ReactiveCompletion { .. } => &VOID,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ReturnStrategy::Direct { .. } => "direct",
            ReturnStrategy::Callback { .. } => "callback",
            ReturnStrategy::ReactiveSingle { .. } => "reactive",
            ReturnStrategy::ReactiveCompletion { .. } => "completion",
        }
    }
}

/// The immutable, validated description of one remote call.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub name: String,
    pub verb: Method,
    /// Whether the verb may carry a request body.
    pub has_body: bool,
    pub template: UrlTemplate,
    pub base_url: BaseUrlPolicy,
    pub headers: HeaderSpec,
    pub paths: Vec<BoundParam>,
    /// `Query` and `QueryMap` bindings in declaration order.
    pub queries: Vec<BoundParam>,
    pub body: BodyStrategy,
    pub returns: ReturnStrategy,
    /// The result is wrapped in an envelope carrying status code and headers.
    pub http_info: bool,
    /// Number of declared parameters, and therefore of arguments per call.
    pub arity: usize,
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.verb, self.template)
    }
}

/// A structural inconsistency in one declared method.
#[derive(Debug, thiserror::Error)]
#[error("Invalid method '{method}': {kind}")]
pub struct DescriptorError {
    pub method: String,
    pub kind: DescriptorErrorKind,
}

impl DescriptorError {
    pub(crate) fn new(method: impl Into<String>, kind: DescriptorErrorKind) -> Self {
        Self {
            method: method.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorErrorKind {
    #[error("no URL: the method has no URL, there is no base URL and no url parameter")]
    MissingUrl,
    #[error("an HTTP method annotation is required")]
    MissingVerb,
    #[error("only one HTTP method is allowed, found: {}", .0.join(", "))]
    MultipleVerbs(Vec<String>),
    #[error("'{0}' is not a valid HTTP method")]
    InvalidVerb(String),
    #[error("malformed URL template '{template}': {source}")]
    MalformedTemplate {
        template: String,
        source: TemplateError,
    },
    #[error("'{0}' is not a valid path placeholder name")]
    InvalidPlaceholder(String),
    #[error("the URL query string must not contain placeholders, found '{0}'; use a query parameter")]
    QueryPlaceholder(String),
    #[error("URL placeholder '{{{0}}}' has no matching path parameter")]
    UnmatchedPlaceholder(String),
    #[error("path parameter '{0}' has no matching URL placeholder")]
    OrphanPathParam(String),
    #[error("path parameter '{0}' is declared more than once")]
    DuplicatePathParam(String),
    #[error("{placeholders} URL placeholder(s) but {params} path parameter(s)")]
    PathCountMismatch { placeholders: usize, params: usize },
    #[error("parameter '{0}' has more than one role")]
    MultipleRoles(String),
    #[error("at most one {0} parameter is allowed")]
    DuplicateRole(&'static str),
    #[error("field parameter '{0}' can only be used with form-urlencoded encoding")]
    FieldOutsideForm(String),
    #[error("part parameter '{0}' can only be used with multipart encoding")]
    PartOutsideMultipart(String),
    #[error("body parameter '{0}' cannot be used with form-urlencoded or multipart encoding")]
    BodyOutsideDiscrete(String),
    #[error("{0} requests cannot have a body")]
    BodyNotAllowed(String),
    #[error("form-urlencoded method must contain at least one field parameter")]
    EmptyForm,
    #[error("multipart method must contain at least one part parameter")]
    EmptyMultipart,
    #[error("{role} parameter '{param}' must be a map, found '{ty}'")]
    NotAMap {
        role: &'static str,
        param: String,
        ty: TypeRef,
    },
    #[error("{role} parameter '{param}' keys must be of type String, found '{key}'")]
    NonStringMapKey {
        role: &'static str,
        param: String,
        key: TypeRef,
    },
    #[error("callback methods must not declare a result, found '{0}'")]
    CallbackWithResult(TypeRef),
    #[error("Completable methods carry no result, found '{0}'")]
    CompletionWithResult(TypeRef),
    #[error("a callback parameter cannot be combined with a {0} result")]
    CallbackWithStream(StreamKind),
    #[error("malformed static header: {0}")]
    MalformedHeader(#[from] HeaderLineError),
    #[error("a url parameter cannot be combined with an absolute method URL")]
    UrlOverrideWithAbsoluteUrl,
    #[error("method is declared more than once")]
    DuplicateMethod,
    #[error("no {role} converter available for type '{ty}'")]
    UnsupportedType { role: ConverterRole, ty: TypeRef },
}
