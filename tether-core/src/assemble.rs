//! # Request Assembly
//!
//! Turns a [`MethodDescriptor`] and one call's arguments into a [`RequestInfo`] and a
//! [`RequestBody`]. Nothing here touches the network.
//!
//! The URL is the active base URL, then every template segment (placeholders replaced by
//! converted path values), then the query string. Headers are layered from persistent
//! caller headers through static headers and header parameters up to header maps, later
//! layers replacing earlier ones name by name.
use crate::{
    body::{FormBody, MultipartBody, RequestBody},
    content::{BodyContent, RawContent, RequestInfo},
    converter::{ConversionError, ConverterRegistry},
    descriptor::{BaseUrlPolicy, BodyStrategy, BoundParam, MethodDescriptor, ParameterBinding},
    dispatch::{CallFailure, Callback, CallError, Reply},
    meta::TypeRef,
};
use http::{HeaderMap, HeaderName, HeaderValue, header::CONTENT_TYPE};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::Value;
use std::{fmt, path::Path, str::FromStr};

/// Characters escaped in path values unless the binding is marked as already encoded.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// One call argument, positionally matching the declared parameters.
pub enum Arg {
    /// A plain value, converted by the converter of the parameter type.
    Json(Value),
    /// Pre-typed content copied as it is, bypassing converters.
    Raw(RawContent),
    /// Named values for a part map, each either JSON or raw content.
    Parts(Vec<(String, Arg)>),
    /// Receives the result of a callback-style call.
    Callback(Callback),
}

impl Arg {
    pub fn callback(f: impl FnOnce(Result<Reply, CallError>) + Send + 'static) -> Self {
        Arg::Callback(Box::new(f))
    }

    pub fn is_callback(&self) -> bool {
        matches!(self, Arg::Callback(_))
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Arg::Raw(raw) => f.debug_tuple("Raw").field(raw).finish(),
            Arg::Parts(parts) => f.debug_tuple("Parts").field(parts).finish(),
            Arg::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Json(value)
    }
}

impl From<RawContent> for Arg {
    fn from(raw: RawContent) -> Self {
        Arg::Raw(raw)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    #[error("Expected {expected} argument(s), got {actual}")]
    Count { expected: usize, actual: usize },
    #[error("Path parameter '{0}' value must not be null")]
    NullPath(String),
    #[error("Path parameter '{0}' value must not be '.' or '..'")]
    PathTraversal(String),
    #[error("Body parameter '{0}' value must not be null")]
    NullBody(String),
    #[error("Url parameter '{0}' value must not be null")]
    NullUrl(String),
    #[error("Parameter '{param}' expects {expected}")]
    Kind {
        param: String,
        expected: &'static str,
    },
    #[error("{role} parameter '{param}' expects an object")]
    NotAnObject { role: &'static str, param: String },
    #[error("{role} parameter '{param}' contains a null value for key '{key}'")]
    NullMapValue {
        role: &'static str,
        param: String,
        key: String,
    },
    #[error("Invalid header '{name}': '{value}'")]
    InvalidHeader { name: String, value: String },
    #[error("Multipart body must have at least one part")]
    EmptyMultipart,
    #[error("A callback was passed to a method without a callback parameter")]
    UnexpectedCallback,
    #[error("Callback parameter '{0}' expects a callback")]
    MissingCallback(String),
}

/// The type whose converter handles each individual value of a binding: the value type
/// of a map, then the element type of a list.
pub(crate) fn value_type(param: &BoundParam) -> &TypeRef {
    let ty = match (&param.binding, &param.ty) {
        (
            ParameterBinding::QueryMap { .. }
            | ParameterBinding::FieldMap { .. }
            | ParameterBinding::PartMap
            | ParameterBinding::HeaderMap,
            TypeRef::Map(_, value),
        ) => value.as_ref(),
        (_, ty) => ty,
    };
    ty.element()
}

/// Builds the request line, headers and body of one call.
///
/// # Arguments
///
/// * `descriptor` - The method being called.
/// * `args` - One argument per declared parameter.
/// * `converters` - Converters for the parameter types.
/// * `persistent` - Caller-level headers, overridden by everything the method declares. Their
///   `Content-Type` is dropped when the call has a body.
pub fn assemble(
    descriptor: &MethodDescriptor,
    args: &[Arg],
    converters: &ConverterRegistry,
    persistent: &HeaderMap,
) -> Result<(RequestInfo, RequestBody), CallFailure> {
    if args.len() != descriptor.arity {
        return Err(ArgumentError::Count {
            expected: descriptor.arity,
            actual: args.len(),
        }
        .into());
    }

    let assembler = Assembler { args, converters };

    // A caller-level media type only applies to requests without a body.
    let mut caller = persistent.clone();
    let caller_content_type = caller.remove(CONTENT_TYPE);

    let url = assembler.url(descriptor)?;
    let mut headers = assembler.headers(descriptor, &caller)?;
    let content_type = headers.remove(CONTENT_TYPE);

    let mut body = match &descriptor.body {
        BodyStrategy::Discrete { body: None } => RequestBody::Empty,
        BodyStrategy::Discrete { body: Some(param) } => assembler.discrete(param)?,
        BodyStrategy::FormEncoded { fields } => RequestBody::Form(assembler.form(fields)?),
        BodyStrategy::Multipart { parts } => RequestBody::Multipart(assembler.multipart(parts)?),
    };

    let content_type = match content_type {
        Some(content_type) => Some(content_type),
        None if body.is_empty() => caller_content_type,
        None => None,
    };

    if let Some(content_type) = content_type {
        match body.encode() {
            Some(mut content) => {
                let value = content_type.to_str().map_err(|_| ArgumentError::InvalidHeader {
                    name: CONTENT_TYPE.to_string(),
                    value: String::from_utf8_lossy(content_type.as_bytes()).into_owned(),
                })?;
                content.override_content_type(value);
                body = RequestBody::Discrete(content);
            }
            None => {
                headers.insert(CONTENT_TYPE, content_type);
            }
        }
    }

    let request = RequestInfo {
        method: descriptor.verb.clone(),
        url,
        headers,
    };

    Ok((request, body))
}

struct Assembler<'a> {
    args: &'a [Arg],
    converters: &'a ConverterRegistry,
}

impl Assembler<'_> {
    fn json(&self, param: &BoundParam) -> Result<&Value, ArgumentError> {
        match &self.args[param.index] {
            Arg::Json(value) => Ok(value),
            _ => Err(ArgumentError::Kind {
                param: param.name.clone(),
                expected: "a JSON value",
            }),
        }
    }

    fn object(
        &self,
        param: &BoundParam,
    ) -> Result<&serde_json::Map<String, Value>, ArgumentError> {
        match self.json(param)? {
            Value::Object(map) => Ok(map),
            _ => Err(ArgumentError::NotAnObject {
                role: param.binding.role(),
                param: param.name.clone(),
            }),
        }
    }

    fn url_string(&self, ty: &TypeRef, value: &Value) -> Result<String, ConversionError> {
        self.converters.url_converter(ty)?.convert(value)
    }

    /// Converts a value to strings: one per list element for list types, none for null.
    fn strings(&self, param: &BoundParam, value: &Value) -> Result<Vec<String>, CallFailure> {
        let ty = value_type(param);
        let values = match value {
            Value::Null => Vec::new(),
            Value::Array(items) if is_repeated(param) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(|item| self.url_string(ty, item))
                .collect::<Result<Vec<_>, ConversionError>>()?,
            value => vec![self.url_string(ty, value)?],
        };
        Ok(values)
    }

    /// Entries of a map binding, rejecting null values.
    fn entries<'v>(
        &'v self,
        param: &BoundParam,
    ) -> Result<impl Iterator<Item = (&'v String, &'v Value)>, ArgumentError> {
        let map = self.object(param)?;
        if let Some((key, _)) = map.iter().find(|(_, value)| value.is_null()) {
            return Err(ArgumentError::NullMapValue {
                role: param.binding.role(),
                param: param.name.clone(),
                key: key.clone(),
            });
        }
        Ok(map.iter())
    }

    fn url(&self, descriptor: &MethodDescriptor) -> Result<String, CallFailure> {
        let base = match &descriptor.base_url {
            BaseUrlPolicy::Fixed(base) => base.clone(),
            BaseUrlPolicy::Overridden { param } => match self.json(param)? {
                Value::Null => return Err(ArgumentError::NullUrl(param.name.clone()).into()),
                value => self.url_string(&param.ty, value)?,
            },
            BaseUrlPolicy::None => String::new(),
        };

        let path = descriptor.template.render(|name| self.path_value(descriptor, name))?;

        let mut url = join(&base, &path);

        let mut query = FormBody::default();
        for param in &descriptor.queries {
            match &param.binding {
                ParameterBinding::Query { name, encoded } => {
                    for value in self.strings(param, self.json(param)?)? {
                        query.add(name, &value, *encoded);
                    }
                }
                ParameterBinding::QueryMap { encoded } => {
                    for (key, value) in self.entries(param)? {
                        for value in self.strings(param, value)? {
                            query.add(key, &value, *encoded);
                        }
                    }
                }
                _ => {}
            }
        }

        if !query.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&query.serialize());
        }

        Ok(url)
    }

    fn path_value(&self, descriptor: &MethodDescriptor, name: &str) -> Result<String, CallFailure> {
        let Some((param, encoded)) = descriptor.paths.iter().find_map(|p| match &p.binding {
            ParameterBinding::Path { name: n, encoded } if n == name => Some((p, *encoded)),
            _ => None,
        }) else {
            // Descriptors pair every placeholder with a path parameter.
            return Err(ArgumentError::NullPath(name.to_string()).into());
        };

        let value = match self.json(param)? {
            Value::Null => return Err(ArgumentError::NullPath(param.name.clone()).into()),
            value => self.url_string(&param.ty, value)?,
        };

        if encoded {
            return Ok(value);
        }
        if value == "." || value == ".." {
            return Err(ArgumentError::PathTraversal(param.name.clone()).into());
        }
        Ok(utf8_percent_encode(&value, PATH_SEGMENT).to_string())
    }

    fn headers(
        &self,
        descriptor: &MethodDescriptor,
        persistent: &HeaderMap,
    ) -> Result<HeaderMap, CallFailure> {
        let spec = &descriptor.headers;
        let mut headers = persistent.clone();

        let mut statics = HeaderMap::new();
        for (name, value) in &spec.statics {
            statics.append(name.clone(), value.clone());
        }
        if let Some(content_type) = &spec.content_type {
            statics.insert(CONTENT_TYPE, header_value(CONTENT_TYPE.as_str(), content_type)?);
        }
        overlay(&mut headers, statics);

        let mut params = HeaderMap::new();
        for param in &spec.params {
            if let ParameterBinding::Header { name } = &param.binding {
                let name = header_name(name)?;
                for value in self.strings(param, self.json(param)?)? {
                    params.append(name.clone(), header_value(name.as_str(), &value)?);
                }
            }
        }
        overlay(&mut headers, params);

        let mut maps = HeaderMap::new();
        for param in &spec.maps {
            for (key, value) in self.entries(param)? {
                let name = header_name(key)?;
                for value in self.strings(param, value)? {
                    maps.append(name.clone(), header_value(name.as_str(), &value)?);
                }
            }
        }
        overlay(&mut headers, maps);

        Ok(headers)
    }

    fn discrete(&self, param: &BoundParam) -> Result<RequestBody, CallFailure> {
        let content = match &self.args[param.index] {
            Arg::Raw(raw) => raw.to_body(),
            Arg::Json(Value::Null) => return Err(ArgumentError::NullBody(param.name.clone()).into()),
            Arg::Json(value) => self.converters.request_converter(&param.ty)?.convert(value)?,
            _ => {
                return Err(ArgumentError::Kind {
                    param: param.name.clone(),
                    expected: "a JSON value or raw content",
                }
                .into());
            }
        };
        Ok(RequestBody::Discrete(content))
    }

    fn form(&self, fields: &[BoundParam]) -> Result<FormBody, CallFailure> {
        let mut form = FormBody::default();
        for param in fields {
            match &param.binding {
                ParameterBinding::Field { name, encoded } => {
                    for value in self.strings(param, self.json(param)?)? {
                        form.add(name, &value, *encoded);
                    }
                }
                ParameterBinding::FieldMap { encoded } => {
                    for (key, value) in self.entries(param)? {
                        for value in self.strings(param, value)? {
                            form.add(key, &value, *encoded);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }

    fn multipart(&self, parts: &[BoundParam]) -> Result<MultipartBody, CallFailure> {
        let mut multipart = MultipartBody::new();
        for param in parts {
            match (&param.binding, &self.args[param.index]) {
                (ParameterBinding::Part { name, .. }, Arg::Raw(raw)) => {
                    multipart.add_raw(name, raw);
                }
                (ParameterBinding::Part { name, media_type }, Arg::Json(value)) => {
                    let items = match value {
                        Value::Array(items) if is_repeated(param) => items.iter().collect(),
                        value => vec![value],
                    };
                    for item in items.into_iter().filter(|item| !item.is_null()) {
                        let (mut content, file_name) = self.part(param, item)?;
                        if let Some(media_type) = media_type {
                            content.override_content_type(media_type);
                        }
                        multipart.add_part(name, content, file_name);
                    }
                }
                (ParameterBinding::PartMap, Arg::Json(_)) => {
                    for (key, value) in self.entries(param)? {
                        let (content, file_name) = self.part(param, value)?;
                        multipart.add_part(key, content, file_name);
                    }
                }
                (ParameterBinding::PartMap, Arg::Parts(entries)) => {
                    for (key, arg) in entries {
                        match arg {
                            Arg::Raw(raw) => multipart.add_raw(key, raw),
                            Arg::Json(Value::Null) => {
                                return Err(ArgumentError::NullMapValue {
                                    role: param.binding.role(),
                                    param: param.name.clone(),
                                    key: key.clone(),
                                }
                                .into());
                            }
                            Arg::Json(value) => {
                                let (content, file_name) = self.part(param, value)?;
                                multipart.add_part(key, content, file_name);
                            }
                            _ => {
                                return Err(ArgumentError::Kind {
                                    param: param.name.clone(),
                                    expected: "JSON values or raw content",
                                }
                                .into());
                            }
                        }
                    }
                }
                _ => {
                    return Err(ArgumentError::Kind {
                        param: param.name.clone(),
                        expected: "a JSON value or raw content",
                    }
                    .into());
                }
            }
        }

        if multipart.is_empty() {
            return Err(ArgumentError::EmptyMultipart.into());
        }
        Ok(multipart)
    }

    /// Converts one part value. File parts are named after the file they were read from.
    fn part(
        &self,
        param: &BoundParam,
        value: &Value,
    ) -> Result<(BodyContent, Option<String>), CallFailure> {
        let ty = value_type(param);
        let content = self.converters.request_converter(ty)?.convert(value)?;

        let file_name = match (ty, value) {
            (TypeRef::File, Value::String(path)) => Path::new(path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            _ => None,
        };

        Ok((content, file_name))
    }
}

/// List-typed bindings, or maps of lists, repeat their key once per element.
fn is_repeated(param: &BoundParam) -> bool {
    let ty = match (&param.binding, &param.ty) {
        (
            ParameterBinding::QueryMap { .. }
            | ParameterBinding::FieldMap { .. }
            | ParameterBinding::PartMap
            | ParameterBinding::HeaderMap,
            TypeRef::Map(_, value),
        ) => value.as_ref(),
        (_, ty) => ty,
    };
    matches!(ty, TypeRef::List(_))
}

/// Appends `path` to `base` with exactly one `/` between them.
fn join(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        _ => format!("{base}{path}"),
    }
}

/// Replaces every header named in `layer`, keeping repeated values within the layer.
fn overlay(target: &mut HeaderMap, layer: HeaderMap) {
    let mut current: Option<HeaderName> = None;
    for (name, value) in layer {
        match name {
            Some(name) => {
                target.insert(name.clone(), value);
                current = Some(name);
            }
            None => {
                if let Some(name) = &current {
                    target.append(name.clone(), value);
                }
            }
        }
    }
}

fn header_name(name: &str) -> Result<HeaderName, ArgumentError> {
    HeaderName::from_str(name).map_err(|_| ArgumentError::InvalidHeader {
        name: name.to_string(),
        value: String::new(),
    })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ArgumentError> {
    HeaderValue::from_str(value).map_err(|_| ArgumentError::InvalidHeader {
        name: name.to_string(),
        value: value.to_string(),
    })
}
