//! # Services
//!
//! A [`Service`] is the callable form of a whole [`ServiceMeta`]: every declared method is
//! validated into a [`MethodDescriptor`] and its converters are resolved once, when the
//! service is built. After that the service is immutable and cheap to clone; clones share
//! descriptors, converters and transport.
//!
//! ## Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use tether_core::{
//!     meta::{MethodMeta, ParamAnnotation, ParamMeta, ServiceMeta, TypeRef},
//!     service::Service,
//! };
//!
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let meta = ServiceMeta::new("EchoApi")
//!     .base_url("http://localhost:3000/api")
//!     .method(
//!         MethodMeta::new("echo")
//!             .get("/echo/{id}")
//!             .param(ParamMeta::new("id", TypeRef::Int).with(ParamAnnotation::path("id")))
//!             .returns(TypeRef::named("Echo")),
//!     );
//!
//! let service = Service::builder(meta).build()?;
//! let reply = service.call("echo", vec![json!(1).into()])?;
//! println!("{}", reply.body());
//! # Ok(())
//! # }
//! ```
use crate::{
    assemble::{Arg, ArgumentError, value_type},
    converter::{ConverterFactory, ConverterRegistry, ConverterRole, StandardConverters},
    descriptor::{
        BaseUrlPolicy, BodyStrategy, DescriptorError, DescriptorErrorKind, HeaderLineError,
        MethodDescriptor, ReturnStrategy, parse_header_line,
    },
    dispatch::{CallError, CallFailure, Engine, Invocation, Reply, ReplyStream},
    meta::{ServiceMeta, TypeRef},
    transport::{HttpClient, UreqClient},
};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::{collections::HashSet, fmt, str::FromStr, sync::Arc};
use tracing::debug;

/// A validated, callable HTTP API.
#[derive(Clone)]
pub struct Service {
    name: String,
    engine: Arc<Engine>,
    descriptors: Arc<Vec<Arc<MethodDescriptor>>>,
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("methods", &self.descriptors.len())
            .finish_non_exhaustive()
    }
}

impl Service {
    pub fn builder(meta: ServiceMeta) -> ServiceBuilder {
        ServiceBuilder::new(meta)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self, method: &str) -> Option<&MethodDescriptor> {
        self.find(method).map(Arc::as_ref)
    }

    /// All descriptors, in declaration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.descriptors.iter().map(Arc::as_ref)
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.engine.converters
    }

    /// Calls `method` with one argument per declared parameter, whatever its return style.
    ///
    /// # Returns
    ///
    /// * `Ok(Invocation::Value)` - Direct methods, once the response has been converted.
    /// * `Ok(Invocation::Dispatched)` - Callback methods; the callback argument receives the outcome.
    /// * `Ok(Invocation::Stream)` - Reactive methods; nothing is sent until the stream is polled.
    /// * `Err(CallError)` - The call could not be made or, for direct methods, failed.
    pub fn invoke(&self, method: &str, args: Vec<Arg>) -> Result<Invocation, CallError> {
        let descriptor = self.lookup(method)?;
        self.engine.dispatch(descriptor, args)
    }

    /// Calls a direct method and blocks until its reply is available.
    pub fn call(&self, method: &str, args: Vec<Arg>) -> Result<Reply, CallError> {
        let descriptor = self.lookup(method)?;
        expect_style(descriptor, "direct")?;

        match self.engine.dispatch(descriptor, args)? {
            Invocation::Value(reply) => Ok(reply),
            _ => Err(style_error(descriptor, "direct")),
        }
    }

    /// Calls a callback method. `args` omits the callback parameter; `callback` takes its place.
    pub fn enqueue(
        &self,
        method: &str,
        mut args: Vec<Arg>,
        callback: impl FnOnce(Result<Reply, CallError>) + Send + 'static,
    ) -> Result<(), CallError> {
        let descriptor = self.lookup(method)?;
        let ReturnStrategy::Callback { param, .. } = descriptor.returns else {
            return Err(style_error(descriptor, "callback"));
        };

        if param > args.len() {
            return Err(CallError::new(
                &descriptor.name,
                ArgumentError::Count {
                    expected: descriptor.arity,
                    actual: args.len() + 1,
                },
            ));
        }
        args.insert(param, Arg::callback(callback));

        self.engine.dispatch(descriptor, args).map(|_| ())
    }

    /// Calls a reactive method, returning its deferred single-element stream.
    pub fn stream(&self, method: &str, args: Vec<Arg>) -> Result<ReplyStream, CallError> {
        let descriptor = self.lookup(method)?;
        expect_style(descriptor, "reactive")?;

        match self.engine.dispatch(descriptor, args)? {
            Invocation::Stream(stream) => Ok(stream),
            _ => Err(style_error(descriptor, "reactive")),
        }
    }

    fn find(&self, method: &str) -> Option<&Arc<MethodDescriptor>> {
        self.descriptors.iter().find(|d| d.name == method)
    }

    fn lookup(&self, method: &str) -> Result<&Arc<MethodDescriptor>, CallError> {
        self.find(method)
            .ok_or_else(|| CallError::new(method, CallFailure::UnknownMethod))
    }
}

fn expect_style(descriptor: &MethodDescriptor, requested: &'static str) -> Result<(), CallError> {
    let matches = match requested {
        "direct" => matches!(descriptor.returns, ReturnStrategy::Direct { .. }),
        "callback" => matches!(descriptor.returns, ReturnStrategy::Callback { .. }),
        _ => matches!(
            descriptor.returns,
            ReturnStrategy::ReactiveSingle { .. } | ReturnStrategy::ReactiveCompletion { .. }
        ),
    };

    if matches {
        Ok(())
    } else {
        Err(style_error(descriptor, requested))
    }
}

fn style_error(descriptor: &MethodDescriptor, requested: &'static str) -> CallError {
    CallError::new(
        &descriptor.name,
        CallFailure::ReturnStyle {
            actual: descriptor.returns.kind(),
            requested,
        },
    )
}

/// Configures and builds a [`Service`].
pub struct ServiceBuilder {
    meta: ServiceMeta,
    base_url: Option<String>,
    headers: Vec<(String, String)>,
    client: Option<Arc<dyn HttpClient>>,
    factory: Option<Arc<dyn ConverterFactory>>,
}

impl ServiceBuilder {
    fn new(meta: ServiceMeta) -> Self {
        Self {
            meta,
            base_url: None,
            headers: Vec::new(),
            client: None,
            factory: None,
        }
    }

    /// Overrides the base URL declared by the service.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Adds a persistent header, sent with every call unless a method overrides it.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replaces the default [`UreqClient`] transport.
    pub fn client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Replaces the default [`StandardConverters`].
    pub fn converters(mut self, factory: Arc<dyn ConverterFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Validates every method and resolves its converters.
    ///
    /// # Returns
    ///
    /// * `Ok(Service)` - Every method can be called.
    /// * `Err(DescriptorError)` - The first invalid method; no service is produced.
    pub fn build(self) -> Result<Service, DescriptorError> {
        let meta = self.meta;
        let base_url = self.base_url.or(meta.base_url);

        let mut headers = HeaderMap::new();
        for line in &meta.headers {
            let (name, value) = parse_header_line(line)
                .map_err(|e| DescriptorError::new(&meta.name, e.into()))?;
            headers.append(name, value);
        }
        for (name, value) in &self.headers {
            let (name, value) = persistent_header(name, value)
                .map_err(|e| DescriptorError::new(&meta.name, e.into()))?;
            headers.insert(name, value);
        }

        let converters = ConverterRegistry::new(
            self.factory
                .unwrap_or_else(|| Arc::new(StandardConverters)),
        );

        let mut names = HashSet::new();
        let mut descriptors = Vec::with_capacity(meta.methods.len());
        for method in &meta.methods {
            if !names.insert(method.name.as_str()) {
                return Err(DescriptorError::new(
                    &method.name,
                    DescriptorErrorKind::DuplicateMethod,
                ));
            }

            let descriptor = MethodDescriptor::build(method, base_url.as_deref())?;
            resolve_converters(&descriptor, &converters)
                .map_err(|kind| DescriptorError::new(&descriptor.name, kind))?;
            descriptors.push(Arc::new(descriptor));
        }

        debug!(
            service = %meta.name,
            methods = descriptors.len(),
            base_url = base_url.as_deref().unwrap_or_default(),
            "built service"
        );

        let client = self
            .client
            .unwrap_or_else(|| Arc::new(UreqClient::new()));

        Ok(Service {
            name: meta.name,
            engine: Arc::new(Engine {
                converters,
                client,
                headers,
            }),
            descriptors: Arc::new(descriptors),
        })
    }
}

fn persistent_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), HeaderLineError> {
    let header_name =
        HeaderName::from_str(name).map_err(|_| HeaderLineError::InvalidName(name.to_string()))?;
    let header_value =
        HeaderValue::from_str(value).map_err(|_| HeaderLineError::InvalidValue(name.to_string()))?;
    Ok((header_name, header_value))
}

/// Resolves every converter a method will need, so calls never meet an unsupported type.
fn resolve_converters(
    descriptor: &MethodDescriptor,
    converters: &ConverterRegistry,
) -> Result<(), DescriptorErrorKind> {
    let unsupported = |role: ConverterRole, ty: &TypeRef| DescriptorErrorKind::UnsupportedType {
        role,
        ty: ty.clone(),
    };
    let url = |ty: &TypeRef| {
        converters
            .url_converter(ty)
            .map(|_| ())
            .map_err(|_| unsupported(ConverterRole::Url, ty))
    };
    let request = |ty: &TypeRef| {
        converters
            .request_converter(ty)
            .map(|_| ())
            .map_err(|_| unsupported(ConverterRole::Request, ty))
    };

    let result = descriptor.returns.result_type();
    converters
        .response_converter(result)
        .map_err(|_| unsupported(ConverterRole::Response, result))?;

    if let BaseUrlPolicy::Overridden { param } = &descriptor.base_url {
        url(&param.ty)?;
    }
    for param in &descriptor.paths {
        url(&param.ty)?;
    }
    for param in descriptor
        .queries
        .iter()
        .chain(&descriptor.headers.params)
        .chain(&descriptor.headers.maps)
    {
        url(value_type(param))?;
    }

    match &descriptor.body {
        BodyStrategy::Discrete { body: None } => {}
        BodyStrategy::Discrete { body: Some(param) } => request(&param.ty)?,
        BodyStrategy::FormEncoded { fields } => {
            for param in fields {
                url(value_type(param))?;
            }
        }
        BodyStrategy::Multipart { parts } => {
            for param in parts {
                request(value_type(param))?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        body::RequestBody,
        content::{RequestInfo, ResponseContent},
        converter::ConverterRole,
        meta::{MethodMeta, ParamAnnotation as A, ParamMeta as P, StreamKind},
        transport::TransportError,
    };
    use bytes::Bytes;
    use http::StatusCode;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::mpsc;

    /// Echoes the request line back as the response body and keeps the last headers.
    #[derive(Default)]
    struct Mirror {
        headers: Mutex<HeaderMap>,
    }

    impl HttpClient for Mirror {
        fn call(
            &self,
            request: &RequestInfo,
            _body: &RequestBody,
        ) -> Result<ResponseContent, TransportError> {
            *self.headers.lock() = request.headers.clone();
            let line = format!("{} {}", request.method, request.url);
            Ok(ResponseContent::new(
                StatusCode::OK,
                HeaderMap::new(),
                Bytes::from(line),
            ))
        }
    }

    fn api() -> ServiceMeta {
        ServiceMeta::new("Api")
            .base_url("http://h/api")
            .header("X-Client: tether")
            .method(
                MethodMeta::new("echo")
                    .get("/echo/{id}")
                    .param(P::new("id", TypeRef::Int).with(A::path("id")))
                    .returns(TypeRef::String),
            )
            .method(
                MethodMeta::new("later")
                    .get("/later")
                    .param(P::new("done", TypeRef::String).with(A::Callback)),
            )
            .method(
                MethodMeta::new("watch")
                    .get("/watch")
                    .returns_stream(StreamKind::Single, TypeRef::String),
            )
    }

    fn service(meta: ServiceMeta) -> (Service, Arc<Mirror>) {
        let mirror = Arc::new(Mirror::default());
        let service = Service::builder(meta)
            .client(mirror.clone())
            .header("Authorization", "Bearer t")
            .build()
            .unwrap();
        (service, mirror)
    }

    #[test]
    fn direct_call_through_the_service() {
        let (service, mirror) = service(api());

        let reply = service.call("echo", vec![json!(1).into()]).unwrap();

        assert_eq!(reply.body(), &json!("GET http://h/api/echo/1"));
        let headers = mirror.headers.lock();
        assert_eq!(headers["x-client"], "tether");
        assert_eq!(headers["authorization"], "Bearer t");
    }

    #[test]
    fn base_url_can_be_overridden() {
        let mirror = Arc::new(Mirror::default());
        let service = Service::builder(api())
            .base_url("http://other")
            .client(mirror)
            .build()
            .unwrap();

        let reply = service.call("echo", vec![json!(2).into()]).unwrap();
        assert_eq!(reply.body(), &json!("GET http://other/echo/2"));
    }

    #[test]
    fn unknown_methods_and_wrong_styles() {
        let (service, _) = service(api());

        let err = service.call("nope", vec![]).unwrap_err();
        assert!(matches!(err.source, CallFailure::UnknownMethod));
        assert_eq!(err.method, "nope");

        let err = service.call("watch", vec![]).unwrap_err();
        assert!(matches!(
            err.source,
            CallFailure::ReturnStyle {
                actual: "reactive",
                requested: "direct"
            }
        ));

        assert!(service.stream("echo", vec![json!(1).into()]).is_err());
    }

    #[test]
    fn enqueue_inserts_the_callback() {
        let (service, _) = service(api());
        let (tx, rx) = mpsc::channel();

        service
            .enqueue("later", vec![], move |reply| tx.send(reply).unwrap())
            .unwrap();

        let reply = rx.recv().unwrap().unwrap();
        assert_eq!(reply.body(), &json!("GET http://h/api/later"));
    }

    #[test]
    fn duplicate_methods_are_rejected() {
        let meta = api().method(MethodMeta::new("echo").get("/again"));
        let err = Service::builder(meta).build().unwrap_err();

        assert_eq!(err.method, "echo");
        assert_eq!(err.kind, DescriptorErrorKind::DuplicateMethod);
    }

    #[test]
    fn invalid_methods_prevent_the_service() {
        let meta = api().method(
            MethodMeta::new("bad")
                .get("/a")
                .param(P::new("cb", TypeRef::String).with(A::Callback))
                .returns(TypeRef::String),
        );

        let err = Service::builder(meta).build().unwrap_err();
        assert_eq!(err.method, "bad");
        assert!(matches!(err.kind, DescriptorErrorKind::CallbackWithResult(_)));
    }

    #[test]
    fn unsupported_types_are_found_at_build_time() {
        let meta = ServiceMeta::new("Api").base_url("http://h").method(
            MethodMeta::new("download")
                .get("/file")
                .returns(TypeRef::File),
        );

        let err = Service::builder(meta).build().unwrap_err();
        assert_eq!(
            err.kind,
            DescriptorErrorKind::UnsupportedType {
                role: ConverterRole::Response,
                ty: TypeRef::File
            }
        );
    }

    #[test]
    fn converters_are_shared_between_methods() {
        let meta = ServiceMeta::new("Api")
            .base_url("http://h")
            .method(
                MethodMeta::new("a")
                    .get("/a/{id}")
                    .param(P::new("id", TypeRef::Int).with(A::path("id")))
                    .returns(TypeRef::named("User")),
            )
            .method(
                MethodMeta::new("b")
                    .get("/b/{id}")
                    .param(P::new("id", TypeRef::Int).with(A::path("id")))
                    .returns(TypeRef::named("User")),
            );

        let (service, _) = service(meta);
        assert_eq!(service.converters().cached(ConverterRole::Url), 1);
        assert_eq!(service.converters().cached(ConverterRole::Response), 1);
    }

    #[test]
    fn malformed_service_headers() {
        let meta = api().header("no separator");
        let err = Service::builder(meta).build().unwrap_err();

        assert_eq!(err.method, "Api");
        assert_eq!(
            err.kind,
            DescriptorErrorKind::MalformedHeader(HeaderLineError::Malformed(
                "no separator".into()
            ))
        );
    }

    #[test]
    fn descriptors_keep_declaration_order() {
        let (service, _) = service(api());
        let names: Vec<_> = service.descriptors().map(|d| d.name.as_str()).collect();

        assert_eq!(names, ["echo", "later", "watch"]);
        assert_eq!(
            service.descriptor("echo").unwrap().to_string(),
            "GET /echo/{id}"
        );
    }
}
