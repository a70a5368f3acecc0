//! # Return Dispatch
//!
//! Runs one call according to the [`ReturnStrategy`] of its descriptor:
//!
//! * **Direct**: the request is sent on the calling thread and the converted [`Reply`]
//!   is returned.
//! * **Callback**: the request is handed to [`HttpClient::enqueue`] and the call returns
//!   at once; the callback argument later receives the reply or the error.
//! * **Reactive**: a deferred single-element [`ReplyStream`] is returned. Nothing is sent
//!   until the stream is polled.
//!
//! ## Blocking
//!
//! Transports are blocking. When a reactive stream is polled inside a tokio runtime, the
//! call runs on the runtime's blocking pool so the polling task never blocks a worker
//! thread. Outside a runtime it runs on a dedicated thread.
//!
//! Every failure, whatever its origin, reaches the caller as a [`CallError`] naming the
//! method; the [`CallFailure`] it wraps tells them apart.
use crate::{
    assemble::{Arg, ArgumentError, assemble},
    body::RequestBody,
    content::ResponseContent,
    converter::{ConversionError, ConverterRegistry, ResponseConverter},
    descriptor::{MethodDescriptor, ReturnStrategy},
    transport::{HttpClient, TransportError, spawn_blocking},
};
use bytes::Bytes;
use futures_util::{FutureExt, StreamExt, stream::BoxStream};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::{fmt, sync::Arc};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Receives the outcome of a callback-style call exactly once.
pub type Callback = Box<dyn FnOnce(Result<Reply, CallError>) + Send + 'static>;

/// The deferred result of a reactive call: exactly one item, then the end of the stream.
pub type ReplyStream = BoxStream<'static, Result<Reply, CallError>>;

/// The single error type of every call, naming the method that failed.
#[derive(Debug, thiserror::Error)]
#[error("Call to '{method}' failed: {source}")]
pub struct CallError {
    pub method: String,
    #[source]
    pub source: CallFailure,
}

impl CallError {
    pub(crate) fn new(method: impl Into<String>, source: impl Into<CallFailure>) -> Self {
        Self {
            method: method.into(),
            source: source.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CallFailure {
    #[error("No such method")]
    UnknownMethod,
    #[error("The method delivers its result {actual}, not {requested}")]
    ReturnStyle {
        actual: &'static str,
        requested: &'static str,
    },
    #[error("Invalid argument: {0}")]
    Argument(#[from] ArgumentError),
    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),
    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error("Server responded with status {}", .0.status)]
    Status(Box<ResponseContent>),
}

/// The status line and headers of a response alongside its converted body.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpInfo {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// The converted body. `Null` for non-2xx responses.
    pub body: Value,
    /// The unconverted body of a non-2xx response.
    pub error_body: Option<Bytes>,
}

impl HttpInfo {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// The converted result of a successful call.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Value(Value),
    Enveloped(HttpInfo),
}

impl Reply {
    pub fn body(&self) -> &Value {
        match self {
            Reply::Value(value) => value,
            Reply::Enveloped(info) => &info.body,
        }
    }

    pub fn into_body(self) -> Value {
        match self {
            Reply::Value(value) => value,
            Reply::Enveloped(info) => info.body,
        }
    }

    pub fn http_info(&self) -> Option<&HttpInfo> {
        match self {
            Reply::Value(_) => None,
            Reply::Enveloped(info) => Some(info),
        }
    }

    /// Deserializes the body into a typed value.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.body())
    }
}

/// What a call-site hands back, one variant per return style.
pub enum Invocation {
    Value(Reply),
    /// The call was enqueued; the callback argument receives the outcome.
    Dispatched,
    Stream(ReplyStream),
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocation::Value(reply) => f.debug_tuple("Value").field(reply).finish(),
            Invocation::Dispatched => f.write_str("Dispatched"),
            Invocation::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// What every call of a service shares besides its descriptor and arguments.
pub(crate) struct Engine {
    pub converters: ConverterRegistry,
    pub client: Arc<dyn HttpClient>,
    pub headers: HeaderMap,
}

impl Engine {
    /// Runs one call according to the return strategy of `descriptor`.
    pub(crate) fn dispatch(
        self: &Arc<Self>,
        descriptor: &Arc<MethodDescriptor>,
        args: Vec<Arg>,
    ) -> Result<Invocation, CallError> {
        match &descriptor.returns {
            ReturnStrategy::Direct { .. } => {
                self.execute(descriptor, &args).map(Invocation::Value)
            }
            ReturnStrategy::Callback { param, name, .. } => {
                self.enqueue(descriptor, args, *param, name)?;
                Ok(Invocation::Dispatched)
            }
            ReturnStrategy::ReactiveSingle { .. } | ReturnStrategy::ReactiveCompletion { .. } => {
                if args.iter().any(Arg::is_callback) {
                    return Err(CallError::new(
                        &descriptor.name,
                        ArgumentError::UnexpectedCallback,
                    ));
                }
                Ok(Invocation::Stream(self.deferred(descriptor.clone(), args)))
            }
        }
    }

    /// Sends the request on the calling thread.
    fn execute(&self, descriptor: &MethodDescriptor, args: &[Arg]) -> Result<Reply, CallError> {
        let fail = |failure: CallFailure| CallError::new(&descriptor.name, failure);

        if args.iter().any(Arg::is_callback) {
            return Err(fail(ArgumentError::UnexpectedCallback.into()));
        }

        let converter = self
            .converters
            .response_converter(descriptor.returns.result_type())
            .map_err(|e| fail(e.into()))?;

        let (request, body) =
            assemble(descriptor, args, &self.converters, &self.headers).map_err(fail)?;

        debug!(
            method = %descriptor.name,
            verb = %request.method,
            url = %request.url,
            body = body_kind(&body),
            "sending request"
        );

        let response = self
            .client
            .call(&request, &body)
            .map_err(|e| fail(e.into()))?;

        convert(descriptor, converter.as_ref(), response).map_err(fail)
    }

    /// Hands the request to the transport; the callback at `param` receives the outcome.
    fn enqueue(
        &self,
        descriptor: &Arc<MethodDescriptor>,
        mut args: Vec<Arg>,
        param: usize,
        name: &str,
    ) -> Result<(), CallError> {
        let fail = |failure: CallFailure| CallError::new(&descriptor.name, failure);

        if args.len() != descriptor.arity {
            return Err(fail(
                ArgumentError::Count {
                    expected: descriptor.arity,
                    actual: args.len(),
                }
                .into(),
            ));
        }

        // The callback is taken out so the remaining arguments can be assembled as usual.
        let callback = match std::mem::replace(&mut args[param], Arg::Json(Value::Null)) {
            Arg::Callback(callback) => callback,
            _ => return Err(fail(ArgumentError::MissingCallback(name.to_string()).into())),
        };

        let prepared = self
            .converters
            .response_converter(descriptor.returns.result_type())
            .map_err(CallFailure::from)
            .and_then(|converter| {
                if args.iter().any(Arg::is_callback) {
                    return Err(ArgumentError::UnexpectedCallback.into());
                }
                assemble(descriptor, &args, &self.converters, &self.headers)
                    .map(|assembled| (converter, assembled))
            });

        let (converter, (request, body)) = match prepared {
            Ok(prepared) => prepared,
            Err(failure) => {
                callback(Err(fail(failure)));
                return Ok(());
            }
        };

        debug!(
            method = %descriptor.name,
            verb = %request.method,
            url = %request.url,
            body = body_kind(&body),
            "enqueueing request"
        );

        let descriptor = descriptor.clone();
        self.client.clone().enqueue(
            request,
            body,
            Box::new(move |result| {
                let reply = result
                    .map_err(CallFailure::from)
                    .and_then(|response| convert(&descriptor, converter.as_ref(), response))
                    .map_err(|failure| CallError::new(&descriptor.name, failure));
                callback(reply);
            }),
        );

        Ok(())
    }

    /// A stream that runs the call once, when first polled.
    fn deferred(self: &Arc<Self>, descriptor: Arc<MethodDescriptor>, args: Vec<Arg>) -> ReplyStream {
        let engine = self.clone();
        let call = async move {
            let (tx, rx) = oneshot::channel();
            let name = descriptor.name.clone();

            spawn_blocking(move || {
                let _ = tx.send(engine.execute(&descriptor, &args));
            });

            rx.await.unwrap_or_else(|_| {
                Err(CallError::new(name, TransportError::Aborted))
            })
        };

        call.into_stream().boxed()
    }
}

/// Applies the response converter, or wraps the response in an [`HttpInfo`] envelope.
fn convert(
    descriptor: &MethodDescriptor,
    converter: &dyn ResponseConverter,
    response: ResponseContent,
) -> Result<Reply, CallFailure> {
    if !response.is_success() {
        warn!(
            method = %descriptor.name,
            status = %response.status,
            "received non-success response"
        );

        if descriptor.http_info {
            return Ok(Reply::Enveloped(HttpInfo {
                status: response.status,
                headers: response.headers,
                body: Value::Null,
                error_body: Some(response.bytes),
            }));
        }
        return Err(CallFailure::Status(Box::new(response)));
    }

    let body = if response.is_empty_status() {
        Value::Null
    } else {
        converter.convert(&response)?
    };

    if descriptor.http_info {
        Ok(Reply::Enveloped(HttpInfo {
            status: response.status,
            headers: response.headers,
            body,
            error_body: None,
        }))
    } else {
        Ok(Reply::Value(body))
    }
}

fn body_kind(body: &RequestBody) -> &'static str {
    match body {
        RequestBody::Empty => "empty",
        RequestBody::Discrete(_) => "discrete",
        RequestBody::Form(_) => "form-urlencoded",
        RequestBody::Multipart(_) => "multipart",
    }
}
