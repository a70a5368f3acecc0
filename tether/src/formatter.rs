use crate::core::Output;
use colored::*;
use tether_core::{
    CallError, Reply, Service,
    descriptor::{BaseUrlPolicy, BodyStrategy, BoundParam, MethodDescriptor, ReturnStrategy},
};
use std::fmt::Display;

/// A wrapper struct for a formatted, colored string.
///
/// Implements `Display` so it can be printed directly.
pub struct FormattedString(pub String);

pub struct GenericError<T: Display>(pub &'static str, pub T);

impl std::fmt::Display for FormattedString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "{}", self.0)?;
        Ok(())
    }
}

impl From<serde_json::Value> for FormattedString {
    fn from(value: serde_json::Value) -> Self {
        FormattedString(serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string()))
    }
}

impl From<Reply> for FormattedString {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Value(value) => FormattedString::from(value),
            Reply::Enveloped(info) => {
                let status = if info.is_success() {
                    info.status.to_string().green()
                } else {
                    info.status.to_string().red()
                };

                let mut out = format!("{} {}\n", "HTTP".cyan(), status);
                for (name, value) in info.headers.iter() {
                    out.push_str(&format!(
                        "{}: {}\n",
                        name.as_str().yellow(),
                        String::from_utf8_lossy(value.as_bytes())
                    ));
                }
                out.push('\n');

                match info.error_body {
                    Some(bytes) => out.push_str(&String::from_utf8_lossy(&bytes)),
                    None => out.push_str(&FormattedString::from(info.body).0),
                }
                FormattedString(out)
            }
        }
    }
}

impl From<CallError> for FormattedString {
    fn from(err: CallError) -> Self {
        FormattedString(format!("{}\n\n'{}'", "Call Failed:".red().bold(), err))
    }
}

impl From<Output> for FormattedString {
    fn from(output: Output) -> Self {
        match output {
            Output::Reply(reply) => FormattedString::from(reply),
            Output::Completed => FormattedString("Completed.".green().to_string()),
            Output::Stream(items) => {
                let mut out = String::new();
                for item in items {
                    let item = match item {
                        Ok(reply) => FormattedString::from(reply),
                        Err(err) => FormattedString::from(err),
                    };
                    out.push_str(&item.0);
                    out.push('\n');
                }
                FormattedString(out.trim_end().to_string())
            }
        }
    }
}

impl<T: Display> From<GenericError<T>> for FormattedString {
    fn from(GenericError(msg, err): GenericError<T>) -> Self {
        FormattedString(format!("{}:\n\n'{}'", msg.red().bold(), err))
    }
}

impl From<&Service> for FormattedString {
    fn from(service: &Service) -> Self {
        let mut out = String::new();
        out.push_str(&format!(
            "{} {} {{\n",
            "service".cyan(),
            service.name().green()
        ));

        for method in service.descriptors() {
            out.push_str("  ");
            // Reuse the From<&MethodDescriptor> implementation
            let method_fmt = FormattedString::from(method);
            out.push_str(&method_fmt.0.replace('\n', "\n  "));
            out.push_str("\n\n");
        }
        out.push('}');
        FormattedString(out)
    }
}

impl From<&MethodDescriptor> for FormattedString {
    fn from(method: &MethodDescriptor) -> Self {
        let returns = match &method.returns {
            ReturnStrategy::Direct { result } => result.to_string().yellow().to_string(),
            ReturnStrategy::Callback { result, .. } => {
                format!("{} {}", "callback".cyan(), result.to_string().yellow())
            }
            ReturnStrategy::ReactiveSingle { wrapper, result } => {
                format!("{}<{}>", wrapper.to_string().cyan(), result.to_string().yellow())
            }
            ReturnStrategy::ReactiveCompletion { wrapper } => wrapper.to_string().cyan().to_string(),
        };
        let returns = if method.http_info {
            format!("{}<{}>", "HttpInfo".cyan(), returns)
        } else {
            returns
        };

        let url = match &method.base_url {
            BaseUrlPolicy::Fixed(base) => format!("{base}{}", method.template),
            BaseUrlPolicy::Overridden { param } => format!("{{{}}}{}", param.name, method.template),
            BaseUrlPolicy::None => method.template.to_string(),
        };

        let mut out = format!(
            "{} {} {} -> {}",
            method.name.green(),
            method.verb.to_string().purple(),
            url,
            returns
        );

        let mut params = bound_params(method);
        params.sort_by_key(|p| p.index);
        for param in params {
            out.push_str(&format!(
                "\n  {} {}: {}",
                param.binding.role().cyan(),
                param.name,
                param.ty.to_string().yellow()
            ));
        }
        if let ReturnStrategy::Callback { name, .. } = &method.returns {
            out.push_str(&format!("\n  {} {}", "callback".cyan(), name));
        }
        if !matches!(method.body, BodyStrategy::Discrete { body: None }) {
            out.push_str(&format!("\n  {} {}", "encoding".cyan(), method.body.kind()));
        }

        FormattedString(out)
    }
}

fn bound_params(method: &MethodDescriptor) -> Vec<&BoundParam> {
    let mut params: Vec<&BoundParam> = Vec::new();
    if let BaseUrlPolicy::Overridden { param } = &method.base_url {
        params.push(param);
    }
    params.extend(&method.paths);
    params.extend(&method.queries);
    params.extend(&method.headers.params);
    params.extend(&method.headers.maps);
    match &method.body {
        BodyStrategy::Discrete { body } => params.extend(body),
        BodyStrategy::FormEncoded { fields } => params.extend(fields),
        BodyStrategy::Multipart { parts } => params.extend(parts),
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::{
        MethodMeta, ParamAnnotation, ParamMeta, ServiceMeta, TypeRef, meta::StreamKind,
    };

    fn service() -> Service {
        let meta = ServiceMeta::new("EchoApi")
            .base_url("http://h/api")
            .method(
                MethodMeta::new("echo")
                    .get("/echo/{id}")
                    .param(ParamMeta::new("id", TypeRef::Int).with(ParamAnnotation::path("id")))
                    .param(
                        ParamMeta::new("trace", TypeRef::String)
                            .with(ParamAnnotation::header("X-Trace")),
                    )
                    .returns(TypeRef::named("Echo")),
            )
            .method(
                MethodMeta::new("ping")
                    .get("/ping")
                    .returns_stream(StreamKind::Completable, TypeRef::Void),
            );

        Service::builder(meta).build().unwrap()
    }

    #[test]
    fn describes_methods_with_their_parameters() {
        colored::control::set_override(false);
        let service = service();

        let echo = FormattedString::from(service.descriptor("echo").unwrap()).0;
        assert_eq!(
            echo,
            "echo GET http://h/api/echo/{id} -> Echo\n  path id: Int\n  header trace: String"
        );

        let whole = FormattedString::from(&service).0;
        assert!(whole.starts_with("service EchoApi {\n  echo GET"));
        assert!(whole.contains("  ping GET http://h/api/ping -> Completable"));
        assert!(whole.ends_with('}'));
    }

    #[test]
    fn enveloped_replies_show_status_and_error_body() {
        colored::control::set_override(false);
        let mut headers = http::HeaderMap::new();
        headers.insert("x-id", http::HeaderValue::from_static("7"));
        let reply = Reply::Enveloped(tether_core::HttpInfo {
            status: http::StatusCode::NOT_FOUND,
            headers,
            body: serde_json::Value::Null,
            error_body: Some("missing".into()),
        });

        let out = FormattedString::from(reply).0;
        assert_eq!(out, "HTTP 404 Not Found\nx-id: 7\n\nmissing");
    }
}
