//! # Core Orchestration Layer
//!
//! This module drives a single execution:
//!
//! 1. **Loading**: It reads the JSON description and builds a validated `Service`.
//! 2. **Arguments**: It turns `--arg` values into call arguments, reading `@path` files.
//! 3. **Dispatch**: It selects the call-site matching the method's return style. Direct calls
//!    run on the blocking pool, callback calls are awaited through a channel and reactive
//!    streams are drained.
use crate::cli::CliArg;
use anyhow::Context;
use futures_util::StreamExt;
use std::path::Path;
use tether_core::{
    Arg, CallError, Reply, Service, ServiceMeta, content::RawContent,
    descriptor::ReturnStrategy,
};
use tokio::sync::oneshot;

pub struct Input {
    pub base_url: Option<String>,
    pub headers: Vec<(String, String)>,
}

pub enum Output {
    Reply(Reply),
    Stream(Vec<Result<Reply, CallError>>),
    /// A completion-only stream finished without error.
    Completed,
}

/// Reads a JSON service description from disk and builds it.
pub fn load(file: &Path, input: Input) -> anyhow::Result<Service> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read '{}'", file.display()))?;
    build(&text, input)
}

/// Builds a service from its JSON description.
pub fn build(description: &str, input: Input) -> anyhow::Result<Service> {
    let meta: ServiceMeta =
        serde_json::from_str(description).context("Invalid service description")?;

    let mut builder = Service::builder(meta);
    if let Some(base_url) = input.base_url {
        builder = builder.base_url(base_url);
    }
    for (name, value) in input.headers {
        builder = builder.header(name, value);
    }

    Ok(builder.build()?)
}

/// Calls `method`, whatever its return style.
pub async fn call(service: Service, method: String, args: Vec<CliArg>) -> anyhow::Result<Output> {
    let returns = service
        .descriptor(&method)
        .map(|d| d.returns.clone())
        .with_context(|| format!("Method '{method}' not found in '{}'", service.name()))?;

    let args = args
        .into_iter()
        .map(into_arg)
        .collect::<anyhow::Result<Vec<_>>>()?;

    match returns {
        ReturnStrategy::Direct { .. } => {
            let reply = tokio::task::spawn_blocking(move || service.call(&method, args)).await??;
            Ok(Output::Reply(reply))
        }
        ReturnStrategy::Callback { .. } => {
            let (tx, rx) = oneshot::channel();
            service.enqueue(&method, args, move |result| {
                let _ = tx.send(result);
            })?;
            let reply = rx.await.context("The callback was dropped before completing")??;
            Ok(Output::Reply(reply))
        }
        ReturnStrategy::ReactiveSingle { .. } => {
            let stream = service.stream(&method, args)?;
            Ok(Output::Stream(stream.collect().await))
        }
        ReturnStrategy::ReactiveCompletion { .. } => {
            let mut stream = service.stream(&method, args)?;
            while let Some(item) = stream.next().await {
                item?;
            }
            Ok(Output::Completed)
        }
    }
}

fn into_arg(arg: CliArg) -> anyhow::Result<Arg> {
    match arg {
        CliArg::Json(value) => Ok(Arg::Json(value)),
        CliArg::File(path) => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read '{}'", path.display()))?;
            let mut raw = RawContent::new("application/octet-stream", bytes);
            if let Some(name) = path.file_name() {
                raw = raw.with_file_name(name.to_string_lossy());
            }
            Ok(Arg::Raw(raw))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    const DESCRIPTION: &str = r#"{
        "name": "EchoApi",
        "base_url": "http://127.0.0.1:1/api",
        "methods": [
            {
                "name": "echo",
                "verbs": [{ "method": "GET", "path": "/echo/{id}" }],
                "params": [{ "name": "id", "ty": "int", "annotations": [{ "role": "path", "name": "id" }] }],
                "returns": { "ty": { "named": "Echo" } }
            },
            {
                "name": "text",
                "verbs": [{ "method": "GET", "path": "/text" }],
                "params": [{ "name": "done", "ty": "string", "annotations": [{ "role": "callback" }] }]
            },
            {
                "name": "watch",
                "verbs": [{ "method": "GET", "path": "/text" }],
                "returns": { "wrapper": "single", "ty": "string" }
            },
            {
                "name": "fail",
                "verbs": [{ "method": "DELETE", "path": "/status/500" }],
                "returns": { "wrapper": "completable" }
            }
        ]
    }"#;

    async fn spawn_echo() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(echo_service::run(listener));
        format!("http://{addr}/api")
    }

    fn input(base_url: String) -> Input {
        Input {
            base_url: Some(base_url),
            headers: vec![("x-cli".into(), "1".into())],
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn calls_every_return_style() {
        let service = build(DESCRIPTION, input(spawn_echo().await)).unwrap();

        let Output::Reply(reply) = call(service.clone(), "echo".into(), vec![CliArg::Json(json!(5))])
            .await
            .unwrap()
        else {
            panic!("expected a reply");
        };
        assert_eq!(reply.body(), &json!({"id": "5"}));

        let Output::Reply(reply) = call(service.clone(), "text".into(), vec![]).await.unwrap()
        else {
            panic!("expected a reply");
        };
        assert_eq!(reply.body(), &json!("hello tether"));

        let Output::Stream(items) = call(service.clone(), "watch".into(), vec![]).await.unwrap()
        else {
            panic!("expected a stream");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap().body(), &json!("hello tether"));

        let err = call(service, "fail".into(), vec![]).await.err().unwrap();
        assert!(err.to_string().contains("Call to 'fail' failed"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_methods_are_reported() {
        let service = build(DESCRIPTION, input("http://127.0.0.1:1".into())).unwrap();
        let err = call(service, "missing".into(), vec![]).await.err().unwrap();
        assert!(err.to_string().contains("Method 'missing' not found in 'EchoApi'"));
    }

    #[test]
    fn invalid_descriptions_fail_to_build() {
        let err = build("{", input("http://h".into())).err().unwrap();
        assert!(err.to_string().contains("Invalid service description"));

        let description = json!({
            "name": "Api",
            "methods": [{ "name": "m", "verbs": [{ "method": "GET", "path": "/{id}" }] }]
        });
        let err = build(&description.to_string(), input("http://h".into()))
            .err()
            .unwrap();
        assert!(err.to_string().contains("Invalid method 'm'"));
    }
}
