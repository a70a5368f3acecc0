//! # Declarations
//!
//! Plain, unvalidated descriptions of a remote HTTP API. These are the input of the
//! descriptor builder: whatever front-end produced them (hand-written Rust, a JSON file,
//! generated code) the core only trusts them after [`crate::descriptor::MethodDescriptor::build`]
//! has validated them.
//!
//! Every type here is `serde`-(de)serialisable so a whole [`ServiceMeta`] can be loaded from JSON:
//!
//! ```json
//! {
//!   "name": "EchoApi",
//!   "base_url": "http://localhost:3000/api",
//!   "methods": [{
//!     "name": "echo",
//!     "verbs": [{ "method": "GET", "path": "/echo/{id}" }],
//!     "params": [{ "name": "id", "ty": "int", "annotations": [{ "role": "path", "name": "id" }] }],
//!     "returns": { "ty": { "named": "Echo" } }
//!   }]
//! }
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

/// The logical type of a parameter or a result.
///
/// Converters are resolved and cached per `TypeRef`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    Void,
    String,
    Int,
    Float,
    Bool,
    Char,
    /// Raw file content. As a request value it is a path on the local file system.
    File,
    List(Box<TypeRef>),
    Map(Box<TypeRef>, Box<TypeRef>),
    /// Any structured type, encoded with the generic object (JSON) converter.
    Named(String),
    /// The HTTP info envelope: status code and headers alongside the converted body.
    HttpInfo(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn list(inner: TypeRef) -> Self {
        TypeRef::List(Box::new(inner))
    }

    pub fn map(key: TypeRef, value: TypeRef) -> Self {
        TypeRef::Map(Box::new(key), Box::new(value))
    }

    pub fn http_info(inner: TypeRef) -> Self {
        TypeRef::HttpInfo(Box::new(inner))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    /// The element type of a list, or `self` for anything else.
    pub fn element(&self) -> &TypeRef {
        match self {
            TypeRef::List(inner) => inner,
            other => other,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Void => write!(f, "Void"),
            TypeRef::String => write!(f, "String"),
            TypeRef::Int => write!(f, "Int"),
            TypeRef::Float => write!(f, "Float"),
            TypeRef::Bool => write!(f, "Bool"),
            TypeRef::Char => write!(f, "Char"),
            TypeRef::File => write!(f, "File"),
            TypeRef::List(inner) => write!(f, "List<{inner}>"),
            TypeRef::Map(key, value) => write!(f, "Map<{key}, {value}>"),
            TypeRef::Named(name) => write!(f, "{name}"),
            TypeRef::HttpInfo(inner) => write!(f, "HttpInfo<{inner}>"),
        }
    }
}

/// A whole API: a set of methods sharing a base URL and persistent headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceMeta {
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Caller-level headers (`"Name: value"`) sent with every call.
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub methods: Vec<MethodMeta>,
}

impl ServiceMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn header(mut self, line: impl Into<String>) -> Self {
        self.headers.push(line.into());
        self
    }

    pub fn method(mut self, method: MethodMeta) -> Self {
        self.methods.push(method);
        self
    }
}

/// One HTTP-verb annotation: the verb and the method-level URL template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbMeta {
    pub method: String,
    #[serde(default)]
    pub path: Option<String>,
    /// Only meaningful for custom verbs; standard verbs know whether they carry a body.
    #[serde(default)]
    pub has_body: Option<bool>,
}

/// Body encoding annotation of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    FormUrlEncoded,
    Multipart,
}

/// Reactive wrapper declared around a method result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Single,
    Maybe,
    Observable,
    Flowable,
    /// Success/failure only, no payload.
    Completable,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamKind::Single => "Single",
            StreamKind::Maybe => "Maybe",
            StreamKind::Observable => "Observable",
            StreamKind::Flowable => "Flowable",
            StreamKind::Completable => "Completable",
        };
        f.write_str(name)
    }
}

/// The declared result shape of a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnMeta {
    #[serde(default)]
    pub wrapper: Option<StreamKind>,
    #[serde(default = "void")]
    pub ty: TypeRef,
}

fn void() -> TypeRef {
    TypeRef::Void
}

impl Default for ReturnMeta {
    fn default() -> Self {
        Self {
            wrapper: None,
            ty: TypeRef::Void,
        }
    }
}

/// Raw per-parameter role metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ParamAnnotation {
    Path {
        name: String,
        #[serde(default)]
        encoded: bool,
    },
    Query {
        name: String,
        #[serde(default)]
        encoded: bool,
    },
    QueryMap {
        #[serde(default)]
        encoded: bool,
    },
    Header {
        name: String,
    },
    HeaderMap,
    Field {
        name: String,
        #[serde(default)]
        encoded: bool,
    },
    FieldMap {
        #[serde(default)]
        encoded: bool,
    },
    Part {
        name: String,
        /// Overrides the media type chosen by the request converter.
        #[serde(default)]
        media_type: Option<String>,
    },
    PartMap,
    Body,
    Url,
    Callback,
    /// Metadata the core does not understand. Ignored.
    Other {
        name: String,
    },
}

impl ParamAnnotation {
    pub fn path(name: impl Into<String>) -> Self {
        ParamAnnotation::Path {
            name: name.into(),
            encoded: false,
        }
    }

    pub fn query(name: impl Into<String>) -> Self {
        ParamAnnotation::Query {
            name: name.into(),
            encoded: false,
        }
    }

    pub fn header(name: impl Into<String>) -> Self {
        ParamAnnotation::Header { name: name.into() }
    }

    pub fn field(name: impl Into<String>) -> Self {
        ParamAnnotation::Field {
            name: name.into(),
            encoded: false,
        }
    }

    pub fn part(name: impl Into<String>) -> Self {
        ParamAnnotation::Part {
            name: name.into(),
            media_type: None,
        }
    }

    pub(crate) fn is_recognized(&self) -> bool {
        !matches!(self, ParamAnnotation::Other { .. })
    }
}

/// One declared method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamMeta {
    pub name: String,
    pub ty: TypeRef,
    #[serde(default)]
    pub annotations: Vec<ParamAnnotation>,
}

impl ParamMeta {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            annotations: Vec::new(),
        }
    }

    pub fn with(mut self, annotation: ParamAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// One declared method, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodMeta {
    pub name: String,
    #[serde(default)]
    pub verbs: Vec<VerbMeta>,
    /// Static headers (`"Name: value"`).
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub encoding: Option<Encoding>,
    #[serde(default)]
    pub params: Vec<ParamMeta>,
    #[serde(default)]
    pub returns: ReturnMeta,
}

impl MethodMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn verb(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.verbs.push(VerbMeta {
            method: method.into(),
            path: Some(path.into()),
            has_body: None,
        });
        self
    }

    /// A custom verb, with an explicit answer to whether it carries a body.
    pub fn custom_verb(
        mut self,
        method: impl Into<String>,
        path: Option<String>,
        has_body: bool,
    ) -> Self {
        self.verbs.push(VerbMeta {
            method: method.into(),
            path,
            has_body: Some(has_body),
        });
        self
    }

    pub fn get(self, path: impl Into<String>) -> Self {
        self.verb("GET", path)
    }

    pub fn post(self, path: impl Into<String>) -> Self {
        self.verb("POST", path)
    }

    pub fn put(self, path: impl Into<String>) -> Self {
        self.verb("PUT", path)
    }

    pub fn delete(self, path: impl Into<String>) -> Self {
        self.verb("DELETE", path)
    }

    pub fn header(mut self, line: impl Into<String>) -> Self {
        self.headers.push(line.into());
        self
    }

    pub fn form_url_encoded(mut self) -> Self {
        self.encoding = Some(Encoding::FormUrlEncoded);
        self
    }

    pub fn multipart(mut self) -> Self {
        self.encoding = Some(Encoding::Multipart);
        self
    }

    pub fn param(mut self, param: ParamMeta) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.returns = ReturnMeta { wrapper: None, ty };
        self
    }

    pub fn returns_stream(mut self, wrapper: StreamKind, ty: TypeRef) -> Self {
        self.returns = ReturnMeta {
            wrapper: Some(wrapper),
            ty,
        };
        self
    }
}
