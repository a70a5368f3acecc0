use super::{
    BaseUrlPolicy, BodyStrategy, BoundParam, DescriptorError, DescriptorErrorKind, HeaderSpec,
    MethodDescriptor, ParameterBinding, ReturnStrategy, UrlTemplate,
    headers::{HeaderLineError, parse_header_line},
    url_template::is_valid_placeholder,
};
use crate::meta::{Encoding, MethodMeta, ParamAnnotation, ParamMeta, ReturnMeta, StreamKind, TypeRef, VerbMeta};
use http::{HeaderName, Method};
use std::{collections::HashSet, str::FromStr};
use tracing::debug;

use DescriptorErrorKind as Kind;

impl MethodDescriptor {
    /// Validates a declared method and turns it into a descriptor.
    ///
    /// # Arguments
    ///
    /// * `meta` - The declared method.
    /// * `base_url` - The base URL of the owning service, if any.
    ///
    /// # Returns
    ///
    /// * `Ok(MethodDescriptor)` - The method is consistent and can be called.
    /// * `Err(DescriptorError)` - The first inconsistency found, naming the method.
    pub fn build(meta: &MethodMeta, base_url: Option<&str>) -> Result<Self, DescriptorError> {
        let descriptor =
            build(meta, base_url).map_err(|kind| DescriptorError::new(&meta.name, kind))?;

        debug!(
            method = %descriptor.name,
            request = %descriptor,
            body = descriptor.body.kind(),
            returns = descriptor.returns.kind(),
            "built method descriptor"
        );

        Ok(descriptor)
    }
}

fn build(meta: &MethodMeta, base_url: Option<&str>) -> Result<MethodDescriptor, Kind> {
    let verb_meta = single_verb(&meta.verbs)?;
    let (verb, has_body) = parse_verb(verb_meta)?;
    let template = parse_template(verb_meta.path.as_deref().unwrap_or_default())?;

    let mut headers = HeaderSpec::default();
    for line in &meta.headers {
        let (name, value) = parse_header_line(line)?;
        headers.add_static(name, value);
    }

    let mut paths = Vec::new();
    let mut queries = Vec::new();
    let mut fields = Vec::new();
    let mut parts = Vec::new();
    let mut body = None;
    let mut url = None;
    let mut callback = None;

    for (index, param) in meta.params.iter().enumerate() {
        let Some(binding) = bind(param, meta.encoding)? else {
            continue;
        };

        let bound = BoundParam {
            index,
            name: param.name.clone(),
            ty: param.ty.clone(),
            binding,
        };

        match bound.binding {
            ParameterBinding::Path { .. } => paths.push(bound),
            ParameterBinding::Query { .. } | ParameterBinding::QueryMap { .. } => {
                queries.push(bound)
            }
            ParameterBinding::Header { .. } => headers.params.push(bound),
            ParameterBinding::HeaderMap => headers.maps.push(bound),
            ParameterBinding::Field { .. } | ParameterBinding::FieldMap { .. } => {
                fields.push(bound)
            }
            ParameterBinding::Part { .. } | ParameterBinding::PartMap => parts.push(bound),
            ParameterBinding::Body => set_once(&mut body, bound)?,
            ParameterBinding::UrlOverride => set_once(&mut url, bound)?,
            ParameterBinding::Callback => set_once(&mut callback, bound)?,
        }
    }

    if !has_body && (body.is_some() || meta.encoding.is_some()) {
        return Err(Kind::BodyNotAllowed(verb.to_string()));
    }

    let body = match meta.encoding {
        None => BodyStrategy::Discrete { body },
        Some(Encoding::FormUrlEncoded) if fields.is_empty() => return Err(Kind::EmptyForm),
        Some(Encoding::FormUrlEncoded) => BodyStrategy::FormEncoded { fields },
        Some(Encoding::Multipart) if parts.is_empty() => return Err(Kind::EmptyMultipart),
        Some(Encoding::Multipart) => BodyStrategy::Multipart { parts },
    };

    if template.is_empty() && base_url.is_none() && url.is_none() {
        return Err(Kind::MissingUrl);
    }
    if template.is_absolute() && url.is_some() {
        return Err(Kind::UrlOverrideWithAbsoluteUrl);
    }

    let base_url = match (&url, base_url) {
        (Some(param), _) => BaseUrlPolicy::Overridden {
            param: param.clone(),
        },
        (None, _) if template.is_absolute() => BaseUrlPolicy::None,
        (None, Some(base)) => BaseUrlPolicy::Fixed(base.to_string()),
        (None, None) => BaseUrlPolicy::None,
    };

    check_paths(&template, &paths)?;

    let (returns, http_info) = return_strategy(&meta.returns, callback.as_ref())?;

    Ok(MethodDescriptor {
        name: meta.name.clone(),
        verb,
        has_body,
        template,
        base_url,
        headers,
        paths,
        queries,
        body,
        returns,
        http_info,
        arity: meta.params.len(),
    })
}

fn single_verb(verbs: &[VerbMeta]) -> Result<&VerbMeta, Kind> {
    match verbs {
        [] => Err(Kind::MissingVerb),
        [verb] => Ok(verb),
        many => Err(Kind::MultipleVerbs(
            many.iter().map(|v| v.method.clone()).collect(),
        )),
    }
}

fn parse_verb(verb: &VerbMeta) -> Result<(Method, bool), Kind> {
    let upper = verb.method.trim().to_ascii_uppercase();
    let method =
        Method::from_bytes(upper.as_bytes()).map_err(|_| Kind::InvalidVerb(verb.method.clone()))?;

    let carries_body = method == Method::POST || method == Method::PUT || method == Method::PATCH;
    Ok((method, verb.has_body.unwrap_or(carries_body)))
}

fn parse_template(path: &str) -> Result<UrlTemplate, Kind> {
    if let Some((_, query)) = path.split_once('?')
        && query.contains('{')
    {
        return Err(Kind::QueryPlaceholder(query.to_string()));
    }

    let template = UrlTemplate::parse(path).map_err(|source| Kind::MalformedTemplate {
        template: path.to_string(),
        source,
    })?;

    if let Some(name) = template.placeholders().find(|n| !is_valid_placeholder(n)) {
        return Err(Kind::InvalidPlaceholder(name.to_string()));
    }

    Ok(template)
}

/// Resolves the single recognised role of a parameter. `None` means it has no role.
fn bind(param: &ParamMeta, encoding: Option<Encoding>) -> Result<Option<ParameterBinding>, Kind> {
    let mut recognized = param.annotations.iter().filter(|a| a.is_recognized());
    let Some(annotation) = recognized.next() else {
        return Ok(None);
    };
    if recognized.next().is_some() {
        return Err(Kind::MultipleRoles(param.name.clone()));
    }

    let is_form = encoding == Some(Encoding::FormUrlEncoded);
    let is_multipart = encoding == Some(Encoding::Multipart);

    let binding = match annotation.clone() {
        ParamAnnotation::Path { name, encoded } => {
            if !is_valid_placeholder(&name) {
                return Err(Kind::InvalidPlaceholder(name));
            }
            ParameterBinding::Path { name, encoded }
        }
        ParamAnnotation::Query { name, encoded } => ParameterBinding::Query { name, encoded },
        ParamAnnotation::QueryMap { encoded } => {
            require_string_map(param, "query map")?;
            ParameterBinding::QueryMap { encoded }
        }
        ParamAnnotation::Header { name } => {
            if HeaderName::from_str(&name).is_err() {
                return Err(Kind::MalformedHeader(HeaderLineError::InvalidName(name)));
            }
            ParameterBinding::Header { name }
        }
        ParamAnnotation::HeaderMap => {
            require_string_map(param, "header map")?;
            ParameterBinding::HeaderMap
        }
        ParamAnnotation::Field { name, encoded } => {
            if !is_form {
                return Err(Kind::FieldOutsideForm(param.name.clone()));
            }
            ParameterBinding::Field { name, encoded }
        }
        ParamAnnotation::FieldMap { encoded } => {
            if !is_form {
                return Err(Kind::FieldOutsideForm(param.name.clone()));
            }
            require_string_map(param, "field map")?;
            ParameterBinding::FieldMap { encoded }
        }
        ParamAnnotation::Part { name, media_type } => {
            if !is_multipart {
                return Err(Kind::PartOutsideMultipart(param.name.clone()));
            }
            ParameterBinding::Part { name, media_type }
        }
        ParamAnnotation::PartMap => {
            if !is_multipart {
                return Err(Kind::PartOutsideMultipart(param.name.clone()));
            }
            require_string_map(param, "part map")?;
            ParameterBinding::PartMap
        }
        ParamAnnotation::Body => {
            if encoding.is_some() {
                return Err(Kind::BodyOutsideDiscrete(param.name.clone()));
            }
            ParameterBinding::Body
        }
        ParamAnnotation::Url => ParameterBinding::UrlOverride,
        ParamAnnotation::Callback => ParameterBinding::Callback,
        ParamAnnotation::Other { .. } => return Ok(None),
    };

    Ok(Some(binding))
}

fn require_string_map(param: &ParamMeta, role: &'static str) -> Result<(), Kind> {
    match &param.ty {
        TypeRef::Map(key, _) if **key == TypeRef::String => Ok(()),
        TypeRef::Map(key, _) => Err(Kind::NonStringMapKey {
            role,
            param: param.name.clone(),
            key: (**key).clone(),
        }),
        other => Err(Kind::NotAMap {
            role,
            param: param.name.clone(),
            ty: other.clone(),
        }),
    }
}

fn set_once(slot: &mut Option<BoundParam>, bound: BoundParam) -> Result<(), Kind> {
    if slot.is_some() {
        return Err(Kind::DuplicateRole(bound.binding.role()));
    }
    *slot = Some(bound);
    Ok(())
}

/// Placeholders and path parameters must match one to one.
fn check_paths(template: &UrlTemplate, paths: &[BoundParam]) -> Result<(), Kind> {
    let mut declared = Vec::with_capacity(paths.len());
    let mut seen = HashSet::new();
    for param in paths {
        if let ParameterBinding::Path { name, .. } = &param.binding {
            if !seen.insert(name.as_str()) {
                return Err(Kind::DuplicatePathParam(name.clone()));
            }
            declared.push(name.as_str());
        }
    }

    let placeholders: Vec<&str> = template.placeholders().collect();

    if let Some(missing) = placeholders.iter().find(|name| !seen.contains(*name)) {
        return Err(Kind::UnmatchedPlaceholder(missing.to_string()));
    }
    if let Some(orphan) = declared.iter().find(|name| !placeholders.contains(*name)) {
        return Err(Kind::OrphanPathParam(orphan.to_string()));
    }
    if placeholders.len() != declared.len() {
        return Err(Kind::PathCountMismatch {
            placeholders: placeholders.len(),
            params: declared.len(),
        });
    }

    Ok(())
}

fn return_strategy(
    returns: &ReturnMeta,
    callback: Option<&BoundParam>,
) -> Result<(ReturnStrategy, bool), Kind> {
    match (returns.wrapper, callback) {
        (Some(wrapper), Some(_)) => Err(Kind::CallbackWithStream(wrapper)),
        (Some(StreamKind::Completable), None) if !returns.ty.is_void() => {
            Err(Kind::CompletionWithResult(returns.ty.clone()))
        }
        (Some(StreamKind::Completable), None) => Ok((
            ReturnStrategy::ReactiveCompletion {
                wrapper: StreamKind::Completable,
            },
            false,
        )),
        (Some(wrapper), None) => {
            let (result, http_info) = unwrap_envelope(&returns.ty);
            Ok((ReturnStrategy::ReactiveSingle { wrapper, result }, http_info))
        }
        (None, Some(callback)) => {
            if !returns.ty.is_void() {
                return Err(Kind::CallbackWithResult(returns.ty.clone()));
            }
            let (result, http_info) = unwrap_envelope(&callback.ty);
            Ok((
                ReturnStrategy::Callback {
                    param: callback.index,
                    name: callback.name.clone(),
                    result,
                },
                http_info,
            ))
        }
        (None, None) => {
            let (result, http_info) = unwrap_envelope(&returns.ty);
            Ok((ReturnStrategy::Direct { result }, http_info))
        }
    }
}

fn unwrap_envelope(ty: &TypeRef) -> (TypeRef, bool) {
    match ty {
        TypeRef::HttpInfo(inner) => ((**inner).clone(), true),
        other => (other.clone(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{HeaderLineError, Segment, TemplateError};
    use crate::meta::{ParamAnnotation as A, ParamMeta as P};
    use tracing_test::traced_test;

    const BASE: Option<&str> = Some("http://h/api");

    fn kind_of(meta: MethodMeta, base: Option<&str>) -> Kind {
        let err = MethodDescriptor::build(&meta, base).unwrap_err();
        assert_eq!(err.method, meta.name);
        err.kind
    }

    fn echo() -> MethodMeta {
        MethodMeta::new("echo")
            .get("/echo/{id}")
            .param(P::new("id", TypeRef::Int).with(A::path("id")))
            .returns(TypeRef::named("Echo"))
    }

    #[test]
    #[traced_test]
    fn builds_a_simple_get() {
        let descriptor = MethodDescriptor::build(&echo(), BASE).unwrap();

        assert_eq!(descriptor.verb, Method::GET);
        assert!(!descriptor.has_body);
        assert_eq!(
            descriptor.base_url,
            BaseUrlPolicy::Fixed("http://h/api".into())
        );
        assert_eq!(
            descriptor.template.segments(),
            &[
                Segment::Literal("/echo/".into()),
                Segment::Placeholder("id".into())
            ]
        );
        assert_eq!(descriptor.paths.len(), 1);
        assert_eq!(descriptor.body, BodyStrategy::Discrete { body: None });
        assert_eq!(
            descriptor.returns,
            ReturnStrategy::Direct {
                result: TypeRef::named("Echo")
            }
        );
        assert!(!descriptor.http_info);
        assert_eq!(descriptor.arity, 1);
        assert!(logs_contain("built method descriptor"));
    }

    #[test]
    fn missing_url_source() {
        let meta = MethodMeta::new("nowhere").verb("GET", "");
        assert_eq!(kind_of(meta, None), Kind::MissingUrl);
    }

    #[test]
    fn url_override_is_a_url_source() {
        let meta = MethodMeta::new("follow")
            .verb("GET", "")
            .param(P::new("next", TypeRef::String).with(A::Url));

        let descriptor = MethodDescriptor::build(&meta, None).unwrap();
        let BaseUrlPolicy::Overridden { param } = descriptor.base_url else {
            panic!("expected an overridden base URL");
        };
        assert_eq!(param.index, 0);
        assert_eq!(param.binding, ParameterBinding::UrlOverride);
    }

    #[test]
    fn absolute_method_url_needs_no_base() {
        let meta = MethodMeta::new("abs").get("https://example.com/a");
        let descriptor = MethodDescriptor::build(&meta, BASE).unwrap();
        assert_eq!(descriptor.base_url, BaseUrlPolicy::None);
    }

    #[test]
    fn url_override_with_absolute_url_is_rejected() {
        let meta = MethodMeta::new("abs")
            .get("https://example.com/a")
            .param(P::new("u", TypeRef::String).with(A::Url));
        assert_eq!(kind_of(meta, BASE), Kind::UrlOverrideWithAbsoluteUrl);
    }

    #[test]
    fn verbs_must_be_exactly_one() {
        assert_eq!(kind_of(MethodMeta::new("none"), BASE), Kind::MissingVerb);

        let meta = MethodMeta::new("both").get("/a").post("/a");
        assert_eq!(
            kind_of(meta, BASE),
            Kind::MultipleVerbs(vec!["GET".into(), "POST".into()])
        );
    }

    #[test]
    fn custom_verbs() {
        let meta = MethodMeta::new("purge").custom_verb("purge", Some("/cache".into()), false);
        let descriptor = MethodDescriptor::build(&meta, BASE).unwrap();
        assert_eq!(descriptor.verb.as_str(), "PURGE");
        assert!(!descriptor.has_body);

        let meta = MethodMeta::new("bad").verb("NOT A VERB", "/x");
        assert_eq!(kind_of(meta, BASE), Kind::InvalidVerb("NOT A VERB".into()));
    }

    #[test]
    fn placeholder_without_path_param() {
        let meta = MethodMeta::new("m").get("/users/{id}");
        assert_eq!(kind_of(meta, BASE), Kind::UnmatchedPlaceholder("id".into()));
    }

    #[test]
    fn path_param_without_placeholder() {
        let meta = MethodMeta::new("m")
            .get("/users")
            .param(P::new("id", TypeRef::Int).with(A::path("id")));
        assert_eq!(kind_of(meta, BASE), Kind::OrphanPathParam("id".into()));
    }

    #[test]
    fn repeated_placeholder_breaks_the_count() {
        let meta = MethodMeta::new("m")
            .get("/{id}/again/{id}")
            .param(P::new("id", TypeRef::Int).with(A::path("id")));
        assert_eq!(
            kind_of(meta, BASE),
            Kind::PathCountMismatch {
                placeholders: 2,
                params: 1
            }
        );
    }

    #[test]
    fn duplicate_path_params() {
        let meta = MethodMeta::new("m")
            .get("/{id}")
            .param(P::new("a", TypeRef::Int).with(A::path("id")))
            .param(P::new("b", TypeRef::Int).with(A::path("id")));
        assert_eq!(kind_of(meta, BASE), Kind::DuplicatePathParam("id".into()));
    }

    #[test]
    fn placeholder_count_always_matches_path_params() {
        let templates = ["/a", "/{a}", "/{a}/{b}", "/{a}/{b}/{c}"];
        let names = ["a", "b", "c"];

        for template in templates {
            for declared in 0..=names.len() {
                let mut meta = MethodMeta::new("m").get(template);
                for name in &names[..declared] {
                    meta = meta.param(P::new(*name, TypeRef::String).with(A::path(*name)));
                }

                let placeholders = template.matches('{').count();
                let result = MethodDescriptor::build(&meta, BASE);
                assert_eq!(
                    result.is_ok(),
                    placeholders == declared,
                    "template {template} with {declared} path params"
                );
            }
        }
    }

    #[test]
    fn malformed_templates() {
        let meta = MethodMeta::new("m").get("/a/{b");
        assert_eq!(
            kind_of(meta, BASE),
            Kind::MalformedTemplate {
                template: "/a/{b".into(),
                source: TemplateError::Unterminated(3)
            }
        );

        let meta = MethodMeta::new("m").get("/a/{1b}");
        assert_eq!(kind_of(meta, BASE), Kind::InvalidPlaceholder("1b".into()));

        let meta = MethodMeta::new("m").get("/a?b={b}");
        assert_eq!(kind_of(meta, BASE), Kind::QueryPlaceholder("b={b}".into()));
    }

    #[test]
    fn field_outside_form() {
        let meta = MethodMeta::new("m")
            .post("/a")
            .param(P::new("f", TypeRef::String).with(A::field("f")));
        assert_eq!(kind_of(meta, BASE), Kind::FieldOutsideForm("f".into()));

        let meta = MethodMeta::new("m")
            .post("/a")
            .multipart()
            .param(P::new("p", TypeRef::String).with(A::part("p")))
            .param(
                P::new("fm", TypeRef::map(TypeRef::String, TypeRef::String))
                    .with(A::FieldMap { encoded: false }),
            );
        assert_eq!(kind_of(meta, BASE), Kind::FieldOutsideForm("fm".into()));
    }

    #[test]
    fn part_outside_multipart() {
        let meta = MethodMeta::new("m")
            .post("/a")
            .form_url_encoded()
            .param(P::new("f", TypeRef::String).with(A::field("f")))
            .param(P::new("p", TypeRef::File).with(A::part("p")));
        assert_eq!(kind_of(meta, BASE), Kind::PartOutsideMultipart("p".into()));
    }

    #[test]
    fn body_outside_discrete() {
        let meta = MethodMeta::new("m")
            .post("/a")
            .form_url_encoded()
            .param(P::new("f", TypeRef::String).with(A::field("f")))
            .param(P::new("b", TypeRef::named("User")).with(A::Body));
        assert_eq!(kind_of(meta, BASE), Kind::BodyOutsideDiscrete("b".into()));
    }

    #[test]
    fn body_on_get_is_rejected() {
        let meta = MethodMeta::new("m")
            .get("/a")
            .param(P::new("b", TypeRef::named("User")).with(A::Body));
        assert_eq!(kind_of(meta, BASE), Kind::BodyNotAllowed("GET".into()));
    }

    #[test]
    fn empty_encodings_are_rejected() {
        let meta = MethodMeta::new("m").post("/a").form_url_encoded();
        assert_eq!(kind_of(meta, BASE), Kind::EmptyForm);

        let meta = MethodMeta::new("m").post("/a").multipart();
        assert_eq!(kind_of(meta, BASE), Kind::EmptyMultipart);
    }

    #[test]
    fn map_keys_must_be_strings() {
        let meta = MethodMeta::new("m").get("/a").param(
            P::new("q", TypeRef::map(TypeRef::Int, TypeRef::String))
                .with(A::QueryMap { encoded: false }),
        );
        assert_eq!(
            kind_of(meta, BASE),
            Kind::NonStringMapKey {
                role: "query map",
                param: "q".into(),
                key: TypeRef::Int
            }
        );

        let meta = MethodMeta::new("m")
            .post("/a")
            .multipart()
            .param(P::new("parts", TypeRef::list(TypeRef::File)).with(A::PartMap));
        assert_eq!(
            kind_of(meta, BASE),
            Kind::NotAMap {
                role: "part map",
                param: "parts".into(),
                ty: TypeRef::list(TypeRef::File)
            }
        );
    }

    #[test]
    fn one_role_per_parameter() {
        let meta = MethodMeta::new("m").get("/{id}").param(
            P::new("id", TypeRef::Int)
                .with(A::path("id"))
                .with(A::query("id")),
        );
        assert_eq!(kind_of(meta, BASE), Kind::MultipleRoles("id".into()));
    }

    #[test]
    fn unrecognised_parameters_are_ignored() {
        let meta = echo().param(P::new("ctx", TypeRef::named("Context")).with(A::Other {
            name: "Nullable".into(),
        }));

        let descriptor = MethodDescriptor::build(&meta, BASE).unwrap();
        assert_eq!(descriptor.arity, 2);
        assert_eq!(descriptor.paths.len(), 1);
        assert!(descriptor.queries.is_empty());
    }

    #[test]
    fn at_most_one_body_url_and_callback() {
        let meta = MethodMeta::new("m")
            .post("/a")
            .param(P::new("a", TypeRef::String).with(A::Body))
            .param(P::new("b", TypeRef::String).with(A::Body));
        assert_eq!(kind_of(meta, BASE), Kind::DuplicateRole("body"));

        let meta = MethodMeta::new("m")
            .get("")
            .param(P::new("a", TypeRef::String).with(A::Url))
            .param(P::new("b", TypeRef::String).with(A::Url));
        assert_eq!(kind_of(meta, BASE), Kind::DuplicateRole("url"));

        let meta = MethodMeta::new("m")
            .get("/a")
            .param(P::new("a", TypeRef::String).with(A::Callback))
            .param(P::new("b", TypeRef::String).with(A::Callback));
        assert_eq!(kind_of(meta, BASE), Kind::DuplicateRole("callback"));
    }

    #[test]
    fn callback_requires_a_void_result() {
        let meta = MethodMeta::new("m")
            .get("/a")
            .param(P::new("cb", TypeRef::named("User")).with(A::Callback))
            .returns(TypeRef::named("User"));
        assert_eq!(
            kind_of(meta, BASE),
            Kind::CallbackWithResult(TypeRef::named("User"))
        );
    }

    #[test]
    fn completable_requires_a_void_result() {
        let meta = MethodMeta::new("m")
            .delete("/a")
            .returns_stream(StreamKind::Completable, TypeRef::named("User"));
        assert_eq!(
            kind_of(meta, BASE),
            Kind::CompletionWithResult(TypeRef::named("User"))
        );
    }

    #[test]
    fn callback_takes_its_result_type_from_the_parameter() {
        let meta = MethodMeta::new("m")
            .get("/a")
            .param(P::new("cb", TypeRef::http_info(TypeRef::named("User"))).with(A::Callback));

        let descriptor = MethodDescriptor::build(&meta, BASE).unwrap();
        assert_eq!(
            descriptor.returns,
            ReturnStrategy::Callback {
                param: 0,
                name: "cb".into(),
                result: TypeRef::named("User")
            }
        );
        assert!(descriptor.http_info);
    }

    #[test]
    fn callback_and_stream_do_not_mix() {
        let meta = MethodMeta::new("m")
            .get("/a")
            .param(P::new("cb", TypeRef::String).with(A::Callback))
            .returns_stream(StreamKind::Single, TypeRef::Void);
        assert_eq!(
            kind_of(meta, BASE),
            Kind::CallbackWithStream(StreamKind::Single)
        );
    }

    #[test]
    fn reactive_return_strategies() {
        let meta = MethodMeta::new("m")
            .get("/a")
            .returns_stream(StreamKind::Observable, TypeRef::list(TypeRef::Int));
        let descriptor = MethodDescriptor::build(&meta, BASE).unwrap();
        assert_eq!(
            descriptor.returns,
            ReturnStrategy::ReactiveSingle {
                wrapper: StreamKind::Observable,
                result: TypeRef::list(TypeRef::Int)
            }
        );

        let meta = MethodMeta::new("m")
            .delete("/a")
            .returns_stream(StreamKind::Completable, TypeRef::Void);
        let descriptor = MethodDescriptor::build(&meta, BASE).unwrap();
        assert_eq!(
            descriptor.returns,
            ReturnStrategy::ReactiveCompletion {
                wrapper: StreamKind::Completable
            }
        );
        assert_eq!(descriptor.returns.result_type(), &TypeRef::Void);
    }

    #[test]
    fn static_headers() {
        let meta = echo()
            .header("Accept: application/json")
            .header("Content-Type: application/vnd.api+json");
        let descriptor = MethodDescriptor::build(&meta, BASE).unwrap();

        assert_eq!(descriptor.headers.statics.len(), 1);
        assert_eq!(
            descriptor.headers.content_type.as_deref(),
            Some("application/vnd.api+json")
        );

        let meta = echo().header("Accept");
        assert_eq!(
            kind_of(meta, BASE),
            Kind::MalformedHeader(HeaderLineError::Malformed("Accept".into()))
        );
    }

    #[test]
    fn header_parameters_are_split_by_kind() {
        let meta = echo()
            .param(P::new("token", TypeRef::String).with(A::header("Authorization")))
            .param(P::new("extra", TypeRef::map(TypeRef::String, TypeRef::String)).with(A::HeaderMap));
        let descriptor = MethodDescriptor::build(&meta, BASE).unwrap();

        assert_eq!(descriptor.headers.params.len(), 1);
        assert_eq!(descriptor.headers.maps.len(), 1);
        assert_eq!(descriptor.headers.maps[0].index, 2);

        let meta = echo().param(P::new("t", TypeRef::String).with(A::header("Bad Header")));
        assert_eq!(
            kind_of(meta, BASE),
            Kind::MalformedHeader(HeaderLineError::InvalidName("Bad Header".into()))
        );
    }

    #[test]
    fn form_fields_keep_declaration_order() {
        let meta = MethodMeta::new("m")
            .post("/form")
            .form_url_encoded()
            .param(P::new("a", TypeRef::String).with(A::field("a")))
            .param(
                P::new("rest", TypeRef::map(TypeRef::String, TypeRef::String))
                    .with(A::FieldMap { encoded: false }),
            )
            .param(P::new("z", TypeRef::String).with(A::field("z")));

        let descriptor = MethodDescriptor::build(&meta, BASE).unwrap();
        let BodyStrategy::FormEncoded { fields } = descriptor.body else {
            panic!("expected a form body");
        };
        let order: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(order, ["a", "rest", "z"]);
    }
}
