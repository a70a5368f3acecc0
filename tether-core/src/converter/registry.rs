use super::{
    ConversionError, ConverterFactory, ConverterRole, RequestConverter, ResponseConverter,
    UrlConverter,
};
use crate::meta::TypeRef;
use parking_lot::RwLock;
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::trace;

type Cache<C> = RwLock<HashMap<TypeRef, Arc<C>>>;

/// Type-keyed converter cache in front of a [`ConverterFactory`].
///
/// At most one converter is kept per `(role, type)` pair for the lifetime of the registry.
/// Concurrent misses for the same key may both ask the factory, but only the first result
/// inserted is ever handed out.
pub struct ConverterRegistry {
    factory: Arc<dyn ConverterFactory>,
    url: Cache<dyn UrlConverter>,
    request: Cache<dyn RequestConverter>,
    response: Cache<dyn ResponseConverter>,
}

impl ConverterRegistry {
    pub fn new(factory: Arc<dyn ConverterFactory>) -> Self {
        Self {
            factory,
            url: RwLock::default(),
            request: RwLock::default(),
            response: RwLock::default(),
        }
    }

    pub fn url_converter(&self, ty: &TypeRef) -> Result<Arc<dyn UrlConverter>, ConversionError> {
        resolve(&self.url, ConverterRole::Url, ty, || {
            self.factory.url_converter(ty)
        })
    }

    pub fn request_converter(
        &self,
        ty: &TypeRef,
    ) -> Result<Arc<dyn RequestConverter>, ConversionError> {
        resolve(&self.request, ConverterRole::Request, ty, || {
            self.factory.request_converter(ty)
        })
    }

    pub fn response_converter(
        &self,
        ty: &TypeRef,
    ) -> Result<Arc<dyn ResponseConverter>, ConversionError> {
        resolve(&self.response, ConverterRole::Response, ty, || {
            self.factory.response_converter(ty)
        })
    }

    /// Number of converters currently cached for a role.
    pub fn cached(&self, role: ConverterRole) -> usize {
        match role {
            ConverterRole::Url => self.url.read().len(),
            ConverterRole::Request => self.request.read().len(),
            ConverterRole::Response => self.response.read().len(),
        }
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("url", &self.cached(ConverterRole::Url))
            .field("request", &self.cached(ConverterRole::Request))
            .field("response", &self.cached(ConverterRole::Response))
            .finish()
    }
}

fn resolve<C: ?Sized>(
    cache: &Cache<C>,
    role: ConverterRole,
    ty: &TypeRef,
    make: impl FnOnce() -> Option<Arc<C>>,
) -> Result<Arc<C>, ConversionError> {
    if let Some(converter) = cache.read().get(ty) {
        return Ok(converter.clone());
    }

    // The factory runs without holding the lock.
    let created = make().ok_or_else(|| ConversionError::Unsupported {
        role,
        ty: ty.clone(),
    })?;
    trace!(%role, %ty, "created converter");

    Ok(cache.write().entry(ty.clone()).or_insert(created).clone())
}
