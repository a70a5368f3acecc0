//! # Request Bodies
//!
//! The three body strategies a method can use, each producing the final encoded
//! [`BodyContent`] handed to the transport:
//!
//! * **Discrete**: one value converted by the request converter of its type.
//! * **[`FormBody`]**: `name=value` pairs joined with `&`, encoded as
//!   `application/x-www-form-urlencoded`.
//! * **[`MultipartBody`]**: independently typed parts separated by a random boundary,
//!   encoded as `multipart/form-data`.
mod form;
mod multipart;

pub use form::FormBody;
pub use multipart::{MultipartBody, Part};

use crate::content::BodyContent;

/// The body of one assembled request.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Discrete(BodyContent),
    Form(FormBody),
    Multipart(MultipartBody),
}

impl RequestBody {
    /// Encodes the body for the wire. `None` means the request is sent without a body.
    pub fn encode(&self) -> Option<BodyContent> {
        match self {
            RequestBody::Empty => None,
            RequestBody::Discrete(content) => Some(content.clone()),
            RequestBody::Form(form) => Some(form.encode()),
            RequestBody::Multipart(multipart) => Some(multipart.encode()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }
}
