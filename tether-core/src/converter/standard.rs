//! Built-in converters: scalars, raw files and a generic JSON object encoder for everything else.
use super::{ConversionError, ConverterFactory, RequestConverter, ResponseConverter, UrlConverter};
use crate::{
    content::{BodyContent, ResponseContent},
    meta::TypeRef,
};
use serde_json::Value;
use std::{borrow::Cow, sync::Arc};

/// The default [`ConverterFactory`].
///
/// * `String`, `Int`, `Float`, `Bool`, `Char`: plain text in all three directions.
/// * `File`: a request value is a local path whose bytes are sent as `application/octet-stream`.
/// * `Void`: responses are discarded.
/// * `Named`, `List`, `Map`: JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardConverters;

impl ConverterFactory for StandardConverters {
    fn url_converter(&self, ty: &TypeRef) -> Option<Arc<dyn UrlConverter>> {
        match ty {
            TypeRef::Void | TypeRef::File | TypeRef::HttpInfo(_) => None,
            TypeRef::String | TypeRef::Int | TypeRef::Float | TypeRef::Bool | TypeRef::Char => {
                Some(Arc::new(ScalarConverter(ty.clone())))
            }
            TypeRef::List(_) | TypeRef::Map(_, _) | TypeRef::Named(_) => {
                Some(Arc::new(JsonConverter(ty.clone())))
            }
        }
    }

    fn request_converter(&self, ty: &TypeRef) -> Option<Arc<dyn RequestConverter>> {
        match ty {
            TypeRef::Void | TypeRef::HttpInfo(_) => None,
            TypeRef::File => Some(Arc::new(FileConverter)),
            TypeRef::String | TypeRef::Int | TypeRef::Float | TypeRef::Bool | TypeRef::Char => {
                Some(Arc::new(ScalarConverter(ty.clone())))
            }
            TypeRef::List(_) | TypeRef::Map(_, _) | TypeRef::Named(_) => {
                Some(Arc::new(JsonConverter(ty.clone())))
            }
        }
    }

    fn response_converter(&self, ty: &TypeRef) -> Option<Arc<dyn ResponseConverter>> {
        match ty {
            TypeRef::File | TypeRef::HttpInfo(_) => None,
            TypeRef::Void => Some(Arc::new(VoidConverter)),
            TypeRef::String | TypeRef::Int | TypeRef::Float | TypeRef::Bool | TypeRef::Char => {
                Some(Arc::new(ScalarConverter(ty.clone())))
            }
            TypeRef::List(_) | TypeRef::Map(_, _) | TypeRef::Named(_) => {
                Some(Arc::new(JsonConverter(ty.clone())))
            }
        }
    }
}

struct ScalarConverter(TypeRef);

impl ScalarConverter {
    fn invalid(&self, value: impl ToString) -> ConversionError {
        ConversionError::InvalidValue {
            ty: self.0.clone(),
            value: value.to_string(),
        }
    }
}

impl UrlConverter for ScalarConverter {
    fn convert(&self, value: &Value) -> Result<String, ConversionError> {
        match (&self.0, value) {
            (TypeRef::String, Value::String(s)) => Ok(s.clone()),
            // Numbers and booleans are accepted where text is expected.
            (TypeRef::String, Value::Number(n)) => Ok(n.to_string()),
            (TypeRef::String, Value::Bool(b)) => Ok(b.to_string()),
            (TypeRef::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
            (TypeRef::Float, Value::Number(n)) => Ok(n.to_string()),
            (TypeRef::Bool, Value::Bool(b)) => Ok(b.to_string()),
            (TypeRef::Char, Value::String(s)) if s.chars().count() == 1 => Ok(s.clone()),
            _ => Err(self.invalid(value)),
        }
    }
}

impl RequestConverter for ScalarConverter {
    fn convert(&self, value: &Value) -> Result<BodyContent, ConversionError> {
        UrlConverter::convert(self, value).map(BodyContent::text)
    }
}

impl ResponseConverter for ScalarConverter {
    fn convert(&self, response: &ResponseContent) -> Result<Value, ConversionError> {
        let text = decode_text(response, &self.0)?;
        let trimmed = text.trim();
        let invalid = || ConversionError::InvalidBody {
            ty: self.0.clone(),
            body: text.to_string(),
        };

        match &self.0 {
            TypeRef::String => Ok(Value::String(text.to_string())),
            TypeRef::Int => trimmed
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid()),
            TypeRef::Float => trimmed
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(invalid),
            TypeRef::Bool => trimmed
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|_| invalid()),
            TypeRef::Char if trimmed.chars().count() == 1 => {
                Ok(Value::String(trimmed.to_string()))
            }
            _ => Err(invalid()),
        }
    }
}

/// The generic object encoder.
struct JsonConverter(TypeRef);

impl UrlConverter for JsonConverter {
    fn convert(&self, value: &Value) -> Result<String, ConversionError> {
        match value {
            // A bare string is used verbatim rather than quoted.
            Value::String(s) => Ok(s.clone()),
            other => Ok(serde_json::to_string(other)?),
        }
    }
}

impl RequestConverter for JsonConverter {
    fn convert(&self, value: &Value) -> Result<BodyContent, ConversionError> {
        Ok(BodyContent::json(serde_json::to_vec(value)?))
    }
}

impl ResponseConverter for JsonConverter {
    fn convert(&self, response: &ResponseContent) -> Result<Value, ConversionError> {
        let text = decode_text(response, &self.0)?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        let value: Value = serde_json::from_str(&text)?;
        let shape_matches = match (&self.0, &value) {
            (TypeRef::List(_), Value::Array(_)) => true,
            (TypeRef::Map(_, _), Value::Object(_)) => true,
            (TypeRef::List(_) | TypeRef::Map(_, _), _) => false,
            _ => true,
        };

        if shape_matches {
            Ok(value)
        } else {
            Err(ConversionError::InvalidBody {
                ty: self.0.clone(),
                body: text.into_owned(),
            })
        }
    }
}

/// Reads a local file named by the request value.
struct FileConverter;

impl RequestConverter for FileConverter {
    fn convert(&self, value: &Value) -> Result<BodyContent, ConversionError> {
        let Value::String(path) = value else {
            return Err(ConversionError::InvalidValue {
                ty: TypeRef::File,
                value: value.to_string(),
            });
        };

        let bytes = std::fs::read(path).map_err(|source| ConversionError::File {
            path: path.clone(),
            source,
        })?;

        Ok(BodyContent::new("application/octet-stream", bytes))
    }
}

struct VoidConverter;

impl ResponseConverter for VoidConverter {
    fn convert(&self, _response: &ResponseContent) -> Result<Value, ConversionError> {
        Ok(Value::Null)
    }
}

/// Decodes a response body honouring its declared charset.
fn decode_text<'r>(
    response: &'r ResponseContent,
    ty: &TypeRef,
) -> Result<Cow<'r, str>, ConversionError> {
    let charset = response
        .charset
        .as_deref()
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "utf-8".to_string());

    match charset.as_str() {
        "utf-8" | "utf8" => Ok(Cow::Borrowed(std::str::from_utf8(&response.bytes)?)),
        "us-ascii" | "ascii" if response.bytes.is_ascii() => {
            Ok(Cow::Borrowed(std::str::from_utf8(&response.bytes)?))
        }
        "us-ascii" | "ascii" => Err(ConversionError::InvalidBody {
            ty: ty.clone(),
            body: String::from_utf8_lossy(&response.bytes).into_owned(),
        }),
        // Every Latin-1 byte maps to the code point of the same value.
        "iso-8859-1" | "latin1" => Ok(Cow::Owned(
            response.bytes.iter().map(|&b| char::from(b)).collect(),
        )),
        _ => Err(ConversionError::UnsupportedCharset(charset)),
    }
}
