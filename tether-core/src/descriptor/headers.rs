use super::BoundParam;
use http::{HeaderName, HeaderValue, header::CONTENT_TYPE};
use std::str::FromStr;

/// Why a `"Name: value"` header line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderLineError {
    #[error("'{0}' must be of the form 'Name: value'")]
    Malformed(String),
    #[error("invalid header name '{0}'")]
    InvalidName(String),
    #[error("invalid value for header '{0}'")]
    InvalidValue(String),
}

/// Splits a static header line on its first `:` into a validated name and value.
pub fn parse_header_line(line: &str) -> Result<(HeaderName, HeaderValue), HeaderLineError> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| HeaderLineError::Malformed(line.to_string()))?;
    let (name, value) = (name.trim(), value.trim());

    if name.is_empty() {
        return Err(HeaderLineError::Malformed(line.to_string()));
    }

    let header_name =
        HeaderName::from_str(name).map_err(|_| HeaderLineError::InvalidName(name.to_string()))?;
    let header_value =
        HeaderValue::from_str(value).map_err(|_| HeaderLineError::InvalidValue(name.to_string()))?;

    Ok((header_name, header_value))
}

/// Everything a method declares about request headers.
///
/// Merge order at call time, later winning on collision: persistent caller headers,
/// `statics`, `params`, `maps`.
#[derive(Debug, Clone, Default)]
pub struct HeaderSpec {
    pub statics: Vec<(HeaderName, HeaderValue)>,
    /// A static `Content-Type` header. It overrides the body's own media type instead of
    /// being sent as a plain header.
    pub content_type: Option<String>,
    pub params: Vec<BoundParam>,
    pub maps: Vec<BoundParam>,
}

impl HeaderSpec {
    pub(crate) fn add_static(&mut self, name: HeaderName, value: HeaderValue) {
        if name == CONTENT_TYPE
            && let Ok(content_type) = value.to_str()
        {
            self.content_type = Some(content_type.to_string());
            return;
        }
        self.statics.push((name, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_line_splits_on_first_colon() {
        let (name, value) = parse_header_line("X-Trace: a:b:c").unwrap();
        assert_eq!(name.as_str(), "x-trace");
        assert_eq!(value.to_str().unwrap(), "a:b:c");
    }

    #[test]
    fn header_line_without_separator_is_malformed() {
        assert_eq!(
            parse_header_line("Accept application/json"),
            Err(HeaderLineError::Malformed("Accept application/json".into()))
        );
        assert_eq!(
            parse_header_line(": value"),
            Err(HeaderLineError::Malformed(": value".into()))
        );
    }

    #[test]
    fn header_line_with_illegal_name() {
        assert_eq!(
            parse_header_line("Bad Name: x"),
            Err(HeaderLineError::InvalidName("Bad Name".into()))
        );
    }

    #[test]
    fn static_content_type_is_kept_apart() {
        let mut spec = HeaderSpec::default();
        let (name, value) = parse_header_line("Content-Type: text/xml").unwrap();
        spec.add_static(name, value);

        assert!(spec.statics.is_empty());
        assert_eq!(spec.content_type.as_deref(), Some("text/xml"));
    }
}
