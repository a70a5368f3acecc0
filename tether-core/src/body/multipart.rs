use crate::content::{BodyContent, RawContent};
use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

pub const MULTIPART_MEDIA_TYPE: &str = "multipart/form-data";

/// One independently typed section of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub name: String,
    pub file_name: Option<String>,
    pub content: BodyContent,
}

/// A `multipart/form-data` body under construction.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    parts: Vec<Part>,
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartBody {
    /// Starts an empty body with a fresh random boundary.
    pub fn new() -> Self {
        Self::with_boundary(Uuid::new_v4().simple().to_string())
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn add_part(&mut self, name: &str, content: BodyContent, file_name: Option<String>) {
        self.parts.push(Part {
            name: name.to_string(),
            file_name,
            content,
        });
    }

    /// Adds caller-supplied raw content with its own media type and file name.
    pub fn add_raw(&mut self, name: &str, raw: &RawContent) {
        self.add_part(name, raw.to_body(), raw.file_name.clone());
    }

    /// Every part is preceded by `--boundary` and the body ends with `--boundary--`.
    pub fn encode(&self) -> BodyContent {
        let mut buf = BytesMut::new();

        for part in &self.parts {
            buf.put_slice(b"--");
            buf.put_slice(self.boundary.as_bytes());
            buf.put_slice(b"\r\n");

            buf.put_slice(b"Content-Disposition: form-data; name=\"");
            buf.put_slice(escape_quoted(&part.name).as_bytes());
            buf.put_u8(b'"');
            if let Some(file_name) = &part.file_name {
                buf.put_slice(b"; filename=\"");
                buf.put_slice(escape_quoted(file_name).as_bytes());
                buf.put_u8(b'"');
            }
            buf.put_slice(b"\r\n");

            if !part.content.media_type.is_empty() {
                buf.put_slice(b"Content-Type: ");
                buf.put_slice(part.content.content_type().as_bytes());
                buf.put_slice(b"\r\n");
            }

            buf.put_slice(b"\r\n");
            buf.put_slice(&part.content.bytes);
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(b"--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(b"--\r\n");

        BodyContent::new(self.media_type(), Bytes::from(buf))
    }

    fn media_type(&self) -> String {
        format!("{MULTIPART_MEDIA_TYPE}; boundary={}", self.boundary)
    }
}

fn escape_quoted(text: &str) -> String {
    text.replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_parts_between_delimiters() {
        let mut body = MultipartBody::with_boundary("XYZ");
        body.add_part("a", BodyContent::text("one"), None);
        body.add_raw(
            "file",
            &RawContent::new("image/png", &b"\x89PNG"[..]).with_file_name("pic.png"),
        );

        let encoded = body.encode();

        assert_eq!(encoded.media_type, "multipart/form-data; boundary=XYZ");
        assert_eq!(encoded.charset, None);

        let expected = b"--XYZ\r\n\
Content-Disposition: form-data; name=\"a\"\r\n\
Content-Type: text/plain;charset=UTF-8\r\n\
\r\n\
one\r\n\
--XYZ\r\n\
Content-Disposition: form-data; name=\"file\"; filename=\"pic.png\"\r\n\
Content-Type: image/png\r\n\
\r\n\
\x89PNG\r\n\
--XYZ--\r\n";
        assert_eq!(&encoded.bytes[..], &expected[..]);
    }

    #[test]
    fn delimiter_count_is_parts_plus_one() {
        let mut body = MultipartBody::new();
        for name in ["a", "b", "c"] {
            body.add_part(name, BodyContent::text(name), None);
        }

        let encoded = body.encode();
        let text = String::from_utf8(encoded.bytes.to_vec()).unwrap();
        let delimiter = format!("--{}", body.boundary());

        assert_eq!(text.matches(&delimiter).count(), 4);
        assert!(text.ends_with(&format!("{delimiter}--\r\n")));
    }

    #[test]
    fn boundaries_are_random() {
        assert_ne!(
            MultipartBody::new().boundary(),
            MultipartBody::new().boundary()
        );
    }

    #[test]
    fn quotes_in_names_are_escaped() {
        let mut body = MultipartBody::with_boundary("b");
        body.add_part("say \"hi\"", BodyContent::text("x"), Some("a\r\nb".into()));

        let text = String::from_utf8(body.encode().bytes.to_vec()).unwrap();
        assert!(text.contains("name=\"say %22hi%22\"; filename=\"a%0D%0Ab\""));
    }
}
