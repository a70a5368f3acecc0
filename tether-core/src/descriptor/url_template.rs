use std::fmt;

/// One piece of a method URL: verbatim text or a `{name}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unexpected '{{' inside placeholder at offset {0}")]
    NestedOpen(usize),
    #[error("unexpected '}}' outside a placeholder at offset {0}")]
    StrayClose(usize),
    #[error("placeholder opened at offset {0} is never closed")]
    Unterminated(usize),
}

/// The method-level URL, split into alternating literal and placeholder segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl UrlTemplate {
    /// Scans the template once; every `{` or `}` toggles between literal and placeholder
    /// accumulation. Zero-length runs produce no segment.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut open_at: Option<usize> = None;

        for (offset, c) in source.char_indices() {
            match (c, open_at) {
                ('{', None) => {
                    if !current.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut current)));
                    }
                    open_at = Some(offset);
                }
                ('{', Some(_)) => return Err(TemplateError::NestedOpen(offset)),
                ('}', Some(_)) => {
                    if !current.is_empty() {
                        segments.push(Segment::Placeholder(std::mem::take(&mut current)));
                    }
                    open_at = None;
                }
                ('}', None) => return Err(TemplateError::StrayClose(offset)),
                (c, _) => current.push(c),
            }
        }

        if let Some(offset) = open_at {
            return Err(TemplateError::Unterminated(offset));
        }
        if !current.is_empty() {
            segments.push(Segment::Literal(current));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Placeholder names in template order. Repeated names appear once per occurrence.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Whether the template is a complete URL rather than a path relative to a base URL.
    pub fn is_absolute(&self) -> bool {
        let lower = self.source.to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }

    /// Whether the template carries its own static query string.
    pub fn has_query(&self) -> bool {
        self.source.contains('?')
    }

    /// Rejoins the segments, filling each placeholder through `fill`.
    pub fn render<E>(
        &self,
        mut fill: impl FnMut(&str) -> Result<String, E>,
    ) -> Result<String, E> {
        let mut url = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => url.push_str(text),
                Segment::Placeholder(name) => url.push_str(&fill(name)?),
            }
        }
        Ok(url)
    }
}

impl fmt::Display for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// `[a-zA-Z][a-zA-Z0-9_-]*`
pub(crate) fn is_valid_placeholder(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
