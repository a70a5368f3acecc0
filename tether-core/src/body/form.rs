use crate::content::BodyContent;
use url::form_urlencoded::byte_serialize;

pub const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

/// Ordered `name=value` pairs, stored already escaped.
///
/// Also used to build query strings, which follow the same escaping rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormBody {
    pairs: Vec<(String, String)>,
}

impl FormBody {
    /// Appends a pair. When `encoded` is true, name and value are taken verbatim.
    pub fn add(&mut self, name: &str, value: &str, encoded: bool) {
        let (name, value) = if encoded {
            (name.to_string(), value.to_string())
        } else {
            (escape(name), escape(value))
        };
        self.pairs.push((name, value));
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// `name=value` pairs joined with `&`, in insertion order.
    pub fn serialize(&self) -> String {
        self.pairs
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn encode(&self) -> BodyContent {
        BodyContent::new(FORM_MEDIA_TYPE, self.serialize()).with_charset("UTF-8")
    }
}

fn escape(text: &str) -> String {
    byte_serialize(text.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_escaped_and_joined_in_order() {
        let mut form = FormBody::default();
        form.add("a", "x", false);
        form.add("b", "y, z", false);

        assert_eq!(form.serialize(), "a=x&b=y%2C+z");
        assert_eq!(form.len(), 2);
    }

    #[test]
    fn encoded_pairs_are_kept_verbatim() {
        let mut form = FormBody::default();
        form.add("q", "a%20b", true);
        form.add("q", "a%20b", false);

        assert_eq!(form.serialize(), "q=a%20b&q=a%2520b");
    }

    #[test]
    fn names_are_escaped_too() {
        let mut form = FormBody::default();
        form.add("first name", "Ada&Co", false);
        assert_eq!(form.serialize(), "first+name=Ada%26Co");
    }

    #[test]
    fn empty_form_serializes_to_nothing() {
        let form = FormBody::default();
        assert!(form.is_empty());
        assert_eq!(form.serialize(), "");
    }
}
