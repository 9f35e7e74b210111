use http::header::HeaderMap;

use crate::helpers;

/// An ordered multimap of header fields.
///
/// Names are case-preserved exactly as they appeared on the wire (or were
/// appended), repeated names are kept, and iteration order is insertion
/// order — the three properties byte-identical re-serialization depends on.
/// Lookup by name is ASCII-case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    fields: Vec<(String, String)>,
}

impl HeaderFields {
    pub fn new() -> HeaderFields {
        HeaderFields::default()
    }

    /// Appends a field, keeping any existing fields with the same name.
    ///
    /// The name and value are not validated here; serialization rejects
    /// names that are not RFC 7230 tokens and values containing CR or LF.
    pub fn append<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        self.fields.push((name.into(), value.into()));
    }

    /// Returns the first value for `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value for `name` in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.fields
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Converts to an [`http::HeaderMap`] for interop with hyper-style
    /// servers. Name case is lost (`HeaderMap` lowercases names); order and
    /// repeated names are kept.
    pub fn to_header_map(&self) -> crate::Result<HeaderMap> {
        helpers::to_header_map(self)
    }

    /// Builds `HeaderFields` from an [`http::HeaderMap`].
    ///
    /// Fails with [`Error::DecodeHeaderValue`](crate::Error::DecodeHeaderValue)
    /// on values that are not visible ASCII.
    pub fn from_header_map(map: &HeaderMap) -> crate::Result<HeaderFields> {
        helpers::from_header_map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_multimap() {
        let mut fields = HeaderFields::new();
        fields.append("X-A", "1");
        fields.append("X-B", "2");
        fields.append("X-A", "3");

        assert_eq!(fields.len(), 3);
        assert_eq!(fields.get("X-A"), Some("1"));
        assert_eq!(fields.get_all("X-A").collect::<Vec<_>>(), vec!["1", "3"]);
        assert_eq!(
            fields.iter().map(|(n, _)| n).collect::<Vec<_>>(),
            vec!["X-A", "X-B", "X-A"]
        );
    }

    #[test]
    fn test_case_insensitive_lookup_case_preserving_storage() {
        let mut fields = HeaderFields::new();
        fields.append("Content-Disposition", "form-data");

        assert_eq!(fields.get("content-disposition"), Some("form-data"));
        assert_eq!(fields.get("CONTENT-DISPOSITION"), Some("form-data"));
        assert_eq!(fields.iter().next(), Some(("Content-Disposition", "form-data")));
    }

    #[test]
    fn test_header_map_round_trip() {
        let mut fields = HeaderFields::new();
        fields.append("X-One", "a");
        fields.append("X-One", "b");
        fields.append("Content-Type", "text/plain");

        let map = fields.to_header_map().unwrap();
        assert_eq!(map.get_all("x-one").iter().count(), 2);

        let back = HeaderFields::from_header_map(&map).unwrap();
        assert_eq!(back.get_all("x-one").collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(back.get("content-type"), Some("text/plain"));
    }
}
