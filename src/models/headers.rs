//! Ordered, case-insensitive HTTP header list.

use serde::{Deserialize, Serialize};

/// A single header as it was written by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    pub value: String,
}

impl HttpHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Header list that keeps insertion order and matches names without regard
/// to ASCII case. Updating an existing name replaces that entry in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HttpHeaders {
    headers: Vec<HttpHeader>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.name.eq_ignore_ascii_case(name))
    }

    /// Case-insensitively update or append a header.
    pub fn update(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let header = HttpHeader::new(name, value);
        match self.index_of(&header.name) {
            Some(index) => self.headers[index] = header,
            None => self.headers.push(header),
        }
    }

    /// Case-insensitively remove a header. Returns the removed entry.
    pub fn remove(&mut self, name: &str) -> Option<HttpHeader> {
        self.index_of(name).map(|index| self.headers.remove(index))
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.index_of(name).map(|index| self.headers[index].value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HttpHeader> {
        self.headers.iter()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl<N, V> FromIterator<(N, V)> for HttpHeaders
where
    N: Into<String>,
    V: Into<String>,
{
    /// Duplicate names collapse into the last value seen.
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = HttpHeaders::new();
        for (name, value) in iter {
            headers.update(name, value);
        }
        headers
    }
}

impl<'a> IntoIterator for &'a HttpHeaders {
    type Item = &'a HttpHeader;
    type IntoIter = std::slice::Iter<'a, HttpHeader>;

    fn into_iter(self) -> Self::IntoIter {
        self.headers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_replaces_case_insensitively_in_place() {
        let mut headers: HttpHeaders =
            [("Accept", "*/*"), ("X-Trace", "1")].into_iter().collect();
        headers.update("accept", "application/json");

        let names: Vec<_> = headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["accept", "X-Trace"]);
        assert_eq!(headers.value("ACCEPT"), Some("application/json"));
    }

    #[test]
    fn remove_ignores_case() {
        let mut headers: HttpHeaders = [("Cookie", "a=b")].into_iter().collect();
        assert!(headers.remove("cookie").is_some());
        assert!(headers.is_empty());
        assert!(headers.remove("cookie").is_none());
    }

    #[test]
    fn duplicates_collapse_to_last_value() {
        let headers: HttpHeaders = [("A", "1"), ("a", "2")].into_iter().collect();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.value("A"), Some("2"));
    }
}
