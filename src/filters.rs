//! Marketplace listing filters and their composition onto product URLs.

use url::Url;

/// Named query-parameter overrides, kept in definition order. Names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    entries: Vec<(String, String)>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters used for the lowest-price page: French sellers, French cards, Near Mint or better.
    pub fn lowest_price() -> Self {
        Self::new()
            .with("sellerCountry", "12")
            .with("language", "2")
            .with("minCondition", "2")
    }

    /// Same as [`FilterSet::lowest_price`], restricted to private sellers.
    pub fn median_price() -> Self {
        Self::new()
            .with("sellerCountry", "12")
            .with("sellerType", "1")
            .with("language", "2")
            .with("minCondition", "2")
    }

    /// Sets `name` to `value`, replacing any earlier value for that name.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Applies `filters` to the query string of `url`.
///
/// Existing parameters are grouped by name in order of first appearance and
/// keep every value they had. A filter whose name already exists replaces
/// that name's whole value list in place; other filters are appended.
pub fn compose(url: &Url, filters: &FilterSet) -> Url {
    let mut params: Vec<(String, Vec<String>)> = Vec::new();
    for (k, v) in url.query_pairs() {
        match params.iter_mut().find(|(name, _)| *name == k) {
            Some((_, values)) => values.push(v.into_owned()),
            None => params.push((k.into_owned(), vec![v.into_owned()])),
        }
    }

    for (name, value) in filters.iter() {
        match params.iter_mut().find(|(n, _)| n == name) {
            Some((_, values)) => *values = vec![value.to_string()],
            None => params.push((name.to_string(), vec![value.to_string()])),
        }
    }

    let mut composed = url.clone();
    if params.is_empty() {
        composed.set_query(None);
        return composed;
    }

    composed.query_pairs_mut().clear().extend_pairs(
        params
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str()))),
    );
    composed
}
