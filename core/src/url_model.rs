//! `Url`: a normalized request target.
//!
//! # Design
//! Each component accepts a small set of input shapes through a per-field
//! enum (`Text`, `PathInput`, `ParamsInput`) built with `From`, so callers can
//! pass strings, byte strings, segment lists or maps without the builder
//! inspecting types at run time. Resolution order per component is: explicit
//! value, then the part split out of a full URL string, then the default.
//!
//! Serialization renders a scheme only together with a netloc (`http` when
//! none was given), falls back to `/` for an empty path and leaves out `?`
//! and `#` entirely when the query or fragment mapping is empty. Query and
//! fragment pairs are form-url-decoded when parsed and form-url-encoded when
//! rendered, so feeding the output back in yields the same string. A `?` or
//! `#` inside a path is percent-encoded on output so it cannot start a query
//! or fragment when the string is parsed again.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::form_urlencoded;

use crate::error::UrlError;

/// Characters escaped when a path is rendered.
const PATH_ESCAPES: &AsciiSet = &CONTROLS.add(b'?').add(b'#');

/// A text component given either as a string or as UTF-8 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Text {
    Str(String),
    Bytes(Vec<u8>),
}

impl Text {
    fn into_string(self) -> Result<String, UrlError> {
        match self {
            Text::Str(s) => Ok(s),
            Text::Bytes(bytes) => {
                String::from_utf8(bytes).map_err(|e| UrlError::InvalidUtf8(e.to_string()))
            }
        }
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Text::Str(s.to_string())
    }
}

impl From<String> for Text {
    fn from(s: String) -> Self {
        Text::Str(s)
    }
}

impl From<&String> for Text {
    fn from(s: &String) -> Self {
        Text::Str(s.clone())
    }
}

impl From<&[u8]> for Text {
    fn from(bytes: &[u8]) -> Self {
        Text::Bytes(bytes.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Text {
    fn from(bytes: &[u8; N]) -> Self {
        Text::Bytes(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Text {
    fn from(bytes: Vec<u8>) -> Self {
        Text::Bytes(bytes)
    }
}

/// A path given as text or as segments to be joined with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathInput {
    Text(Text),
    Segments(Vec<String>),
}

impl PathInput {
    fn resolve(self) -> Result<String, UrlError> {
        match self {
            PathInput::Text(text) => text.into_string(),
            PathInput::Segments(segments) => Ok(segments.join("/")),
        }
    }
}

macro_rules! text_inputs {
    ($target:ident: $($ty:ty),+) => {
        $(
            impl From<$ty> for $target {
                fn from(text: $ty) -> Self {
                    $target::Text(text.into())
                }
            }
        )+
        impl<const N: usize> From<&[u8; N]> for $target {
            fn from(bytes: &[u8; N]) -> Self {
                $target::Text(bytes.into())
            }
        }
    };
}

text_inputs!(PathInput: &str, String, &String, &[u8], Vec<u8>);

impl From<Vec<String>> for PathInput {
    fn from(segments: Vec<String>) -> Self {
        PathInput::Segments(segments)
    }
}

impl From<Vec<&str>> for PathInput {
    fn from(segments: Vec<&str>) -> Self {
        PathInput::Segments(segments.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for PathInput {
    fn from(segments: &[&str]) -> Self {
        PathInput::Segments(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PathInput {
    fn from(segments: [&str; N]) -> Self {
        PathInput::Segments(segments.iter().map(|s| s.to_string()).collect())
    }
}

/// Query or fragment given as `k=v&…` text or as a ready mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamsInput {
    Text(Text),
    Map(Params),
}

impl ParamsInput {
    fn resolve(self) -> Result<Params, UrlError> {
        match self {
            ParamsInput::Text(text) => Params::parse(&text.into_string()?),
            ParamsInput::Map(params) => Ok(params),
        }
    }
}

text_inputs!(ParamsInput: &str, String, &String, &[u8], Vec<u8>);

impl From<Params> for ParamsInput {
    fn from(params: Params) -> Self {
        ParamsInput::Map(params)
    }
}

impl<K: Into<String>, V: Into<String>> From<HashMap<K, V>> for ParamsInput {
    fn from(map: HashMap<K, V>) -> Self {
        ParamsInput::Map(map.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<String>> From<BTreeMap<K, V>> for ParamsInput {
    fn from(map: BTreeMap<K, V>) -> Self {
        ParamsInput::Map(map.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<String>> From<Vec<(K, V)>> for ParamsInput {
    fn from(pairs: Vec<(K, V)>) -> Self {
        ParamsInput::Map(pairs.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for ParamsInput {
    fn from(pairs: [(K, V); N]) -> Self {
        ParamsInput::Map(pairs.into_iter().collect())
    }
}

/// String-to-string mapping for query and fragment parameters.
///
/// Keys are unique; inserting an existing key replaces its value in place.
/// Equality ignores order. Rendering follows insertion order.
#[derive(Debug, Clone, Default)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse `k=v&k=v`, ignoring surrounding `?` and `&`.
    ///
    /// Every segment must contain exactly one `=`.
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let mut params = Params::new();
        let trimmed = raw.trim_matches(|c: char| c == '?' || c == '&');
        if trimmed.is_empty() {
            return Ok(params);
        }

        for pair in trimmed.split('&') {
            let mut parts = pair.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) => params.insert(decode(key)?, decode(value)?),
                _ => return Err(UrlError::MalformedPair(pair.to_string())),
            }
        }
        Ok(params)
    }

    /// Render as `application/x-www-form-urlencoded`.
    pub fn encode(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.0)
            .finish()
    }
}

impl PartialEq for Params {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for Params {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

fn decode(component: &str) -> Result<String, UrlError> {
    let spaced = component.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| UrlError::InvalidUtf8(format!("{component:?}: {e}")))
}

/// Raw netloc, path, query and fragment of a URL string.
#[derive(Debug, Default, PartialEq, Eq)]
struct Split<'a> {
    netloc: &'a str,
    path: &'a str,
    query: &'a str,
    fragment: &'a str,
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn split(raw: &str) -> (String, Split<'_>) {
    let mut rest = raw;
    let mut scheme = String::new();
    if let Some((candidate, after)) = raw.split_once(':') {
        if is_scheme(candidate) {
            scheme = candidate.to_ascii_lowercase();
            rest = after;
        }
    }

    let mut netloc = "";
    if let Some(after) = rest.strip_prefix("//") {
        let end = after.find(|c: char| matches!(c, '/' | '?' | '#')).unwrap_or(after.len());
        netloc = &after[..end];
        rest = &after[end..];
    }

    let (rest, fragment) = rest.split_once('#').unwrap_or((rest, ""));
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));

    (
        scheme,
        Split {
            netloc,
            path,
            query,
            fragment,
        },
    )
}

/// `scheme://netloc/path?query#fragment`, normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Url {
    scheme: Option<String>,
    netloc: Option<String>,
    path: Option<String>,
    query: Params,
    fragment: Params,
}

impl Url {
    pub fn builder() -> UrlBuilder {
        UrlBuilder::default()
    }

    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        Self::builder().url(raw).build()
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    pub fn netloc(&self) -> Option<&str> {
        self.netloc.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn query(&self) -> &Params {
        &self.query
    }

    pub fn fragment(&self) -> &Params {
        &self.fragment
    }
}

impl FromStr for Url {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Url::parse(s)
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = match self.path.as_deref() {
            Some(path) if !path.is_empty() => path,
            _ => "/",
        };

        match self.netloc.as_deref() {
            Some(netloc) => {
                let scheme = self.scheme.as_deref().unwrap_or("http");
                write!(f, "{scheme}://{netloc}")?;
                if !path.starts_with('/') {
                    f.write_str("/")?;
                }
            }
            // keeps a `//`-prefixed path from re-parsing as a netloc
            None if path.starts_with("//") => f.write_str("//")?,
            None => {}
        }
        write!(f, "{}", utf8_percent_encode(path, PATH_ESCAPES))?;

        if !self.query.is_empty() {
            write!(f, "?{}", self.query.encode())?;
        }
        if !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment.encode())?;
        }
        Ok(())
    }
}

/// Collects components for a `Url`; see the module docs for precedence.
#[derive(Debug, Default, Clone)]
pub struct UrlBuilder {
    url: Option<Text>,
    scheme: Option<Text>,
    netloc: Option<Text>,
    path: Option<PathInput>,
    query: Option<ParamsInput>,
    fragment: Option<ParamsInput>,
}

impl UrlBuilder {
    /// A full URL to split; an empty string is ignored.
    pub fn url(mut self, url: impl Into<Text>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn scheme(mut self, scheme: impl Into<Text>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    pub fn netloc(mut self, netloc: impl Into<Text>) -> Self {
        self.netloc = Some(netloc.into());
        self
    }

    pub fn path(mut self, path: impl Into<PathInput>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn query(mut self, query: impl Into<ParamsInput>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn fragment(mut self, fragment: impl Into<ParamsInput>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    pub fn build(self) -> Result<Url, UrlError> {
        let raw = match self.url {
            Some(url) => url.into_string()?,
            None => String::new(),
        };
        let (parsed_scheme, parsed) = if raw.is_empty() {
            (String::new(), Split::default())
        } else {
            split(&raw)
        };

        let scheme = match self.scheme {
            Some(text) => text.into_string()?,
            None => parsed_scheme,
        };
        let netloc = match self.netloc {
            Some(text) => text.into_string()?,
            None => parsed.netloc.to_string(),
        };
        let path = match self.path {
            Some(input) => Some(input.resolve()?),
            None if raw.is_empty() => None,
            None => Some(parsed.path.to_string()),
        };
        let query = match self.query {
            Some(input) => input.resolve()?,
            None => Params::parse(parsed.query)?,
        };
        let fragment = match self.fragment {
            Some(input) => input.resolve()?,
            None => Params::parse(parsed.fragment)?,
        };

        Ok(Url {
            scheme: non_empty(scheme.trim_matches(|c: char| c == ':' || c == '/')),
            netloc: non_empty(netloc.trim_matches('/')),
            path,
            query,
            fragment,
        })
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(raw: &str) -> String {
        Url::parse(raw).unwrap().to_string()
    }

    #[test]
    fn canonical_urls_round_trip() {
        for raw in [
            "https://acme.example-service.net/api/invoices",
            "https://acme.example-service.net/api/invoices?page=2&per_page=50",
            "http://localhost:3000/api/clients/17#section=items",
            "/api/invoices?status=DRAFT",
            "api/recurrings",
            "/",
        ] {
            assert_eq!(render(raw), raw);
        }
    }

    #[test]
    fn reserialization_is_a_fixed_point() {
        for raw in [
            "HTTPS://acme.example-service.net",
            "//acme.example-service.net//",
            "?&q=a+b&name=%C3%A4rger&",
            "http://h/p?x=a%2Bb&y=~tilde#",
            "////double",
            "",
            "/p?a=%25&b=%2541",
        ] {
            let once = render(raw);
            let twice = render(&once);
            assert_eq!(once, twice, "input {raw:?}");
        }
    }

    #[test]
    fn path_delimiters_are_escaped() {
        for (path, rendered) in [
            ("notes#draft", "notes%23draft"),
            ("search?term", "search%3Fterm"),
            ("/a?b#c", "/a%3Fb%23c"),
        ] {
            let url = Url::builder().path(path).build().unwrap();
            assert_eq!(url.path(), Some(path));
            assert_eq!(url.to_string(), rendered);

            let reparsed = Url::parse(rendered).unwrap();
            assert!(reparsed.query().is_empty());
            assert!(reparsed.fragment().is_empty());
            assert_eq!(reparsed.to_string(), rendered);
        }

        let url = Url::builder()
            .netloc("h")
            .path("notes#draft")
            .query("a=1")
            .build()
            .unwrap();
        assert_eq!(url.to_string(), "http://h/notes%23draft?a=1");
        assert_eq!(render(&url.to_string()), url.to_string());
    }

    #[test]
    fn invalid_utf8_escapes_are_rejected() {
        let err = Url::parse("/p?a=%FF").unwrap_err();
        assert!(matches!(err, UrlError::InvalidUtf8(_)), "{err:?}");

        let err = Url::builder().fragment("%C3=x").build().unwrap_err();
        assert!(matches!(err, UrlError::InvalidUtf8(_)), "{err:?}");
    }

    #[test]
    fn query_text_becomes_a_mapping() {
        let url = Url::builder().query("a=1&b=2").build().unwrap();
        let expected: Params = [("b", "2"), ("a", "1")].into_iter().collect();
        assert_eq!(url.query(), &expected);
        assert_eq!(url.query().get("a"), Some("1"));
        assert_eq!(url.to_string(), "/?a=1&b=2");
    }

    #[test]
    fn empty_fragment_is_omitted() {
        let url = Url::builder()
            .url("http://h/p?a=1")
            .fragment("")
            .build()
            .unwrap();
        assert!(url.fragment().is_empty());
        assert_eq!(url.to_string(), "http://h/p?a=1");
    }

    #[test]
    fn pair_without_equals_is_rejected() {
        let err = Url::builder().query("a").build().unwrap_err();
        assert_eq!(err, UrlError::MalformedPair("a".to_string()));

        assert!(Url::builder().fragment("a=b=c").build().is_err());
        assert!(Url::parse("/p?a=1&&b=2").is_err());
    }

    #[test]
    fn segments_are_joined() {
        let url = Url::builder().path(["foo", "bar"]).build().unwrap();
        assert_eq!(url.path(), Some("foo/bar"));
        assert_eq!(url.to_string(), "foo/bar");

        let url = Url::builder()
            .path(vec!["api".to_string(), "invoices".to_string()])
            .netloc("acme.example-service.net")
            .scheme("https")
            .build()
            .unwrap();
        assert_eq!(url.to_string(), "https://acme.example-service.net/api/invoices");
    }

    #[test]
    fn explicit_components_override_parsed_ones() {
        let url = Url::builder()
            .url("http://old.example/x?a=1#f=1")
            .netloc("new.example")
            .query("b=2")
            .build()
            .unwrap();
        assert_eq!(url.to_string(), "http://new.example/x?b=2#f=1");

        let url = Url::builder()
            .url("http://old.example/x?a=1")
            .query(Params::new())
            .build()
            .unwrap();
        assert_eq!(url.to_string(), "http://old.example/x");
    }

    #[test]
    fn scheme_and_netloc_are_stripped() {
        let url = Url::builder()
            .scheme("https://")
            .netloc("//acme.example-service.net/")
            .build()
            .unwrap();
        assert_eq!(url.scheme(), Some("https"));
        assert_eq!(url.netloc(), Some("acme.example-service.net"));
        assert_eq!(url.to_string(), "https://acme.example-service.net/");
    }

    #[test]
    fn scheme_defaults_only_with_netloc() {
        let url = Url::builder().netloc("example.org").path("a").build().unwrap();
        assert_eq!(url.to_string(), "http://example.org/a");

        let url = Url::builder().scheme("https").path("a").build().unwrap();
        assert_eq!(url.to_string(), "a");
    }

    #[test]
    fn byte_strings_are_decoded() {
        let url = Url::builder()
            .url(b"https://acme.example-service.net/api")
            .query(b"x=1".to_vec())
            .build()
            .unwrap();
        assert_eq!(url.to_string(), "https://acme.example-service.net/api?x=1");

        let err = Url::builder().netloc(vec![0xffu8, 0xfe]).build().unwrap_err();
        assert!(matches!(err, UrlError::InvalidUtf8(_)));
    }

    #[test]
    fn mappings_are_encoded() {
        let query = BTreeMap::from([("name", "Müller & Söhne"), ("page", "1")]);
        let url = Url::builder().path("/api/clients").query(query).build().unwrap();
        assert_eq!(
            url.to_string(),
            "/api/clients?name=M%C3%BCller+%26+S%C3%B6hne&page=1"
        );

        let reparsed = Url::parse(&url.to_string()).unwrap();
        assert_eq!(reparsed.query().get("name"), Some("Müller & Söhne"));
    }

    #[test]
    fn empty_input_renders_root() {
        assert_eq!(Url::builder().build().unwrap().to_string(), "/");
        assert_eq!(Url::builder().url("").build().unwrap(), Url::default());
    }

    #[test]
    fn scheme_is_lowercased_when_split() {
        let url: Url = "HTTPS://Acme.example-service.net/x".parse().unwrap();
        assert_eq!(url.scheme(), Some("https"));
        assert_eq!(url.netloc(), Some("Acme.example-service.net"));
    }

    #[test]
    fn split_rules() {
        let (scheme, parts) = split("https://host:8443/a/b?x=1#y=2");
        assert_eq!(scheme, "https");
        assert_eq!(parts.netloc, "host:8443");
        assert_eq!(parts.path, "/a/b");
        assert_eq!(parts.query, "x=1");
        assert_eq!(parts.fragment, "y=2");

        let (scheme, parts) = split("1abc:/rest");
        assert_eq!(scheme, "");
        assert_eq!(parts.path, "1abc:/rest");
    }
}
