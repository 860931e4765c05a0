use std::collections::HashMap;

/// HTTP request methods.
///
/// Unknown tokens are preserved as [`Method::Other`] (normalized to
/// uppercase) so that routing can still answer 404/405 for them; parsing
/// never rejects a request because of its method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    /// GET - Retrieve a resource
    Get,
    /// POST - Create or submit data
    Post,
    /// PUT - Replace a resource
    Put,
    /// DELETE - Delete a resource
    Delete,
    /// HEAD - Like GET but without the response body
    Head,
    /// OPTIONS - Describe communication options
    Options,
    /// PATCH - Partial modification of a resource
    Patch,
    /// Any other method token, folded to uppercase
    Other(String),
}

impl Method {
    /// Parses an HTTP method token, case-insensitively.
    ///
    /// # Example
    ///
    /// ```
    /// # use lantern::http::request::Method;
    /// assert_eq!(Method::from_token("GET"), Method::Get);
    /// assert_eq!(Method::from_token("get"), Method::Get);
    /// assert_eq!(Method::from_token("BREW"), Method::Other("BREW".to_string()));
    /// ```
    pub fn from_token(s: &str) -> Self {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            "PATCH" => Method::Patch,
            _ => Method::Other(upper),
        }
    }

    /// Returns the canonical uppercase token.
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
            Method::Other(s) => s,
        }
    }
}

/// Represents a parsed HTTP request from a client.
///
/// Header keys are lowercased before insertion; duplicate headers are
/// last-write-wins. The path never carries a query string.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method (GET, POST, etc.)
    pub method: Method,
    /// The request path without any query string (e.g., "/index.html")
    pub path: String,
    /// HTTP version (typically "HTTP/1.1")
    pub version: String,
    /// Request headers, keys lowercased
    pub headers: HashMap<String, String>,
    /// Request body for POST/PUT requests
    pub body: Vec<u8>,
    /// Path parameters bound by a parameterized route, empty otherwise
    pub params: HashMap<String, String>,
}

impl Request {
    /// Retrieves a header value by its lowercase name.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|v| v.as_str())
    }

    /// Retrieves a path parameter bound by the matched route.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|v| v.as_str())
    }

    /// Determines whether the connection should remain open after the response.
    ///
    /// Only an explicit `Connection: keep-alive` keeps the connection open;
    /// anything else, including an absent header, closes it.
    pub fn keep_alive(&self) -> bool {
        self.header("connection")
            .map(|v| v.eq_ignore_ascii_case("keep-alive"))
            .unwrap_or(false)
    }
}

/// Builder for constructing Request objects, mostly useful in tests
/// and for synthesizing requests outside the parser.
pub struct RequestBuilder {
    method: Method,
    path: Option<String>,
    version: Option<String>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl RequestBuilder {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            path: None,
            version: None,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Adds a header; the key is lowercased like the parser does.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn build(self) -> Request {
        Request {
            method: self.method,
            path: self.path.unwrap_or_else(|| "/".to_string()),
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            body: self.body,
            params: HashMap::new(),
        }
    }
}
