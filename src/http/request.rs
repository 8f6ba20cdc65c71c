use std::collections::BTreeMap;

use serde_json::Value;

use super::method::HttpMethod;

#[derive(Debug, Clone, PartialEq)]
pub struct RequestInput {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

impl RequestInput {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
            query: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Short label used in logs and setup diagnostics, e.g. `GET /products/6`.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// A `(method, path template)` pair such as `(GET, "/products/{id}")`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub template: &'static str,
}

impl Endpoint {
    pub const fn new(method: HttpMethod, template: &'static str) -> Self {
        Self { method, template }
    }

    /// Substitute `{name}` placeholders with percent-encoded values. Every
    /// placeholder must be provided.
    pub fn render(&self, params: &BTreeMap<&str, String>) -> Result<String, String> {
        let mut rendered = String::with_capacity(self.template.len());
        let mut rest = self.template;

        while let Some(start) = rest.find('{') {
            rendered.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after
                .find('}')
                .ok_or_else(|| format!("Unclosed placeholder in `{}`", self.template))?;
            let name = &after[..end];
            let value = params
                .get(name)
                .ok_or_else(|| format!("Missing path parameter `{name}` for `{}`", self.template))?;
            rendered.push_str(&urlencoding::encode(value));
            rest = &after[end + 1..];
        }
        rendered.push_str(rest);

        Ok(rendered)
    }

    /// Build a request for this endpoint with path parameters substituted.
    pub fn request(&self, params: &[(&str, String)]) -> Result<RequestInput, String> {
        let params: BTreeMap<&str, String> = params.iter().cloned().collect();
        Ok(RequestInput::new(self.method, self.render(&params)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT: Endpoint = Endpoint::new(HttpMethod::Get, "/products/{id}");

    #[test]
    fn render_substitutes_placeholders() {
        let request = PRODUCT.request(&[("id", "7".to_string())]).unwrap();
        assert_eq!(request.path, "/products/7");
        assert_eq!(request.method, HttpMethod::Get);
    }

    #[test]
    fn render_encodes_reserved_characters() {
        let endpoint = Endpoint::new(HttpMethod::Get, "/products/category/{category}");
        let request = endpoint
            .request(&[("category", "men's clothing/../?x#y".to_string())])
            .unwrap();
        assert_eq!(
            request.path,
            "/products/category/men%27s%20clothing%2F..%2F%3Fx%23y"
        );
    }

    #[test]
    fn render_fills_several_placeholders() {
        let endpoint = Endpoint::new(HttpMethod::Get, "/carts/{cart}/items/{item}");
        let request = endpoint
            .request(&[("item", "3".to_string()), ("cart", "12".to_string())])
            .unwrap();
        assert_eq!(request.path, "/carts/12/items/3");
    }

    #[test]
    fn render_without_placeholders_is_identity() {
        let endpoint = Endpoint::new(HttpMethod::Get, "/products");
        assert_eq!(endpoint.render(&BTreeMap::new()).unwrap(), "/products");
    }

    #[test]
    fn render_rejects_missing_parameters() {
        let err = PRODUCT.render(&BTreeMap::new()).unwrap_err();
        assert!(err.contains("`id`"));
    }

    #[test]
    fn render_rejects_unclosed_placeholder() {
        let endpoint = Endpoint::new(HttpMethod::Get, "/products/{id");
        assert!(endpoint.render(&BTreeMap::new()).is_err());
    }

    #[test]
    fn builder_collects_headers_and_query() {
        let request = RequestInput::get("/products")
            .header("Accept", "application/json")
            .query("limit", "5");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.query, vec![("limit".to_string(), "5".to_string())]);
        assert_eq!(request.label(), "GET /products");
    }
}
