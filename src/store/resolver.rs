//! Address -> URL resolution for remote block stores

use crate::model::Address;

/// Placeholder replaced with the hex address in a [`UrlTemplate`]
pub const ADDRESS_PLACEHOLDER: &str = "{address}";

/// Turns a content address into a URL
///
/// Separate resolvers locate retrieval (source) and submission or pinning
/// (sink) endpoints.
pub trait UrlResolver: Send + Sync {
    fn url(&self, address: &Address) -> String;
}

impl<F> UrlResolver for F
where
    F: Fn(&Address) -> String + Send + Sync,
{
    fn url(&self, address: &Address) -> String {
        self(address)
    }
}

/// A URL with an `{address}` placeholder
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UrlTemplate(String);

impl UrlTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        UrlTemplate(template.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether the template varies with the address
    pub fn has_placeholder(&self) -> bool {
        self.0.contains(ADDRESS_PLACEHOLDER)
    }
}

impl UrlResolver for UrlTemplate {
    fn url(&self, address: &Address) -> String {
        self.0.replace(ADDRESS_PLACEHOLDER, &address.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_substitution() {
        let address = Address::digest(b"block");
        let source = UrlTemplate::new("https://gateway.example/ipfs/{address}/");
        assert_eq!(
            source.url(&address),
            format!("https://gateway.example/ipfs/{}/", address.to_hex())
        );
        assert!(source.has_placeholder());
        assert!(!UrlTemplate::new("https://sink.example/put").has_placeholder());
    }

    #[test]
    fn test_closure_resolver() {
        let address = Address::digest(b"block");
        let resolver = |a: &Address| format!("pin/{}", a.short());
        assert_eq!(resolver.url(&address), format!("pin/{}", address.short()));
    }
}
