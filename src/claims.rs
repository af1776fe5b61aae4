use std::collections::HashMap;

/// Claims carried by the caller's bearer token.
pub trait Claims: Send + Sync {
    /// Returns the raw encoded token, if the caller presented one.
    fn raw_token(&self) -> Option<&str>;

    /// Returns the value of a claim by name.
    fn claim(&self, name: &str) -> Option<String>;
}

/// Claims backed by a plain map.
#[derive(Debug, Default, Clone)]
pub struct MapClaims {
    raw_token: Option<String>,
    claims: HashMap<String, String>,
}

impl MapClaims {
    /// Creates claims for a presented token.
    pub fn new(raw_token: impl Into<String>) -> Self {
        Self {
            raw_token: Some(raw_token.into()),
            claims: HashMap::new(),
        }
    }

    /// Creates claims without a raw token.
    pub fn without_token() -> Self {
        Self::default()
    }

    /// Adds a claim.
    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }
}

impl Claims for MapClaims {
    fn raw_token(&self) -> Option<&str> {
        self.raw_token.as_deref()
    }

    fn claim(&self, name: &str) -> Option<String> {
        self.claims.get(name).cloned()
    }
}
