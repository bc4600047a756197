use std::{collections::HashMap, fmt};

use monoroute_core::Endpoint;

/// Named endpoints a declarative routing tree may refer to.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    endpoints: HashMap<String, Endpoint>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, endpoint: Endpoint) -> Self {
        self.register(name, endpoint);
        self
    }

    /// Register `endpoint` under `name`, returning the endpoint it replaced.
    pub fn register(&mut self, name: impl Into<String>, endpoint: Endpoint) -> Option<Endpoint> {
        self.endpoints.insert(name.into(), endpoint)
    }

    pub fn get(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(name)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.endpoints.keys().collect();
        names.sort();
        f.debug_tuple("HandlerRegistry").field(&names).finish()
    }
}
