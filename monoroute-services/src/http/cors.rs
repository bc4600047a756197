//! Cross-origin resource sharing middleware.
//!
//! [`CorsMiddleware`] writes the `Access-Control-*` headers and a `204 No Content` status, then
//! continues the chain. It is meant for `^` lists of the nodes answering preflight requests,
//! usually behind a method router branch for `OPTIONS`.
use futures::future::LocalBoxFuture;
use http::{
    header::{
        InvalidHeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
        ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS,
        ACCESS_CONTROL_MAX_AGE,
    },
    HeaderValue, StatusCode,
};
use monoroute_core::{AnyResult, Handler, Next, RequestContext};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CorsConfig {
    pub origin: String,
    /// Allow requests carrying cookies or HTTP authentication.
    pub credentials: bool,
    #[serde(deserialize_with = "one_or_many")]
    pub methods: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub headers: Vec<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub expose_headers: Vec<String>,
    /// Seconds a preflight result may be cached.
    pub max_age: u32,
}

impl Default for CorsConfig {
    fn default() -> Self {
        let list =
            |items: &[&str]| -> Vec<String> { items.iter().map(|s| s.to_string()).collect() };
        Self {
            origin: "*".to_string(),
            credentials: true,
            methods: list(&["HEAD", "GET", "OPTIONS"]),
            headers: list(&[
                "Keep-Alive",
                "User-Agent",
                "X-Requested-With",
                "If-Modified-Since",
                "Cache-Control",
                "Content-Type",
            ]),
            expose_headers: list(&["Content-Length"]),
            max_age: 600,
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        OneOrMany::Many(items) => items,
    })
}

/// Header values are rendered once, when the middleware is built.
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    origin: HeaderValue,
    credentials: bool,
    methods: HeaderValue,
    headers: HeaderValue,
    expose_headers: HeaderValue,
    max_age: HeaderValue,
}

impl CorsMiddleware {
    pub fn new(config: &CorsConfig) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            origin: HeaderValue::from_str(&config.origin)?,
            credentials: config.credentials,
            methods: HeaderValue::from_str(&config.methods.join(", "))?,
            headers: HeaderValue::from_str(&config.headers.join(", "))?,
            expose_headers: HeaderValue::from_str(&config.expose_headers.join(", "))?,
            max_age: HeaderValue::from(config.max_age),
        })
    }
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            origin: HeaderValue::from_static("*"),
            credentials: true,
            methods: HeaderValue::from_static("HEAD, GET, OPTIONS"),
            headers: HeaderValue::from_static(
                "Keep-Alive, User-Agent, X-Requested-With, If-Modified-Since, Cache-Control, \
                 Content-Type",
            ),
            expose_headers: HeaderValue::from_static("Content-Length"),
            max_age: HeaderValue::from_static("600"),
        }
    }
}

impl Handler for CorsMiddleware {
    fn handle<'a>(
        &'a self,
        cx: &'a mut RequestContext,
        next: Next,
    ) -> LocalBoxFuture<'a, AnyResult<()>> {
        Box::pin(async move {
            let sink = cx.sink_mut();
            sink.insert_header(ACCESS_CONTROL_ALLOW_ORIGIN, self.origin.clone());
            sink.insert_header(ACCESS_CONTROL_ALLOW_METHODS, self.methods.clone());
            sink.insert_header(ACCESS_CONTROL_ALLOW_HEADERS, self.headers.clone());
            sink.insert_header(ACCESS_CONTROL_EXPOSE_HEADERS, self.expose_headers.clone());
            sink.insert_header(ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
            if self.credentials {
                sink.insert_header(
                    ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                );
            }
            sink.set_status(StatusCode::NO_CONTENT);
            next.run(cx).await
        })
    }
}
