use std::{fmt, str::FromStr};

use http::{Method, Request};

/// Transport-level tag of an inbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    #[default]
    Http,
    /// An HTTP request asking to switch protocols.
    HttpUpgrade,
    /// An HTTP CONNECT request.
    HttpConnect,
    /// A message arriving on an established websocket.
    Ws,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown protocol tag: {0}")]
pub struct UnknownProtocol(pub String);

impl Protocol {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::HttpUpgrade => "http.upgrade",
            Protocol::HttpConnect => "http.connect",
            Protocol::Ws => "ws",
        }
    }

    /// Guess the tag of a plain HTTP request. Websocket traffic is never detected here, the
    /// websocket transport assigns [`Protocol::Ws`] itself.
    pub fn detect<B>(request: &Request<B>) -> Self {
        if request.method() == Method::CONNECT {
            Protocol::HttpConnect
        } else if request.headers().contains_key(http::header::UPGRADE) {
            Protocol::HttpUpgrade
        } else {
            Protocol::Http
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Protocol::Http),
            "http.upgrade" => Ok(Protocol::HttpUpgrade),
            "http.connect" => Ok(Protocol::HttpConnect),
            "ws" => Ok(Protocol::Ws),
            other => Err(UnknownProtocol(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        let req = Request::get("/").body(()).unwrap();
        assert_eq!(Protocol::detect(&req), Protocol::Http);

        let req = Request::get("/chat")
            .header(http::header::UPGRADE, "websocket")
            .body(())
            .unwrap();
        assert_eq!(Protocol::detect(&req), Protocol::HttpUpgrade);

        let req = Request::connect("example.com:443").body(()).unwrap();
        assert_eq!(Protocol::detect(&req), Protocol::HttpConnect);
    }

    #[test]
    fn test_tags() {
        for p in [
            Protocol::Http,
            Protocol::HttpUpgrade,
            Protocol::HttpConnect,
            Protocol::Ws,
        ] {
            assert_eq!(p.as_str().parse::<Protocol>(), Ok(p));
        }
        assert_eq!(
            "gopher".parse::<Protocol>(),
            Err(UnknownProtocol("gopher".to_string()))
        );
    }
}
