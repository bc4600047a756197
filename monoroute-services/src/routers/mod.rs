//! Router variants composing with the tree walk.
//!
//! Every router here is a [`Handler`](monoroute_core::Handler): it pre-processes the context
//! (consumes prefix segments, binds a capture, or picks a branch by request attribute), walks
//! its inner route from the current cursor and continues the chain with whatever the walk
//! appended. They can be stored anywhere a tree expects an endpoint.
mod capture;
mod prefix;
mod select;

pub use capture::CaptureRouter;
pub use prefix::PrefixRouter;
pub use select::{
    ByHostname, ByMethod, ByProtocol, HostnameRouter, KeyExtractor, MethodRouter, ProtocolRouter,
    SelectRouter,
};
