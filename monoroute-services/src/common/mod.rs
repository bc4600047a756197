mod responder;

pub use responder::InternalErrorResponder;
