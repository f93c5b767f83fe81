pub mod sse;

pub use sse::SseTransport;
