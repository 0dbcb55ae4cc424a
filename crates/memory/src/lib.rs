mod channel;
mod route;

pub use channel::{Call, MemoryChannel};
