pub mod lifecycle;
pub mod server;
pub mod storage;
