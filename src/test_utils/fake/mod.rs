mod document_store;
mod kv_store;
mod static_adapter;

pub use coordination::*;
pub use document_store::*;
pub use kv_store::*;
pub use static_adapter::*;
