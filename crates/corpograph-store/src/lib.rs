pub mod error;
pub mod migrations;
pub mod payload;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use payload::{EdgePayload, NodePayload, NodePayloadList};
pub use store::{GraphStore, StoreConfig};
pub use types::{EdgeRecord, GraphExport, NodeRecord};
