pub use corpograph_store as store;
pub use corpograph_sync as sync;

pub use corpograph_store::{
    EdgePayload, EdgeRecord, GraphExport, GraphStore, NodePayload, NodePayloadList, NodeRecord,
    StoreConfig, StoreError,
};
pub use corpograph_sync::{
    ArangoConfig, ArangoRemote, GraphExporter, RemoteGraph, RemoteHandle, SyncError,
};
