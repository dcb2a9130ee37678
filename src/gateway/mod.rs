mod object_store;
mod path;
mod submit;
mod sweep;
#[cfg(test)]
mod tests;

pub use object_store::{validate_key, LocalObjectStore, ObjectStore, UploadReceipt};
pub use path::storage_key;
pub use submit::{PhotoRecorder, SubmitGateway};
pub use sweep::{sweep_orphans, SweepReport};
