//! Finalize notifications describing a freshly written object.

use serde::{Deserialize, Serialize};

/// Path prefix under which uploaded certificate images are analysed.
pub const DEFAULT_WATCH_PREFIX: &str = "certificates/";

/// Descriptor of one finalized object, as delivered by the storage trigger.
///
/// Object names follow `<prefix><certificateId>_<timestamp>.<ext>`; only
/// `name` and `bucket` are required on the wire.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StorageObject {
    /// Full slash-delimited object path.
    pub name: String,

    /// Container the object was written to.
    pub bucket: String,
}

impl StorageObject {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bucket: bucket.into(),
        }
    }

    /// Whether the object lives under the watched prefix.
    pub fn is_eligible(&self, prefix: &str) -> bool {
        self.name.starts_with(prefix)
    }

    /// Base file name (the segment after the last `/`).
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Certificate identifier encoded in the file name: everything before the
    /// first `_`, or the whole base name when there is no separator.
    pub fn certificate_id(&self) -> &str {
        let file_name = self.file_name();
        file_name.split('_').next().unwrap_or(file_name)
    }
}
