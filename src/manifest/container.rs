//! Manifest container access

use std::path::Path;

/// Logical name of the manifest container object (`manifest.unity3d`)
pub const MANIFEST_NAME: &str = "manifest";

/// A named text asset extracted from a container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextAsset {
    /// Asset name (`m_Name`), e.g. `Bundle`
    pub name: String,
    /// Raw payload (`m_Script`), still encrypted
    pub bytes: Vec<u8>,
}

/// Reads text assets out of a downloaded asset-bundle container
///
/// Implemented by the embedding application on top of a Unity bundle reader.
/// Called from a blocking thread, so implementations may do synchronous I/O.
pub trait ContainerReader: Send + Sync {
    /// List every text asset in the container at `path`, in container order
    fn read_text_assets(&self, path: &Path) -> crate::Result<Vec<TextAsset>>;
}
