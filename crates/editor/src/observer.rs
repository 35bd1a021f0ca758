use std::path::Path;

/// Write-notification seam. The server wires this to the code index so every
/// successful write keeps the index consistent with the filesystem.
pub trait ChangeObserver: Send + Sync {
    fn on_file_changed(&self, path: &Path);
}

/// Observer that ignores everything; the default for tests.
pub struct NullObserver;

impl ChangeObserver for NullObserver {
    fn on_file_changed(&self, _path: &Path) {}
}
