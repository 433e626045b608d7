use std::thread::{self, JoinHandle};

use log::debug;

use super::{BuildOptions, MeshBvh, SerializeOptions, SerializedBvh};
use crate::{BuildError, Geometry};

/// A build running on its own thread over a private copy of the geometry
#[derive(Debug)]
pub struct BackgroundBuild {
    handle: JoinHandle<Result<SerializedBvh, BuildError>>,
}

impl BackgroundBuild {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker. The result owns its buffers; pass it to [`MeshBvh::deserialize`]
    /// with the caller's geometry to install the reordered index.
    pub fn join(self) -> Result<SerializedBvh, BuildError> {
        self.handle.join().map_err(|_| BuildError::WorkerPanic)?
    }
}

/// Start building a hierarchy for `geometry` on a worker thread. The geometry is copied,
/// so the caller's buffers are not touched until the result is deserialized.
pub fn build_in_background(geometry: &Geometry, options: BuildOptions) -> BackgroundBuild {
    let mut geometry = geometry.deep_clone();
    let handle = thread::spawn(move || {
        let bvh = MeshBvh::new(&mut geometry, options)?;
        debug!("background build finished with {} roots", bvh.roots().len());
        // the worker's copy is dropped here, so nothing else aliases the result
        Ok(bvh.serialize(SerializeOptions { clone_buffers: false }))
    });
    BackgroundBuild { handle }
}
