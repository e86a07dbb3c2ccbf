//! OCI image layer sources.
//!
//! ```text
//!  image/
//!  ├── oci-layout           (OCI layout marker)
//!  ├── index.json           (Image index)
//!  └── blobs/
//!      └── sha256/
//!          ├── <manifest>   (Image manifest)
//!          ├── <config>     (Image configuration)
//!          └── <layers>     (Filesystem layers, tar or tar+gzip)
//! ```

mod image;
mod layers;

pub use image::{OciImage, OciImageConfig};
pub use layers::{stream_error, CancellableReader, FileLayer, Layer, MemoryLayer, LAYER_BUFFER_SIZE};
