//! Object detection behind an opaque backend trait.
//!
//! - `DetectorBackend`: frame + threshold in, labelled boxes out.
//! - `ModelHandle`: the model loaded once at startup and shared by reference.
//! - Backends: `stub` (no detections), `scripted` (JSON-lines replay) and,
//!   with the `backend-tract` feature, `tract` (YOLO-style ONNX models).

mod backend;
mod backends;
mod loader;
mod nms;
mod result;

pub use backend::DetectorBackend;
pub use backends::{ScriptedBackend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use loader::ModelHandle;
pub use nms::non_max_suppression;
pub use result::{BBox, Detection};
