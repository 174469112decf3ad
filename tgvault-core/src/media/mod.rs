pub mod classifier;
pub mod video;

pub use classifier::{classify, ClassificationInput};
pub use video::VideoGeometry;
