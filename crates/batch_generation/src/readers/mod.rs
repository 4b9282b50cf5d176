pub mod image_dir;

pub use image_dir::{ImageFolderSource, DEFAULT_EXTENSIONS};
