// 存储抽象层模块

pub mod local;
pub mod traits;
pub mod upload;

pub use local::LocalStorage;
pub use traits::Storage;
pub use upload::{allowed_extension, save_upload, UploadError, UploadPolicy};
