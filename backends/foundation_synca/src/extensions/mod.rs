pub mod serde_ext;
pub mod tokio_ext;
