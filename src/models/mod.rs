pub mod settings;
pub mod stream;
