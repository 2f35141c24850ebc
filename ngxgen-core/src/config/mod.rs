//! The canonical configuration model

mod loader;
mod patch;
pub mod presets;
mod tls;
mod types;

pub use loader::ConfigLoader;
pub use patch::*;
pub use tls::TlsPresetSpec;
pub use types::*;
