//! Smear render settings.
//!
//! - The `BlurSettings` snapshot every render job carries
//! - The resolution cascade that decides which config file wins
//! - Hardware revalidation of gpu/preset choices after load

pub mod hardware;
pub mod model;
pub mod resolve;

pub use hardware::{GpuType, HardwareCaps};
pub use model::{AdvancedSettings, BlurSettings};
pub use resolve::{ResolvedSettings, LOCAL_CONFIG_FILENAME};
