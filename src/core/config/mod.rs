pub mod layout;
pub mod remote;
pub mod settings;

pub use layout::InstallLayout;
pub use remote::{RemoteConfig, ReplaceFolderName};
pub use settings::{default_base_dir, HttpSettings, UpdaterSettings};
