pub mod codec;
pub mod store;

pub use codec::{compare, normalize, split_components, VersionComponents};
pub use store::{RecordLayout, VersionRecord, VersionStore};
