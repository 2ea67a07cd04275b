pub mod child;
pub mod registry;

pub use child::{ChildHandle, ExitStatus, SpawnOptions, Supervisor};
pub use registry::{ProcessRegistry, RegistryDocument};
