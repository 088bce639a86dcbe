pub mod container;
pub mod coordinator;

pub use container::{Container, ContainerConfig};
pub use coordinator::{CacheSizes, Coordinator, CoordinatorConfig};
