pub mod registry;

pub use registry::{TaskControlPlane, TaskControlPlaneDeps, TaskSnapshot};
