pub mod entitlement;
pub mod invoice;
pub mod plan;
pub mod subscription;

pub use entitlement::*;
pub use invoice::*;
pub use plan::*;
pub use subscription::*;
