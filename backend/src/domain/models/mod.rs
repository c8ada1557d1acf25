pub mod attendance;
pub mod intake;
pub mod parent_access;

pub use attendance::*;
pub use intake::*;
pub use parent_access::*;
