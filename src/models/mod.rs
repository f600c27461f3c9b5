pub mod case;
pub mod enums;
pub mod recommendation;

pub use case::*;
pub use enums::*;
pub use recommendation::*;
