pub mod decision;
pub mod intervention;
pub mod plant;
pub mod weather;

pub use decision::*;
pub use intervention::*;
pub use plant::*;
pub use weather::*;
