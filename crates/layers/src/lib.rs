pub mod layer;
pub mod palette;
pub mod ramp;
pub mod symbology;

pub use layer::*;
pub use palette::*;
pub use ramp::*;
pub use symbology::*;
