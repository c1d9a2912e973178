pub mod battery;
pub mod order;
pub mod plan;
pub mod prices;
pub mod reservation;

pub use battery::*;
pub use order::*;
pub use plan::*;
pub use prices::*;
pub use reservation::*;
