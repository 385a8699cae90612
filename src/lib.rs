pub mod accumulator;
pub mod fetch;
pub mod filter;
pub mod listing;
pub mod merge;
pub mod model;
pub mod orderer;
pub mod output;
pub mod parser;
pub mod stop;

pub use model::{Direction, Pass, StopRequest, TripRecord};
pub use orderer::StopBoard;
pub use stop::process_stop;
