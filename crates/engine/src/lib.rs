pub mod allocation;
pub mod poller;
pub mod trader;

pub use allocation::*;
pub use poller::*;
pub use trader::*;
