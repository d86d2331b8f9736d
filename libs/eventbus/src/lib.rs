mod bus;
mod handler;

pub use bus::{EventBus, EventLike, Receiver, SendError};
pub use handler::{EventHandler, HandlerContext, HandlerRegistry};
