pub mod console;
pub mod endpoint;
pub mod events;
pub mod logging;
pub mod probe;
pub mod shield;
