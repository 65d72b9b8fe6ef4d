mod adapter;
mod codec;
mod fetch;
mod naming;
mod segment;
mod writer;

pub use adapter::*;
pub use codec::*;
pub use fetch::*;
pub use naming::*;
pub use segment::*;
pub use writer::*;

#[macro_use]
extern crate log;
