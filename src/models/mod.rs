mod inventory;
mod warranty;

pub use inventory::*;
pub use warranty::*;
