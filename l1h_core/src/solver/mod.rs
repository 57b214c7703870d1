
mod operator;
mod backend;
mod solver_error;
mod param;
mod tracker;

pub use operator::*;
pub use backend::*;
pub use solver_error::*;
pub use param::*;
pub use tracker::*;
