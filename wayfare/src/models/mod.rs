mod concept;
mod outcome;
mod place;
mod source;

pub use concept::*;
pub use outcome::*;
pub use place::*;
pub use source::*;
