pub mod attribution;
pub mod normalize;
pub mod synthetic;
