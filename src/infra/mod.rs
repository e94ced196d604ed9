pub mod poll;
pub mod probe;
