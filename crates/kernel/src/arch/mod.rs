// Architecture support

pub mod armv7;

pub use armv7::Context;
