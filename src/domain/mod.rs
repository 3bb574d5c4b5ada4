//! Domain layer - contract bindings

pub mod counter;

pub use counter::CounterContract;
