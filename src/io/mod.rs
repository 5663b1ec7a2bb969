//! Transport abstraction between party-shards, and the one concrete
//! transport this crate ships: an in-process simulated bus.
//!
//! Grounded on `drivacy/io/simulated_socket.h`'s `Socket`/`SimulatedSocket`
//! pair, reframed as explicit dependency injection (an owned registry
//! passed around, never a global/static map) per the design notes on
//! avoiding back-pointers and shared mutable statics.

pub mod socket;

pub use socket::{Envelope, Payload, SimulatedBus, Socket};
