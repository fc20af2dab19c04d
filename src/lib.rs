#![deny(clippy::dbg_macro)]
#![deny(clippy::print_stderr)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod cli;
pub mod error;
pub mod map;
pub mod search;

mod entities;
mod render;
mod sources;
mod utils;

pub use entities::Envelope;
pub use entities::apartment::{Apartment, ApartmentResults, GeoPoint};
pub use sources::apartments::ApartmentSearchClient;
pub use sources::auth::Session;
