//! Route definitions for the PrestAmigo API

mod capital;
mod loan;
mod profile;
mod proof;

pub use capital::capital_routes;
pub use loan::loan_routes;
pub use profile::profile_routes;
pub use proof::proof_routes;
