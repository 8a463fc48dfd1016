//! Error conversions between the auth libraries and `NimaError`.

mod conversions;

pub use conversions::InfraError;
