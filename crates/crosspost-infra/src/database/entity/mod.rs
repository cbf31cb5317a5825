//! SeaORM entities for the publish tables.

pub mod destination;
pub mod post;
pub mod target;
