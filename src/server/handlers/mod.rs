pub mod annotations;
pub mod bathrooms;
