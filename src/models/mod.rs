pub mod access;
pub mod profile;
