pub mod extractor;
pub mod jwt;
pub mod preferences;
pub mod roles;
pub mod test_utils;
