pub mod extractor;
pub mod jwt;
pub mod reference;
pub mod test_utils;
