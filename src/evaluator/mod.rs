pub mod odds;
pub mod sanity;
pub mod types;
pub mod value;
