pub mod authenticate;
pub mod probe;
pub mod request;
