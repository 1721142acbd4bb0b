pub mod channel;
pub mod protocol;
