pub mod http;
pub mod icmp;
pub mod tcp;
