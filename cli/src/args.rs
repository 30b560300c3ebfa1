mod dns;
mod global;

pub use dns::DnsArgs;
pub use global::GlobalArgs;
