use std::net::IpAddr;

use clap::Args;
use lookups::resolve::DnsResolver;

const HEADING: Option<&str> = Some("DNS Options");

/// Where and how names are resolved.
#[derive(Debug, Args, Clone)]
pub struct DnsArgs {
    /// Nameserver to query. No other server is ever consulted.
    #[clap(long, env = "LOOKUPS_NAMESERVER", default_value = "127.0.0.1", help_heading = HEADING)]
    pub nameserver: IpAddr,

    /// Port the nameserver listens on
    #[clap(long, env = "LOOKUPS_PORT", default_value_t = 3007, help_heading = HEADING)]
    pub port: u16,

    /// Time to allow each query attempt
    #[clap(long, env = "LOOKUPS_TIMEOUT", default_value = "5s", help_heading = HEADING)]
    pub timeout: humantime::Duration,
}

impl DnsArgs {
    pub fn resolver(&self) -> DnsResolver {
        DnsResolver::builder()
            .nameserver(self.nameserver)
            .port(self.port)
            .timeout(self.timeout.into())
            .build()
    }
}
