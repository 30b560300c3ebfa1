use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::time::Duration;

use async_stream::try_stream;
use bon::bon;
use futures::stream::BoxStream;
use futures::StreamExt;
use hickory_resolver::config::NameServerConfigGroup;
use hickory_resolver::config::ResolveHosts;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::config::ResolverOpts;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use tracing::debug;

use crate::resolve::Resolve;
use crate::resolve::ResolutionError;

/// Nameserver queried when none is configured.
pub const DEFAULT_NAMESERVER: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Port queried when none is configured.
pub const DEFAULT_PORT: u16 = 3007;

/// Resolves A records against exactly one nameserver.
#[derive(Debug, Clone)]
pub struct DnsResolver {
    dns: TokioResolver,
}

#[bon]
impl DnsResolver {
    /// Creates a resolver that only ever talks to `nameserver:port`. The
    /// system resolver config, search domains and the hosts file are ignored,
    /// and nothing is cached between queries. `localhost` is the exception:
    /// hickory answers it locally without asking the nameserver.
    /// `timeout` applies to each of the `attempts`.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_NAMESERVER)] nameserver: IpAddr,
        #[builder(default = DEFAULT_PORT)] port: u16,
        #[builder(default = Duration::from_secs(5))] timeout: Duration,
        #[builder(default = 2)] attempts: usize,
    ) -> Self {
        let servers = NameServerConfigGroup::from_ips_clear(&[nameserver], port, true);
        let config = ResolverConfig::from_parts(None, Vec::new(), servers);

        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = attempts;
        opts.use_hosts_file = ResolveHosts::Never;
        opts.cache_size = 0;

        let dns = TokioResolver::builder_with_config(config, TokioConnectionProvider::default())
            .with_options(opts)
            .build();
        debug!(%nameserver, port, "Built DNS resolver");
        Self { dns }
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Resolve for DnsResolver {
    fn resolve_fallible<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxStream<'a, Result<Ipv4Addr, ResolutionError>> {
        if name.is_empty() {
            return futures::stream::iter([Err(ResolutionError::EmptyName)]).boxed();
        }

        try_stream! {
            let lookup = self.dns.ipv4_lookup(name).await?;
            let mut records = lookup.iter().peekable();
            records.peek().ok_or(ResolutionError::NoAnswer)?;
            for record in records {
                yield record.0;
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

    use hickory_resolver::proto::op::Message;
    use hickory_resolver::proto::op::MessageType;
    use hickory_resolver::proto::op::ResponseCode;
    use hickory_resolver::proto::rr::rdata::A;
    use hickory_resolver::proto::rr::RData;
    use hickory_resolver::proto::rr::Record;
    use rstest::rstest;
    use tokio::net::UdpSocket;

    use super::*;
    use crate::resolve::ResolveExt;

    type Zone = HashMap<String, Vec<Ipv4Addr>>;

    fn zone<const N: usize>(entries: [(&str, Vec<Ipv4Addr>); N]) -> Zone {
        entries
            .into_iter()
            .map(|(name, addrs)| (name.to_ascii_lowercase(), addrs))
            .collect()
    }

    /// Answers A queries from `zone` until the test runtime shuts down. Names
    /// missing from the zone get NXDOMAIN. The counter tracks queries seen.
    async fn spawn_nameserver(zone: Zone) -> (SocketAddr, Arc<AtomicUsize>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let queries = Arc::new(AtomicUsize::new(0));
        let seen = queries.clone();

        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let Ok(request) = Message::from_vec(&buf[..len]) else {
                    continue;
                };
                seen.fetch_add(1, Ordering::SeqCst);

                let mut response = Message::new();
                response
                    .set_id(request.id())
                    .set_message_type(MessageType::Response)
                    .set_op_code(request.op_code())
                    .set_recursion_desired(request.recursion_desired())
                    .set_recursion_available(true);

                for query in request.queries() {
                    response.add_query(query.clone());
                    let name = query.name().to_utf8().to_ascii_lowercase();
                    match zone.get(name.trim_end_matches('.')) {
                        Some(addrs) => {
                            for addr in addrs {
                                let rdata = RData::A(A(*addr));
                                response.add_answer(Record::from_rdata(
                                    query.name().clone(),
                                    60,
                                    rdata,
                                ));
                            }
                        }
                        None => {
                            response.set_response_code(ResponseCode::NXDomain);
                        }
                    }
                }

                let bytes = response.to_vec().unwrap();
                socket.send_to(&bytes, peer).await.unwrap();
            }
        });

        (addr, queries)
    }

    /// Names from the local hosts file, minus the ones hickory answers itself.
    fn hosts_file_names() -> Vec<String> {
        let hosts = std::fs::read_to_string("/etc/hosts").unwrap_or_default();
        hosts
            .lines()
            .filter_map(|line| line.split('#').next())
            .flat_map(|line| line.split_whitespace().skip(1))
            .map(str::to_ascii_lowercase)
            .filter(|name| !name.is_empty() && !name.contains("localhost"))
            .collect()
    }

    fn resolver_for(addr: SocketAddr) -> DnsResolver {
        DnsResolver::builder()
            .nameserver(addr.ip())
            .port(addr.port())
            .timeout(Duration::from_secs(1))
            .attempts(1)
            .build()
    }

    #[rstest]
    #[case("one.test", vec![Ipv4Addr::new(10, 0, 0, 1)])]
    #[case("two.test", vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)])]
    #[case("two.test.", vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)])]
    #[tokio::test]
    async fn resolve_works(#[case] name: &str, #[case] expected: Vec<Ipv4Addr>) {
        let zone = zone([
            ("one.test", vec![Ipv4Addr::new(10, 0, 0, 1)]),
            (
                "two.test",
                vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)],
            ),
        ]);
        let (addr, _) = spawn_nameserver(zone).await;
        let resolver = resolver_for(addr);

        let mut addrs = resolver.resolve_all(name).await.unwrap();
        addrs.sort();
        assert_eq!(addrs, expected);
    }

    #[tokio::test]
    async fn nxdomain_is_an_error() {
        let (addr, _) = spawn_nameserver(Zone::new()).await;
        let resolver = resolver_for(addr);
        let result = resolver.resolve_all("missing.test").await;
        assert!(matches!(result, Err(ResolutionError::Query(_))));
    }

    #[tokio::test]
    async fn empty_name_is_rejected() {
        let resolver = DnsResolver::default();
        let result = resolver.resolve_all("").await;
        assert!(matches!(result, Err(ResolutionError::EmptyName)));
    }

    #[tokio::test]
    async fn hosts_file_names_go_to_the_nameserver() {
        let answer = Ipv4Addr::new(10, 9, 9, 9);
        let mut names = hosts_file_names();
        names.push("hosts-fallback.test".to_owned());
        let zone: Zone = names.iter().map(|name| (name.clone(), vec![answer])).collect();
        let (addr, queries) = spawn_nameserver(zone).await;
        let resolver = resolver_for(addr);

        for name in &names {
            let addrs = resolver.resolve_all(name).await.unwrap();
            assert_eq!(addrs, vec![answer], "{name} was not answered by the nameserver");
        }
        assert_eq!(queries.load(Ordering::SeqCst), names.len());
    }

    #[tokio::test]
    async fn repeated_names_are_queried_again() {
        let (addr, queries) =
            spawn_nameserver(zone([("one.test", vec![Ipv4Addr::new(10, 0, 0, 1)])])).await;
        let resolver = resolver_for(addr);

        for _ in 0..2 {
            resolver.resolve_all("one.test").await.unwrap();
        }
        assert_eq!(queries.load(Ordering::SeqCst), 2);
    }
}
