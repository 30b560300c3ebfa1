mod dns;

use std::net::Ipv4Addr;

use futures::stream::BoxStream;
use futures::TryStreamExt;
use hickory_resolver::ResolveError;

pub use self::dns::DnsResolver;

/// Why a single name could not be resolved.
///
/// These are caught per name by the engine and never abort a run.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("empty name")]
    EmptyName,

    #[error("the DNS response does not contain an answer to the question")]
    NoAnswer,

    #[error(transparent)]
    Query(#[from] ResolveError),
}

/// Map hostnames to their IPv4 addresses.
pub trait Resolve {
    /// Looks up the A records of `name`.
    ///
    /// The stream is lazy: nothing is sent until it is first polled.
    fn resolve_fallible<'a>(
        &'a self,
        name: &'a str,
    ) -> BoxStream<'a, Result<Ipv4Addr, ResolutionError>>;
}

/// An extension trait for [`Resolve`] that provides convenient combinators.
pub trait ResolveExt: Resolve {
    /// Collects every address of `name`. Fails as a whole if the stream
    /// yields any error, so a failed name never produces a partial answer.
    async fn resolve_all(&self, name: &str) -> Result<Vec<Ipv4Addr>, ResolutionError>;
}

impl<R> ResolveExt for R
where
    R: Resolve + ?Sized,
{
    async fn resolve_all(&self, name: &str) -> Result<Vec<Ipv4Addr>, ResolutionError> {
        self.resolve_fallible(name).try_collect().await
    }
}
