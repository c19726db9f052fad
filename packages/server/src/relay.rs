//! Bidirectional byte relay between two streams, used for exec and
//! port-forward style channels.

use std::fmt;
use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

const BUF_SIZE: usize = 8 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    AToB,
    BToA,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AToB => "a->b",
            Self::BToA => "b->a",
        })
    }
}

/// Why a relay stopped.
#[derive(Debug)]
pub enum RelayEnd {
    /// The reading side of this direction reached end of stream.
    Closed(Direction),
    Cancelled,
    Failed(Direction, io::Error),
}

#[derive(Debug)]
pub struct RelayStats {
    pub a_to_b: u64,
    pub b_to_a: u64,
    pub end: RelayEnd,
}

/// Copy bytes both ways between `a` and `b` until one side finishes or fails,
/// or `cancel` fires. Both directions stop together and both write halves are
/// shut down before returning.
#[instrument(skip_all)]
pub async fn relay<A, B>(a: A, b: B, cancel: CancellationToken) -> RelayStats
where
    A: AsyncRead + AsyncWrite + Send,
    B: AsyncRead + AsyncWrite + Send,
{
    let (mut a_read, mut a_write) = tokio::io::split(a);
    let (mut b_read, mut b_write) = tokio::io::split(b);
    let mut a_to_b = 0u64;
    let mut b_to_a = 0u64;

    let end = {
        let forward = pump(&mut a_read, &mut b_write, &mut a_to_b);
        let backward = pump(&mut b_read, &mut a_write, &mut b_to_a);
        tokio::select! {
            res = forward => finished(Direction::AToB, res),
            res = backward => finished(Direction::BToA, res),
            _ = cancel.cancelled() => RelayEnd::Cancelled,
        }
    };

    if let Err(e) = b_write.shutdown().await {
        debug!(error = %e, "Shutdown of b failed");
    }
    if let Err(e) = a_write.shutdown().await {
        debug!(error = %e, "Shutdown of a failed");
    }

    debug!(a_to_b, b_to_a, end = ?end, "Relay finished");
    RelayStats { a_to_b, b_to_a, end }
}

fn finished(direction: Direction, res: io::Result<()>) -> RelayEnd {
    match res {
        Ok(()) => RelayEnd::Closed(direction),
        Err(e) => RelayEnd::Failed(direction, e),
    }
}

async fn pump<R, W>(reader: &mut R, writer: &mut W, copied: &mut u64) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        writer.write_all(&buf[..n]).await?;
        writer.flush().await?;
        *copied += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::duplex;

    use super::*;

    #[tokio::test]
    async fn copies_both_ways_until_a_closes() {
        let (mut client_a, a) = duplex(64);
        let (b, mut client_b) = duplex(64);
        let handle = tokio::spawn(relay(a, b, CancellationToken::new()));

        client_a.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        client_b.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        client_b.write_all(b"world!").await.unwrap();
        let mut buf = [0u8; 6];
        client_a.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"world!");

        client_a.shutdown().await.unwrap();
        let stats = handle.await.unwrap();
        assert_eq!(stats.a_to_b, 5);
        assert_eq!(stats.b_to_a, 6);
        assert!(matches!(stats.end, RelayEnd::Closed(Direction::AToB)));

        let mut rest = Vec::new();
        client_b.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_both_directions() {
        let (mut client_a, a) = duplex(64);
        let (b, mut client_b) = duplex(64);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(relay(a, b, cancel.clone()));

        cancel.cancel();
        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(stats.end, RelayEnd::Cancelled));
        assert_eq!(stats.a_to_b + stats.b_to_a, 0);

        let mut rest = Vec::new();
        client_a.read_to_end(&mut rest).await.unwrap();
        client_b.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn peer_drop_ends_relay() {
        let (client_a, a) = duplex(64);
        let (b, client_b) = duplex(64);
        let handle = tokio::spawn(relay(a, b, CancellationToken::new()));

        drop(client_b);
        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(stats.end, RelayEnd::Closed(Direction::BToA)));
        drop(client_a);
    }
}
