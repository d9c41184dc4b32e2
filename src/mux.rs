//! Readiness multiplexer
//!
//! A thin epoll wrapper plus the token codec that maps a readiness
//! wake back to its source: the discovery bus, the shutdown signal
//! descriptor, or one stream of one slot. Tokens survive in the kernel
//! while slots churn, so decoding a token for a slot that is no longer
//! active must be detectable (and skipped) by the caller.

use std::io;
use std::os::unix::io::{BorrowedFd, RawFd};

use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags, EpollTimeout};

/// Upper bound on events serviced per wake.
pub const WAIT_BATCH: usize = 10;

/// Which of an active slot's two streams became ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// The physical legacy node has a state record.
    Legacy,
    /// The mirror has a force-feedback request.
    Mirror,
}

/// Decoded readiness source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Discovery,
    Shutdown,
    Slot { slot: usize, stream: Stream },
}

impl Token {
    pub fn encode(self) -> u64 {
        match self {
            Token::Discovery => 0,
            Token::Shutdown => 1,
            Token::Slot { slot, stream } => {
                let stream = match stream {
                    Stream::Legacy => 0,
                    Stream::Mirror => 1,
                };
                2 + (slot as u64) * 2 + stream
            }
        }
    }

    pub fn decode(data: u64) -> Token {
        match data {
            0 => Token::Discovery,
            1 => Token::Shutdown,
            n => {
                let n = n - 2;
                let stream = if n % 2 == 0 { Stream::Legacy } else { Stream::Mirror };
                Token::Slot {
                    slot: (n / 2) as usize,
                    stream,
                }
            }
        }
    }
}

pub struct Mux {
    epoll: Epoll,
}

impl Mux {
    pub fn new() -> io::Result<Self> {
        let epoll = Epoll::new(EpollCreateFlags::EPOLL_CLOEXEC)?;
        Ok(Self { epoll })
    }

    /// Watch a descriptor for readability under the given token.
    pub fn register(&self, fd: RawFd, token: Token) -> io::Result<()> {
        // The caller owns the fd and keeps it open until deregister.
        let fd = unsafe { BorrowedFd::borrow_raw(fd) };
        self.epoll
            .add(fd, EpollEvent::new(EpollFlags::EPOLLIN, token.encode()))?;
        Ok(())
    }

    pub fn deregister(&self, fd: RawFd) -> io::Result<()> {
        let fd = unsafe { BorrowedFd::borrow_raw(fd) };
        self.epoll.delete(fd)?;
        Ok(())
    }

    /// Block until at least one source is ready. The wait is
    /// indefinite: the engine is purely reactive.
    pub fn wait(&self, events: &mut [EpollEvent]) -> io::Result<usize> {
        loop {
            match self.epoll.wait(events, EpollTimeout::NONE) {
                Ok(n) => return Ok(n),
                Err(nix::errno::Errno::EINTR) => continue,
                Err(errno) => return Err(errno.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_roundtrip() {
        let tokens = [
            Token::Discovery,
            Token::Shutdown,
            Token::Slot { slot: 0, stream: Stream::Legacy },
            Token::Slot { slot: 0, stream: Stream::Mirror },
            Token::Slot { slot: 9, stream: Stream::Legacy },
            Token::Slot { slot: 9, stream: Stream::Mirror },
        ];
        for token in tokens {
            assert_eq!(Token::decode(token.encode()), token);
        }
    }

    #[test]
    fn test_token_encoding_is_unique() {
        let mut seen = std::collections::HashSet::new();
        assert!(seen.insert(Token::Discovery.encode()));
        assert!(seen.insert(Token::Shutdown.encode()));
        for slot in 0..10 {
            for stream in [Stream::Legacy, Stream::Mirror] {
                assert!(seen.insert(Token::Slot { slot, stream }.encode()));
            }
        }
    }
}
