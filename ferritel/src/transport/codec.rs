//! Minimal telnet byte filter.
//!
//! Strips IAC command sequences out of the received stream and answers
//! every option request with a refusal, leaving the connection in plain
//! NVT mode. Option negotiation beyond that is out of scope.

use bytes::{BufMut, Bytes, BytesMut};
use log::trace;
use memchr::{memchr, memchr2};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;
const CR: u8 = b'\r';
const NUL: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    /// Saw `CR`; a following `NUL` is dropped.
    Cr,
    Iac,
    Negotiate(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Output of one decode pass.
#[derive(Debug, Default)]
pub struct Decoded {
    /// Application data with telnet commands removed.
    pub data: Bytes,

    /// Negotiation replies to write back to the peer.
    pub replies: Bytes,
}

/// Stateful telnet decoder. Sequences split across reads are handled.
#[derive(Debug)]
pub struct TelnetDecoder {
    state: State,
}

impl TelnetDecoder {
    pub fn new() -> Self {
        Self { state: State::Data }
    }

    /// Decode one chunk read from the socket.
    pub fn decode(&mut self, input: &[u8]) -> Decoded {
        let mut data = BytesMut::with_capacity(input.len());
        let mut replies = BytesMut::new();
        let mut pos = 0;

        while pos < input.len() {
            match self.state {
                State::Data => {
                    let rest = &input[pos..];
                    match memchr2(IAC, CR, rest) {
                        None => {
                            data.extend_from_slice(rest);
                            pos = input.len();
                        }
                        Some(offset) => {
                            data.extend_from_slice(&rest[..offset]);
                            if rest[offset] == CR {
                                data.put_u8(CR);
                                self.state = State::Cr;
                            } else {
                                self.state = State::Iac;
                            }
                            pos += offset + 1;
                        }
                    }
                }
                State::Cr => {
                    self.state = State::Data;
                    if input[pos] == NUL {
                        pos += 1;
                    }
                }
                State::Iac => {
                    let byte = input[pos];
                    pos += 1;
                    self.state = match byte {
                        IAC => {
                            data.put_u8(IAC);
                            State::Data
                        }
                        WILL | WONT | DO | DONT => State::Negotiate(byte),
                        SB => State::Subnegotiation,
                        other => {
                            trace!("telnet: ignoring command {}", other);
                            State::Data
                        }
                    };
                }
                State::Negotiate(verb) => {
                    let option = input[pos];
                    pos += 1;
                    trace!("telnet: received {} for option {}", verb_name(verb), option);
                    match verb {
                        WILL => replies.extend_from_slice(&[IAC, DONT, option]),
                        DO => replies.extend_from_slice(&[IAC, WONT, option]),
                        _ => {}
                    }
                    self.state = State::Data;
                }
                State::Subnegotiation => match memchr(IAC, &input[pos..]) {
                    None => pos = input.len(),
                    Some(offset) => {
                        pos += offset + 1;
                        self.state = State::SubnegotiationIac;
                    }
                },
                State::SubnegotiationIac => {
                    let byte = input[pos];
                    pos += 1;
                    self.state = if byte == SE {
                        State::Data
                    } else {
                        State::Subnegotiation
                    };
                }
            }
        }

        Decoded {
            data: data.freeze(),
            replies: replies.freeze(),
        }
    }
}

impl Default for TelnetDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Double every `IAC` byte in outgoing data.
pub fn escape_iac(data: &[u8]) -> Bytes {
    if memchr(IAC, data).is_none() {
        return Bytes::copy_from_slice(data);
    }

    let mut out = BytesMut::with_capacity(data.len() + 8);
    for &byte in data {
        if byte == IAC {
            out.put_u8(IAC);
        }
        out.put_u8(byte);
    }
    out.freeze()
}

fn verb_name(verb: u8) -> &'static str {
    match verb {
        WILL => "WILL",
        WONT => "WONT",
        DO => "DO",
        DONT => "DONT",
        _ => "?",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_data_passes_through() {
        let mut decoder = TelnetDecoder::new();
        let out = decoder.decode(b"login: ");
        assert_eq!(&out.data[..], b"login: ");
        assert!(out.replies.is_empty());
    }

    #[test]
    fn test_negotiation_refused() {
        let mut decoder = TelnetDecoder::new();
        // WILL ECHO, DO TERMINAL-TYPE, WONT LINEMODE
        let out = decoder.decode(&[IAC, WILL, 1, IAC, DO, 24, IAC, WONT, 34, b'o', b'k']);
        assert_eq!(&out.data[..], b"ok");
        assert_eq!(&out.replies[..], &[IAC, DONT, 1, IAC, WONT, 24]);
    }

    #[test]
    fn test_sequence_split_across_reads() {
        let mut decoder = TelnetDecoder::new();
        let first = decoder.decode(&[b'a', IAC]);
        assert_eq!(&first.data[..], b"a");
        let second = decoder.decode(&[DO]);
        assert!(second.data.is_empty());
        let third = decoder.decode(&[3, b'b']);
        assert_eq!(&third.data[..], b"b");
        assert_eq!(&third.replies[..], &[IAC, WONT, 3]);
    }

    #[test]
    fn test_subnegotiation_skipped() {
        let mut decoder = TelnetDecoder::new();
        let out = decoder.decode(&[b'x', IAC, SB, 24, 1, IAC, SE, b'y']);
        assert_eq!(&out.data[..], b"xy");
        assert!(out.replies.is_empty());
    }

    #[test]
    fn test_escaped_iac_and_cr_nul() {
        let mut decoder = TelnetDecoder::new();
        let out = decoder.decode(&[IAC, IAC, b'a', CR, NUL, b'b', CR, b'\n']);
        assert_eq!(&out.data[..], &[IAC, b'a', CR, b'b', CR, b'\n']);
    }

    #[test]
    fn test_escape_iac() {
        assert_eq!(&escape_iac(b"plain")[..], b"plain");
        assert_eq!(&escape_iac(&[1, IAC, 2])[..], &[1, IAC, IAC, 2]);
    }
}
