//! Parser and evaluator for the optional user-supplied capture filter ANDed
//! onto the fixed "udp and dst port bootps and not ether src <mac>"
//! predicate every listener already enforces.
//!
//! Only a small conjunctive subset of the pcap filter language is accepted:
//! whitespace-separated `host`/`port`/`ether host`/`src host`/`dst host`/
//! `src port`/`dst port`/`ether src`/`ether dst` terms, each optionally
//! prefixed with `not`, joined implicitly (an `and` keyword between terms is
//! permitted but not required). `or`, parentheses, and every other pcap
//! primitive are rejected at parse time rather than silently ignored.

use std::net::Ipv4Addr;

use dhcprelya_proto::constants;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Host,
    HostSrc,
    HostDst,
    Port,
    PortSrc,
    PortDst,
    EtherHost,
    EtherSrc,
    EtherDst,
}

#[derive(Debug, Clone, Copy)]
enum Value {
    Ip(Ipv4Addr),
    Port(u16),
    Mac([u8; 6]),
}

#[derive(Debug, Clone, Copy)]
struct Term {
    field: Field,
    value: Value,
    negate: bool,
}

/// A parsed, ready-to-evaluate capture filter.
#[derive(Debug, Clone)]
pub struct CaptureFilter {
    terms: Vec<Term>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("filter expression has no terms")]
    Empty,
    #[error("unknown filter keyword {0:?}")]
    UnknownKeyword(String),
    #[error("unsupported filter keyword {0:?} (only a conjunction of host/port/ether terms is supported)")]
    Unsupported(String),
    #[error("missing value after {0:?}")]
    MissingValue(String),
    #[error("invalid IPv4 address {0:?}")]
    BadIp(String),
    #[error("invalid port {0:?}")]
    BadPort(String),
    #[error("invalid MAC address {0:?}")]
    BadMac(String),
}

impl CaptureFilter {
    pub fn parse(expr: &str) -> Result<Self, FilterParseError> {
        let mut tokens = expr.split_whitespace();
        let mut terms = Vec::new();

        while let Some(mut word) = tokens.next() {
            if word.eq_ignore_ascii_case("and") {
                continue;
            }

            let mut negate = false;
            if word.eq_ignore_ascii_case("not") {
                negate = true;
                word = tokens.next().ok_or_else(|| FilterParseError::MissingValue("not".into()))?;
            }

            let term = match word.to_ascii_lowercase().as_str() {
                "host" => {
                    let v = next_value(&mut tokens, "host")?;
                    Term { field: Field::Host, value: Value::Ip(parse_ip(v)?), negate }
                }
                "port" => {
                    let v = next_value(&mut tokens, "port")?;
                    Term { field: Field::Port, value: Value::Port(parse_port(v)?), negate }
                }
                "src" => parse_dir_term(&mut tokens, "src", Field::HostSrc, Field::PortSrc, negate)?,
                "dst" => parse_dir_term(&mut tokens, "dst", Field::HostDst, Field::PortDst, negate)?,
                "ether" => {
                    let sub = next_value(&mut tokens, "ether")?;
                    let field = match sub.to_ascii_lowercase().as_str() {
                        "host" => Field::EtherHost,
                        "src" => Field::EtherSrc,
                        "dst" => Field::EtherDst,
                        other => return Err(FilterParseError::Unsupported(format!("ether {other}"))),
                    };
                    let v = next_value(&mut tokens, "ether <dir>")?;
                    Term { field, value: Value::Mac(parse_mac(v)?), negate }
                }
                other => return Err(FilterParseError::UnknownKeyword(other.to_string())),
            };

            terms.push(term);
        }

        if terms.is_empty() {
            return Err(FilterParseError::Empty);
        }

        Ok(Self { terms })
    }

    /// Evaluate every term as a conjunction against an already
    /// length-validated Ethernet/IPv4/UDP frame.
    pub fn matches(&self, frame: &[u8]) -> bool {
        let ip_start = constants::ETHER_HDR_LEN;
        let ihl = (frame[ip_start] & 0x0f) as usize * 4;
        let udp_start = ip_start + ihl;

        let ether_dst: [u8; 6] = frame[0..6].try_into().unwrap();
        let ether_src: [u8; 6] = frame[6..12].try_into().unwrap();
        let ip_src = Ipv4Addr::new(
            frame[ip_start + 12],
            frame[ip_start + 13],
            frame[ip_start + 14],
            frame[ip_start + 15],
        );
        let ip_dst = Ipv4Addr::new(
            frame[ip_start + 16],
            frame[ip_start + 17],
            frame[ip_start + 18],
            frame[ip_start + 19],
        );
        let port_src = u16::from_be_bytes([frame[udp_start], frame[udp_start + 1]]);
        let port_dst = u16::from_be_bytes([frame[udp_start + 2], frame[udp_start + 3]]);

        self.terms.iter().all(|term| {
            let hit = match (term.field, term.value) {
                (Field::Host, Value::Ip(ip)) => ip_src == ip || ip_dst == ip,
                (Field::HostSrc, Value::Ip(ip)) => ip_src == ip,
                (Field::HostDst, Value::Ip(ip)) => ip_dst == ip,
                (Field::Port, Value::Port(p)) => port_src == p || port_dst == p,
                (Field::PortSrc, Value::Port(p)) => port_src == p,
                (Field::PortDst, Value::Port(p)) => port_dst == p,
                (Field::EtherHost, Value::Mac(m)) => ether_src == m || ether_dst == m,
                (Field::EtherSrc, Value::Mac(m)) => ether_src == m,
                (Field::EtherDst, Value::Mac(m)) => ether_dst == m,
                _ => unreachable!("field/value kind mismatch is a parser bug"),
            };
            hit != term.negate
        })
    }
}

fn next_value<'a>(tokens: &mut std::str::SplitWhitespace<'a>, label: &str) -> Result<&'a str, FilterParseError> {
    tokens.next().ok_or_else(|| FilterParseError::MissingValue(label.to_string()))
}

fn parse_dir_term(
    tokens: &mut std::str::SplitWhitespace,
    label: &str,
    host_field: Field,
    port_field: Field,
    negate: bool,
) -> Result<Term, FilterParseError> {
    let sub = next_value(tokens, label)?;
    match sub.to_ascii_lowercase().as_str() {
        "host" => {
            let v = next_value(tokens, &format!("{label} host"))?;
            Ok(Term { field: host_field, value: Value::Ip(parse_ip(v)?), negate })
        }
        "port" => {
            let v = next_value(tokens, &format!("{label} port"))?;
            Ok(Term { field: port_field, value: Value::Port(parse_port(v)?), negate })
        }
        other => Err(FilterParseError::Unsupported(format!("{label} {other}"))),
    }
}

fn parse_ip(s: &str) -> Result<Ipv4Addr, FilterParseError> {
    s.parse().map_err(|_| FilterParseError::BadIp(s.to_string()))
}

fn parse_port(s: &str) -> Result<u16, FilterParseError> {
    s.parse().map_err(|_| FilterParseError::BadPort(s.to_string()))
}

fn parse_mac(s: &str) -> Result<[u8; 6], FilterParseError> {
    let mut out = [0u8; 6];
    let mut n = 0;
    for (slot, part) in out.iter_mut().zip(s.split(':')) {
        *slot = u8::from_str_radix(part, 16).map_err(|_| FilterParseError::BadMac(s.to_string()))?;
        n += 1;
    }
    if n != 6 {
        return Err(FilterParseError::BadMac(s.to_string()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(src_ip: Ipv4Addr, dst_ip: Ipv4Addr, src_port: u16, dst_port: u16, src_mac: [u8; 6]) -> Vec<u8> {
        let mut f = vec![0u8; constants::ETHER_HDR_LEN + 20 + 8];
        f[6..12].copy_from_slice(&src_mac);
        f[constants::ETHER_HDR_LEN] = 0x45;
        let ip_start = constants::ETHER_HDR_LEN;
        f[ip_start + 12..ip_start + 16].copy_from_slice(&src_ip.octets());
        f[ip_start + 16..ip_start + 20].copy_from_slice(&dst_ip.octets());
        let udp_start = ip_start + 20;
        f[udp_start..udp_start + 2].copy_from_slice(&src_port.to_be_bytes());
        f[udp_start + 2..udp_start + 4].copy_from_slice(&dst_port.to_be_bytes());
        f
    }

    #[test]
    fn host_term_matches_either_direction() {
        let filter = CaptureFilter::parse("host 10.0.0.5").unwrap();
        let f = frame(Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 1), 68, 67, [1; 6]);
        assert!(filter.matches(&f));
        let f = frame(Ipv4Addr::new(10, 0, 0, 9), Ipv4Addr::new(10, 0, 0, 1), 68, 67, [1; 6]);
        assert!(!filter.matches(&f));
    }

    #[test]
    fn conjunction_of_host_and_port_requires_both() {
        let filter = CaptureFilter::parse("host 10.0.0.5 and port 67").unwrap();
        let f = frame(Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 1), 68, 67, [1; 6]);
        assert!(filter.matches(&f));
        let f = frame(Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 1), 68, 53, [1; 6]);
        assert!(!filter.matches(&f));
    }

    #[test]
    fn not_prefix_negates_the_term() {
        let filter = CaptureFilter::parse("not host 10.0.0.5").unwrap();
        let f = frame(Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 1), 68, 67, [1; 6]);
        assert!(!filter.matches(&f));
        let f = frame(Ipv4Addr::new(10, 0, 0, 9), Ipv4Addr::new(10, 0, 0, 1), 68, 67, [1; 6]);
        assert!(filter.matches(&f));
    }

    #[test]
    fn ether_src_term() {
        let filter = CaptureFilter::parse("ether src aa:bb:cc:dd:ee:ff").unwrap();
        let f = frame(Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 1), 68, 67, [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
        assert!(filter.matches(&f));
        let f = frame(Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 1), 68, 67, [1; 6]);
        assert!(!filter.matches(&f));
    }

    #[test]
    fn empty_expression_is_rejected() {
        assert_eq!(CaptureFilter::parse("   ").unwrap_err(), FilterParseError::Empty);
    }

    #[test]
    fn or_keyword_is_rejected() {
        let err = CaptureFilter::parse("host 10.0.0.5 or port 67").unwrap_err();
        assert_eq!(err, FilterParseError::UnknownKeyword("or".to_string()));
    }

    #[test]
    fn unknown_primitive_is_rejected() {
        let err = CaptureFilter::parse("net 10.0.0.0/24").unwrap_err();
        assert_eq!(err, FilterParseError::UnknownKeyword("net".to_string()));
    }
}
