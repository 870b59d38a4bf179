use std::net::Ipv4Addr;

use crate::constants::{DHCP_FIXED_LEN, MAGIC_COOKIE, MAGIC_COOKIE_LEN};
use crate::error::FrameError;

const OP: usize = 0;
const HOPS: usize = 3;
const CIADDR: usize = 12;
const YIADDR: usize = 16;
const GIADDR: usize = 24;
const CHADDR: usize = 28;
const FLAGS: usize = 10;
const CHADDR_LEN: usize = 16;

/// A bounds-checked, zero-copy view over a raw DHCP payload (fixed header,
/// magic cookie, option stream). Mutating a field mutates the underlying
/// bytes in place, so every field the relay does not touch is guaranteed to
/// survive byte-for-byte -- there is no parse/rebuild round trip to get
/// subtly wrong.
///
/// This is the "typed header view" called for in the design notes: it
/// replaces raw pointer arithmetic into packet bytes with named,
/// length-checked accessors.
pub struct DhcpView<'a> {
    buf: &'a mut [u8],
}

impl<'a> DhcpView<'a> {
    /// Wrap `buf` as a DHCP view. Fails if `buf` is shorter than the fixed
    /// header plus magic cookie, mirroring the validator's own lower bound.
    pub fn new(buf: &'a mut [u8]) -> Result<Self, FrameError> {
        if buf.len() < DHCP_FIXED_LEN + MAGIC_COOKIE_LEN {
            return Err(FrameError::UdpPayloadTooShort);
        }

        Ok(Self { buf })
    }

    pub fn op(&self) -> u8 {
        self.buf[OP]
    }

    pub fn hops(&self) -> u8 {
        self.buf[HOPS]
    }

    pub fn set_hops(&mut self, hops: u8) {
        self.buf[HOPS] = hops;
    }

    pub fn flags(&self) -> u16 {
        u16::from_be_bytes([self.buf[FLAGS], self.buf[FLAGS + 1]])
    }

    pub fn broadcast(&self) -> bool {
        self.flags() & crate::constants::BROADCAST_FLAG != 0
    }

    pub fn ciaddr(&self) -> Ipv4Addr {
        read_addr(self.buf, CIADDR)
    }

    pub fn yiaddr(&self) -> Ipv4Addr {
        read_addr(self.buf, YIADDR)
    }

    pub fn giaddr(&self) -> Ipv4Addr {
        read_addr(self.buf, GIADDR)
    }

    pub fn set_giaddr(&mut self, addr: Ipv4Addr) {
        self.buf[GIADDR..GIADDR + 4].copy_from_slice(&addr.octets());
    }

    /// First 6 bytes of the 16-byte `chaddr` field; valid for Ethernet
    /// (`hlen == 6`), which is the only hardware type this relay forwards.
    pub fn chaddr(&self) -> [u8; 6] {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.buf[CHADDR..CHADDR + 6]);
        mac
    }

    /// Raw option bytes, starting immediately after the magic cookie and
    /// running to the end of the buffer as currently sliced (callers should
    /// re-slice to `get_dhcp_len` before forwarding).
    pub fn options(&self) -> &[u8] {
        &self.buf[DHCP_FIXED_LEN + MAGIC_COOKIE_LEN..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf
    }
}

fn read_addr(buf: &[u8], offset: usize) -> Ipv4Addr {
    Ipv4Addr::new(buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3])
}

/// Walk the DHCP option area starting right after the magic cookie and
/// return the total payload length: fixed header + cookie + options up to
/// and including the `0xff` terminator.
///
/// Returns 0 if the terminator is not found before `payload` ends, which
/// callers treat as "the payload is corrupt, drop it".
pub fn get_dhcp_len(payload: &[u8]) -> usize {
    let opt_start = DHCP_FIXED_LEN + MAGIC_COOKIE_LEN;

    if payload.len() < opt_start {
        return 0;
    }

    let mut i = opt_start;

    while i < payload.len() {
        let tag = payload[i];

        if tag == 0 {
            // Pad byte.
            i += 1;
            continue;
        }

        if tag == 0xff {
            return i + 1;
        }

        if i + 1 >= payload.len() {
            return 0;
        }

        let len = payload[i + 1] as usize;
        i += 2 + len;
    }

    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_header() -> Vec<u8> {
        vec![0u8; DHCP_FIXED_LEN]
    }

    #[test]
    fn option_walk_finds_terminator() {
        let mut payload = fixed_header();
        payload.extend_from_slice(&MAGIC_COOKIE);
        payload.extend_from_slice(&[53, 1, 1, 0xff]);

        assert_eq!(get_dhcp_len(&payload), DHCP_FIXED_LEN + MAGIC_COOKIE_LEN + 4);
    }

    #[test]
    fn option_walk_skips_pad_bytes() {
        let mut payload = fixed_header();
        payload.extend_from_slice(&MAGIC_COOKIE);
        payload.extend_from_slice(&[0, 0, 53, 1, 1, 0xff]);

        assert_eq!(get_dhcp_len(&payload), DHCP_FIXED_LEN + MAGIC_COOKIE_LEN + 6);
    }

    #[test]
    fn option_walk_missing_terminator_returns_zero() {
        let mut payload = fixed_header();
        payload.extend_from_slice(&MAGIC_COOKIE);
        payload.extend_from_slice(&[53, 1, 1]);

        assert_eq!(get_dhcp_len(&payload), 0);
    }

    #[test]
    fn option_walk_is_idempotent() {
        let mut payload = fixed_header();
        payload.extend_from_slice(&MAGIC_COOKIE);
        payload.extend_from_slice(&[53, 1, 2, 1, 4, 10, 0, 0, 1, 0xff]);

        let len_a = get_dhcp_len(&payload);
        let len_b = get_dhcp_len(&payload[..len_a]);

        assert_eq!(len_a, len_b);
    }

    #[test]
    fn view_mutates_hops_and_giaddr_in_place() {
        let mut payload = fixed_header();
        payload.extend_from_slice(&MAGIC_COOKIE);
        payload.extend_from_slice(&[0xff]);

        let mut view = DhcpView::new(&mut payload).unwrap();
        assert_eq!(view.hops(), 0);
        assert_eq!(view.giaddr(), Ipv4Addr::UNSPECIFIED);

        view.set_hops(1);
        view.set_giaddr(Ipv4Addr::new(10, 0, 0, 1));

        assert_eq!(view.hops(), 1);
        assert_eq!(view.giaddr(), Ipv4Addr::new(10, 0, 0, 1));
    }
}
