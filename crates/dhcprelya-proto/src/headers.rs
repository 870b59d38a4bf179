use binbuf::prelude::*;

use crate::constants::ETHERTYPE_IPV4;

/// A 6-byte link-layer address.
pub type MacAddr = [u8; 6];

pub const BROADCAST_MAC: MacAddr = [0xff; 6];

/// Plain Ethernet II header: destination, source, ethertype. No 802.1Q tag
/// support, matching the untagged client segments this relay targets.
#[derive(Debug, Clone, Copy)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

impl EthernetHeader {
    pub fn ipv4(src: MacAddr, dst: MacAddr) -> Self {
        Self {
            dst,
            src,
            ethertype: ETHERTYPE_IPV4,
        }
    }
}

impl Readable for EthernetHeader {
    type Error = BufferError;

    fn read<E: Endianness>(buf: &mut impl ToReadBuffer) -> Result<Self, Self::Error> {
        let dst = read_mac(buf)?;
        let src = read_mac(buf)?;
        let ethertype = u16::read::<E>(buf)?;

        Ok(Self { dst, src, ethertype })
    }
}

impl Writeable for EthernetHeader {
    type Error = BufferError;

    fn write<E: Endianness>(&self, buf: &mut impl ToWriteBuffer) -> Result<usize, Self::Error> {
        let mut n = 0;

        n += write_mac(&self.dst, buf)?;
        n += write_mac(&self.src, buf)?;
        n += self.ethertype.write::<E>(buf)?;

        Ok(n)
    }
}

fn read_mac(buf: &mut impl ToReadBuffer) -> Result<MacAddr, BufferError> {
    let bytes = buf.read_slice(6)?;
    let mut mac = [0u8; 6];
    mac.copy_from_slice(bytes);
    Ok(mac)
}

fn write_mac(mac: &MacAddr, buf: &mut impl ToWriteBuffer) -> Result<usize, BufferError> {
    buf.write_slice(mac.as_slice())?;
    Ok(6)
}

/// IPv4 header without options (IHL = 5), see RFC 791.
#[derive(Debug, Clone, Copy)]
pub struct Ipv4Header {
    pub version_ihl: u8,
    pub tos: u8,
    pub total_len: u16,
    pub id: u16,
    pub flags_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src: u32,
    pub dst: u32,
}

/// `ToS` byte used for all relayed replies; the low-delay precedence bit
/// matches `dhcrelay`'s emitted traffic.
pub const TOS_LOWDELAY: u8 = 0x10;

impl Ipv4Header {
    pub fn new(src: u32, dst: u32, payload_len: u16, protocol: u8) -> Self {
        Self {
            version_ihl: (4 << 4) | 5,
            tos: TOS_LOWDELAY,
            total_len: crate::constants::IPV4_HDR_LEN as u16 + payload_len,
            id: 0,
            flags_offset: 0,
            ttl: 16,
            protocol,
            checksum: 0,
            src,
            dst,
        }
    }
}

impl Readable for Ipv4Header {
    type Error = BufferError;

    fn read<E: Endianness>(buf: &mut impl ToReadBuffer) -> Result<Self, Self::Error> {
        let version_ihl = u8::read::<E>(buf)?;
        let tos = u8::read::<E>(buf)?;
        let total_len = u16::read::<E>(buf)?;
        let id = u16::read::<E>(buf)?;
        let flags_offset = u16::read::<E>(buf)?;
        let ttl = u8::read::<E>(buf)?;
        let protocol = u8::read::<E>(buf)?;
        let checksum = u16::read::<E>(buf)?;
        let src = u32::read::<E>(buf)?;
        let dst = u32::read::<E>(buf)?;

        Ok(Self {
            version_ihl,
            tos,
            total_len,
            id,
            flags_offset,
            ttl,
            protocol,
            checksum,
            src,
            dst,
        })
    }
}

impl Writeable for Ipv4Header {
    type Error = BufferError;

    fn write<E: Endianness>(&self, buf: &mut impl ToWriteBuffer) -> Result<usize, Self::Error> {
        let mut n = 0;

        n += self.version_ihl.write::<E>(buf)?;
        n += self.tos.write::<E>(buf)?;
        n += self.total_len.write::<E>(buf)?;
        n += self.id.write::<E>(buf)?;
        n += self.flags_offset.write::<E>(buf)?;
        n += self.ttl.write::<E>(buf)?;
        n += self.protocol.write::<E>(buf)?;
        n += self.checksum.write::<E>(buf)?;
        n += self.src.write::<E>(buf)?;
        n += self.dst.write::<E>(buf)?;

        Ok(n)
    }
}

/// UDP header.
#[derive(Debug, Clone, Copy)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub len: u16,
    pub checksum: u16,
}

impl UdpHeader {
    pub fn new(src_port: u16, dst_port: u16, payload_len: u16) -> Self {
        Self {
            src_port,
            dst_port,
            len: crate::constants::UDP_HDR_LEN as u16 + payload_len,
            checksum: 0,
        }
    }
}

impl Readable for UdpHeader {
    type Error = BufferError;

    fn read<E: Endianness>(buf: &mut impl ToReadBuffer) -> Result<Self, Self::Error> {
        let src_port = u16::read::<E>(buf)?;
        let dst_port = u16::read::<E>(buf)?;
        let len = u16::read::<E>(buf)?;
        let checksum = u16::read::<E>(buf)?;

        Ok(Self {
            src_port,
            dst_port,
            len,
            checksum,
        })
    }
}

impl Writeable for UdpHeader {
    type Error = BufferError;

    fn write<E: Endianness>(&self, buf: &mut impl ToWriteBuffer) -> Result<usize, Self::Error> {
        let mut n = 0;

        n += self.src_port.write::<E>(buf)?;
        n += self.dst_port.write::<E>(buf)?;
        n += self.len.write::<E>(buf)?;
        n += self.checksum.write::<E>(buf)?;

        Ok(n)
    }
}
