//! Linux `AF_PACKET` raw sockets: the capture handle and raw-frame write
//! handle an `Interface` binds per NIC, plus the two `ioctl`s needed to learn
//! an interface's MAC and bound IPv4 address. `libc`'s own `ifreq` binding
//! is version-sensitive across targets, so the two shapes actually used
//! here are declared locally with the union's leading `sockaddr` member --
//! the same trick `ifreq`-adjacent crates use to dodge that churn.

use std::io;
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, RawFd};

#[repr(C)]
struct IfreqAddr {
    ifr_name: [libc::c_char; libc::IFNAMSIZ],
    ifr_addr: libc::sockaddr,
}

#[repr(C)]
struct IfreqHwaddr {
    ifr_name: [libc::c_char; libc::IFNAMSIZ],
    ifr_hwaddr: libc::sockaddr,
}

fn copy_name(dst: &mut [libc::c_char; libc::IFNAMSIZ], name: &str) -> io::Result<()> {
    let bytes = name.as_bytes();
    if bytes.len() >= dst.len() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "interface name too long"));
    }
    for (slot, byte) in dst.iter_mut().zip(bytes) {
        *slot = *byte as libc::c_char;
    }
    Ok(())
}

fn ioctl_socket() -> io::Result<RawFd> {
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(fd)
}

/// Look up an interface's 6-byte link-layer address via `SIOCGIFHWADDR`.
pub fn hardware_addr(name: &str) -> io::Result<[u8; 6]> {
    let fd = ioctl_socket()?;

    let mut req = IfreqHwaddr {
        ifr_name: [0; libc::IFNAMSIZ],
        ifr_hwaddr: unsafe { std::mem::zeroed() },
    };
    copy_name(&mut req.ifr_name, name)?;

    let ret = unsafe { libc::ioctl(fd, libc::SIOCGIFHWADDR as _, &mut req) };
    let result = if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        let mut mac = [0u8; 6];
        for (slot, byte) in mac.iter_mut().zip(req.ifr_hwaddr.sa_data.iter()) {
            *slot = *byte as u8;
        }
        Ok(mac)
    };

    unsafe { libc::close(fd) };
    result
}

/// Look up an interface's bound IPv4 address via `SIOCGIFADDR`. Returns
/// `Ok(None)` when the kernel reports `EADDRNOTAVAIL` (no address bound),
/// which callers treat as "fall back to auto-detection" rather than an
/// error.
pub fn ipv4_addr(name: &str) -> io::Result<Option<Ipv4Addr>> {
    let fd = ioctl_socket()?;

    let mut req = IfreqAddr {
        ifr_name: [0; libc::IFNAMSIZ],
        ifr_addr: unsafe { std::mem::zeroed() },
    };
    copy_name(&mut req.ifr_name, name)?;

    let ret = unsafe { libc::ioctl(fd, libc::SIOCGIFADDR as _, &mut req) };
    let result = if ret < 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EADDRNOTAVAIL) {
            Ok(None)
        } else {
            Err(err)
        }
    } else {
        let sockaddr_in = unsafe { &*(&req.ifr_addr as *const libc::sockaddr as *const libc::sockaddr_in) };
        Ok(Some(Ipv4Addr::from(u32::from_be(sockaddr_in.sin_addr.s_addr))))
    };

    unsafe { libc::close(fd) };
    result
}

/// Enumerate every IPv4 address currently bound to an interface via
/// `getifaddrs`. `SIOCGIFADDR` only ever returns one (the primary) address,
/// which is not enough to validate a `bind_ip=` declaration against an
/// interface carrying several addresses.
pub fn all_ipv4_addrs(name: &str) -> io::Result<Vec<Ipv4Addr>> {
    let mut head: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut head) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let mut addrs = Vec::new();
    let mut cur = head;
    while !cur.is_null() {
        let ifa = unsafe { &*cur };
        if !ifa.ifa_name.is_null() && !ifa.ifa_addr.is_null() {
            let ifa_name = unsafe { std::ffi::CStr::from_ptr(ifa.ifa_name) };
            if ifa_name.to_bytes() == name.as_bytes() {
                let family = unsafe { (*ifa.ifa_addr).sa_family };
                if family as i32 == libc::AF_INET {
                    let sin = unsafe { &*(ifa.ifa_addr as *const libc::sockaddr_in) };
                    addrs.push(Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)));
                }
            }
        }
        cur = ifa.ifa_next;
    }

    unsafe { libc::freeifaddrs(head) };
    Ok(addrs)
}

/// A non-blocking `AF_PACKET`/`SOCK_RAW` socket bound to one interface,
/// selecting `ETH_P_IP` so only IPv4 frames are delivered. Reading yields
/// the complete Ethernet frame; writing injects one verbatim.
pub struct RawFrameSocket {
    fd: RawFd,
    ifindex: i32,
}

impl RawFrameSocket {
    pub fn bind(ifindex: i32) -> io::Result<Self> {
        let fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW,
                (libc::ETH_P_IP as u16).to_be() as i32,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as u16;
        addr.sll_protocol = (libc::ETH_P_IP as u16).to_be();
        addr.sll_ifindex = ifindex;

        let ret = unsafe {
            libc::bind(
                fd,
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
        if flags < 0 || unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        Ok(Self { fd, ifindex })
    }

    /// Attempt one non-blocking read of a complete frame. `WouldBlock`
    /// means "nothing captured yet", the normal case between packets.
    pub fn try_recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { libc::recv(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }

    /// Write a complete Ethernet frame (the caller supplies the Ethernet
    /// header too) out this interface.
    pub fn send(&self, frame: &[u8]) -> io::Result<usize> {
        let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as u16;
        addr.sll_ifindex = self.ifindex;
        addr.sll_halen = 6;

        let n = unsafe {
            libc::sendto(
                self.fd,
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
                0,
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}

impl AsRawFd for RawFrameSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for RawFrameSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}
