//! Socket construction that needs to happen before the options it sets
//! (`SO_REUSEADDR`) take effect, i.e. before `bind` -- `std::net::UdpSocket`
//! does not expose a pre-bind hook, so the socket is built directly with
//! `libc` the way [`lib_ifs::raw`] builds the capture socket.

use std::io;
use std::net::Ipv4Addr;
use std::os::fd::FromRawFd;

fn setsockopt_flag(fd: i32, name: i32) -> io::Result<()> {
    let one: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            name,
            &one as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Open the per-interface UDP socket: bound to `(ip, port)` with
/// `SO_REUSEADDR` and `SO_BROADCAST` set before bind, then handed to the
/// `tokio` reactor.
pub fn bind_udp_socket(ip: Ipv4Addr, port: u16) -> io::Result<tokio::net::UdpSocket> {
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        if let Err(err) = setsockopt_flag(fd, libc::SO_REUSEADDR).and_then(|_| setsockopt_flag(fd, libc::SO_BROADCAST)) {
            libc::close(fd);
            return Err(err);
        }

        let mut addr: libc::sockaddr_in = std::mem::zeroed();
        addr.sin_family = libc::AF_INET as u16;
        addr.sin_port = port.to_be();
        addr.sin_addr.s_addr = u32::from(ip).to_be();

        let ret = libc::bind(
            fd,
            &addr as *const libc::sockaddr_in as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        );
        if ret < 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        let flags = libc::fcntl(fd, libc::F_GETFL, 0);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }

        let std_socket = std::net::UdpSocket::from_raw_fd(fd);
        tokio::net::UdpSocket::from_std(std_socket)
    }
}

/// Resolve an interface name to its kernel `ifindex`, needed to bind the
/// `AF_PACKET` capture/write socket.
pub fn if_index(name: &str) -> io::Result<libc::c_int> {
    let cname = std::ffi::CString::new(name)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "interface name contains NUL"))?;
    let idx = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    if idx == 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(idx as libc::c_int)
    }
}
