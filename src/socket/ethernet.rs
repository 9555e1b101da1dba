use std::io;
use std::ffi::CString;
use std::os::unix::io::{AsRawFd, RawFd};
use core::task::{Poll, Context};
use futures::ready;
use packed_struct::prelude::*;
use tokio::io::unix::AsyncFd;
use super::EthercatSocket;


/// ethernet type: ethercat
const ETHERCAT_TYPE: u16 = 0x88a4;
/// ethernet frame size without checksum, which is appended by the network card
const MAX_ETHERNET_FRAME: usize = 1514;
/// size of [EthernetHeader] once packed
const ETHERNET_HEADER: usize = 14;
/// shorter frames must be padded
const MIN_ETHERNET_FRAME: usize = 60;
/// `sll_pkttype` of the copies of our own frames, which packet sockets also receive
const PACKET_OUTGOING: u8 = 4;

/// broadcasting is the way to reach the first slave whatever its mac address
const DESTINATION: [u8; 6] = [0xff; 6];
const SOURCE: [u8; 6] = [0x01; 6];


/**
    Raw socket allowing direct ethercat com, but only one segment on the ethernet network

    Raw sockets are not implemented in std::net, so here is an implementation found in `smoltcp` and `ethercrab`.
    This implementation is linux-specific, and needs `CAP_NET_RAW` (or root)

    The socket is non-blocking and registered to the tokio reactor, so it must be created inside a tokio runtime.
*/
#[derive(Debug)]
pub struct EthernetSocket {
    lower: AsyncFd<RawLink>,
}

/// owner of the raw file descriptor, closing it when dropped
#[derive(Debug)]
struct RawLink {
    fd: libc::c_int,
}

impl EthernetSocket {
    pub fn new(interface: &str) -> io::Result<Self> {
        let name = CString::new(interface)
            .map_err(|_|  io::Error::new(io::ErrorKind::InvalidInput, "interface name contains a nul byte"))?;
        if interface.is_empty() || interface.len() >= libc::IF_NAMESIZE
            {return Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid interface name length"))}

        // create
        let link = unsafe {
            let fd = libc::socket(
                // Ethernet II frames
                libc::AF_PACKET,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                ETHERCAT_TYPE.to_be() as i32,
            );
            if fd == -1 {
                return Err(io::Error::last_os_error());
            }
            RawLink {fd}
        };

        let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
        if index == 0 {
            return Err(io::Error::last_os_error());
        }

        // bind
        let sockaddr = libc::sockaddr_ll {
            sll_family: libc::AF_PACKET as u16,
            sll_protocol: ETHERCAT_TYPE.to_be(),
            sll_ifindex: index as libc::c_int,
            sll_hatype: 1,
            sll_pkttype: 0,
            sll_halen: 6,
            sll_addr: [0; 8],
        };

        unsafe {
            #[allow(trivial_casts)]
            let res = libc::bind(
                link.fd,
                &sockaddr as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            );
            if res == -1 {
                return Err(io::Error::last_os_error());
            }
        }
        log::debug!("raw socket bound to {} (index {})", interface, index);

        Ok(Self {lower: AsyncFd::new(link)?})
    }
}

impl Drop for RawLink {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

impl AsRawFd for RawLink {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl AsRawFd for EthernetSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.lower.as_raw_fd()
    }
}

impl EthercatSocket for EthernetSocket {
    fn poll_receive(&self, cx: &mut Context<'_>, data: &mut [u8]) -> Poll<io::Result<usize>> {
        let mut packed = [0u8; MAX_ETHERNET_FRAME + 4];
        let header_size = ETHERNET_HEADER;
        loop {
            let mut guard = ready!(self.lower.poll_read_ready(cx))?;
            let (len, pkttype) = match guard.try_io(|lower| receive_raw(lower.as_raw_fd(), &mut packed)) {
                Ok(received) => received?,
                Err(_would_block) => continue,
            };
            if pkttype == PACKET_OUTGOING || len < header_size
                {continue}
            let header = EthernetHeader::unpack_from_slice(&packed[.. header_size])
                .map_err(|_|  io::Error::new(io::ErrorKind::InvalidData, "malformed ethernet header"))?;
            if header.ty != ETHERCAT_TYPE
                {continue}

            let content = &packed[header_size .. len];
            let size = content.len().min(data.len());
            data[.. size].copy_from_slice(&content[.. size]);
            return Poll::Ready(Ok(size));
        }
    }
    fn poll_send(&self, cx: &mut Context<'_>, data: &[u8]) -> Poll<io::Result<()>> {
        let mut packed = heapless::Vec::<u8, MAX_ETHERNET_FRAME>::new();
        let header = EthernetHeader {
            dst: DESTINATION,
            src: SOURCE,
            // vlan is said to be optional and this is not present in most ethercat frames, so will not be used here
            ty: ETHERCAT_TYPE,
            }.pack()
            .map_err(|_|  io::Error::new(io::ErrorKind::InvalidInput, "cannot pack ethernet header"))?;
        let too_large = |_|  io::Error::new(io::ErrorKind::InvalidInput, "ethercat frame too large for ethernet");
        packed.extend_from_slice(&header).map_err(too_large)?;
        packed.extend_from_slice(data).map_err(too_large)?;
        if packed.len() < MIN_ETHERNET_FRAME {
            packed.resize(MIN_ETHERNET_FRAME, 0).map_err(too_large)?;
        }

        loop {
            let mut guard = ready!(self.lower.poll_write_ready(cx))?;
            match guard.try_io(|lower| send_raw(lower.as_raw_fd(), &packed)) {
                Ok(sent) => return Poll::Ready(sent),
                Err(_would_block) => continue,
            }
        }
    }
    fn max_frame(&self) -> usize {
        MAX_ETHERNET_FRAME - ETHERNET_HEADER
    }
}


// intermediate C-like functions

/// receive one frame, returning its size and its packet type
fn receive_raw(lower: RawFd, packed: &mut [u8]) -> io::Result<(usize, u8)> {
    let mut address: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
    let mut address_len = std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;
    let len = unsafe {
        #[allow(trivial_casts)]
        libc::recvfrom(
            lower,
            packed.as_mut_ptr() as *mut libc::c_void,
            packed.len(),
            0,
            &mut address as *mut libc::sockaddr_ll as *mut libc::sockaddr,
            &mut address_len,
        )
    };
    if len < 0 {
        Err(io::Error::last_os_error())
    }
    else {
        Ok((len as usize, address.sll_pkttype))
    }
}

fn send_raw(lower: RawFd, data: &[u8]) -> io::Result<()> {
    let len = unsafe {
        libc::write(
            lower,
            data.as_ptr() as *const libc::c_void,
            data.len(),
        )
    };
    if len < 0 {
        Err(io::Error::last_os_error())
    }
    else if (len as usize) != data.len() {
        Err(io::Error::new(io::ErrorKind::WriteZero, "ethernet frame partially sent"))
    }
    else {
        Ok(())
    }
}



#[derive(PackedStruct, Clone, Debug)]
#[packed_struct(size_bytes="14", bit_numbering = "msb0", endian = "msb")]
struct EthernetHeader {
    #[packed_field(bytes="0:5")]  dst: [u8;6],
    #[packed_field(bytes="6:11")]  src: [u8;6],
    #[packed_field(bytes="12:13")]  ty: u16,
}
