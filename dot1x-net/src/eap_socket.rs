//! Raw `AF_PACKET` socket carrying EAPOL frames on one interface.

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use async_trait::async_trait;
use tokio::io::unix::AsyncFd;
use tracing::{debug, info};

use crate::error::Result;
use crate::ethernet::{MacAddress, ETHERTYPE_EAPOL};
use crate::interface::InterfaceInfo;
use crate::transport::{ShutdownSignal, Transport};

const MAX_FRAME_LEN: usize = 65536;

// linux/if_packet.h `struct packet_mreq`
#[repr(C)]
struct PacketMreq {
    mr_ifindex: libc::c_int,
    mr_type: libc::c_ushort,
    mr_alen: libc::c_ushort,
    mr_address: [libc::c_uchar; 8],
}

pub struct EapSocket {
    fd: AsyncFd<OwnedFd>,
    mac: MacAddress,
    shutdown: ShutdownSignal,
}

impl EapSocket {
    /// Binds to `interface` for ethertype 0x888e and joins the PAE group
    /// address. With `promiscuous` the interface is also put in promiscuous
    /// mode for as long as the socket is open.
    pub fn open(interface: &InterfaceInfo, promiscuous: bool) -> Result<Self> {
        let protocol = ETHERTYPE_EAPOL.to_be();
        // SAFETY: plain socket(2) call; the result is checked before use.
        let raw = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                protocol as libc::c_int,
            )
        };
        if raw < 0 {
            return Err(io::Error::last_os_error().into());
        }
        // SAFETY: `raw` is a freshly created descriptor owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        // SAFETY: sockaddr_ll is plain old data; all-zero is a valid value.
        let mut addr: libc::sockaddr_ll = unsafe { mem::zeroed() };
        addr.sll_family = libc::AF_PACKET as libc::c_ushort;
        addr.sll_protocol = protocol;
        addr.sll_ifindex = interface.index as libc::c_int;
        // SAFETY: `addr` outlives the call and its size is passed alongside.
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error().into());
        }

        let mut group = [0u8; 8];
        group[..6].copy_from_slice(&MacAddress::EAPOL_MULTICAST.octets());
        add_membership(&fd, interface.index, libc::PACKET_MR_MULTICAST as libc::c_ushort, group)?;
        if promiscuous {
            add_membership(&fd, interface.index, libc::PACKET_MR_PROMISC as libc::c_ushort, [0u8; 8])?;
        }

        info!(
            "EAPOL socket bound to {} (index {}, mac {}, promiscuous {})",
            interface.name, interface.index, interface.mac, promiscuous
        );
        Ok(EapSocket {
            fd: AsyncFd::new(fd)?,
            mac: interface.mac,
            shutdown: ShutdownSignal::new(),
        })
    }

    /// Hardware address of the bound interface.
    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    async fn recv_frame(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.fd.readable().await?;
            let result = guard.try_io(|inner| {
                // SAFETY: `buf` is valid for writes of `buf.len()` bytes.
                let n = unsafe {
                    libc::recv(inner.as_raw_fd(), buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0)
                };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            });
            match result {
                Ok(received) => return received,
                Err(_would_block) => continue,
            }
        }
    }
}

fn add_membership(fd: &OwnedFd, ifindex: u32, mr_type: libc::c_ushort, address: [u8; 8]) -> Result<()> {
    let mreq = PacketMreq {
        mr_ifindex: ifindex as libc::c_int,
        mr_type,
        mr_alen: if mr_type == libc::PACKET_MR_MULTICAST as libc::c_ushort { 6 } else { 0 },
        mr_address: address,
    };
    // SAFETY: `mreq` matches the kernel's packet_mreq layout and outlives the call.
    let rc = unsafe {
        libc::setsockopt(
            fd.as_raw_fd(),
            libc::SOL_PACKET,
            libc::PACKET_ADD_MEMBERSHIP,
            &mreq as *const PacketMreq as *const libc::c_void,
            mem::size_of::<PacketMreq>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error().into());
    }
    Ok(())
}

#[async_trait]
impl Transport for EapSocket {
    async fn send(&self, data: &[u8]) -> Result<()> {
        loop {
            let mut guard = self.fd.writable().await?;
            let result = guard.try_io(|inner| {
                // SAFETY: `data` is valid for reads of `data.len()` bytes.
                let n = unsafe {
                    libc::send(inner.as_raw_fd(), data.as_ptr() as *const libc::c_void, data.len(), 0)
                };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            });
            match result {
                Ok(sent) => {
                    sent?;
                    return Ok(());
                }
                Err(_would_block) => continue,
            }
        }
    }

    async fn receive(&self) -> Result<Option<Vec<u8>>> {
        if self.shutdown.is_triggered() {
            return Ok(None);
        }
        let mut buf = vec![0u8; MAX_FRAME_LEN];
        tokio::select! {
            received = self.recv_frame(&mut buf) => {
                let n = received?;
                buf.truncate(n);
                Ok(Some(buf))
            }
            _ = self.shutdown.triggered() => {
                debug!("EAPOL socket shut down");
                Ok(None)
            }
        }
    }

    fn shutdown(&self) {
        self.shutdown.trigger();
    }
}
