/*!
    This module provide the trait [EthercatSocket], and the implementor allowing to exchange ethercat frames over a physical ethernet port.

    The raw socket allows one only master with one only ethercat segment on the ethernet network, which is exactly what is needed to find on which port a segment is plugged: an interface with no ethercat slave simply never returns the frames sent.

    Other socket implementations (like a simulated segment) can be given to [RawMaster](crate::rawmaster::RawMaster) as long as they implement [EthercatSocket].
*/

#[cfg(target_os = "linux")]
mod ethernet;

#[cfg(target_os = "linux")]
pub use ethernet::EthernetSocket;
use core::task::{Poll, Context};

use std::io;

/**
    trait implementing the ethercat frame encapsulation into some medium

    This allows to send or receive ethercat frames over any network, but according to ETG 1000.4, only Ethernet and UDP are officially supported
*/
pub trait EthercatSocket {
    /**
        receive an ethercat frame into the given buffer (starting from ethercat header)

        The buffer should be big enough for the data to receive. Returns the number of bytes read.

        The implementor is responsible from assembling the whole packet, and hiding the details of socket-specific headers, footers, checks, fragmentation ...
    */
    fn poll_receive(&self, cx: &mut Context<'_>, data: &mut [u8]) -> Poll<io::Result<usize>>;

    /**
        send an ethercat frame contained in the given buffer.

        The whole buffer will be sent, the user has to tail it to the exact data size to send.

        the buffer passed must contain the data with the ethercat header.
        The implentor of this trait is responsible of encapsulating the data into the specific socket by adding the necessary specific headers, footers, checks, fragmentation ...
    */
    fn poll_send(&self, cx: &mut Context<'_>, data: &[u8]) -> Poll<io::Result<()>>;

    /// maximum frame size tolerated for sending by this socket
    fn max_frame(&self) -> usize;
}
