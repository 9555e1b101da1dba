/*!
	low level ethercat communication functions.

	It wraps an ethercat socket to send and receive ethercat frames containing commands, one PDU at a time.
*/

use core::time::Duration;
use futures::future::poll_fn;
use tokio::sync::Mutex;
use bilge::prelude::*;

use crate::{
    socket::*,
    data::{self, Field, PduData, Storage, Cursor},
    error::{EthercatError, EthercatResult},
    };


/// maximum frame size, currently limited to the size tolerated by its header (content size coded with 11 bits)
const MAX_ETHERCAT_FRAME: usize = 2050;
/// default delay after which a PDU is considered lost
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(200);

/**
    low level ethercat communication functions, with no notion of slave.

    genericity allows to use any socket implementing [EthercatSocket], see [crate::socket] for more details.

    This struct does not do any checking of the communication states on the slaves, it is just executing the basic commands on the slaves physical memory (aka. registers).
    Each command is sent in its own frame and the next command is only sent once the previous frame came back or timed out, so at most one frame is travelling on the segment.

    The returned value of each command is the working counter: the number of slaves who processed the command.
*/
pub struct RawMaster {
	/// delay after which a sent frame is considered lost
	timeout: Duration,
	// socket implementation
	socket: Box<dyn EthercatSocket + Send + Sync>,
	// communication state, locked during a whole PDU exchange
	pdu_state: Mutex<PduState>,
}
struct PduState {
	token: u8,
	send: [u8; MAX_ETHERCAT_FRAME],
	receive: [u8; MAX_ETHERCAT_FRAME],
}
impl RawMaster {
	pub fn new<S: EthercatSocket + 'static + Send + Sync>(socket: S, timeout: Duration) -> Self {
        Self {
            timeout,
            socket: Box::new(socket),
            pdu_state: Mutex::new(PduState {
                token: 0,
                send: [0; MAX_ETHERCAT_FRAME],
                receive: [0; MAX_ETHERCAT_FRAME],
                }),
        }
	}

	// shorthands to PDU commands
	pub async fn brd<T: PduData>(&self, address: Field<T>) -> EthercatResult<PduAnswer<T>> {
        self.read(SlaveAddress::Broadcast, address).await
	}
	pub async fn bwr<T: PduData>(&self, address: Field<T>, data: T) -> EthercatResult<PduAnswer<()>> {
        self.write(SlaveAddress::Broadcast, address, data).await
	}
	pub async fn apwr<T: PduData>(&self, slave: u16, address: Field<T>, data: T) -> EthercatResult<PduAnswer<()>> {
        self.write(SlaveAddress::AutoIncremented(slave), address, data).await
	}
	pub async fn fprd<T: PduData>(&self, slave: u16, address: Field<T>) -> EthercatResult<PduAnswer<T>> {
        self.read(SlaveAddress::Fixed(slave), address).await
	}
	pub async fn fpwr<T: PduData>(&self, slave: u16, address: Field<T>, data: T) -> EthercatResult<PduAnswer<()>> {
        self.write(SlaveAddress::Fixed(slave), address, data).await
	}

	/// maps to a *rd command
	pub async fn read<T: PduData>(&self, slave: SlaveAddress, memory: Field<T>) -> EthercatResult<PduAnswer<T>> {
        let (command, slave) = match slave {
            SlaveAddress::Broadcast => (PduCommand::BRD, 0),
            SlaveAddress::AutoIncremented(address) => (PduCommand::APRD, 0u16.wrapping_sub(address)),
            SlaveAddress::Fixed(address) => (PduCommand::FPRD, address),
            };
        let mut buffer = T::Packed::zeroed();
        let answers = self.pdu(command, slave, memory.byte as u16, &mut buffer.as_mut()[.. memory.len]).await?;
        Ok(PduAnswer {
			answers,
			value: T::unpack(buffer.as_ref())?,
			})
    }
	/// maps to a *wr command
	pub async fn write<T: PduData>(&self, slave: SlaveAddress, memory: Field<T>, data: T) -> EthercatResult<PduAnswer<()>> {
        let (command, slave) = match slave {
            SlaveAddress::Broadcast => (PduCommand::BWR, 0),
            SlaveAddress::AutoIncremented(address) => (PduCommand::APWR, 0u16.wrapping_sub(address)),
            SlaveAddress::Fixed(address) => (PduCommand::FPWR, address),
            };
        let mut buffer = T::Packed::zeroed();
        data.pack(buffer.as_mut())?;
		Ok(PduAnswer {
			answers: self.pdu(command, slave, memory.byte as u16, &mut buffer.as_mut()[.. memory.len]).await?,
			value: (),
			})
	}

	/**
        send a PDU on the ethercat bus and wait for it to come back

        `data` is sent and is overwritten by the data returned by the slaves.
        returns the number of slaves who processed the command, or a timeout error if the frame did not come back in time.
	*/
	pub async fn pdu(&self, command: PduCommand, slave_address: u16, memory_address: u16, data: &mut [u8]) -> EthercatResult<u16> {
        let mut guard = self.pdu_state.lock().await;
        let state = &mut *guard;

        // reserving a token number to recognize our answer among other frames
        let token = state.token;
        state.token = state.token.wrapping_add(1);

        let size = request(
            &mut state.send[.. MAX_ETHERCAT_FRAME.min(self.socket.max_frame())],
            command, token, slave_address, memory_address, data)?;
        log::trace!("send {:?} token {} slave {:#06x} memory {:#06x} len {}", command, token, slave_address, memory_address, data.len());

        let send = &state.send[.. size];
        poll_fn(|cx| self.socket.poll_send(cx, send)).await?;

        match tokio::time::timeout(self.timeout, self.receive(&mut state.receive, command, token, data)).await {
            Ok(answers) => answers,
            Err(_elapsed) => Err(EthercatError::Timeout("no frame returned by the segment")),
        }
	}

	/// receive frames until the answer of the given PDU is found
	async fn receive(&self, receive: &mut [u8], command: PduCommand, token: u8, data: &mut [u8]) -> EthercatResult<u16> {
        loop {
            let size = poll_fn(|cx| self.socket.poll_receive(cx, &mut receive[..])).await?;
            match answer(&receive[.. size], command, token, data) {
                Ok(Some(answers)) => return Ok(answers),
                Ok(None) => {},
                // frames of other masters or truncated frames are not answers, ignore them
                Err(_) => log::debug!("ignoring malformed frame of {} bytes", size),
            }
        }
	}
}

/// write a frame containing one PDU in the given buffer, returns the frame size
fn request(buffer: &mut [u8], command: PduCommand, token: u8, slave_address: u16, memory_address: u16, data: &[u8]) -> EthercatResult<usize> {
    let content = PduHeader::packed_size() + data.len() + PduFooter::packed_size();
    if EthercatHeader::packed_size() + content > buffer.len()
        {return Err(EthercatError::Master("data too large for one frame"))}

    let mut header = PduHeader::from(u80::new(0));
    header.set_command(command as u8);
    header.set_token(token);
    header.set_slave_address(slave_address);
    header.set_memory_address(memory_address);
    header.set_len(u11::new(data.len() as u16));

    let mut cursor = Cursor::new(buffer);
    cursor.pack(&EthercatHeader::pdu(content))?;
    cursor.pack(&header)?;
    cursor.write(data)?;
    cursor.pack(&PduFooter::from(0u16))?;
    Ok(cursor.position())
}

/// look for the answer to the given PDU in a received frame, copy its data and return its working count
fn answer(frame: &[u8], command: PduCommand, token: u8, data: &mut [u8]) -> EthercatResult<Option<u16>> {
    let mut frame = Cursor::new(frame);
    let header = frame.unpack::<EthercatHeader>()?;
    if header.ty().value() != EthercatType::PDU as u8
        {return Ok(None)}
    let mut content = Cursor::new(frame.read(usize::from(header.len().value()))?);
    loop {
        let pdu = content.unpack::<PduHeader>()?;
        let body = content.read(usize::from(pdu.len().value()))?;
        let footer = content.unpack::<PduFooter>()?;
        if pdu.token() == token
        && pdu.command() == command as u8
        && body.len() == data.len() {
            data.copy_from_slice(body);
            return Ok(Some(footer.working_count()));
        }
        if ! pdu.next() {break}
    }
    Ok(None)
}


/// dynamically specifies a destination address on the ethercat loop
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum SlaveAddress {
	/// every slave will receive and execute
	Broadcast,
	/// address will be determined by the topology (index of the slave in the ethernet loop)
	AutoIncremented(u16),
	/// address has been set by the master previously
	Fixed(u16),
}

#[derive(Copy, Clone, Debug)]
pub struct PduAnswer<T> {
	pub answers: u16,
	pub value: T,
}
impl<T> PduAnswer<T> {
    /// return the value if exactly one slave answered
    pub fn one(self) -> EthercatResult<T> {
        self.exact(1)
    }
    /// return the value if exactly `n` slaves answered
    pub fn exact(self, n: u16) -> EthercatResult<T> {
        if self.answers != n
            {return Err(EthercatError::Protocol("wrong slave count answering PDU"))}
        Ok(self.value)
    }
}


/// ethercat frame header (common to ethernet or UDP mediums) as described in ETG 1000.4 table 11
#[bitsize(16)]
#[derive(FromBits, DebugBits, Copy, Clone)]
struct EthercatHeader {
    /// length of the ethercat frame (minus 2 bytes, which is the header)
    len: u11,
    reserved: u1,
    /// frame type, see [EthercatType]
    ty: u4,
}
data::bilge_pdudata!(EthercatHeader, u16);

impl EthercatHeader {
    fn pdu(len: usize) -> Self {
        let mut header = Self::from(0u16);
        header.set_len(u11::new(len as u16));
        header.set_ty(u4::new(EthercatType::PDU as u8));
        header
    }
}

/// type of ethercat frame
#[repr(u8)]
#[derive(Debug, Copy, Clone)]
enum EthercatType {
    /// process data unit, use to exchange with physical and logical memory
    ///
    /// See ETG.1000.4
    PDU = 0x1,
}


/// header of a PDU frame, this one of the possible ethercat frames
#[bitsize(80)]
#[derive(FromBits, DebugBits, Copy, Clone)]
struct PduHeader {
    /// PDU command, specifying whether logical or physical memory is accesses, addressing type, and what read/write operation
    command: u8,
    /// PDU task request identifier
    token: u8,
    /// slave address, its meaning depend on the command
    slave_address: u16,
    /// memory address of the data to access, which memory is accessed depend on the command
    memory_address: u16,
    /// data length following the header, excluding the footer. starting from `memory_address` in the addressed memory
    len: u11,
    reserved: u3,
    circulating: bool,
    /// true if there is an other PDU in the same PDU frame
    next: bool,
    interrupt: u16,
}
data::bilge_pdudata!(PduHeader, u80, u128, 10);

/// footer for PDU exchange
#[bitsize(16)]
#[derive(FromBits, DebugBits, Copy, Clone)]
struct PduFooter {
    working_count: u16,
}
data::bilge_pdudata!(PduFooter, u16);

/// the possible PDU commands
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PduCommand {
    /// no operation
    NOP = 0x0,

    /// broadcast read
    BRD = 0x07,
    /// broadcast write
    BWR = 0x08,
    /// broadcast read & write
    BRW = 0x09,

    /// auto-incremented slave read
    APRD = 0x01,
    /// auto-incremented slave write
    APWR = 0x02,
    /// auto-incremented slave read & write
    APRW = 0x03,

    /// fixed slave read
    FPRD = 0x04,
    /// fixed slave write
    FPWR = 0x05,
    /// fixed slave read & write
    FPRW = 0x06,

    /// logical memory read
    LRD = 0x0A,
    /// logical memory write
    LWR = 0x0B,
    /// logical memory read & write
    LRW = 0x0C,

    /// auto-incremented slave read multiple write
    ARMW = 0x0D,
    /// fixed slave read multiple write
    FRMW = 0x0E,
}
