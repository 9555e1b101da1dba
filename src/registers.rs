/*!
    structs and consts for the registers in a standard slave's RAM that are used to detect and identify slaves. This should be used instead of any hardcoded register value.

    Some registers are partially redundant, this is because we can use some field pointing to a big struct and other fields pointing to only parts of the same struct.
*/

use bilge::prelude::*;
use crate::data::{self, Field, PduData, PackingResult, Cursor};

pub mod address {
    use super::*;

    /// register of the station address, aka the fixed slave address
    /// ETG.1000.4 table 32
    pub const fixed: Field<u16> = Field::simple(0x0010);
}
pub mod dl {
    use super::*;

    /// type and revision of the slave controller, every ESC implements it so it is the register broadcasted to count slaves
    /// ETG.1000.4 table 31
    pub const information: Field<DLInformation> = Field::simple(0x0000);
}

/// SII (Slave Information Interface) allows to retreive declarative informations about a slave (like a manifest) like product code, vendor, etc as well as slave boot-up configs
pub mod sii {
    use super::*;

	pub const access: Field<u8> = Field::simple(0x0500);
	pub const control: Field<SiiControl> = Field::simple(0x0502);
	/// register contains the read data (32 bit/64 bit) with the last read operation.
	pub const data: Field<[u8; 8]> = Field::simple(0x0508);

	/// agregates [const@control] and the EEPROM address register following it, so a request is issued in one PDU
	pub const request: Field<SiiRequest> = Field::simple(control.byte);
}

/// AL (Application Layer) registers are controling the communication state of a slave
pub mod al {
    use super::*;

    pub const control: Field<AlControlRequest> = Field::simple(0x0120);
    pub const status: Field<AlStatus> = Field::simple(0x0130);
}


/// ETG.1000.4 table 31, only the leading words are needed to count and identify controllers
#[bitsize(16)]
#[derive(FromBits, DebugBits, Copy, Clone, PartialEq, Eq)]
pub struct DLInformation {
    /// type of the slave controller
    pub ty: u8,
    /// (major revision) revision of the slave controller.
    pub revision: u8,
}
data::bilge_pdudata!(DLInformation, u16);

/**
    the current operation state on one device.

    ETG.1000.6 table 9
*/
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AlState {
    Init = 1,
    PreOperational = 2,
    Bootstrap = 3,
    SafeOperational = 4,
    Operational = 8,
}

/// ETG.1000.6 table 9
#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq)]
pub struct AlControlRequest {
    /// requested state of communication
    pub state: u4,
    /// if true, parameter change of the [AlStatus::changed] will be reset
    pub ack: bool,
    /// request of id instead of error code in the AL status code register
    pub request_id: bool,
    reserved: u2,
}
data::bilge_pdudata!(AlControlRequest, u8);

impl AlControlRequest {
    /// request to switch to the given state, acknowledging any pending error
    pub fn switch(state: AlState) -> Self {
        let mut request = Self::from(0u8);
        request.set_state(u4::new(state as u8));
        request.set_ack(true);
        request
    }
}

/// ETG.1000.6 table 12
#[bitsize(8)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq)]
pub struct AlStatus {
    /// current state of communication, as a mix of [AlState] flags when read by broadcast
    pub state: u4,
    /// true if requested by [AlControlRequest::ack]
    pub changed: bool,
    reserved: u3,
}
data::bilge_pdudata!(AlStatus, u8);


/**
    register controling the read/write operations to Slave Information Interface (SII)

	ETG.1000.4 table 49
*/
#[bitsize(16)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq)]
pub struct SiiControl {
	/// true if SII is writable
	pub write_access: bool,
	reserved: u4,
	/**
		- false: Normal operation (DL interfaces to SII)
		- true: DL-user emulates SII

		cannot be set by the master
	*/
	pub eeprom_emulation: bool,
	/// number of bytes per read transaction, cannot be set by master
	pub read_size: SiiTransaction,
	/// unit of SII addresses, cannot be set by master
	pub address_unit: SiiUnit,
	/**
		read operation requested (parameter write) or read operation busy (parameter read)
		To start a new read operation there must be a positive edge on this parameter
	*/
	pub read_operation: bool,
	/// write operation requested (parameter write) or write operation busy (parameter read)
	pub write_operation: bool,
	/// reload operation requested (parameter write) or reload operation busy (parameter read)
	pub reload_operation: bool,

	/// checksum error while reading at startup
	pub checksum_error: bool,
	/// error on reading Device Information
	pub device_info_error: bool,
	/// error on last SII request, the request was not acknowledged by the EEPROM
	pub command_error: bool,
	/// error on last write operation
	pub write_error: bool,

	/// operation is ongoing
	pub busy: bool,
}
data::bilge_pdudata!(SiiControl, u16);

impl SiiControl {
    /// a control word requesting nothing, also clearing the error flags
    pub fn nop() -> Self  {Self::from(0u16)}
    /// a control word requesting a read operation
    pub fn read() -> Self {
        let mut control = Self::nop();
        control.set_read_operation(true);
        control
    }
}

#[bitsize(1)]
#[derive(FromBits, Debug, Copy, Clone, Eq, PartialEq)]
pub enum SiiTransaction {
	Bytes4 = 0,
	Bytes8 = 1,
}
impl SiiTransaction {
    /// number of bytes available in [sii::data] after a read operation
    pub fn len(self) -> usize {
        match self {
            Self::Bytes4 => 4,
            Self::Bytes8 => 8,
        }
    }
}

#[bitsize(1)]
#[derive(FromBits, Debug, Copy, Clone, Eq, PartialEq)]
pub enum SiiUnit {
	Byte = 0,
	Word = 1,
}

/// control word and EEPROM word address of an SII request, contiguous in the slave's memory
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SiiRequest {
    pub control: SiiControl,
    pub address: u32,
}
impl PduData for SiiRequest {
    type Packed = [u8; 6];

    fn pack(&self, dst: &mut [u8]) -> PackingResult<()> {
        let mut cursor = Cursor::new(dst);
        cursor.pack(&self.control)?;
        cursor.pack(&self.address)
    }
    fn unpack(src: &[u8]) -> PackingResult<Self> {
        let mut cursor = Cursor::new(src);
        Ok(Self {
            control: cursor.unpack()?,
            address: cursor.unpack()?,
        })
    }
}
