/*!
    implementation of the Slave Information Interface (SII), giving access to a slave's EEPROM where its identity is stored.

    ETG.1000.4 6.4, ETG.1000.6 5.4
*/

use crate::{
    rawmaster::RawMaster,
    registers::{self, SiiControl, SiiRequest},
    eeprom::{self, CategoryType},
    data::Cursor,
    error::{EthercatError, EthercatResult},
    };


/// number of polls of the SII control register before considering the EEPROM stuck
const SII_POLLS: usize = 100;
/// number of attempts of an EEPROM read refused by the EEPROM
const SII_RETRIES: usize = 3;
/// maximum number of categories walked before giving up on finding the name
const MAX_CATEGORIES: usize = 64;

/// error reported by the slave's SII
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SiiError {
    /// the EEPROM did not acknowledge the read request
    Nack,
    /// the SII stayed busy with an other operation
    Busy,
    /// the EEPROM content is not following the standard layout
    Malformed,
}

impl From<EthercatError<()>> for EthercatError<SiiError> {
    fn from(src: EthercatError<()>) -> Self {src.upgrade()}
}


/**
    reader of a slave's EEPROM through its SII

    The slave must have a fixed address, and the EEPROM access must be given to the master (this is the default after power-on)
*/
pub struct Sii<'a> {
    master: &'a RawMaster,
    slave: u16,
}
impl<'a> Sii<'a> {
    pub fn new(master: &'a RawMaster, slave: u16) -> Self {
        Self {master, slave}
    }

    /// wait for the SII to finish any ongoing operation and return its control register
    async fn idle(&self) -> EthercatResult<SiiControl, SiiError> {
        for _ in 0 .. SII_POLLS {
            let control = self.master.fprd(self.slave, registers::sii::control).await?.one()?;
            if ! control.busy()
                {return Ok(control)}
        }
        Err(EthercatError::Slave(SiiError::Busy))
    }

    /// read the chunk of bytes (4 or 8 depending on the slave) starting at the given word address
    async fn read_chunk(&self, address: u16) -> EthercatResult<heapless::Vec<u8, 8>, SiiError> {
        for _ in 0 .. SII_RETRIES {
            let control = self.idle().await?;
            if control.command_error() || control.write_error() {
                // clear the error flags of a former request
                self.master.fpwr(self.slave, registers::sii::control, SiiControl::nop()).await?.one()?;
            }
            self.master.fpwr(self.slave, registers::sii::request, SiiRequest {
                control: SiiControl::read(),
                address: u32::from(address),
                }).await?.one()?;

            let status = self.idle().await?;
            if status.command_error() {
                log::debug!("slave {:#06x} eeprom did not acknowledge reading word {:#06x}", self.slave, address);
                continue
            }
            let data = self.master.fprd(self.slave, registers::sii::data).await?.one()?;
            return heapless::Vec::from_slice(&data[.. status.read_size().len()])
                .map_err(|_|  EthercatError::Slave(SiiError::Malformed));
        }
        Err(EthercatError::Slave(SiiError::Nack))
    }

    /// read `len` bytes from the EEPROM, starting at the given word address
    pub async fn read(&self, address: u16, len: usize) -> EthercatResult<Vec<u8>, SiiError> {
        let mut data = Vec::with_capacity(len + 8);
        let mut word = address;
        while data.len() < len {
            let chunk = self.read_chunk(word).await?;
            data.extend_from_slice(&chunk);
            word = word.checked_add((chunk.len() / 2) as u16)
                .ok_or(EthercatError::Slave(SiiError::Malformed))?;
        }
        data.truncate(len);
        Ok(data)
    }
    /// read a 32 bit word from the EEPROM
    pub async fn read_u32(&self, address: u16) -> EthercatResult<u32, SiiError> {
        let data = self.read(address, 4).await?;
        Ok(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
    }

    /// vendor id and product code of the slave
    pub async fn identity(&self) -> EthercatResult<(u32, u32), SiiError> {
        Ok((
            self.read_u32(eeprom::device::vendor).await?,
            self.read_u32(eeprom::device::product).await?,
        ))
    }

    /**
        device name of the slave, as given by the general category and stored in the strings category

        returns `None` if the EEPROM does not provide a name, or a blank one
    */
    pub async fn name(&self) -> EthercatResult<Option<String>, SiiError> {
        let malformed = EthercatError::Slave(SiiError::Malformed);
        let mut word = eeprom::categories;
        let mut strings = None;
        let mut name = None;

        for _ in 0 .. MAX_CATEGORIES {
            let header = self.read(word, 4).await?;
            let category = CategoryType::from(u16::from_le_bytes([header[0], header[1]]));
            let size = u16::from_le_bytes([header[2], header[3]]);
            let content = word.checked_add(2).ok_or(malformed.clone())?;
            match category {
                CategoryType::End => break,
                CategoryType::Strings => strings = Some((content, size)),
                CategoryType::General => {
                    let general = self.read(content, eeprom::general::name + 1).await?;
                    name = Some(general[eeprom::general::name]);
                    },
                _ => {},
            }
            if strings.is_some() && name.is_some()
                {break}
            word = content.checked_add(size).ok_or(malformed.clone())?;
        }

        let (Some((start, size)), Some(index)) = (strings, name)
            else {return Ok(None)};
        if index == 0
            {return Ok(None)}
        let content = self.read(start, usize::from(size) * 2).await?;
        Ok(string(&content, index))
    }
}

/// extract the string at the given index (starting at 1) in the content of a strings category
fn string(strings: &[u8], index: u8) -> Option<String> {
    let mut cursor = Cursor::new(strings);
    let count = cursor.unpack::<u8>().ok()?;
    if index == 0 || index > count
        {return None}
    for i in 1 ..= count {
        let len = cursor.unpack::<u8>().ok()?;
        let text = cursor.read(usize::from(len)).ok()?;
        if i == index {
            let text = String::from_utf8_lossy(text);
            let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            return (! text.is_empty()).then(|| text.to_owned());
        }
    }
    None
}
