/*!
    This module expose the standard EEPROM registers needed to identify a slave. registers are defined as word addresses in the EEPROM, which content can be accessed using the instance of [Sii](crate::sii::Sii) (Slave Information Interface) proper to each slave.

    ETG.1000.6 5.4
*/

//  ETG.1000.6 5.4 table 16

pub mod device {
    pub const vendor: u16 = 0x0008;
    pub const product: u16 = 0x000a;
}

/// first word of the categories area, every category starts with a header of 2 words: its type then its size in words
pub const categories: u16 = 0x0040;

/// type of category in the SII, ETG.1000.6 table 19
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CategoryType {
    Nop,
    /// String repository for other Categories structure of this category data see ETG.1000.6 Table 20
    Strings,
    /// General information structure of this category data see ETG.1000.6 Table 21
    General,
    /// mark the end of SII categories
    End,
    /// any other category, not needed to identify a slave
    Other(u16),
}
impl From<u16> for CategoryType {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Nop,
            10 => Self::Strings,
            30 => Self::General,
            0xffff => Self::End,
            other => Self::Other(other),
        }
    }
}

pub mod general {
    /// byte offset in the general category of the device name, as an index to the strings category (1-based, 0 means no name)
    pub const name: usize = 3;
}
