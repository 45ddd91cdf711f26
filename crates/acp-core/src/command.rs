//! Protocol command codes.

/// Command carried in the message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Command {
    /// Reflect the body back to the sender.
    Echo = 0x01,
    /// Write a firmware image to the primary flash bank.
    FlashPrimary = 0x03,
    /// Accepted by firmware but with no documented behaviour.
    Reserved4 = 0x04,
    /// Write a firmware image to the secondary flash bank.
    FlashSecondary = 0x05,
    /// Write a bootloader image.
    FlashBootloader = 0x06,
    /// Read one or more typed properties.
    GetProperty = 0x14,
    /// Write one or more typed properties.
    SetProperty = 0x15,
    /// Invoke a station-side action.
    Perform = 0x16,
    /// Accepted by firmware but with no documented behaviour.
    Reserved17 = 0x17,
    /// Subscribe to unsolicited change events.
    Monitor = 0x18,
    /// Remote procedure call with a plist payload.
    Rpc = 0x19,
    /// SRP authentication exchange.
    Authenticate = 0x1a,
    /// Query the station's feature list.
    GetFeatures = 0x1b,
}

impl Command {
    /// Decode a header command field.
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0x01 => Some(Self::Echo),
            0x03 => Some(Self::FlashPrimary),
            0x04 => Some(Self::Reserved4),
            0x05 => Some(Self::FlashSecondary),
            0x06 => Some(Self::FlashBootloader),
            0x14 => Some(Self::GetProperty),
            0x15 => Some(Self::SetProperty),
            0x16 => Some(Self::Perform),
            0x17 => Some(Self::Reserved17),
            0x18 => Some(Self::Monitor),
            0x19 => Some(Self::Rpc),
            0x1a => Some(Self::Authenticate),
            0x1b => Some(Self::GetFeatures),
            _ => None,
        }
    }

    /// Wire representation of this command.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Commands that may be sent before authentication without a password.
    ///
    /// These always carry the empty-password header key.
    pub fn is_pre_auth(self) -> bool {
        matches!(self, Self::Authenticate | Self::GetFeatures)
    }
}
