//! Console menu: command keys, menu text and the command mailbox.
//!
//! The console is polled from the main loop, but the byte slot is atomic so a
//! receive interrupt handler could post into it without changing the reader.

use core::sync::atomic::{AtomicU8, Ordering};

/// One menu action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuCommand {
    /// `0`: step to the next PCK/MCK setting
    NextClockSetting,
    /// `1`: backup mode
    Backup,
    /// `2`: ultra low power mode 0
    Ulp0,
    /// `3`: ultra low power mode 1
    Ulp1,
    /// `4`: idle mode
    Idle,
    /// `A`: DDR power-up sequence
    DdrInit,
    /// `B`: fill the DDR with the test pattern
    DdrWrite,
    /// `C`: verify the test pattern
    DdrCheck,
    /// `D`: DDR self-refresh, pads isolated
    DdrSelfRefresh,
    /// `E`: DDR back to normal mode
    DdrNormal,
}

impl MenuCommand {
    /// Every command, in menu order.
    pub const ALL: [Self; 10] = [
        Self::NextClockSetting,
        Self::Backup,
        Self::Ulp0,
        Self::Ulp1,
        Self::Idle,
        Self::DdrInit,
        Self::DdrWrite,
        Self::DdrCheck,
        Self::DdrSelfRefresh,
        Self::DdrNormal,
    ];

    /// Decode a received byte. Letters are case-insensitive; anything else
    /// returns `None`.
    pub const fn from_key(byte: u8) -> Option<Self> {
        Some(match byte.to_ascii_uppercase() {
            b'0' => Self::NextClockSetting,
            b'1' => Self::Backup,
            b'2' => Self::Ulp0,
            b'3' => Self::Ulp1,
            b'4' => Self::Idle,
            b'A' => Self::DdrInit,
            b'B' => Self::DdrWrite,
            b'C' => Self::DdrCheck,
            b'D' => Self::DdrSelfRefresh,
            b'E' => Self::DdrNormal,
            _ => return None,
        })
    }

    /// Character echoed back when the command is accepted.
    pub const fn echo(self) -> char {
        match self {
            Self::NextClockSetting => '0',
            Self::Backup => '1',
            Self::Ulp0 => '2',
            Self::Ulp1 => '3',
            Self::Idle => '4',
            Self::DdrInit => 'a',
            Self::DdrWrite => 'b',
            Self::DdrCheck => 'c',
            Self::DdrSelfRefresh => 'd',
            Self::DdrNormal => 'e',
        }
    }

    /// `true` for commands that read or write the DDR window.
    pub const fn touches_ddr_contents(self) -> bool {
        matches!(self, Self::DdrWrite | Self::DdrCheck)
    }
}

/// Menu printed after start-up and after every command.
pub const MENU_TEXT: &str = "\n\r\n\r ------------------------------------------\n\r \
Select an option :\n\r \
0 -> Select clock setting\n\r \
1 -> Enter BackUp mode\n\r \
2 -> Enter Ultra Low Power mode 0\n\r \
3 -> Enter Ultra Low Power mode 1\n\r \
4 -> Enter Idle mode\n\r \
A -> Init DDR\n\r \
B -> Write data in DDR\n\r \
C -> Check data in DDR\n\r \
D -> Set DDR self-refresh mode and isolate Pads\n\r \
E -> Reset DDR to normal mode and reconnect Pads\n\r \
=>";

const EMPTY: u8 = 0;

/// Single-slot command mailbox. The last posted byte wins.
pub struct Mailbox {
    slot: AtomicU8,
}

impl Mailbox {
    /// Empty mailbox.
    pub const fn new() -> Self {
        Self { slot: AtomicU8::new(EMPTY) }
    }

    /// Post a received byte. NUL is dropped since it marks the empty slot.
    pub fn post(&self, byte: u8) {
        if byte != EMPTY {
            self.slot.store(byte, Ordering::Release);
        }
    }

    /// Take the pending byte, leaving the slot empty.
    pub fn take(&self) -> Option<u8> {
        match self.slot.swap(EMPTY, Ordering::AcqRel) {
            EMPTY => None,
            byte => Some(byte),
        }
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
