use core::fmt;

use super::commands::{self, Frame};

pub const COMMAND_LEN: usize = 7;
pub const ANSWER_LEN: usize = 32;
/// Bytes following the start marker.
pub const BODY_LEN: usize = ANSWER_LEN - 2;
/// Bytes covered by the check code.
const CHECKED_LEN: usize = ANSWER_LEN - 2;

/// Commands understood by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Read,
    PassiveMode,
    ActiveMode,
    Sleep,
    Wakeup,
}

impl Command {
    pub const ALL: [Command; 5] = [
        Command::Read,
        Command::PassiveMode,
        Command::ActiveMode,
        Command::Sleep,
        Command::Wakeup,
    ];

    /// Returns the wire form of the command, checksum included.
    pub const fn encode(self) -> Frame {
        match self {
            Command::Read => commands::READ,
            Command::PassiveMode => commands::CHANGE_MODE_PASSIVE,
            Command::ActiveMode => commands::CHANGE_MODE_ACTIVE,
            Command::Sleep => commands::SLEEP,
            Command::Wakeup => commands::WAKEUP,
        }
    }
}

/// Additive check code used by both frame directions.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, &byte| sum.wrapping_add(u16::from(byte)))
}

/// Why a 32-byte buffer was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    MissingStart,
    ChecksumMismatch { expected: u16, calculated: u16 },
}

/// Decoded answer frame. Concentrations are in µg/m³, particle bins are
/// counts per 0.1 L of air beyond the given diameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AnswerFrame {
    pub length: u16,
    pub pm1_standard: u16,
    pub pm25_standard: u16,
    pub pm10_standard: u16,
    pub pm1_atmospheric: u16,
    pub pm25_atmospheric: u16,
    pub pm10_atmospheric: u16,
    pub particles_300nm: u16,
    pub particles_500nm: u16,
    pub particles_1000nm: u16,
    pub particles_2500nm: u16,
    pub particles_5000nm: u16,
    pub particles_10000nm: u16,
    pub reserved: u16,
    pub check_code: u16,
}

impl AnswerFrame {
    /// Length field the sensor reports: 13 data words plus the check code.
    pub const LENGTH: u16 = 28;

    pub fn decode(bytes: &[u8; ANSWER_LEN]) -> Result<Self, FrameError> {
        if bytes[0] != commands::START_1 || bytes[1] != commands::START_2 {
            return Err(FrameError::MissingStart);
        }

        let word = |index: usize| u16::from_be_bytes([bytes[2 + 2 * index], bytes[3 + 2 * index]]);

        let expected = word(14);
        let calculated = checksum(&bytes[..CHECKED_LEN]);
        if expected != calculated {
            return Err(FrameError::ChecksumMismatch {
                expected,
                calculated,
            });
        }

        Ok(Self {
            length: word(0),
            pm1_standard: word(1),
            pm25_standard: word(2),
            pm10_standard: word(3),
            pm1_atmospheric: word(4),
            pm25_atmospheric: word(5),
            pm10_atmospheric: word(6),
            particles_300nm: word(7),
            particles_500nm: word(8),
            particles_1000nm: word(9),
            particles_2500nm: word(10),
            particles_5000nm: word(11),
            particles_10000nm: word(12),
            reserved: word(13),
            check_code: expected,
        })
    }

    /// Serializes the frame, recomputing the check code from the other fields.
    pub fn to_bytes(&self) -> [u8; ANSWER_LEN] {
        let mut bytes = [0u8; ANSWER_LEN];
        bytes[0] = commands::START_1;
        bytes[1] = commands::START_2;

        let words = [
            self.length,
            self.pm1_standard,
            self.pm25_standard,
            self.pm10_standard,
            self.pm1_atmospheric,
            self.pm25_atmospheric,
            self.pm10_atmospheric,
            self.particles_300nm,
            self.particles_500nm,
            self.particles_1000nm,
            self.particles_2500nm,
            self.particles_5000nm,
            self.particles_10000nm,
            self.reserved,
        ];
        for (chunk, word) in bytes[2..CHECKED_LEN].chunks_exact_mut(2).zip(words) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }

        let check = checksum(&bytes[..CHECKED_LEN]);
        bytes[CHECKED_LEN..].copy_from_slice(&check.to_be_bytes());
        bytes
    }
}

impl fmt::Display for AnswerFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "PM1 {} µg/m³, PM2.5 {} µg/m³, PM10 {} µg/m³",
            self.pm1_standard, self.pm25_standard, self.pm10_standard
        )
    }
}
