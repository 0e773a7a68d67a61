pub type Frame = [u8; 7];

pub const START_1: u8 = 0x42;
pub const START_2: u8 = 0x4d;

pub const CMD_READ: u8 = 0xe2;
pub const CMD_CHANGE_MODE: u8 = 0xe1;
pub const CMD_SLEEP_SET: u8 = 0xe4;

// Trailing two bytes are the big-endian sum of the first five.
pub const READ: Frame = [START_1, START_2, CMD_READ, 0x00, 0x00, 0x01, 0x71];
pub const CHANGE_MODE_PASSIVE: Frame = [START_1, START_2, CMD_CHANGE_MODE, 0x00, 0x00, 0x01, 0x70];
pub const CHANGE_MODE_ACTIVE: Frame = [START_1, START_2, CMD_CHANGE_MODE, 0x00, 0x01, 0x01, 0x71];
pub const SLEEP: Frame = [START_1, START_2, CMD_SLEEP_SET, 0x00, 0x00, 0x01, 0x73];
pub const WAKEUP: Frame = [START_1, START_2, CMD_SLEEP_SET, 0x00, 0x01, 0x01, 0x74];
