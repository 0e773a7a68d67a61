pub const ADDR_PRIMARY: u8 = 0x76;
pub const ADDR_SECONDARY: u8 = 0x77;

pub const ID: u8 = 0xd0;
pub const RESET: u8 = 0xe0;
pub const CTRL_HUM: u8 = 0xf2;
pub const STATUS: u8 = 0xf3;
pub const CTRL_MEAS: u8 = 0xf4;
pub const CONFIG: u8 = 0xf5;
pub const PRESS_MSB: u8 = 0xf7;
pub const TEMP_MSB: u8 = 0xfa;
pub const HUM_MSB: u8 = 0xfd;

// Calibration lives in three separate ranges.
pub const CALIB_TP: u8 = 0x88;
pub const CALIB_TP_LEN: usize = 24;
pub const CALIB_H1: u8 = 0xa1;
pub const CALIB_H2: u8 = 0xe1;
pub const CALIB_H2_LEN: usize = 7;

pub const RESET_WORD: u8 = 0xb6;
pub const CHIP_ID: u8 = 0x60;

pub const STATUS_MEASURING: u8 = 1 << 3;
pub const STATUS_IM_UPDATE: u8 = 1 << 0;
