use super::registers::{CALIB_H2_LEN, CALIB_TP_LEN};

/// Factory trimming constants, named as in the datasheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationSet {
    pub dig_t1: u16,
    pub dig_t2: i16,
    pub dig_t3: i16,
    pub dig_p1: u16,
    pub dig_p2: i16,
    pub dig_p3: i16,
    pub dig_p4: i16,
    pub dig_p5: i16,
    pub dig_p6: i16,
    pub dig_p7: i16,
    pub dig_p8: i16,
    pub dig_p9: i16,
    pub dig_h1: u8,
    pub dig_h2: i16,
    pub dig_h3: u8,
    pub dig_h4: i16,
    pub dig_h5: i16,
    pub dig_h6: i8,
}

impl CalibrationSet {
    /// Merges the three calibration ranges: `0x88..=0x9f`, `0xa1` and
    /// `0xe1..=0xe7`.
    pub fn from_registers(
        tp: &[u8; CALIB_TP_LEN],
        h1: u8,
        h: &[u8; CALIB_H2_LEN],
    ) -> Self {
        let unsigned = |i: usize| u16::from_le_bytes([tp[i], tp[i + 1]]);
        let signed = |i: usize| i16::from_le_bytes([tp[i], tp[i + 1]]);

        // 0xe4 holds H4[11:4], 0xe5 holds H5[3:0] in its high nibble and
        // H4[3:0] in its low nibble, 0xe6 holds H5[11:4]. Both are signed.
        let dig_h4 = (i16::from(h[3] as i8) << 4) | i16::from(h[4] & 0x0f);
        let dig_h5 = (i16::from(h[5] as i8) << 4) | i16::from(h[4] >> 4);

        Self {
            dig_t1: unsigned(0),
            dig_t2: signed(2),
            dig_t3: signed(4),
            dig_p1: unsigned(6),
            dig_p2: signed(8),
            dig_p3: signed(10),
            dig_p4: signed(12),
            dig_p5: signed(14),
            dig_p6: signed(16),
            dig_p7: signed(18),
            dig_p8: signed(20),
            dig_p9: signed(22),
            dig_h1: h1,
            dig_h2: i16::from_le_bytes([h[0], h[1]]),
            dig_h3: h[2],
            dig_h4,
            dig_h5,
            dig_h6: h[6] as i8,
        }
    }
}
