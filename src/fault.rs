/// Coarse classification of everything that can go wrong during acquisition.
///
/// The acquisition loop only looks at this, never at the concrete error, when
/// deciding whether a failed step is worth another attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// Bus or serial link failure.
    Transport,
    /// The device answered, but not with what the protocol allows.
    Protocol,
    /// Calibration data made a formula undefined.
    Computation,
}

impl Fault {
    pub const fn is_retryable(self) -> bool {
        !matches!(self, Fault::Computation)
    }
}
