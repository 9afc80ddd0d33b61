/// Errors returned by the slave core entry points.
///
/// Protocol-level trouble (address mismatch, unknown ROM command, inactive
/// alarm) is not an error: 1-Wire has no slave-initiated error channel, so
/// the core deselects silently and waits for the next reset pulse.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OneWireSlaveError {
    /// [`start`](crate::OneWireSlave::start) was called on a core that is
    /// already running.
    AlreadyStarted,
}
