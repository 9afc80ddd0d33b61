use core::cell::RefCell;
use critical_section::Mutex;

/// A critical-section guarded cell for sharing a slave core with interrupt
/// handlers.
///
/// The core's state record has a single owner, the interrupt dispatcher;
/// this cell is that owner. Declare one in static storage, [`install`] the
/// built core once during start-up, then route every interrupt entry
/// through [`with`]:
///
/// `SLAVE.with(|s| s.on_falling_edge());`
///
/// The closure runs inside a critical section, so an edge handler can never
/// observe the core mid-update from another entry.
///
/// [`install`]: SlaveCell::install
/// [`with`]: SlaveCell::with
pub struct SlaveCell<S>(Mutex<RefCell<Option<S>>>);

impl<S> SlaveCell<S> {
    /// Creates an empty cell. Usable in statics.
    pub const fn new() -> Self {
        SlaveCell(Mutex::new(RefCell::new(None)))
    }

    /// Moves a built core into the cell. Call once before enabling the
    /// edge and timer interrupts; a second call replaces the previous core.
    pub fn install(&self, slave: S) {
        critical_section::with(|cs| {
            *self.0.borrow_ref_mut(cs) = Some(slave);
        });
    }

    /// Runs `f` on the installed core inside a critical section. Returns
    /// `None` if nothing has been installed yet.
    pub fn with<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        critical_section::with(|cs| self.0.borrow_ref_mut(cs).as_mut().map(f))
    }
}

impl<S> Default for SlaveCell<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::SlaveCell;

    #[test]
    fn empty_cell_is_a_no_op() {
        let cell: SlaveCell<u8> = SlaveCell::new();
        assert_eq!(cell.with(|v| *v), None);
    }

    #[test]
    fn install_then_with() {
        static CELL: SlaveCell<u32> = SlaveCell::new();
        CELL.install(41);
        assert_eq!(CELL.with(|v| *v + 1), Some(42));
        CELL.with(|v| *v = 7);
        assert_eq!(CELL.with(|v| *v), Some(7));
    }
}
