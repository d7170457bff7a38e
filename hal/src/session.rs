use crate::bus::BusContext;

/// A device part (channel device, trigger controller) bound to the context of the device
/// that owns it, for as long as the device is mutably borrowed.
///
/// Nothing here is synchronised. Taking a session needs `&mut` on the device, so one
/// session at a time is all the borrow checker allows, and sharing a device between
/// threads needs a `Mutex` around it.
pub struct Session<'a, T> {
    part: &'a T,
    bus: &'a mut dyn BusContext,
}

impl<'a, T> Session<'a, T> {
    pub fn new(part: &'a T, bus: &'a mut dyn BusContext) -> Self {
        Self { part, bus }
    }

    pub fn part(&self) -> &T {
        self.part
    }

    pub(crate) fn bus(&self) -> &dyn BusContext {
        &*self.bus
    }

    pub(crate) fn split(&mut self) -> (&T, &mut dyn BusContext) {
        (self.part, &mut *self.bus)
    }
}
