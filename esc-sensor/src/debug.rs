use num_enum::IntoPrimitive;

/// Debug value slots published for external inspection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum DebugSlot {
    /// Motor currently polled, counted from 1.
    MotorIndex = 0,
    /// Running total of request timeouts.
    NumTimeouts = 1,
    /// Temperature of the last fresh combined reading.
    Temperature = 2,
    /// Rpm of the last fresh combined reading.
    Rpm = 3,
}

/// Destination for debug values, e.g. a table shown by a configurator.
///
/// Takes `&self` since sinks are usually shared tables of atomics.
pub trait DebugSink {
    fn set(&self, slot: DebugSlot, value: i16);
}

impl DebugSink for () {
    fn set(&self, _slot: DebugSlot, _value: i16) {}
}

impl<D: DebugSink> DebugSink for &D {
    fn set(&self, slot: DebugSlot, value: i16) {
        (**self).set(slot, value);
    }
}
