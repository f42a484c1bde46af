//! GPIO lines wired to a component

use crate::error::Result;
use crate::vendor::functions::*;
use crate::vendor::VendorCommands;

/// Outputs of the on-chip detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DetectionPins {
    /// A target is present
    pub target_detected: bool,
    /// The target moves towards the sensor
    pub approaching: bool,
}

/// Remote pin access of one component
#[derive(Clone)]
pub struct Pins {
    commands: VendorCommands,
}

impl Pins {
    pub(crate) fn new(commands: VendorCommands) -> Self {
        Self { commands }
    }

    /// Drive the reset line (`true` = asserted)
    pub fn set_reset_pin(&self, asserted: bool) -> Result<()> {
        self.commands.write(FN_PINS_SET_RESET, &[asserted as u8])
    }

    /// Pulse the reset line
    pub fn reset(&self) -> Result<()> {
        self.commands.write(FN_PINS_RESET, &[])
    }

    /// Level of the interrupt line
    pub fn irq_pin(&self) -> Result<bool> {
        let mut level = [0u8];
        self.commands
            .transfer_checked(FN_PINS_GET_IRQ, &[], &mut level)?;
        Ok(level[0] != 0)
    }

    /// Levels of the detector outputs
    pub fn detection_pins(&self) -> Result<DetectionPins> {
        let mut bits = [0u8];
        self.commands
            .transfer_checked(FN_PINS_GET_DETECTION, &[], &mut bits)?;
        Ok(DetectionPins {
            target_detected: bits[0] & DETECTION_TARGET != 0,
            approaching: bits[0] & DETECTION_APPROACHING != 0,
        })
    }
}
