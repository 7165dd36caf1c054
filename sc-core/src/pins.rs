//! Physical header pin translation
//!
//! Configuration names the fan by its position on the 40-pin connector.
//! The GPIO layer may address lines either by that position (`Board`) or by
//! the SoC's native numbering (`Bcm`).

use serde::{Deserialize, Serialize};

use crate::error::{ChamberError, Result};

/// Numbering scheme used by the GPIO layer
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GpioMode {
    Board,
    Bcm,
}

/// Header position (1-indexed) to BCM line, -1 for power, ground and ID pins
#[rustfmt::skip]
const BCM_MAP: [i32; 40] = [
    -1, -1, 2, -1, 3, -1, 4, -1, -1, -1,
    17, 18, 27, -1, 22, 23, -1, 24, 10, -1,
    9, 25, 11, 8, -1, 7, -1, -1, 5, -1,
    6, 12, 13, -1, 19, 16, 26, 20, -1, 21,
];

/// Translate a header position into the numbering of `mode`.
///
/// Returns -1 when the position is outside 1..=40 or is not a GPIO line.
pub fn map_pin(board_pin: i32, mode: GpioMode) -> i32 {
    match mode {
        GpioMode::Board => board_pin,
        GpioMode::Bcm => {
            if (1..=40).contains(&board_pin) {
                BCM_MAP[(board_pin - 1) as usize]
            } else {
                -1
            }
        }
    }
}

/// Like [`map_pin`] but rejects unusable positions
pub fn resolve_pin(board_pin: i32, mode: GpioMode) -> Result<u8> {
    let line = map_pin(board_pin, mode);
    if line < 0 {
        return Err(ChamberError::invalid_pin(
            board_pin,
            "not a GPIO position on the 40-pin header",
        ));
    }
    u8::try_from(line).map_err(|_| ChamberError::invalid_pin(board_pin, "line number out of range"))
}
