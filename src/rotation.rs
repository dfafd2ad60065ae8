//! Rotation handling
//!
//! The ST7789 rotates in hardware: MADCTL swaps and mirrors the address
//! counters, so a rotated window is still written row-major with no
//! per-pixel remapping. What changes is the MADCTL byte and which RAM
//! offset applies to which axis.
//!
//! ## Example
//!
//! ```
//! use camview::{rotation::madctl, Rotation};
//!
//! assert_eq!(madctl(Rotation::Rotate0, false), 0x00);
//! assert_eq!(madctl(Rotation::Rotate90, false), 0x60);
//! ```

use crate::command::{MADCTL_BGR, MADCTL_MV, MADCTL_MX, MADCTL_MY};
use crate::config::Rotation;

/// MADCTL value for a rotation
pub fn madctl(rotation: Rotation, bgr: bool) -> u8 {
    let order = match rotation {
        Rotation::Rotate0 => 0,
        Rotation::Rotate90 => MADCTL_MX | MADCTL_MV,
        Rotation::Rotate180 => MADCTL_MX | MADCTL_MY,
        Rotation::Rotate270 => MADCTL_MY | MADCTL_MV,
    };
    if bgr { order | MADCTL_BGR } else { order }
}

/// RAM offsets `(column, row)` as seen in the rotated address space
///
/// With MV set the controller exchanges the column and row counters, so
/// the native offsets swap axes.
pub fn rotated_offsets(column: u16, row: u16, rotation: Rotation) -> (u16, u16) {
    match rotation {
        Rotation::Rotate0 | Rotation::Rotate180 => (column, row),
        Rotation::Rotate90 | Rotation::Rotate270 => (row, column),
    }
}
