// SPDX-License-Identifier: GPL-3.0-only

//! CPU-side frame formats
//!
//! Camera frames usually arrive as NV12 (YUV 4:2:0). [`Nv12Image`] produces
//! such frames from decoded still images so they can be pushed through the
//! same conversion stage a live camera feed uses.

mod nv12;

pub use nv12::Nv12Image;
