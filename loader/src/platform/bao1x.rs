pub mod bao1x;
pub use bao1x::*;
#[cfg(feature = "swap")]
pub mod swap;
#[cfg(feature = "swap")]
pub use swap::*;

#[cfg(any(feature = "board-baosec", feature = "board-baosor"))]
mod gfx;
