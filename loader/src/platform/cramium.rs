pub mod cramium;
pub use cramium::*;
#[cfg(feature = "swap")]
pub mod swap;
#[cfg(feature = "swap")]
pub use swap::*;
#[cfg(any(feature = "board-baosec", feature = "board-baosor"))]
mod bootlogo;

#[cfg(feature = "updates")]
mod update;
#[cfg(feature = "updates")]
pub use update::*;
#[cfg(feature = "updates")]
mod verifier;

#[cfg(any(feature = "board-baosec", feature = "board-baosor"))]
mod gfx;
#[cfg(any(feature = "qr", feature = "cam-test"))]
mod homography;
#[cfg(any(feature = "qr", feature = "cam-test"))]
mod qr;
#[cfg(feature = "usb")]
mod usb;

#[cfg(feature = "updates")]
mod sha512_digest;
