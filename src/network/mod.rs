//! Socket setup and stream framing.

pub mod io;
pub mod socket;

pub use io::{FRAME_PREFIX_LEN, encode_frame, read_exact, read_frame, write_frame};
pub use socket::{ListeningSockets, bind_tcp, bind_udp, resolve};
