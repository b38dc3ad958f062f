//! ZX Spectrum tape image to audio pulse stream converter.
//!
//! Parses raw TAP images, TZX tape containers and v1 .Z80 memory
//! snapshots into a normalized tape item sequence, encodes each block
//! into the timed pulse edges the Spectrum ROM loader (or the bundled
//! turbo scheme) expects, and renders the edges as PCM samples for live
//! playback or WAV capture. The item sequence can also be re-serialized
//! as a TZX container.

pub mod block;
mod error;
pub mod loader;
pub mod pulse;
pub mod render;
pub mod tap;
pub mod turbo;
pub mod tzx;
pub mod tzx_writer;
pub mod wav;
pub mod z80;

pub use block::{Block, TapeItem, TimingProfile};
pub use error::{DeviceError, EncodeError, ParseError, RenderError, SinkError};
pub use loader::{TapeLoader, load_path, loader_for_path};
pub use pulse::{PulseEdge, PulseEncoder};
pub use render::{CancelToken, RenderConfig, RenderState, SampleStream, render_to_vec};
pub use tzx_writer::write_tzx;
pub use wav::{render_to_wav, save_samples};
