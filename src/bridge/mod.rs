//! Blocking input bridge: synchronous reads across the sandbox boundary
//!
//! Code inside the sandbox may ask for a line of text mid-execution. The
//! sandbox thread arms an [`InputChannel`], publishes an input request to the
//! controller and parks on the channel's status cell. The controller, on its
//! own thread, writes the reply into the fixed data region and flips the cell
//! to ready, which wakes the sandbox thread.
//!
//! Only one side touches the data region at a time: the controller while the
//! sandbox is parked, the sandbox after waking. The status cell sits behind a
//! single mutex/condvar pair.
//!
//! # Example
//!
//! ```ignore
//! use sandbox_playground::bridge::InputChannel;
//! use std::sync::Arc;
//!
//! let channel = Arc::new(InputChannel::default());
//! let sandbox_side = channel.clone();
//! let reader = std::thread::spawn(move || sandbox_side.request(|| true));
//!
//! // ... once the request has been observed:
//! channel.resolve("Ada")?;
//! assert_eq!(reader.join().unwrap()?, "Ada");
//! ```

pub mod channel;
pub use channel::{
    ArmedRead, DEFAULT_INPUT_BUFFER_BYTES, InputChannel, InputStatus, STATUS_CELL_BYTES,
};
