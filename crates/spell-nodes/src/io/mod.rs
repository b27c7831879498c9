//! Input, output, and text-shaping components.

pub mod join;
pub mod output;
pub mod text_input;

pub use join::Join;
pub use output::Output;
pub use text_input::TextInput;
