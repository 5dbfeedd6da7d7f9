//! Conversion of staged saves into worlds.
//!
//! Every `.bin` file left in the output directory by [`stage`](crate::stage)
//! is matched back to its title binding, handed to a
//! [`Converter`](x360mse_convert::Converter) writing into `<output>/<stem>/`,
//! and the converted world is then renamed to the console title.
//!
//! Saves are converted one at a time; the converter is expected to use the
//! parallelism hint it is given.

pub mod error;
pub(crate) mod file;
mod stream;

pub use self::file::{ConversionOutcome, ConversionStatus, convert_file};
pub use self::stream::{ConvertEvent, convert};
