//! Parse and load `.env` files.
//!
//! [`parse_key_value`] is the core: a pure function turning one line into an
//! optional `(key, value)` pair. Lines are `[export ]KEY=VALUE`, where the
//! value is either a single unquoted word or a `"` / `'` quoted string taken
//! verbatim, and `#` outside quotes starts a comment.
//!
//! [`EnvLoader::load`] is the safe loader and writes to an in-memory map by
//! default. The convenience loaders ([`load`], [`from_paths`], [`dotenv`])
//! mutate the process environment and are `unsafe`, because callers must
//! guarantee no concurrent process-environment access.

mod env;
mod error;
mod loader;
mod model;
mod parser;

pub use env::TargetEnv;
pub use error::{Error, ParseError, ParseErrorKind};
pub use loader::{EnvLoader, dotenv, from_filename, from_path, from_paths, load};
pub use model::{Entry, LoadReport, ParseMode};
pub use parser::{
    parse_bytes, parse_bytes_with_mode, parse_key_value, parse_line, parse_reader,
    parse_reader_with_mode, parse_str, parse_str_with_mode,
};
