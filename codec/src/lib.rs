mod decode;
mod encode;
mod patcher;
mod value;

pub use decode::{decode, DecodeError};
pub use encode::{encode, EncodeError, EncodeResult};
pub use patcher::{PatchedMessage, ReferencePatcher};
pub use value::{EncodedChild, EncodedValue, Value};
