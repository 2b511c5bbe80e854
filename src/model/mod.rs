use derive_new::new;
use serde::{Deserialize, Serialize};

pub use account::*;
pub use timestamp::*;
pub use user::*;
pub use video::*;

mod account;
mod timestamp;
mod user;
mod video;

/// Turn an identifier into a single path component. ASCII alphanumerics, `-` and `_` are kept and every other byte
/// is written as `%XX`, so two different ids never share a name and none of them can leave its directory.
fn path_component(id: &str) -> String {
    let mut component = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            component.push(char::from(byte));
        } else {
            component.push_str(&format!("%{byte:02X}"));
        }
    }
    component
}
