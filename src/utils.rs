//! # Utility Functions Module
//!
//! Small helpers shared by the tool adapters: argument vectors for external
//! commands and display names for log lines.

use std::ffi::OsString;
use std::path::Path;

/// Builds an argument vector from mixed literals, numbers and paths.
///
/// Paths go through `OsString` untouched, so non UTF-8 file names survive.
///
/// ```rust
/// use static_asset_optimizer::tool_args;
/// use std::path::Path;
///
/// let input = Path::new("a.png");
/// let args = tool_args!["-q", 70, "-o", input];
/// assert_eq!(args[1], "70");
/// ```
#[macro_export]
macro_rules! tool_args {
    [$($item:expr),* $(,)?] => {
        vec![$($crate::utils::ToolArg::to_arg(&$item)),*]
    };
}

/// Conversion used by [`tool_args!`]
pub trait ToolArg {
    fn to_arg(&self) -> OsString;
}

impl ToolArg for &str {
    fn to_arg(&self) -> OsString {
        OsString::from(self)
    }
}

impl ToolArg for String {
    fn to_arg(&self) -> OsString {
        OsString::from(self)
    }
}

impl ToolArg for &Path {
    fn to_arg(&self) -> OsString {
        self.as_os_str().to_os_string()
    }
}

impl ToolArg for std::path::PathBuf {
    fn to_arg(&self) -> OsString {
        self.as_os_str().to_os_string()
    }
}

macro_rules! numeric_tool_arg {
    ($($ty:ty),*) => {
        $(impl ToolArg for $ty {
            fn to_arg(&self) -> OsString {
                OsString::from(self.to_string())
            }
        })*
    };
}

numeric_tool_arg!(u8, u32, u64, usize, i32);

/// File name for log lines, falling back to the full path
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
