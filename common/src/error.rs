use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// A Win32 / COM call failed. `label` names the call site.
    #[cfg(windows)]
    #[error("{label}: {source}")]
    Win32 {
        label: &'static str,
        #[source]
        source: windows::core::Error,
    },

    #[error("failed to compile shader entry point `{entry}`: {message}")]
    ShaderCompile { entry: String, message: String },

    #[error("payload of {len} bytes does not fit in a {capacity} byte buffer")]
    PayloadTooLarge { len: usize, capacity: usize },

    #[error("{0}")]
    Unsupported(&'static str),
}

/// Attaches a call-site label to a failed Win32 / COM result.
#[cfg(windows)]
pub trait Context<T> {
    fn context(self, label: &'static str) -> Result<T>;
}

#[cfg(windows)]
impl<T> Context<T> for windows::core::Result<T> {
    fn context(self, label: &'static str) -> Result<T> {
        self.map_err(|source| Error::Win32 { label, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_error_names_both_sizes() {
        let e = Error::PayloadTooLarge {
            len: 65,
            capacity: 64,
        };
        assert_eq!(
            e.to_string(),
            "payload of 65 bytes does not fit in a 64 byte buffer"
        );
    }

    #[test]
    fn shader_error_names_entry_point() {
        let e = Error::ShaderCompile {
            entry: "VSmain".to_string(),
            message: "syntax error".to_string(),
        };
        assert!(e.to_string().contains("`VSmain`"));
    }
}
