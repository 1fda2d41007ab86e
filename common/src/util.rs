use std::{ffi::CString, io};

use env_logger::{Env, Target};

pub trait AsCString {
    fn as_c_string(&self) -> CString;
}

impl AsCString for String {
    fn as_c_string(&self) -> CString {
        CString::new(self.clone()).unwrap_or_default()
    }
}

impl AsCString for &str {
    fn as_c_string(&self) -> CString {
        self.to_string().as_c_string()
    }
}

/// Writes `s` to the debugger output channel.
#[cfg(windows)]
pub fn print_debug_string(s: &str) {
    use windows::{core::PCSTR, Win32::System::Diagnostics::Debug::OutputDebugStringA};

    let message = s.as_c_string();
    unsafe {
        OutputDebugStringA(PCSTR(message.as_ptr() as _));
    }
}

#[cfg(not(windows))]
pub fn print_debug_string(s: &str) {
    eprint!("{s}");
}

/// `io::Write` sink that forwards everything to [`print_debug_string`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DebugOutput;

impl io::Write for DebugOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        print_debug_string(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Routes the `log` facade to the debugger output channel.
///
/// Verbosity follows `RUST_LOG` and defaults to `info`. Calling this more
/// than once is harmless; only the first logger is kept.
pub fn init_logging() {
    let result = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(DebugOutput)))
        .format_timestamp(None)
        .try_init();

    if result.is_err() {
        log::debug!("logger already initialized");
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn interior_nul_falls_back_to_empty() {
        assert_eq!("a\0b".as_c_string(), CString::default());
        assert_eq!("abc".as_c_string().as_bytes(), b"abc");
    }

    #[test]
    fn debug_output_consumes_whole_buffer() {
        let mut out = DebugOutput;
        assert_eq!(out.write(b"hello\n").unwrap(), 6);
        out.flush().unwrap();
    }

    #[test]
    fn init_logging_twice_is_harmless() {
        init_logging();
        init_logging();
        log::info!("logging initialized");
    }
}
