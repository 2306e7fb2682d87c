//! Process suspension.
//!
//! Pausing a render stops the encoding consumer with SIGSTOP and resumes it
//! with SIGCONT. The producer is left running: it blocks on the full pipe
//! within one buffer's worth of frames, so suspending the consumer alone
//! halts the whole pipeline without tearing down either process.

use smear_common::error::SmearResult;

/// Seam over the platform suspension primitive.
pub trait Pausable: Send + Sync {
    fn suspend(&self, pid: u32) -> SmearResult<()>;
    fn resume(&self, pid: u32) -> SmearResult<()>;
}

#[cfg(unix)]
pub use unix::SignalPauser;

#[cfg(unix)]
mod unix {
    use super::Pausable;
    use smear_common::error::{SmearError, SmearResult};

    /// SIGSTOP/SIGCONT based pausing.
    pub struct SignalPauser;

    impl SignalPauser {
        fn signal(pid: u32, sig: libc::c_int) -> SmearResult<()> {
            // Safety: kill with a valid signal number; the pid came from a
            // child we spawned ourselves.
            let rc = unsafe { libc::kill(pid as libc::pid_t, sig) };
            if rc != 0 {
                return Err(SmearError::render(format!(
                    "signal {sig} to pid {pid} failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
            Ok(())
        }
    }

    impl Pausable for SignalPauser {
        fn suspend(&self, pid: u32) -> SmearResult<()> {
            Self::signal(pid, libc::SIGSTOP)
        }

        fn resume(&self, pid: u32) -> SmearResult<()> {
            Self::signal(pid, libc::SIGCONT)
        }
    }
}

#[cfg(not(unix))]
pub use fallback::SignalPauser;

#[cfg(not(unix))]
mod fallback {
    use super::Pausable;
    use smear_common::error::{SmearError, SmearResult};

    /// Placeholder on platforms without stop/continue signals.
    pub struct SignalPauser;

    impl Pausable for SignalPauser {
        fn suspend(&self, _pid: u32) -> SmearResult<()> {
            Err(SmearError::unsupported(
                "pause is not supported on this platform",
            ))
        }

        fn resume(&self, _pid: u32) -> SmearResult<()> {
            Err(SmearError::unsupported(
                "pause is not supported on this platform",
            ))
        }
    }
}
