use nix::errno::Errno;
use nix::libc;
use nix::sys::time::TimeSpec;
use nix::time::{ClockId, clock_gettime};
use parking_lot::{Condvar, Mutex};
use std::ffi::CString;
use std::os::raw::c_int;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SemaphoreError {
    #[error("Semaphore operation failed: {0}")]
    Os(#[from] Errno),
    #[error("Invalid semaphore name")]
    InvalidName,
}

/// A semaphore whose count never exceeds one.
///
/// `wait_acquire` consumes the signal, blocking until one is available.
/// `signal_release` makes the signal available; releasing an already
/// signaled semaphore leaves it at one.
pub trait BinarySemaphore: Send + Sync {
    fn wait_acquire(&self) -> Result<(), SemaphoreError>;

    /// Returns `Ok(false)` if no signal arrived within `timeout`.
    fn try_acquire_for(&self, timeout: Duration) -> Result<bool, SemaphoreError>;

    fn signal_release(&self) -> Result<(), SemaphoreError>;
}

impl<T: BinarySemaphore + ?Sized> BinarySemaphore for Arc<T> {
    fn wait_acquire(&self) -> Result<(), SemaphoreError> {
        (**self).wait_acquire()
    }

    fn try_acquire_for(&self, timeout: Duration) -> Result<bool, SemaphoreError> {
        (**self).try_acquire_for(timeout)
    }

    fn signal_release(&self) -> Result<(), SemaphoreError> {
        (**self).signal_release()
    }
}

/// POSIX named semaphore shared between processes.
pub struct NamedSemaphore {
    sem: *mut libc::sem_t,
    name: String,
}

impl NamedSemaphore {
    /// Create the semaphore with `initial_value`, or open it if it already
    /// exists. The initial value only applies to the creating call.
    ///
    /// Returns the handle and whether this call created the object.
    pub fn create_or_open(name: &str, initial_value: u32) -> Result<(Self, bool), SemaphoreError> {
        let c_name = CString::new(name).map_err(|_| SemaphoreError::InvalidName)?;

        let sem = unsafe {
            libc::sem_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL,
                0o666 as libc::c_uint,
                initial_value as libc::c_uint,
            )
        };

        if sem != libc::SEM_FAILED {
            return Ok((
                Self {
                    sem,
                    name: name.to_string(),
                },
                true,
            ));
        }

        let errno = Errno::last();
        if errno != Errno::EEXIST {
            return Err(SemaphoreError::Os(errno));
        }

        Self::open(name).map(|sem| (sem, false))
    }

    pub fn open(name: &str) -> Result<Self, SemaphoreError> {
        let c_name = CString::new(name).map_err(|_| SemaphoreError::InvalidName)?;

        let sem = unsafe { libc::sem_open(c_name.as_ptr(), 0) };

        if sem == libc::SEM_FAILED {
            return Err(SemaphoreError::Os(Errno::last()));
        }

        Ok(Self {
            sem,
            name: name.to_string(),
        })
    }

    pub fn value(&self) -> Result<i32, SemaphoreError> {
        let mut val: c_int = 0;
        let ret = unsafe { libc::sem_getvalue(self.sem, &mut val) };
        if ret != 0 {
            return Err(SemaphoreError::Os(Errno::last()));
        }
        Ok(val)
    }

    /// Remove the name. Open handles keep working; a missing name is not an
    /// error.
    pub fn unlink(name: &str) -> Result<(), SemaphoreError> {
        let c_name = CString::new(name).map_err(|_| SemaphoreError::InvalidName)?;
        let ret = unsafe { libc::sem_unlink(c_name.as_ptr()) };
        if ret != 0 {
            let errno = Errno::last();
            if errno != Errno::ENOENT {
                return Err(SemaphoreError::Os(errno));
            }
        }
        Ok(())
    }
}

impl BinarySemaphore for NamedSemaphore {
    fn wait_acquire(&self) -> Result<(), SemaphoreError> {
        loop {
            let ret = unsafe { libc::sem_wait(self.sem) };
            if ret == 0 {
                return Ok(());
            }
            let errno = Errno::last();
            if errno != Errno::EINTR {
                return Err(SemaphoreError::Os(errno));
            }
        }
    }

    fn try_acquire_for(&self, timeout: Duration) -> Result<bool, SemaphoreError> {
        // sem_timedwait measures against CLOCK_REALTIME
        let deadline = clock_gettime(ClockId::CLOCK_REALTIME)? + TimeSpec::from_duration(timeout);

        loop {
            let ret = unsafe { libc::sem_timedwait(self.sem, deadline.as_ref()) };
            if ret == 0 {
                return Ok(true);
            }
            match Errno::last() {
                Errno::ETIMEDOUT => return Ok(false),
                Errno::EINTR => continue,
                errno => return Err(SemaphoreError::Os(errno)),
            }
        }
    }

    fn signal_release(&self) -> Result<(), SemaphoreError> {
        if self.value()? >= 1 {
            tracing::warn!(semaphore = %self.name, "Release on a signaled semaphore ignored");
            return Ok(());
        }

        let ret = unsafe { libc::sem_post(self.sem) };
        if ret != 0 {
            return Err(SemaphoreError::Os(Errno::last()));
        }
        Ok(())
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        unsafe {
            libc::sem_close(self.sem);
        }
    }
}

unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

/// In-process binary semaphore for threads sharing one address space.
#[derive(Debug, Default)]
pub struct LocalSemaphore {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl LocalSemaphore {
    pub fn new(signaled: bool) -> Self {
        Self {
            signaled: Mutex::new(signaled),
            cond: Condvar::new(),
        }
    }

    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }
}

impl BinarySemaphore for LocalSemaphore {
    fn wait_acquire(&self) -> Result<(), SemaphoreError> {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.cond.wait(&mut signaled);
        }
        *signaled = false;
        Ok(())
    }

    fn try_acquire_for(&self, timeout: Duration) -> Result<bool, SemaphoreError> {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.signaled.lock();
        while !*signaled {
            if self.cond.wait_until(&mut signaled, deadline).timed_out() {
                break;
            }
        }
        if *signaled {
            *signaled = false;
            return Ok(true);
        }
        Ok(false)
    }

    fn signal_release(&self) -> Result<(), SemaphoreError> {
        *self.signaled.lock() = true;
        self.cond.notify_one();
        Ok(())
    }
}
