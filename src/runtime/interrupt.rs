use super::RuntimeError;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

pub fn interrupt_flag() -> &'static AtomicBool {
    &INTERRUPTED
}

#[cfg(unix)]
extern "C" fn on_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
    // a second ^C terminates immediately
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
    }
}

#[cfg(unix)]
pub fn install_interrupt_handler() -> Result<(), RuntimeError> {
    let handler = on_sigint as extern "C" fn(libc::c_int);
    let previous = unsafe { libc::signal(libc::SIGINT, handler as libc::sighandler_t) };
    if previous == libc::SIG_ERR {
        return Err(RuntimeError::SignalHandler(
            std::io::Error::last_os_error().to_string(),
        ));
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn install_interrupt_handler() -> Result<(), RuntimeError> {
    Ok(())
}
