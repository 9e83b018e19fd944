use std::io::{self, Read};
use std::process::{Child, ChildStderr, ExitStatus};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::foundation::error::EncodeError;

const STDERR_TAIL_BYTES: usize = 4096;
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Process handle operations the guard relies on.
pub(crate) trait Reap {
    fn id(&self) -> u32;
    fn kill(&mut self) -> io::Result<()>;
    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>>;
    fn wait(&mut self) -> io::Result<ExitStatus>;
}

impl Reap for Child {
    fn id(&self) -> u32 {
        Child::id(self)
    }

    fn kill(&mut self) -> io::Result<()> {
        Child::kill(self)
    }

    fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        Child::try_wait(self)
    }

    fn wait(&mut self) -> io::Result<ExitStatus> {
        Child::wait(self)
    }
}

/// Owns a spawned child and guarantees it is reaped exactly once.
///
/// `wait` consumes the guard. If the guard is dropped without a successful wait (an error path),
/// the child is killed and reaped in `Drop` so it never lingers as a zombie.
pub(crate) struct ChildGuard<C: Reap = Child> {
    child: Option<C>,
    pid: u32,
}

impl<C: Reap> ChildGuard<C> {
    pub(crate) fn new(child: C) -> Self {
        let pid = child.id();
        Self {
            child: Some(child),
            pid,
        }
    }

    pub(crate) fn pid(&self) -> u32 {
        self.pid
    }

    /// Send the forced-termination signal. A child that already exited is not an error.
    pub(crate) fn kill(&mut self) {
        if let Some(child) = self.child.as_mut()
            && let Err(e) = child.kill()
        {
            tracing::debug!(pid = self.pid, error = %e, "kill on encoder process failed");
        }
    }

    /// Block until the child exits. With a timeout, a child still running at the deadline is
    /// killed and reaped, and `TimedOut` is returned.
    ///
    /// The child leaves the guard only once it has been reaped; on `Wait` errors `Drop` still
    /// kills and reaps it.
    pub(crate) fn wait(mut self, timeout: Option<Duration>) -> Result<ExitStatus, EncodeError> {
        let pid = self.pid;
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| EncodeError::Wait(io::Error::other("encoder process already reaped")))?;
        let result = wait_child(child, pid, timeout);
        if !matches!(result, Err(EncodeError::Wait(_))) {
            self.child = None;
        }
        result
    }
}

fn wait_child<C: Reap>(
    child: &mut C,
    pid: u32,
    timeout: Option<Duration>,
) -> Result<ExitStatus, EncodeError> {
    let Some(timeout) = timeout else {
        return child.wait().map_err(EncodeError::Wait);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(EncodeError::Wait)? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            tracing::warn!(pid, ?timeout, "encoder did not exit in time, killing");
            let _ = child.kill();
            child.wait().map_err(EncodeError::Wait)?;
            return Err(EncodeError::TimedOut { after: timeout });
        }
        std::thread::sleep(WAIT_POLL_INTERVAL);
    }
}

impl<C: Reap> Drop for ChildGuard<C> {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            match child.wait() {
                Ok(status) => {
                    tracing::warn!(pid = self.pid, %status, "reaped encoder process abandoned without finish")
                }
                Err(e) => tracing::error!(pid = self.pid, error = %e, "failed to reap encoder process"),
            }
        }
    }
}

/// Drain stderr on a helper thread so the child never blocks on a full pipe, keeping the tail.
pub(crate) fn spawn_stderr_drain(mut stderr: ChildStderr) -> JoinHandle<io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut tail = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stderr.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            tail.extend_from_slice(&chunk[..n]);
            if tail.len() > STDERR_TAIL_BYTES {
                tail.drain(..tail.len() - STDERR_TAIL_BYTES);
            }
        }
        Ok(tail)
    })
}

pub(crate) fn join_stderr(handle: Option<JoinHandle<io::Result<Vec<u8>>>>) -> String {
    let bytes = match handle.map(JoinHandle::join) {
        Some(Ok(Ok(bytes))) => bytes,
        Some(Ok(Err(e))) => return format!("<stderr read failed: {e}>"),
        Some(Err(_)) => return "<stderr drain thread panicked>".to_string(),
        None => Vec::new(),
    };
    String::from_utf8_lossy(&bytes).trim().to_string()
}

/// Map a non-success exit status to the matching error.
pub(crate) fn exit_failure(status: ExitStatus, stderr: String) -> Option<EncodeError> {
    if status.success() {
        return None;
    }
    if let Some(code) = status.code() {
        return Some(EncodeError::Exit { code, stderr });
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt as _;
        if let Some(signal) = status.signal() {
            return Some(EncodeError::Signaled { signal, stderr });
        }
    }
    Some(EncodeError::Exit { code: -1, stderr })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    fn sh(script: &str) -> Child {
        Command::new("sh")
            .args(["-c", script])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap()
    }

    #[test]
    fn zero_exit_is_success() {
        let status = ChildGuard::new(sh("exit 0")).wait(None).unwrap();
        assert!(exit_failure(status, String::new()).is_none());
    }

    #[test]
    fn nonzero_exit_is_reported_with_code() {
        let status = ChildGuard::new(sh("exit 3")).wait(None).unwrap();
        assert!(matches!(
            exit_failure(status, String::new()),
            Some(EncodeError::Exit { code: 3, .. })
        ));
    }

    #[test]
    fn signal_termination_is_reported() {
        let mut guard = ChildGuard::new(sh("exec sleep 30"));
        guard.kill();
        let status = guard.wait(None).unwrap();
        assert!(matches!(
            exit_failure(status, String::new()),
            Some(EncodeError::Signaled { signal: 9, .. })
        ));
    }

    #[test]
    fn wait_timeout_kills_child() {
        let guard = ChildGuard::new(sh("exec sleep 30"));
        let err = guard.wait(Some(Duration::from_millis(50))).unwrap_err();
        assert!(matches!(err, EncodeError::TimedOut { .. }));
    }

    #[test]
    fn stderr_tail_is_collected() {
        let mut child = sh("echo 'bad things' >&2; exit 1");
        let drain = spawn_stderr_drain(child.stderr.take().unwrap());
        let status = ChildGuard::new(child).wait(None).unwrap();
        let stderr = join_stderr(Some(drain));
        assert_eq!(stderr, "bad things");
        match exit_failure(status, stderr) {
            Some(EncodeError::Exit { code: 1, stderr }) => assert_eq!(stderr, "bad things"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[derive(Default)]
    struct Ledger {
        kills: usize,
        waits: usize,
    }

    /// Child whose `try_wait` always fails.
    struct StuckChild(std::rc::Rc<std::cell::RefCell<Ledger>>);

    impl Reap for StuckChild {
        fn id(&self) -> u32 {
            4242
        }

        fn kill(&mut self) -> io::Result<()> {
            self.0.borrow_mut().kills += 1;
            Ok(())
        }

        fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
            Err(io::Error::other("try_wait failed"))
        }

        fn wait(&mut self) -> io::Result<ExitStatus> {
            use std::os::unix::process::ExitStatusExt as _;
            self.0.borrow_mut().waits += 1;
            Ok(ExitStatus::from_raw(9))
        }
    }

    #[test]
    fn failed_try_wait_still_kills_and_reaps() {
        let ledger = std::rc::Rc::new(std::cell::RefCell::new(Ledger::default()));
        let guard = ChildGuard::new(StuckChild(ledger.clone()));
        let err = guard.wait(Some(Duration::from_secs(5))).unwrap_err();
        assert!(matches!(err, EncodeError::Wait(_)), "{err}");
        let ledger = ledger.borrow();
        assert_eq!((ledger.kills, ledger.waits), (1, 1));
    }

    #[test]
    fn successful_wait_reaps_once() {
        let ledger = std::rc::Rc::new(std::cell::RefCell::new(Ledger::default()));
        ChildGuard::new(StuckChild(ledger.clone())).wait(None).unwrap();
        let ledger = ledger.borrow();
        assert_eq!((ledger.kills, ledger.waits), (0, 1));
    }

    #[test]
    fn dropped_guard_reaps_child() {
        let child = sh("exec sleep 30");
        let pid = child.id();
        drop(ChildGuard::new(child));
        // The pid is no longer our child once reaped.
        let alive = Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stderr(Stdio::null())
            .status()
            .unwrap();
        assert!(!alive.success());
    }
}
