//! Native descriptors behind open streams, and launch-time redirects built
//! from them.
//!
//! A [`RedirectSpec`] borrows the descriptor, so it cannot outlive the file it
//! was taken from. Nothing is duplicated until the spec is turned into a
//! [`Stdio`] at launch.

use std::fs::File;
use std::io::Cursor;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::process::{ChildStdin, Stdio};

use nix::fcntl::{fcntl, FcntlArg};

use crate::error::{Error, Result};

/// A stream that may or may not wrap an OS descriptor.
pub trait NativeHandle {
    /// Short name used in error messages.
    fn kind(&self) -> &'static str;

    fn native_fd(&self) -> Option<BorrowedFd<'_>>;
}

impl NativeHandle for File {
    fn kind(&self) -> &'static str { "file" }

    fn native_fd(&self) -> Option<BorrowedFd<'_>> { Some(self.as_fd()) }
}

impl NativeHandle for UnixStream {
    fn kind(&self) -> &'static str { "unix stream" }

    fn native_fd(&self) -> Option<BorrowedFd<'_>> { Some(self.as_fd()) }
}

impl NativeHandle for ChildStdin {
    fn kind(&self) -> &'static str { "child stdin" }

    fn native_fd(&self) -> Option<BorrowedFd<'_>> { Some(self.as_fd()) }
}

impl NativeHandle for Vec<u8> {
    fn kind(&self) -> &'static str { "in-memory buffer" }

    fn native_fd(&self) -> Option<BorrowedFd<'_>> { None }
}

impl<T> NativeHandle for Cursor<T> {
    fn kind(&self) -> &'static str { "in-memory cursor" }

    fn native_fd(&self) -> Option<BorrowedFd<'_>> { None }
}

/// Returns the descriptor `handle` wraps.
pub fn extract<H: NativeHandle + ?Sized>(handle: &H) -> Result<BorrowedFd<'_>> {
    handle
        .native_fd()
        .ok_or(Error::UnsupportedHandleKind { kind: handle.kind() })
}

/// "Connect the child's stdout to this descriptor."
#[derive(Debug, Clone, Copy)]
pub struct RedirectSpec<'fd> {
    fd: BorrowedFd<'fd>,
}

impl<'fd> RedirectSpec<'fd> {
    /// Fails if the descriptor is already closed. The check is inherently racy
    /// against other threads closing raw descriptors.
    pub fn from_fd(fd: BorrowedFd<'fd>) -> Result<Self> {
        let raw = fd.as_raw_fd();
        fcntl(raw, FcntlArg::F_GETFD)
            .map_err(|source| Error::InvalidDescriptor { fd: raw, source })?;
        Ok(RedirectSpec { fd })
    }

    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Duplicates the descriptor for one standard stream of a child. The
    /// duplicate lands on the child's fd 1 (or 2) and is closed in the parent
    /// once the child is spawned.
    pub fn stdio(&self) -> Result<Stdio> {
        let owned = self
            .fd
            .try_clone_to_owned()
            .map_err(|e| Error::io(format!("duplicating descriptor {}", self.raw_fd()), e))?;
        tracing::debug!(
            source = self.raw_fd(),
            dup = owned.as_raw_fd(),
            "duplicated log descriptor"
        );
        Ok(Stdio::from(owned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom, Write};

    #[test]
    fn extract_file_descriptor_is_stable() {
        let file = tempfile::tempfile().unwrap();
        let first = extract(&file).unwrap().as_raw_fd();
        let second = extract(&file).unwrap().as_raw_fd();
        assert_eq!(first, file.as_raw_fd());
        assert_eq!(first, second);
    }

    #[test]
    fn extract_rejects_in_memory_streams() {
        let cursor = Cursor::new(Vec::<u8>::new());
        match extract(&cursor) {
            Err(Error::UnsupportedHandleKind { kind }) => assert_eq!(kind, "in-memory cursor"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            extract(&Vec::<u8>::new()),
            Err(Error::UnsupportedHandleKind { .. })
        ));
    }

    #[test]
    fn redirect_from_open_descriptor() {
        let file = tempfile::tempfile().unwrap();
        let spec = RedirectSpec::from_fd(extract(&file).unwrap()).unwrap();
        assert_eq!(spec.raw_fd(), file.as_raw_fd());
    }

    #[test]
    fn redirect_from_closed_descriptor_fails() {
        // Far above anything the test process has open.
        let fd = unsafe { BorrowedFd::borrow_raw(9_999) };
        match RedirectSpec::from_fd(fd) {
            Err(Error::InvalidDescriptor { fd, source }) => {
                assert_eq!(fd, 9_999);
                assert_eq!(source, nix::errno::Errno::EBADF);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn stdio_shares_the_open_file() {
        let mut file = tempfile::tempfile().unwrap();
        let spec = RedirectSpec::from_fd(extract(&file).unwrap()).unwrap();
        let _stdio = spec.stdio().unwrap();

        // The original descriptor is untouched by the duplication.
        file.write_all(b"still writable\n").unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        let mut text = String::new();
        file.read_to_string(&mut text).unwrap();
        assert_eq!(text, "still writable\n");
    }

    #[test]
    fn redirect_through_a_socket_pair() {
        let (writer, mut reader) = UnixStream::pair().unwrap();
        let fd = extract(&writer).unwrap();
        assert_eq!(fd.as_raw_fd(), writer.as_raw_fd());
        assert_eq!(writer.kind(), "unix stream");

        let spec = RedirectSpec::from_fd(fd).unwrap();
        let status = std::process::Command::new("/bin/sh")
            .args(["-c", "echo over the socket"])
            .stdout(spec.stdio().unwrap())
            .status()
            .unwrap();
        assert!(status.success());
        drop(writer);

        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "over the socket\n");
    }

    #[test]
    fn extract_child_stdin() {
        let mut child = std::process::Command::new("cat")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        let stdin = child.stdin.take().unwrap();
        let fd = extract(&stdin).unwrap();
        assert_eq!(fd.as_raw_fd(), stdin.as_raw_fd());
        assert!(RedirectSpec::from_fd(fd).is_ok());
        assert_eq!(stdin.kind(), "child stdin");

        drop(stdin);
        assert!(child.wait().unwrap().success());
    }
}
