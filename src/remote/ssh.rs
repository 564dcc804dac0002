//! SSH/SFTP transport to the device
//!
//! Password authentication over a single session. The same session serves
//! the interactive shell that runs the test menu and the SFTP channel that
//! moves files.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;

use ssh2::{Channel, ErrorCode, Session, Sftp};

use crate::error::{Result, RmfAudioError};
use crate::remote::console::{Console, MarkerBuffer};
use crate::remote::files::RemoteFiles;
use crate::remote::ConnectionParams;

/// libssh2's LIBSSH2_FX_NO_SUCH_FILE
const SFTP_NO_SUCH_FILE: i32 = 2;

/// An authenticated SSH session
pub struct SshLink {
    session: Session,
    host: String,
    port: u16,
}

impl SshLink {
    pub fn connect(params: &ConnectionParams) -> Result<Self> {
        let connection_error = |reason: String| RmfAudioError::Connection {
            host: params.host.clone(),
            port: params.port,
            reason,
        };

        let tcp = TcpStream::connect((params.host.as_str(), params.port))
            .map_err(|e| connection_error(e.to_string()))?;
        let mut session = Session::new().map_err(|e| connection_error(e.to_string()))?;
        session.set_tcp_stream(tcp);
        session.handshake().map_err(|e| connection_error(e.to_string()))?;

        session
            .userauth_password(&params.username, &params.password)
            .map_err(|_| RmfAudioError::Authentication {
                username: params.username.clone(),
                host: params.host.clone(),
            })?;
        if !session.authenticated() {
            return Err(RmfAudioError::Authentication {
                username: params.username.clone(),
                host: params.host.clone(),
            });
        }

        log::info!("Connected to {}@{}:{}", params.username, params.host, params.port);
        Ok(Self {
            session,
            host: params.host.clone(),
            port: params.port,
        })
    }

    pub fn files(&self) -> Result<SftpFiles> {
        let sftp = self.session.sftp().map_err(|e| RmfAudioError::Connection {
            host: self.host.clone(),
            port: self.port,
            reason: format!("SFTP subsystem unavailable: {}", e),
        })?;
        Ok(SftpFiles { sftp })
    }

    /// Interactive shell with a pseudo-terminal; the console keeps the session alive
    pub fn shell(self) -> Result<SshConsole> {
        let open_error = |e: ssh2::Error| RmfAudioError::Connection {
            host: self.host.clone(),
            port: self.port,
            reason: format!("Failed to open shell: {}", e),
        };
        let mut channel = self.session.channel_session().map_err(open_error)?;
        channel.request_pty("xterm", None, None).map_err(open_error)?;
        channel.shell().map_err(open_error)?;
        Ok(SshConsole {
            channel,
            buffer: MarkerBuffer::new(),
            _link: self,
        })
    }

    /// Console and file access sharing this session
    pub fn into_device(self) -> Result<(SshConsole, SftpFiles)> {
        let files = self.files()?;
        let console = self.shell()?;
        Ok((console, files))
    }
}

impl Drop for SshLink {
    fn drop(&mut self) {
        if let Err(e) = self.session.disconnect(None, "session finished", None) {
            log::debug!("SSH disconnect from {} failed: {}", self.host, e);
        }
    }
}

/// File access over SFTP
pub struct SftpFiles {
    sftp: Sftp,
}

impl SftpFiles {
    fn create_parents(&self, path: &Path) {
        let Some(parent) = path.parent() else { return };
        let mut ancestors: Vec<&Path> = parent.ancestors().collect();
        ancestors.reverse();
        for dir in ancestors {
            if dir.as_os_str().is_empty() || self.sftp.stat(dir).is_ok() {
                continue;
            }
            if let Err(e) = self.sftp.mkdir(dir, 0o755) {
                log::debug!("mkdir {} failed: {}", dir.display(), e);
            }
        }
    }
}

fn sftp_error(path: &str, e: ssh2::Error) -> RmfAudioError {
    match e.code() {
        ErrorCode::SFTP(SFTP_NO_SUCH_FILE) => RmfAudioError::RemoteFileNotFound {
            path: path.to_string(),
        },
        _ => RmfAudioError::Transfer {
            path: path.to_string(),
            reason: e.to_string(),
        },
    }
}

impl RemoteFiles for SftpFiles {
    fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut file = self.sftp.open(Path::new(path)).map_err(|e| sftp_error(path, e))?;
        let mut contents = Vec::new();
        file.read_to_end(&mut contents).map_err(|e| RmfAudioError::Transfer {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(contents)
    }

    fn write(&mut self, path: &str, contents: &[u8]) -> Result<()> {
        let target = Path::new(path);
        self.create_parents(target);
        let mut file = self.sftp.create(target).map_err(|e| sftp_error(path, e))?;
        file.write_all(contents).map_err(|e| RmfAudioError::Transfer {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    fn remove(&mut self, path: &str) -> Result<()> {
        match self.sftp.unlink(Path::new(path)).map_err(|e| sftp_error(path, e)) {
            Ok(()) | Err(RmfAudioError::RemoteFileNotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Interactive shell channel
pub struct SshConsole {
    channel: Channel,
    buffer: MarkerBuffer,
    _link: SshLink,
}

impl Console for SshConsole {
    fn send_line(&mut self, line: &str) -> Result<()> {
        log::debug!("ssh <- {}", line);
        self.channel.write_all(format!("{}\n", line).as_bytes())?;
        self.channel.flush()?;
        Ok(())
    }

    fn read_until(&mut self, marker: &str) -> Result<String> {
        self.buffer.read_until(&mut self.channel, marker)
    }
}

impl Drop for SshConsole {
    fn drop(&mut self) {
        let _ = self.channel.send_eof();
        let _ = self.channel.close();
    }
}

/// Run `f` with SFTP access; the session is torn down on every exit path
pub fn with_remote_files<T>(params: &ConnectionParams, f: impl FnOnce(&mut SftpFiles) -> Result<T>) -> Result<T> {
    let link = SshLink::connect(params)?;
    let mut files = link.files()?;
    f(&mut files)
}
