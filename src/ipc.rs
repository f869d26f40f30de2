use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::{env, io};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum ControlMessage {
    /// Ask for the status line currently shown.
    Status,
    SetThreshold(f32),
    Shutdown,
}

impl ControlMessage {
    fn expects_reply(&self) -> bool {
        matches!(self, ControlMessage::Status)
    }
}

pub fn socket_path() -> PathBuf {
    if let Some(path) = env::var_os("LIVE_LABEL_SOCKET") {
        return PathBuf::from(path);
    }
    env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(env::temp_dir)
        .join("live-label.sock")
}

pub fn send_command(msg: ControlMessage) -> io::Result<Option<String>> {
    let mut stream = UnixStream::connect(socket_path())?;
    serde_json::to_writer(&mut stream, &msg)?;
    stream.flush()?;
    let _ = stream.shutdown(Shutdown::Write);

    if msg.expects_reply() {
        let mut buf = String::new();
        stream.read_to_string(&mut buf)?;
        Ok(Some(buf))
    } else {
        Ok(None)
    }
}
