//! A small observation socket (§2, §6.4): a unix socket that, on every
//! accepted connection, writes one JSON snapshot of the port's state and
//! closes. Analogous to a metrics exporter but without the separate HTTP
//! listener — this ordinary clock has exactly one port to report on.

use std::fs::Permissions;
use std::os::unix::prelude::PermissionsExt;
use std::path::Path;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A point-in-time snapshot of the port the daemon observes (§4.2.1's
/// PORT_STATE plus the servo's most recent correction terms).
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObservableState {
    pub port_state: String,
    pub offset_from_master_ns: Option<i64>,
    pub mean_path_delay_ns: Option<i64>,
    pub clock_identity: String,
}

pub fn spawn(
    config: &super::config::ObservabilityConfig,
    state: watch::Receiver<ObservableState>,
) -> JoinHandle<std::io::Result<()>> {
    let config = config.clone();
    tokio::spawn(async move {
        let result = observer(config, state).await;
        if let Err(ref e) = result {
            log::warn!("Abnormal termination of the state observer: {e}");
            log::warn!("The state observer will not be available");
        }
        result
    })
}

async fn observer(
    config: super::config::ObservabilityConfig,
    state: watch::Receiver<ObservableState>,
) -> std::io::Result<()> {
    let path = match config.observation_path {
        Some(path) => path,
        None => return Ok(()),
    };

    // This binary needs to run as root to be able to adjust the system
    // clock; the socket inherits root permissions by default, so loosen
    // them explicitly for unprivileged readers.
    let permissions: std::fs::Permissions =
        PermissionsExt::from_mode(config.observation_permissions);

    let peers_listener = create_unix_socket_with_permissions(&path, permissions)?;

    loop {
        let (mut stream, _addr) = peers_listener.accept().await?;
        let snapshot = state.borrow().clone();
        write_json(&mut stream, &snapshot).await?;
    }
}

fn other_error<T>(msg: String) -> std::io::Result<T> {
    use std::io::{Error, ErrorKind};
    Err(Error::new(ErrorKind::Other, msg))
}

pub fn create_unix_socket_with_permissions(
    path: &Path,
    permissions: Permissions,
) -> std::io::Result<tokio::net::UnixListener> {
    let listener = create_unix_socket(path)?;

    std::fs::set_permissions(path, permissions)?;

    Ok(listener)
}

fn create_unix_socket(path: &Path) -> std::io::Result<tokio::net::UnixListener> {
    // Must unlink path before the bind below, otherwise we get "address
    // already in use".
    if path.exists() {
        use std::os::unix::fs::FileTypeExt;

        let meta = std::fs::metadata(path)?;
        if !meta.file_type().is_socket() {
            return other_error(format!("path {path:?} exists but is not a socket"));
        }

        std::fs::remove_file(path)?;
    }

    let error = match tokio::net::UnixListener::bind(path) {
        Ok(listener) => return Ok(listener),
        Err(e) => e,
    };

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            let msg = format!(
                "could not create observe socket at {path:?} because its parent directory does not exist",
            );
            return other_error(msg);
        }
    }

    let msg = format!("could not create observe socket at {path:?}: {error:?}");
    other_error(msg)
}

pub async fn write_json<T>(stream: &mut UnixStream, value: &T) -> std::io::Result<()>
where
    T: serde::Serialize,
{
    let bytes = serde_json::to_vec(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    stream.write_all(&bytes).await
}
