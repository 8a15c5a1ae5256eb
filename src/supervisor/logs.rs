//! Backend stdout/stderr capture.

use std::path::Path;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Where captured backend lines go.
#[derive(Clone)]
pub(crate) struct LogSink {
    server: String,
    forward: bool,
    file: Option<Arc<Mutex<File>>>,
}

impl LogSink {
    /// Build a sink, opening `<log_dir>/<server>.log` for append when a
    /// directory is configured. A file that cannot be opened is logged and
    /// skipped so the backend still starts.
    pub(crate) async fn open(server: &str, forward: bool, log_dir: Option<&Path>) -> Self {
        let file = match log_dir {
            Some(dir) => match open_log_file(dir, server).await {
                Ok(file) => Some(Arc::new(Mutex::new(file))),
                Err(e) => {
                    tracing::warn!(
                        server = %server,
                        dir = %dir.display(),
                        error = %e,
                        "Cannot open backend log file"
                    );
                    None
                }
            },
            None => None,
        };

        Self {
            server: server.to_string(),
            forward,
            file,
        }
    }

    async fn write(&self, stream: &'static str, line: &str) {
        if self.forward {
            tracing::info!(
                target: "fleetgate::backend",
                server = %self.server,
                stream,
                "{}",
                line
            );
        }

        if let Some(file) = &self.file {
            let mut file = file.lock().await;
            let entry = format!("[{}] {}\n", stream, line);
            // Flushed per line so the file is complete once the reader ends
            let written = match file.write_all(entry.as_bytes()).await {
                Ok(()) => file.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                tracing::debug!(server = %self.server, error = %e, "Backend log write failed");
            }
        }
    }
}

async fn open_log_file(dir: &Path, server: &str) -> std::io::Result<File> {
    tokio::fs::create_dir_all(dir).await?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{}.log", server)))
        .await
}

/// Forward lines from one stream until EOF or cancellation.
pub(crate) fn spawn_reader<R>(
    reader: R,
    stream: &'static str,
    sink: LogSink,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => sink.write(stream, &line).await,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(server = %sink.server, stream, error = %e, "Backend output read failed");
                        break;
                    }
                },
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reader_appends_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LogSink::open("alpha", false, Some(dir.path())).await;

        let input: &[u8] = b"loading weights\nready\n";
        spawn_reader(input, "stdout", sink, CancellationToken::new())
            .await
            .unwrap();

        let content = std::fs::read_to_string(dir.path().join("alpha.log")).unwrap();
        assert_eq!(content, "[stdout] loading weights\n[stdout] ready\n");
    }

    #[tokio::test]
    async fn test_last_line_is_on_disk_when_reader_ends() {
        let dir = tempfile::tempdir().unwrap();

        for round in 0..20 {
            let name = format!("crash-{}", round);
            let sink = LogSink::open(&name, false, Some(dir.path())).await;
            let input: &[u8] = b"starting\nCUDA out of memory\n";
            spawn_reader(input, "stderr", sink, CancellationToken::new())
                .await
                .unwrap();

            let content = std::fs::read_to_string(dir.path().join(format!("{}.log", name))).unwrap();
            assert!(
                content.ends_with("[stderr] CUDA out of memory\n"),
                "round {}: {:?}",
                round,
                content
            );
        }
    }

    #[tokio::test]
    async fn test_reader_without_file_drains_input() {
        let sink = LogSink::open("alpha", true, None).await;
        let input: &[u8] = b"one\ntwo\n";
        let handle = spawn_reader(input, "stderr", sink, CancellationToken::new());
        assert!(handle.await.is_ok());
    }
}
