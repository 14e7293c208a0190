use super::{ClientRecord, ServerRecord};
use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub const SERVER_LOG: &str = "server_global_metrics.csv";

/// Append-only sink for the per-client and server metric streams.
///
/// Clonable handle, cheap to pass to every component. Client streams are
/// truncated when first opened in a process; the server stream appends
/// across restarts. Both get their header exactly once, when the file is
/// first created.
#[derive(Debug, Clone)]
pub struct MetricsSink {
    inner: Arc<Mutex<SinkInner>>,
}

#[derive(Debug)]
struct SinkInner {
    dir: PathBuf,
    clients: HashMap<u32, Writer<File>>,
    server: Option<Writer<File>>,
}

impl MetricsSink {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating log directory {}", dir.display()))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(SinkInner {
                dir,
                clients: HashMap::new(),
                server: None,
            })),
        })
    }

    pub fn dir(&self) -> PathBuf {
        self.inner.lock().dir.clone()
    }

    pub fn client_log_path(dir: &Path, client_id: u32) -> PathBuf {
        dir.join(format!("client_{client_id}_metrics.csv"))
    }

    pub fn server_log_path(dir: &Path) -> PathBuf {
        dir.join(SERVER_LOG)
    }

    /// Opens a client's stream, discarding anything a previous run left
    /// behind. Called once per client at startup; logging to an
    /// unregistered client registers it on the fly.
    pub fn register_client(&self, client_id: u32) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::client_writer(&mut inner, client_id)?;
        Ok(())
    }

    pub fn log_client(&self, record: &ClientRecord) -> Result<()> {
        let mut inner = self.inner.lock();
        let writer = Self::client_writer(&mut inner, record.client_id)?;
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    pub fn log_server(&self, record: &ServerRecord) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.server.is_none() {
            let path = Self::server_log_path(&inner.dir);
            let existed = path.exists();
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("opening server log {}", path.display()))?;
            debug!("server log {} (existed: {})", path.display(), existed);
            inner.server = Some(
                WriterBuilder::new()
                    .has_headers(!existed)
                    .from_writer(file),
            );
        }
        let writer = inner.server.as_mut().unwrap();
        writer.serialize(record)?;
        writer.flush()?;
        Ok(())
    }

    fn client_writer(inner: &mut SinkInner, client_id: u32) -> Result<&mut Writer<File>> {
        if !inner.clients.contains_key(&client_id) {
            let path = Self::client_log_path(&inner.dir, client_id);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("clearing stale log {}", path.display()))?;
            }
            let file = File::create(&path)
                .with_context(|| format!("creating client log {}", path.display()))?;
            debug!("client {} log at {}", client_id, path.display());
            inner
                .clients
                .insert(client_id, WriterBuilder::new().has_headers(true).from_writer(file));
        }
        Ok(inner.clients.get_mut(&client_id).unwrap())
    }
}
