//! Configuration file watcher for hot reload.
//!
//! Only validated configs are forwarded. A broken edit is logged and the
//! gate keeps the policy it already has.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GateConfig;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GateConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiver the server reads updates from.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GateConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. Dropping the returned handle stops the watch.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let ConfigWatcher { path, update_tx } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_reload_event(&event, &watched) => reload(&watched, &update_tx),
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;
        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn is_reload_event(event: &Event, path: &Path) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && (event.paths.is_empty() || event.paths.iter().any(|p| p.ends_with(path.file_name().unwrap_or_default())))
}

fn reload(path: &Path, tx: &mpsc::UnboundedSender<GateConfig>) {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "Config file changed, route policy reloading");
            if tx.send(config).is_err() {
                tracing::debug!("Config receiver gone, dropping update");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Config reload rejected, keeping current policy");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, EventKind, ModifyKind};
    use std::io::Write;

    #[test]
    fn test_reload_event_filter() {
        let path = Path::new("/etc/gate/gate.toml");
        let modify = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.to_path_buf());
        let other = Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from("/etc/gate/other.toml"));
        let access = Event::new(EventKind::Access(notify::event::AccessKind::Any)).add_path(path.to_path_buf());

        assert!(is_reload_event(&modify, path));
        assert!(!is_reload_event(&other, path));
        assert!(!is_reload_event(&access, path));
    }

    #[test]
    fn test_reload_forwards_only_valid_configs() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let (watcher, mut rx) = ConfigWatcher::new(file.path());

        writeln!(file, "[routes]\npublic = [\"/\", \"/pricing\"]").unwrap();
        reload(file.path(), &watcher.update_tx);
        let config = rx.try_recv().unwrap();
        assert_eq!(config.routes.public, vec!["/", "/pricing"]);

        writeln!(file, "[rate_limit]\nwindow_secs = 0").unwrap();
        reload(file.path(), &watcher.update_tx);
        assert!(rx.try_recv().is_err());
    }
}
