use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KilnError {
    #[error("Error while reading the dependency manifest:\n{0}")]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Error while watching for file changes:\n{0}")]
    Watch(#[from] WatchError),

    #[error("Failed to reserve the reload port")]
    ReloadPort(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Couldn't read manifest '{path}'.\n{source}")]
    Read {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Couldn't parse manifest '{path}'.\n{source}")]
    Parse {
        path: Utf8PathBuf,
        source: serde_json::Error,
    },

    #[error("Dependency '{name}' has no installed descriptor at '{path}'. Run 'kiln install' first.")]
    MissingDescriptor { name: String, path: Utf8PathBuf },

    #[error("Installed descriptor for '{name}' is malformed.\n{source}")]
    MalformedDescriptor {
        name: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Task '{task}' lists unknown prerequisite '{prerequisite}'")]
    UnknownPrerequisite { task: String, prerequisite: String },

    #[error("Task '{0}' is registered more than once")]
    Duplicate(String),

    #[error("Task graph contains a cycle through '{0}'")]
    Cycle(String),

    #[error("Unknown task '{0}'")]
    UnknownTask(String),
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error(transparent)]
    Pattern(#[from] glob::PatternError),

    #[error(transparent)]
    Recv(#[from] std::sync::mpsc::RecvError),
}
