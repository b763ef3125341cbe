use std::env::consts::{ARCH, DLL_PREFIX, DLL_SUFFIX};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use super::types::LoaderConfig;

const SYSTEM_LIBRARY_ROOTS: [&str; 3] = ["/usr/lib", "/usr/local/lib", "/lib"];

/// Where a library was found: either a bare name the OS loader resolves on
/// its own, or a concrete file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryLocation {
    System(String),
    File(PathBuf),
}

impl LibraryLocation {
    pub fn as_os_str(&self) -> &OsStr {
        match self {
            LibraryLocation::System(name) => OsStr::new(name),
            LibraryLocation::File(path) => path.as_os_str(),
        }
    }
}

impl std::fmt::Display for LibraryLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryLocation::System(name) => write!(f, "{}", name),
            LibraryLocation::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LibrarySearch {
    names: Vec<String>,
    paths: Vec<PathBuf>,
    auto_resolve: bool,
}

impl LibrarySearch {
    pub fn new(names: Vec<String>, paths: Vec<PathBuf>) -> Self {
        Self {
            names,
            paths,
            auto_resolve: true,
        }
    }

    pub fn from_config(config: &LoaderConfig) -> Self {
        let mut paths = system_library_paths(ARCH);
        if let Some(var) = &config.search_path_env {
            paths.extend(env_library_paths(var));
        }
        paths.extend(application_library_paths());
        paths.extend(config.extra_search_paths.iter().cloned());
        dedup(&mut paths);

        Self {
            names: library_names(config),
            paths,
            auto_resolve: config.auto_resolve,
        }
    }

    pub fn with_auto_resolve(mut self, auto_resolve: bool) -> Self {
        self.auto_resolve = auto_resolve;
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn candidate_count(&self) -> usize {
        self.names.len() * (self.paths.len() + usize::from(self.auto_resolve))
    }

    /// Bare-name resolution through the OS loader first, then a manual probe
    /// of every (directory, name) pair in order.
    pub fn locate(&self) -> Option<LibraryLocation> {
        log::debug!(
            "Searching {} library paths for {:?}",
            self.paths.len(),
            self.names
        );

        if self.auto_resolve {
            if let Some(name) = self.resolve_by_name() {
                log::debug!("Found library through the system loader: {}", name);
                return Some(LibraryLocation::System(name));
            }
        }

        if let Some(path) = self.probe_paths() {
            log::debug!("Found library file: {}", path.display());
            return Some(LibraryLocation::File(path));
        }

        log::warn!("No OCR library found among {:?}", self.names);
        None
    }

    fn resolve_by_name(&self) -> Option<String> {
        self.names.iter().find_map(|name| {
            // SAFETY: loading runs the library's initializers; the candidate
            // names all refer to the OCR library this crate is built to load.
            match unsafe { libloading::Library::new(name) } {
                Ok(library) => {
                    drop(library);
                    Some(name.clone())
                }
                Err(e) => {
                    log::trace!("System loader could not resolve {}: {}", name, e);
                    None
                }
            }
        })
    }

    pub fn probe_paths(&self) -> Option<PathBuf> {
        self.paths
            .iter()
            .filter(|dir| dir.is_dir())
            .flat_map(|dir| self.names.iter().map(move |name| dir.join(name)))
            .find(|candidate| is_readable_file(candidate))
    }
}

/// Exact version, major version, unversioned, then legacy aliases.
pub fn library_names(config: &LoaderConfig) -> Vec<String> {
    let unversioned = format!("{}{}{}", DLL_PREFIX, config.library_name, DLL_SUFFIX);
    let major = config
        .library_version
        .split('.')
        .next()
        .filter(|major| !major.is_empty());

    let mut names = Vec::with_capacity(3 + config.legacy_names.len());
    if !config.library_version.is_empty() {
        names.push(format!("{}.{}", unversioned, config.library_version));
    }
    if let Some(major) = major {
        names.push(format!("{}.{}", unversioned, major));
    }
    names.push(unversioned);
    names.extend(config.legacy_names.iter().cloned());
    dedup(&mut names);
    names
}

pub fn system_library_paths(arch: &str) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = SYSTEM_LIBRARY_ROOTS.iter().map(PathBuf::from).collect();

    let multiarch = match arch {
        "x86_64" => Some("x86_64-linux-gnu"),
        "aarch64" => Some("aarch64-linux-gnu"),
        "arm" => Some("arm-linux-gnueabihf"),
        _ => None,
    };
    if let Some(triple) = multiarch {
        paths.extend(
            SYSTEM_LIBRARY_ROOTS
                .iter()
                .map(|root| Path::new(root).join(triple)),
        );
    }

    paths
}

fn env_library_paths(var: &str) -> Vec<PathBuf> {
    std::env::var_os(var)
        .map(|value| {
            std::env::split_paths(&value)
                .filter(|path| !path.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// `<exe dir>/../lib` and the executable's own directory.
fn application_library_paths() -> Vec<PathBuf> {
    let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    else {
        return Vec::new();
    };

    let mut paths = Vec::with_capacity(2);
    if let Some(prefix) = exe_dir.parent() {
        paths.push(prefix.join("lib"));
    }
    paths.push(exe_dir);
    paths
}

fn is_readable_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false) && fs::File::open(path).is_ok()
}

fn dedup<T: PartialEq + Clone>(items: &mut Vec<T>) {
    let mut seen: Vec<T> = Vec::with_capacity(items.len());
    items.retain(|item| {
        if seen.contains(item) {
            false
        } else {
            seen.push(item.clone());
            true
        }
    });
}
