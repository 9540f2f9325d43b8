//! In-memory hierarchical filesystem
//!
//! An arena of up to 64 nodes addressed by index, not owning pointers: the root's parent is its
//! own index, so the back-reference is a lookup rather than ownership, and there is never a
//! cycle to free. Each file's content is capped at 4 KiB.

use crate::sync::SpinLock;
use alloc::vec::Vec;
use heapless::String;

/// Maximum number of filesystem nodes
pub const MAX_NODES: usize = 64;
/// Maximum bytes of content a single file may hold
pub const MAX_FILE_SIZE: usize = 4096;
/// Maximum length of a single path component
const MAX_NAME: usize = 31;
/// Arena index of the root directory
pub const ROOT: usize = 0;

/// What a node is
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Kind {
    File,
    Dir,
}

/// An arena-allocated filesystem node
struct Node {
    kind: Kind,
    name: String<MAX_NAME>,
    parent: usize,
    /// Children, by arena index (directories only)
    children: Vec<usize>,
    /// Content bytes (files only)
    content: Vec<u8>,
}

impl Node {
    fn dir(name: &str, parent: usize) -> Self {
        Self {
            kind: Kind::Dir,
            name: String::try_from(name).unwrap_or_default(),
            parent,
            children: Vec::new(),
            content: Vec::new(),
        }
    }

    fn file(name: &str, parent: usize) -> Self {
        Self {
            kind: Kind::File,
            name: String::try_from(name).unwrap_or_default(),
            parent,
            children: Vec::new(),
            content: Vec::new(),
        }
    }
}

/// The arena: a fixed pool of optional nodes, one lock for the whole tree (the filesystem is one
/// more process-wide global under the kernel's coarse-lock discipline)
struct Fs {
    nodes: [Option<Node>; MAX_NODES],
}

impl Fs {
    const fn empty() -> Self {
        Self {
            nodes: [const { None }; MAX_NODES],
        }
    }

    fn find_child(&self, dir: usize, name: &str) -> Option<usize> {
        let node = self.nodes[dir].as_ref()?;
        node.children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].as_ref().is_some_and(|n| n.name == name))
    }

    /// Resolves a `/`-or-relative path against `cwd`, supporting `.` and `..`
    fn resolve(&self, cwd: usize, path: &str) -> Option<usize> {
        let mut current = if path.starts_with('/') { ROOT } else { cwd };
        for component in path.split('/').filter(|c| !c.is_empty()) {
            current = match component {
                "." => current,
                ".." => self.nodes[current].as_ref()?.parent,
                name => self.find_child(current, name)?,
            };
        }
        Some(current)
    }

    fn alloc(&mut self, node: Node) -> Option<usize> {
        let idx = self.nodes.iter().position(Option::is_none)?;
        self.nodes[idx] = Some(node);
        Some(idx)
    }
}

static FS: SpinLock<Fs> = SpinLock::new(Fs::empty());

/// Initializes the filesystem with just the root directory
pub fn init() {
    crate::call_once!();
    let mut fs = FS.lock();
    fs.nodes[ROOT] = Some(Node::dir("/", ROOT));
}

/// Resolves `path` (absolute or relative to `cwd`) to a node index
pub fn resolve(cwd: usize, path: &str) -> Option<usize> {
    FS.lock().resolve(cwd, path)
}

/// Creates a directory named by the last component of `path`, under its resolved parent
pub fn mkdir(cwd: usize, path: &str) -> Result<usize, &'static str> {
    let (parent, name) = split_parent(cwd, path)?;
    let mut fs = FS.lock();
    if fs.find_child(parent, name).is_some() {
        return Err("already exists");
    }
    let idx = fs.alloc(Node::dir(name, parent)).ok_or("filesystem full")?;
    fs.nodes[parent]
        .as_mut()
        .expect("parent resolved above")
        .children
        .push(idx);
    Ok(idx)
}

/// Removes an empty directory
pub fn rmdir(cwd: usize, path: &str) -> Result<(), &'static str> {
    let mut fs = FS.lock();
    let idx = fs.resolve(cwd, path).ok_or("not found")?;
    if idx == ROOT {
        return Err("cannot remove root");
    }
    let node = fs.nodes[idx].as_ref().ok_or("not found")?;
    if node.kind != Kind::Dir {
        return Err("not a directory");
    }
    if !node.children.is_empty() {
        return Err("directory not empty");
    }
    detach(&mut fs, idx);
    fs.nodes[idx] = None;
    Ok(())
}

/// Creates an empty file named by the last component of `path`
pub fn touch(cwd: usize, path: &str) -> Result<usize, &'static str> {
    let (parent, name) = split_parent(cwd, path)?;
    let mut fs = FS.lock();
    if fs.find_child(parent, name).is_some() {
        return Err("already exists");
    }
    let idx = fs.alloc(Node::file(name, parent)).ok_or("filesystem full")?;
    fs.nodes[parent]
        .as_mut()
        .expect("parent resolved above")
        .children
        .push(idx);
    Ok(idx)
}

/// Replaces a file's full content
pub fn write(cwd: usize, path: &str, data: &[u8]) -> Result<(), &'static str> {
    if data.len() > MAX_FILE_SIZE {
        return Err("file too large");
    }
    let mut fs = FS.lock();
    let idx = fs.resolve(cwd, path).ok_or("not found")?;
    let node = fs.nodes[idx].as_mut().ok_or("not found")?;
    if node.kind != Kind::File {
        return Err("not a file");
    }
    node.content.clear();
    node.content.extend_from_slice(data);
    Ok(())
}

/// Reads a file's full content into `out`, returning the number of bytes copied
pub fn read(cwd: usize, path: &str, out: &mut [u8]) -> Result<usize, &'static str> {
    let fs = FS.lock();
    let idx = fs.resolve(cwd, path).ok_or("not found")?;
    let node = fs.nodes[idx].as_ref().ok_or("not found")?;
    if node.kind != Kind::File {
        return Err("not a file");
    }
    let len = node.content.len().min(out.len());
    out[..len].copy_from_slice(&node.content[..len]);
    Ok(len)
}

/// Removes a file (not a directory)
pub fn rm(cwd: usize, path: &str) -> Result<(), &'static str> {
    let mut fs = FS.lock();
    let idx = fs.resolve(cwd, path).ok_or("not found")?;
    if idx == ROOT {
        return Err("cannot remove root");
    }
    if fs.nodes[idx].as_ref().ok_or("not found")?.kind != Kind::File {
        return Err("not a file");
    }
    detach(&mut fs, idx);
    fs.nodes[idx] = None;
    Ok(())
}

/// Lists the names (and whether each is a directory) of a directory's children
pub fn ls(cwd: usize, path: &str, mut f: impl FnMut(&str, bool)) -> Result<(), &'static str> {
    let fs = FS.lock();
    let idx = fs.resolve(cwd, path).ok_or("not found")?;
    let node = fs.nodes[idx].as_ref().ok_or("not found")?;
    if node.kind != Kind::Dir {
        return Err("not a directory");
    }
    for &child in &node.children {
        if let Some(child_node) = fs.nodes[child].as_ref() {
            f(&child_node.name, child_node.kind == Kind::Dir);
        }
    }
    Ok(())
}

/// Reverse-walks from `idx` to the root, writing the absolute path into `out`
pub fn path_of(mut idx: usize, out: &mut String<256>) {
    out.clear();
    let fs = FS.lock();
    // Collect segments leaf-to-root, then write them out in reverse
    let mut names: Vec<String<MAX_NAME>> = Vec::new();
    while idx != ROOT {
        let Some(node) = fs.nodes[idx].as_ref() else {
            break;
        };
        names.push(node.name.clone());
        idx = node.parent;
    }
    if names.is_empty() {
        let _ = out.push('/');
        return;
    }
    for name in names.iter().rev() {
        let _ = out.push('/');
        let _ = out.push_str(name);
    }
}

/// Splits `path` into its resolved parent directory and final component name
fn split_parent(cwd: usize, path: &str) -> Result<(usize, &str), &'static str> {
    let trimmed = path.trim_end_matches('/');
    let (dir_part, name) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));
    if name.is_empty() {
        return Err("invalid path");
    }
    let parent = if dir_part.is_empty() {
        if path.starts_with('/') {
            ROOT
        } else {
            cwd
        }
    } else {
        resolve(cwd, dir_part).ok_or("parent not found")?
    };
    Ok((parent, name))
}

/// Removes `idx` from its parent's child list, without freeing the slot
fn detach(fs: &mut Fs, idx: usize) {
    let parent = fs.nodes[idx].as_ref().map(|n| n.parent);
    if let Some(parent) = parent {
        if let Some(parent_node) = fs.nodes[parent].as_mut() {
            parent_node.children.retain(|&c| c != idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> SpinLock<Fs> {
        let fs = SpinLock::new(Fs::empty());
        fs.lock().nodes[ROOT] = Some(Node::dir("/", ROOT));
        fs
    }

    #[test]
    fn resolve_absolute_and_relative_paths() {
        let fs = fresh();
        let a = fs.lock().alloc(Node::dir("a", ROOT)).unwrap();
        fs.lock().nodes[ROOT].as_mut().unwrap().children.push(a);
        let b = fs.lock().alloc(Node::dir("b", a)).unwrap();
        fs.lock().nodes[a].as_mut().unwrap().children.push(b);

        assert_eq!(fs.lock().resolve(ROOT, "/a/b"), Some(b));
        assert_eq!(fs.lock().resolve(a, "b"), Some(b));
        assert_eq!(fs.lock().resolve(b, ".."), Some(a));
        assert_eq!(fs.lock().resolve(b, "../.."), Some(ROOT));
        assert_eq!(fs.lock().resolve(ROOT, "."), Some(ROOT));
    }

    #[test]
    fn resolve_missing_component_fails() {
        let fs = fresh();
        assert_eq!(fs.lock().resolve(ROOT, "/nope"), None);
    }

    /// Exercises `mkdir`/`touch`/`write`/`read`/`rm`/`rmdir` together against the shared global
    /// filesystem in one test, since splitting them across `#[test]` functions would race on the
    /// same global under parallel test execution
    #[test]
    fn public_api_mkdir_write_read_rm_rmdir() {
        reset_global_fs();

        mkdir(ROOT, "/a").unwrap();
        touch(ROOT, "/a/f").unwrap();
        assert_eq!(rmdir(ROOT, "/a"), Err("directory not empty"));

        write(ROOT, "/a/f", b"Hello").unwrap();
        let mut out = [0_u8; 16];
        let n = read(ROOT, "/a/f", &mut out).unwrap();
        assert_eq!(&out[..n], b"Hello");

        rm(ROOT, "/a/f").unwrap();
        assert_eq!(read(ROOT, "/a/f", &mut out), Err("not found"));
        assert!(rmdir(ROOT, "/a").is_ok());
    }

    /// Resets the shared global filesystem to a clean root
    ///
    /// Only safe to call from a single test, since the global is process-wide.
    fn reset_global_fs() {
        let mut fs = FS.lock();
        for node in &mut fs.nodes {
            *node = None;
        }
        fs.nodes[ROOT] = Some(Node::dir("/", ROOT));
    }
}
