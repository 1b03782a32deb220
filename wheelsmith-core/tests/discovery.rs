/// Finding wheels in the output directory and interpreters under a prefix.
use std::fs;
use std::path::PathBuf;

use wheelsmith_core::discovery::{discover_interpreters, ArtifactDiscovery, DirDiscovery};

#[test]
fn discovers_wheels_sorted_by_name() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();

    let later = root.join("ext-1.0-cp36-cp36m-linux_x86_64.whl");
    let earlier = root.join("ext-1.0-cp27-cp27mu-linux_x86_64.whl");
    fs::write(&later, b"wheel").unwrap();
    fs::write(&earlier, b"wheel").unwrap();

    let found = DirDiscovery::new(root).discover().expect("discover");

    let paths: Vec<PathBuf> = found.into_iter().map(|a| a.path).collect();
    assert_eq!(paths, vec![earlier, later]);
}

#[test]
fn ignores_other_files() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    fs::write(root.join("ext-1.0.tar.gz"), b"sdist").unwrap();
    fs::write(root.join("README.txt"), b"hello").unwrap();

    let found = DirDiscovery::new(root).discover().expect("discover");

    assert!(found.is_empty());
}

#[test]
fn custom_extension_is_honoured() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = temp.path();
    let egg = root.join("ext-1.0-py3.6.egg");
    fs::write(&egg, b"egg").unwrap();

    let found = DirDiscovery::new(root)
        .extension("egg")
        .discover()
        .expect("discover");

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].file_name(), "ext-1.0-py3.6.egg");
}

#[test]
fn returns_error_for_missing_output_dir() {
    let missing = PathBuf::from("/nonexistent/wheelsmith/dist");
    let result = DirDiscovery::new(missing).discover();

    assert!(result.is_err());
}

#[test]
fn interpreters_need_a_python_executable() {
    let temp = tempfile::tempdir().expect("tempdir");
    let prefix = temp.path();
    for name in ["cp36-cp36m", "cp27-cp27m"] {
        let bin = prefix.join(name).join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("python"), b"").unwrap();
    }
    fs::create_dir_all(prefix.join("pypy_73/bin")).unwrap();

    let found = discover_interpreters(prefix).expect("discover");

    let tags: Vec<String> = found.iter().map(|i| i.tag()).collect();
    assert_eq!(tags, vec!["cp27-cp27m", "cp36-cp36m"]);
}
