use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tempfile::NamedTempFile;
use walkdir::WalkDir;
use zip::ZipArchive;

pub const BUILD_FILE: &str = "BUILD";

/// Lists every `*.whl` below `directory`, sorted.
pub fn list_wheels(directory: &Path) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(anyhow!("Каталог {} не найден", directory.display()));
    }

    let mut wheels = Vec::new();
    for entry in WalkDir::new(directory) {
        let entry =
            entry.with_context(|| format!("Не удалось обойти {}", directory.display()))?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "whl")
        {
            wheels.push(entry.into_path());
        }
    }

    wheels.sort();
    Ok(wheels)
}

pub fn extract_wheel(wheel: &Path, destination: &Path) -> Result<()> {
    fs::create_dir_all(destination)
        .with_context(|| format!("Не удалось создать {}", destination.display()))?;

    let file =
        File::open(wheel).with_context(|| format!("Не удалось открыть {}", wheel.display()))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("{} не является zip-архивом", wheel.display()))?;
    archive
        .extract(destination)
        .with_context(|| format!("Не удалось распаковать {}", wheel.display()))
}

/// Absolute form of `path` with `.`/`..` and symlinks resolved.
pub fn canonical(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).with_context(|| format!("Не удалось найти {}", path.display()))
}

/// Copies `file` into `directory` under its own name and returns the new path.
pub fn copy_into(file: &Path, directory: &Path) -> Result<PathBuf> {
    let name = file
        .file_name()
        .ok_or_else(|| anyhow!("У пути {} нет имени файла", file.display()))?;
    let target = directory.join(name);
    if target != file {
        fs::copy(file, &target).with_context(|| {
            format!(
                "Не удалось скопировать {} в {}",
                file.display(),
                target.display()
            )
        })?;
    }
    Ok(target)
}

/// Replaces `path` with `content` via a temporary file in the same directory,
/// so a failed write never leaves a partial file behind.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .with_context(|| format!("Не удалось создать {}", parent.display()))?;

    let mut temp = NamedTempFile::new_in(&parent)
        .with_context(|| format!("Не удалось создать временный файл в {}", parent.display()))?;
    temp.write_all(content.as_bytes())
        .with_context(|| format!("Не удалось записать {}", path.display()))?;
    temp.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("Не удалось записать {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::{canonical, copy_into, extract_wheel, list_wheels, write_atomic};
    use crate::testing::write_wheel;

    #[test]
    fn lists_wheels_recursively_in_order() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("nested"))?;
        write_wheel(&dir.path().join("nested"), "b-1.0-py3-none-any.whl", &[])?;
        write_wheel(dir.path(), "a-1.0-py3-none-any.whl", &[])?;
        fs::write(dir.path().join("requirements.txt"), "a\nb\n")?;

        let wheels = list_wheels(dir.path())?;
        let names: Vec<String> = wheels
            .iter()
            .map(|path| path.strip_prefix(dir.path()).map(|p| p.display().to_string()))
            .collect::<Result<_, _>>()?;
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"a-1.0-py3-none-any.whl".to_string()));
        assert!(list_wheels(&dir.path().join("absent")).is_err());
        assert_eq!(
            canonical(&dir.path().join("nested/../a-1.0-py3-none-any.whl"))?,
            canonical(&wheels[0])?
        );
        Ok(())
    }

    #[test]
    fn extracts_and_copies_wheel() -> Result<()> {
        let source = tempdir()?;
        let target = tempdir()?;
        let wheel = write_wheel(
            source.path(),
            "six-1.11.0-py2.py3-none-any.whl",
            &[("six.py", "VERSION = 1\n"), ("six-1.11.0.dist-info/METADATA", "Name: six\n")],
        )?;

        extract_wheel(&wheel, target.path())?;
        let copied = copy_into(&wheel, target.path())?;

        assert_eq!(fs::read_to_string(target.path().join("six.py"))?, "VERSION = 1\n");
        assert!(target.path().join("six-1.11.0.dist-info/METADATA").exists());
        assert!(copied.exists());
        assert_eq!(copy_into(&copied, target.path())?, copied);
        Ok(())
    }

    #[test]
    fn atomic_write_replaces_content() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("out/requirements.bzl");
        write_atomic(&path, "first")?;
        write_atomic(&path, "second")?;
        assert_eq!(fs::read_to_string(&path)?, "second");
        assert_eq!(fs::read_dir(dir.path().join("out"))?.count(), 1);
        Ok(())
    }
}
