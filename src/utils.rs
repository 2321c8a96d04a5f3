use anyhow::Context;
use md5::{Digest, Md5};
use serde::Serialize;
use std::{fs, path::Path};

pub const TARGET_URL: &str = "https://www.pascalcoste-shopping.com/esthetique/fond-de-teint.html";
pub const TARGET_SELECTOR: &str = "img.uk-cover";
pub const SCREENSHOT_PATH: &str = "screenshot.png";
pub const OUTPUT_PATH: &str = "data.json";
pub const BANNER_FORMAT: &str = "Left Side Banner";
pub const VIEWPORT: (u32, u32) = (1200, 1200);

/// Hex encoded MD5 of the url string. Only used as a dedup key.
pub fn content_hash(url: &str) -> String {
    format!("{:x}", Md5::digest(url.as_bytes()))
}

/// Serializes `value` with a two space indent and overwrites `path`.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("could not serialize record")?;
    create_parent_dir(path)?;
    fs::write(path, json).context(format!("could not write json to {:?}", path))?;
    Ok(())
}

pub fn create_parent_dir(path: &Path) -> anyhow::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .context(format!("could not create directory {:?}", parent)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_is_md5_hex() {
        assert_eq!(
            content_hash("https://example.com/a.jpg"),
            "7cff6e664a8bf6783610a2814043d343"
        );
        assert_eq!(content_hash(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn hash_is_stable() {
        let a = content_hash("https://example.com/b.jpg");
        let b = content_hash("https://example.com/b.jpg");
        assert_eq!(a, b);
        assert_ne!(a, content_hash("https://example.com/a.jpg"));
    }

    #[test]
    fn writes_pretty_json_and_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");

        write_json_pretty(&path, &json!({ "id": "x" })).unwrap();

        let s = fs::read_to_string(&path).unwrap();
        assert_eq!(s, "{\n  \"id\": \"x\"\n}");
    }

    #[test]
    fn bare_file_name_has_no_parent_to_create() {
        assert!(create_parent_dir(Path::new("data.json")).is_ok());
    }
}
