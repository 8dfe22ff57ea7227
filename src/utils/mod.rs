use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::fs;

static DOMAIN_RE: OnceLock<Regex> = OnceLock::new();

/// `label(.label)+.tld`，标签不以连字符开头或结尾
pub fn is_valid_domain(domain: &str) -> bool {
    DOMAIN_RE
        .get_or_init(|| {
            Regex::new(r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$").unwrap()
        })
        .is_match(domain)
}

/// 读取域名列表：每行一个，跳过空行与 `#` 注释
pub async fn read_domain_list(path: impl AsRef<Path>) -> std::io::Result<Vec<String>> {
    let text = fs::read_to_string(path).await?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// `850ms` / `2.34s` / `1m 5.2s`
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {:.1}s", ms / 60_000, (ms % 60_000) as f64 / 1000.0)
    }
}

pub async fn save_file(path: impl AsRef<Path>, data: &[u8]) -> std::io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, data).await?;
    Ok(())
}

/// 删除文件；文件不存在不算错误
pub async fn remove_file_if_exists(path: impl AsRef<Path>) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_validation() {
        for ok in ["ornek.com", "sub.ornek.com.tr", "a-b.io", "x1.co"] {
            assert!(is_valid_domain(ok), "{ok}");
        }
        for bad in ["", "localhost", "-a.com", "a-.com", "a..com", "ornek.c", "http://a.com", "a.com/"] {
            assert!(!is_valid_domain(bad), "{bad}");
        }
    }

    #[test]
    fn durations_follow_three_scales() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(2340)), "2.34s");
        assert_eq!(format_duration(Duration::from_millis(65_200)), "1m 5.2s");
    }

    #[tokio::test]
    async fn list_file_skips_blanks_and_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.txt");
        std::fs::write(&path, "# sosyal medya\ntwitter.com\n\n  discord.com  \n#x.com\n").unwrap();

        let domains = read_domain_list(&path).await.unwrap();
        assert_eq!(domains, ["twitter.com", "discord.com"]);
    }

    #[tokio::test]
    async fn saved_files_can_be_removed_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("captcha.png");

        save_file(&path, b"png").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"png");

        remove_file_if_exists(&path).await.unwrap();
        remove_file_if_exists(&path).await.unwrap();
        assert!(!path.exists());
    }
}
