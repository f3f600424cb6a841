use std::env;
use std::fs;

/// 允许注入编译期环境的配置项。
const ALLOWED_KEYS: &[&str] = &["NFC_DUMP_DIR"];

fn main() {
    const ENV_PATH: &str = ".env";
    println!("cargo:rerun-if-changed={}", ENV_PATH);
    for key in ALLOWED_KEYS {
        println!("cargo:rerun-if-env-changed={}", key);
    }

    // 构建进程自带的环境变量优先于 .env
    let file_entries = fs::read_to_string(ENV_PATH)
        .map(|contents| parse_dotenv(&contents))
        .unwrap_or_default();
    for key in ALLOWED_KEYS {
        let value = env::var(key).ok().or_else(|| {
            file_entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        });
        if let Some(value) = value {
            println!("cargo:rustc-env={}={}", key, value);
        }
    }
}

/// 解析 .env 内容，只保留白名单字段。
fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if !ALLOWED_KEYS.contains(&key) {
            continue;
        }
        entries.push((key.to_string(), unquote(value.trim()).to_string()));
    }
    entries
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
