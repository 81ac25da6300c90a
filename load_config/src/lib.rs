//! Layered configuration loading.
//!
//! Sources are merged in increasing order of precedence:
//!
//! 1. the built-in default TOML
//! 2. `/etc/{name}/{name}.toml` and `/etc/{name}/{name}.json`
//! 3. `./{name}.toml` and `./{name}.json`
//! 4. the file passed explicitly, if any
//! 5. environment variables prefixed with `{NAME}_`, nested keys split on `__`
//!
//! Environment values are parsed, so `42` becomes an integer. Keys listed as
//! raw keys keep their value as the verbatim string instead.
use std::path::Path;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use tracing::info;

fn load_config_file(path: &Path, figment: Figment) -> Figment {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => figment.merge(Toml::file(path)),
        _ => figment.merge(Json::file(path)),
    }
}

fn load_config_in_dir(name: &str, dir: &Path, mut figment: Figment) -> Figment {
    for ext in ["toml", "json"] {
        let filename = dir.join(format!("{name}.{ext}"));
        if filename.exists() {
            info!("loading config file: {}", filename.display());
            figment = load_config_file(&filename, figment);
        }
    }
    figment
}

fn env_prefix(name: &str) -> String {
    format!("{}_", name.to_uppercase().replace('-', "_"))
}

fn merge_env(name: &str, raw_env_keys: &[&str], mut figment: Figment) -> Figment {
    let env = Env::prefixed(&env_prefix(name)).split("__");
    for (key, value) in env.clone().only(raw_env_keys).iter() {
        figment = figment.merge(Serialized::default(&key.as_str().to_lowercase(), value));
    }
    figment.merge(env.ignore(raw_env_keys))
}

fn search_load_config(
    name: &str,
    search_dirs: &[&Path],
    default_toml: &str,
    leaf_config: Option<&Path>,
    raw_env_keys: &[&str],
) -> Figment {
    let mut figment = Figment::from(Toml::string(default_toml));
    for dir in search_dirs {
        figment = load_config_in_dir(name, dir, figment);
    }
    if let Some(path) = leaf_config {
        info!("loading config file: {}", path.display());
        figment = load_config_file(path, figment);
    }
    merge_env(name, raw_env_keys, figment)
}

/// Build the configuration figment of the application `name`.
///
/// `raw_env_keys` names the top-level keys whose environment override is
/// always a string, such as access keys that may consist of digits only.
pub fn load_config(
    name: &str,
    default_toml: &str,
    leaf_config: Option<&Path>,
    raw_env_keys: &[&str],
) -> Figment {
    let etc_dir = Path::new("/etc").join(name);
    search_load_config(
        name,
        &[etc_dir.as_path(), Path::new(".")],
        default_toml,
        leaf_config,
        raw_env_keys,
    )
}
