use std::fs;
use std::path::{Path, PathBuf};
use yaml_rust2::{Yaml, YamlLoader};

use crate::config::ConfigError;

/// Loads a YAML file, expanding `!include <relative path>` lines.
///
/// Included documents are merged first (in order of appearance), then the
/// remaining content of the including file is merged on top of them.
pub fn load_yaml_with_includes(path: &Path) -> Result<Yaml, ConfigError> {
    let mut chain = Vec::new();
    let merged = process_includes_recursive(path, &mut chain)?;
    tracing::debug!(path = %path.display(), "Processed config includes");
    Ok(merged)
}

fn process_includes_recursive(path: &Path, chain: &mut Vec<PathBuf>) -> Result<Yaml, ConfigError> {
    let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if chain.contains(&key) {
        return Err(ConfigError::IncludeCycle(path.to_path_buf()));
    }
    chain.push(key);

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let base_path = path.parent().unwrap_or(Path::new(""));

    let (includes, rest): (Vec<&str>, Vec<&str>) = contents
        .lines()
        .partition(|&line| line.trim().starts_with("!include"));

    let mut merged_includes: Option<Yaml> = None;
    for line in includes {
        let include_path = line.trim().trim_start_matches("!include").trim();
        if include_path.is_empty() {
            return Err(ConfigError::EmptyInclude(path.to_path_buf()));
        }
        let included = process_includes_recursive(&base_path.join(include_path), chain)?;
        merged_includes = Some(match merged_includes {
            Some(acc) => merge_yaml(&acc, &included),
            None => included,
        });
    }

    let rest_yamls =
        YamlLoader::load_from_str(&rest.join("\n")).map_err(|source| ConfigError::Scan {
            path: path.to_path_buf(),
            source,
        })?;
    let merged_rest = rest_yamls
        .into_iter()
        .reduce(|acc, next| merge_yaml(&acc, &next));

    chain.pop();

    match (merged_includes, merged_rest) {
        (Some(base), Some(overrides)) => Ok(merge_yaml(&base, &overrides)),
        (Some(base), None) => Ok(base),
        (None, Some(overrides)) => Ok(overrides),
        (None, None) => Err(ConfigError::EmptyDocument(path.to_path_buf())),
    }
}

/// Deep-merges two YAML values; hashes merge key by key, anything else is
/// replaced by the override.
pub fn merge_yaml(base: &Yaml, override_yaml: &Yaml) -> Yaml {
    match (base, override_yaml) {
        (Yaml::Hash(base_hash), Yaml::Hash(override_hash)) => {
            let mut result = base_hash.clone();
            for (key, value) in override_hash {
                let merged = match base_hash.get(key) {
                    Some(base_value) => merge_yaml(base_value, value),
                    None => value.clone(),
                };
                result.insert(key.clone(), merged);
            }
            Yaml::Hash(result)
        }
        (_, override_value) => override_value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Yaml {
        YamlLoader::load_from_str(source).unwrap().remove(0)
    }

    #[test]
    fn test_merge_nested_hashes() {
        let base = parse("trainer:\n  seed: 42\n  test_ratio: 0.2\n");
        let overrides = parse("trainer:\n  seed: 7\n");

        let merged = merge_yaml(&base, &overrides);

        assert_eq!(merged["trainer"]["seed"].as_i64(), Some(7));
        assert_eq!(merged["trainer"]["test_ratio"].as_f64(), Some(0.2));
    }

    #[test]
    fn test_scalar_override_replaces_hash() {
        let base = parse("preprocessing:\n  visibility_fill: 10\n");
        let overrides = parse("preprocessing: ~\n");

        let merged = merge_yaml(&base, &overrides);

        assert!(merged["preprocessing"].is_null());
    }
}
