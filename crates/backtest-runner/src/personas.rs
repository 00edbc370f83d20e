use std::path::Path;

use anyhow::{Context, Result};

/// A named trading persona. The prompt is opaque to the core: it is handed
/// to the oracle verbatim and the name labels decisions for later grouping.
#[derive(Debug, Clone)]
pub struct Persona {
    pub name: String,
    pub prompt: String,
}

/// Load every `*.txt` prompt file from the personas directory, one persona
/// per file, named by file stem. Sorted by name for reproducible run order.
pub fn load_personas(dir: &Path) -> Result<Vec<Persona>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading personas directory {}", dir.display()))?;

    let mut personas = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        if name.is_empty() {
            continue;
        }
        let prompt = std::fs::read_to_string(&path)
            .with_context(|| format!("reading persona file {}", path.display()))?
            .trim()
            .to_string();
        personas.push(Persona { name, prompt });
    }

    if personas.is_empty() {
        anyhow::bail!("no persona files found in {}", dir.display());
    }
    personas.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(personas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_txt_files_sorted_by_name() {
        let dir = std::env::temp_dir().join("personas_sorted");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("value_investor.txt"), "Patient value buyer.\n").unwrap();
        std::fs::write(dir.join("day_trader.txt"), "Momentum chaser.").unwrap();
        std::fs::write(dir.join("notes.md"), "not a persona").unwrap();

        let personas = load_personas(&dir).unwrap();
        assert_eq!(personas.len(), 2);
        assert_eq!(personas[0].name, "day_trader");
        assert_eq!(personas[1].name, "value_investor");
        assert_eq!(personas[1].prompt, "Patient value buyer.");
    }

    #[test]
    fn test_empty_directory_is_an_error() {
        let dir = std::env::temp_dir().join("personas_empty");
        std::fs::create_dir_all(&dir).unwrap();
        assert!(load_personas(&dir).is_err());
    }
}
