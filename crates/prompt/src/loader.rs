//! Loader for the optional composition style file.

use crate::compositor::Compositor;
use crate::types::CompositionStyle;
use fewshot_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

/// Path of the style file inside a workspace.
pub fn style_path(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".fewshot/style.yaml")
}

/// Load the composition style for a workspace.
///
/// Reads `.fewshot/style.yaml` when present; keys it omits keep their
/// defaults. Without the file the default style applies.
///
/// # Example
/// ```no_run
/// use fewshot_prompt::load_style;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let style = load_style(Path::new("."))?;
/// println!("Example label: {}", style.example_label);
/// # Ok(())
/// # }
/// ```
pub fn load_style(workspace_path: &Path) -> AppResult<CompositionStyle> {
    let style_file = style_path(workspace_path);

    if !style_file.exists() {
        tracing::debug!("No style file at {:?}; using defaults", style_file);
        return Ok(CompositionStyle::default());
    }

    let contents = std::fs::read_to_string(&style_file).map_err(|e| {
        AppError::Prompt(format!("Failed to read style file {:?}: {}", style_file, e))
    })?;

    let style: CompositionStyle = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse style file {:?}: {}", style_file, e))
    })?;

    validate_style(&style)?;

    tracing::info!("Loaded composition style from {:?}", style_file);
    Ok(style)
}

/// Write the default style file, for users to edit. Existing files are kept.
pub fn write_default_style(workspace_path: &Path) -> AppResult<PathBuf> {
    let style_file = style_path(workspace_path);
    if style_file.exists() {
        return Ok(style_file);
    }

    if let Some(parent) = style_file.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let yaml = serde_yaml::to_string(&CompositionStyle::default())?;
    std::fs::write(&style_file, yaml)?;
    Ok(style_file)
}

/// Validate a composition style.
fn validate_style(style: &CompositionStyle) -> AppResult<()> {
    let fields = [
        ("introUser", &style.intro_user),
        ("introModel", &style.intro_model),
        ("transitionUser", &style.transition_user),
        ("transitionModel", &style.transition_model),
        ("exampleLabel", &style.example_label),
    ];

    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(AppError::Prompt(format!(
                "Style field '{}' cannot be empty",
                name
            )));
        }
    }

    if !style.example_label.contains("{{text}}") && !style.example_label.contains("{{{text}}}") {
        return Err(AppError::Prompt(
            "Style exampleLabel must include {{text}}".to_string(),
        ));
    }

    // Compiles and trial-renders the label
    Compositor::new(style.clone())?;

    Ok(())
}
