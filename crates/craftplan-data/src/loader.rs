//! Pack directory loading: manifest discovery, format detection (RON/JSON/TOML),
//! deserialization, and the inline-item merge.
//!
//! The manifest is found by base name (`manifest.ron`, `manifest.toml` or
//! `manifest.json`; more than one is an error). Data files are named by the
//! manifest relative to the pack directory and their format follows their
//! extension. Items and tags are optional.

use craftplan_core::pack::{
    ItemDef, PackData, PackManifest, PackTags, Recipe, RecipeTypeDef, merge_inline_items,
};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading a pack.
#[derive(Debug, thiserror::Error)]
pub enum PackLoadError {
    /// A required file was not found in the pack directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The manifest declares a different pack than the caller asked for.
    #[error("pack id mismatch: expected '{expected}', found '{found}'")]
    PackIdMismatch { expected: String, found: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, PackLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(PackLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, PackLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(PackLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// A file the manifest names, which must exist.
fn named_file(dir: &Path, name: &str) -> Result<PathBuf, PackLoadError> {
    let path = dir.join(name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(PackLoadError::MissingRequired {
            file: name.to_string(),
            dir: dir.to_path_buf(),
        })
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> PackLoadError {
    PackLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, PackLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list from a file. TOML has no top-level arrays, so for TOML
/// the array is read from `toml_key` of the top-level table. RON and JSON
/// files hold the list directly.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, PackLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }

    let content = std::fs::read_to_string(path)?;
    let mut table: toml::Table = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
    let array = table
        .remove(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?;
    array
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(path, e))
}

// ===========================================================================
// Pack loading
// ===========================================================================

/// Locate and parse the manifest of a pack directory.
pub fn load_manifest(dir: &Path) -> Result<PackManifest, PackLoadError> {
    let path = find_data_file(dir, "manifest")?.ok_or_else(|| PackLoadError::MissingRequired {
        file: "manifest".to_string(),
        dir: dir.to_path_buf(),
    })?;
    debug!(path = %path.display(), "reading pack manifest");
    deserialize_file(&path)
}

/// Resolved paths of a pack's data files.
struct PackPaths {
    items: Option<PathBuf>,
    recipe_types: PathBuf,
    recipes: PathBuf,
    tags: Option<PathBuf>,
}

impl PackPaths {
    fn resolve(dir: &Path, manifest: &PackManifest) -> Result<Self, PackLoadError> {
        let files = &manifest.files;
        Ok(Self {
            items: files.items.as_deref().map(|f| named_file(dir, f)).transpose()?,
            recipe_types: named_file(dir, &files.recipe_types)?,
            recipes: named_file(dir, &files.recipes)?,
            tags: files.tags.as_deref().map(|f| named_file(dir, f)).transpose()?,
        })
    }
}

type PackContents = (Vec<ItemDef>, Vec<RecipeTypeDef>, Vec<Recipe>, Option<PackTags>);

fn read_items(path: Option<&Path>) -> Result<Vec<ItemDef>, PackLoadError> {
    match path {
        Some(path) => deserialize_list(path, "items"),
        None => Ok(Vec::new()),
    }
}

fn read_recipe_types(path: &Path) -> Result<Vec<RecipeTypeDef>, PackLoadError> {
    deserialize_list(path, "recipeTypes")
}

fn read_recipes(path: &Path) -> Result<Vec<Recipe>, PackLoadError> {
    deserialize_list(path, "recipes")
}

fn read_tags(path: Option<&Path>) -> Result<Option<PackTags>, PackLoadError> {
    path.map(deserialize_file::<PackTags>).transpose()
}

#[cfg(not(feature = "parallel"))]
fn read_contents(paths: &PackPaths) -> Result<PackContents, PackLoadError> {
    Ok((
        read_items(paths.items.as_deref())?,
        read_recipe_types(&paths.recipe_types)?,
        read_recipes(&paths.recipes)?,
        read_tags(paths.tags.as_deref())?,
    ))
}

/// Reads the four data files concurrently; the snapshot is assembled only
/// once all of them have parsed.
#[cfg(feature = "parallel")]
fn read_contents(paths: &PackPaths) -> Result<PackContents, PackLoadError> {
    let ((items, recipe_types), (recipes, tags)) = rayon::join(
        || {
            rayon::join(
                || read_items(paths.items.as_deref()),
                || read_recipe_types(&paths.recipe_types),
            )
        },
        || {
            rayon::join(
                || read_recipes(&paths.recipes),
                || read_tags(paths.tags.as_deref()),
            )
        },
    );
    Ok((items?, recipe_types?, recipes?, tags?))
}

/// Load a pack directory into a complete snapshot.
pub fn load_pack(dir: &Path) -> Result<PackData, PackLoadError> {
    let manifest = load_manifest(dir)?;
    let paths = PackPaths::resolve(dir, &manifest)?;
    let (items, recipe_types, recipes, tags) = read_contents(&paths)?;
    let items = merge_inline_items(items, &recipes);

    info!(
        pack = %manifest.pack_id,
        items = items.len(),
        recipe_types = recipe_types.len(),
        recipes = recipes.len(),
        tags = tags.as_ref().map_or(0, |t| t.item.len()),
        "pack loaded"
    );

    Ok(PackData {
        manifest,
        items,
        recipe_types,
        recipes,
        tags,
    })
}

/// Like [`load_pack`], but rejects a manifest whose pack id differs from
/// `expected_pack_id` before any data file is read.
pub fn load_pack_checked(dir: &Path, expected_pack_id: &str) -> Result<PackData, PackLoadError> {
    let manifest = load_manifest(dir)?;
    if manifest.pack_id != expected_pack_id {
        return Err(PackLoadError::PackIdMismatch {
            expected: expected_pack_id.to_string(),
            found: manifest.pack_id,
        });
    }
    load_pack(dir)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use craftplan_core::index::ContentIndex;
    use craftplan_core::key::ItemKey;
    use craftplan_core::pack::SlotIo;
    use craftplan_core::planner::{Planner, Selections};
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "craftplan_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clean up a test directory.
    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const JSON_MANIFEST: &str = r#"{
        "packId": "demo",
        "gameId": "mc",
        "displayName": "Demo",
        "files": {
            "items": "items.json",
            "recipeTypes": "recipe_types.json",
            "recipes": "recipes.json",
            "tags": "tags.json"
        }
    }"#;

    const JSON_RECIPES: &str = r##"[
        {
            "id": "plank",
            "type": "crafting",
            "slotContents": {
                "in0": { "kind": "tag", "id": "#logs", "amount": 1 },
                "out": { "kind": "item", "id": "plank", "amount": 4 }
            },
            "inlineItems": [ { "key": { "id": "plank" }, "name": "Plank" } ]
        }
    ]"##;

    fn write_json_pack(dir: &Path) {
        fs::write(dir.join("manifest.json"), JSON_MANIFEST).unwrap();
        fs::write(
            dir.join("items.json"),
            r#"[{ "key": { "id": "oak_log" } }, { "key": { "id": "birch_log" } }]"#,
        )
        .unwrap();
        fs::write(dir.join("recipe_types.json"), r#"[{ "key": "crafting" }]"#).unwrap();
        fs::write(dir.join("recipes.json"), JSON_RECIPES).unwrap();
        fs::write(
            dir.join("tags.json"),
            r#"{ "item": { "logs": { "values": ["oak_log", "birch_log"] } } }"#,
        )
        .unwrap();
    }

    // -----------------------------------------------------------------------
    // detect_format / find_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("a.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("a.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("a.json")).unwrap(), Format::Json);
        assert!(matches!(
            detect_format(Path::new("a.yaml")),
            Err(PackLoadError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("recipes")),
            Err(PackLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("manifest.ron"), "()").unwrap();
        fs::write(dir.join("manifest.json"), "{}").unwrap();

        let result = find_data_file(&dir, "manifest");
        assert!(matches!(result, Err(PackLoadError::ConflictingFormats { .. })));

        cleanup(&dir);
    }

    #[test]
    fn find_data_file_missing() {
        let dir = make_test_dir("find_missing");
        assert_eq!(find_data_file(&dir, "manifest").unwrap(), None);
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // deserialize_list
    // -----------------------------------------------------------------------

    #[test]
    fn deserialize_list_toml_reads_key() {
        let dir = make_test_dir("list_toml");
        let path = dir.join("items.toml");
        fs::write(
            &path,
            r#"
[[items]]
key = { id = "iron_ore" }

[[items]]
key = { id = "wool", meta = 14 }
name = "Red Wool"
"#,
        )
        .unwrap();

        let items: Vec<ItemDef> = deserialize_list(&path, "items").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].key, ItemKey::new("wool").with_meta(14));

        cleanup(&dir);
    }

    #[test]
    fn deserialize_list_toml_missing_key() {
        let dir = make_test_dir("list_toml_missing");
        let path = dir.join("items.toml");
        fs::write(&path, "[[other]]\nx = 1\n").unwrap();

        let result: Result<Vec<ItemDef>, _> = deserialize_list(&path, "items");
        match result {
            Err(PackLoadError::Parse { detail, .. }) => assert!(detail.contains("items")),
            other => panic!("expected parse error, got {other:?}"),
        }

        cleanup(&dir);
    }

    #[test]
    fn deserialize_list_ron() {
        let dir = make_test_dir("list_ron");
        let path = dir.join("recipe_types.ron");
        fs::write(
            &path,
            r#"[(key: "smelting", slots: [(slotId: "fuel", io: catalyst)])]"#,
        )
        .unwrap();

        let types: Vec<RecipeTypeDef> = deserialize_list(&path, "recipeTypes").unwrap();
        assert_eq!(types[0].slots[0].io, SlotIo::Catalyst);

        cleanup(&dir);
    }

    #[test]
    fn deserialize_file_parse_error() {
        let dir = make_test_dir("parse_error");
        let path = dir.join("recipes.json");
        fs::write(&path, "[{ not json").unwrap();

        let result: Result<Vec<Recipe>, _> = deserialize_file(&path);
        assert!(matches!(result, Err(PackLoadError::Parse { .. })));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // load_pack
    // -----------------------------------------------------------------------

    #[test]
    fn load_json_pack() {
        let dir = make_test_dir("load_json");
        write_json_pack(&dir);

        let pack = load_pack(&dir).unwrap();
        assert_eq!(pack.manifest.default_namespace(), "mc");
        assert_eq!(pack.recipes.len(), 1);
        // Two catalog items plus the inline plank.
        assert_eq!(pack.items.len(), 3);
        assert_eq!(pack.items[2].name.as_deref(), Some("Plank"));
        assert!(pack.tags.is_some());

        // The loaded snapshot plans end to end.
        let index = ContentIndex::build(&pack);
        let selections = Selections::new().select_tag_item("mc:logs", "oak_log");
        let tree = Planner::new(&index).build_tree(&ItemKey::new("plank"), 8.0, &selections);
        assert_eq!(tree.leaf_items["oak_log"], 2.0);

        cleanup(&dir);
    }

    #[test]
    fn load_mixed_format_pack_without_optional_files() {
        let dir = make_test_dir("load_mixed");
        fs::write(
            dir.join("manifest.toml"),
            r#"
packId = "mixed"
gameId = "mc"

[files]
recipeTypes = "recipe_types.ron"
recipes = "recipes.json"
"#,
        )
        .unwrap();
        fs::write(dir.join("recipe_types.ron"), r#"[(key: "crafting")]"#).unwrap();
        fs::write(dir.join("recipes.json"), JSON_RECIPES).unwrap();

        let pack = load_pack(&dir).unwrap();
        assert_eq!(pack.manifest.pack_id, "mixed");
        assert_eq!(pack.recipe_types[0].key, "crafting");
        assert_eq!(pack.items.len(), 1);
        assert!(pack.tags.is_none());

        cleanup(&dir);
    }

    #[test]
    fn missing_manifest() {
        let dir = make_test_dir("no_manifest");
        let result = load_pack(&dir);
        assert!(matches!(
            result,
            Err(PackLoadError::MissingRequired { ref file, .. }) if file == "manifest"
        ));
        cleanup(&dir);
    }

    #[test]
    fn manifest_names_missing_file() {
        let dir = make_test_dir("missing_named");
        write_json_pack(&dir);
        fs::remove_file(dir.join("tags.json")).unwrap();

        let result = load_pack(&dir);
        assert!(matches!(
            result,
            Err(PackLoadError::MissingRequired { ref file, .. }) if file == "tags.json"
        ));

        cleanup(&dir);
    }

    #[test]
    fn checked_load_rejects_other_pack() {
        let dir = make_test_dir("checked");
        write_json_pack(&dir);

        assert!(load_pack_checked(&dir, "demo").is_ok());
        match load_pack_checked(&dir, "other") {
            Err(PackLoadError::PackIdMismatch { expected, found }) => {
                assert_eq!(expected, "other");
                assert_eq!(found, "demo");
            }
            other => panic!("expected mismatch, got {other:?}"),
        }

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Error display
    // -----------------------------------------------------------------------

    #[test]
    fn error_display_messages() {
        let err = PackLoadError::MissingRequired {
            file: "recipes.json".to_string(),
            dir: PathBuf::from("/packs/demo"),
        };
        assert_eq!(
            err.to_string(),
            "required file 'recipes.json' not found in /packs/demo"
        );

        let err = PackLoadError::PackIdMismatch {
            expected: "a".into(),
            found: "b".into(),
        };
        assert_eq!(err.to_string(), "pack id mismatch: expected 'a', found 'b'");

        let err = PackLoadError::Parse {
            file: PathBuf::from("tags.json"),
            detail: "eof".into(),
        };
        assert_eq!(err.to_string(), "parse error in tags.json: eof");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: PackLoadError = io.into();
        assert!(matches!(err, PackLoadError::Io(_)));
    }
}
