//! 文件夹批量动作：create_folder / delete_folders / move_folders / rename_folders
//!
//! 所有路径都落在 UserDirs（用户根目录 + 白名单位置，如 Desktop、Documents）之下。
//! 批量动作逐项处理、逐项报告：某一项失败不会中断其余项，整体仍返回 Success，
//! 失败细节放在 payload.items 中（按输入顺序）。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::actions::{
    Action, ActionErrorKind, ActionFailure, ActionHandler, ActionPayload, ActionSpec, ItemOutcome, ParamSpec,
    ParamType, ValidatedArgs,
};

/// 用户目录：根目录 + 允许的位置名
#[derive(Debug, Clone)]
pub struct UserDirs {
    root: PathBuf,
    locations: Vec<String>,
}

impl UserDirs {
    pub fn new(root: impl AsRef<Path>, locations: Vec<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            locations,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    /// 位置名（大小写不敏感）解析为绝对目录
    pub fn resolve(&self, location: &str) -> Result<PathBuf, ActionFailure> {
        let location = location.trim();
        self.locations
            .iter()
            .find(|l| l.eq_ignore_ascii_case(location))
            .map(|l| self.root.join(l))
            .ok_or_else(|| {
                ActionFailure::invalid_arguments(format!(
                    "Invalid location '{}'. Choose from: {}",
                    location,
                    self.locations.join(", ")
                ))
            })
    }

    /// 位置目录下的单个条目；名称不得包含路径分隔符
    pub fn entry(&self, location: &str, name: &str) -> Result<PathBuf, ActionFailure> {
        check_name(name)?;
        Ok(self.resolve(location)?.join(name.trim()))
    }
}

pub(crate) fn check_name(name: &str) -> Result<(), ActionFailure> {
    let name = name.trim();
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ActionFailure::invalid_arguments(format!(
            "Invalid folder name '{name}'"
        )));
    }
    Ok(())
}

pub(crate) async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

fn display_name(v: &Value, key: &str) -> String {
    v.get(key)
        .and_then(|x| x.as_str())
        .unwrap_or("?")
        .to_string()
}

/// 批量条目统一先反序列化为 Option 字段，缺字段时按条目报告
fn parse_item<T: DeserializeOwned>(raw: &Value) -> Result<T, ActionFailure> {
    serde_json::from_value(raw.clone())
        .map_err(|_| ActionFailure::invalid_arguments(format!("Incomplete folder information: {raw}")))
}

fn require<'a>(field: &'a Option<String>, raw: &Value) -> Result<&'a str, ActionFailure> {
    match field.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(ActionFailure::invalid_arguments(format!(
            "Incomplete folder information: {raw}"
        ))),
    }
}

fn folder_item_type(fields: &[(&str, &str)]) -> ParamType {
    ParamType::Object(
        fields
            .iter()
            .map(|(name, desc)| ParamSpec::string(name, desc).required())
            .collect(),
    )
}

// ---------------------------------------------------------------------------

/// create_folder：在同一位置下创建一个或多个文件夹
pub struct CreateFolderAction {
    dirs: UserDirs,
}

impl CreateFolderAction {
    pub fn new(dirs: UserDirs) -> Self {
        Self { dirs }
    }

    async fn create_one(&self, base: &Path, name: &str, location: &str) -> Result<PathBuf, ActionFailure> {
        check_name(name)?;
        let path = base.join(name.trim());
        if exists(&path).await {
            return Err(ActionFailure::new(
                ActionErrorKind::AlreadyExists,
                format!("Folder '{name}' already exists at {location}."),
            ));
        }
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| ActionFailure::io(&format!("Failed to create '{name}'"), &e))?;
        Ok(path)
    }
}

#[derive(Deserialize)]
struct CreateFolderArgs {
    location: String,
    folder_names: Vec<String>,
}

impl Action for CreateFolderAction {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            "create_folder",
            "Creates one or more folders inside a known user directory like Desktop or Documents.",
        )
        .param(
            ParamSpec::string(
                "location",
                "Target location under the user directory (e.g., 'Desktop', 'Documents').",
            )
            .required(),
        )
        .param(
            ParamSpec::array("folder_names", ParamType::String, "Names of the folders to create.")
                .required(),
        )
    }
}

#[async_trait]
impl ActionHandler for CreateFolderAction {
    async fn execute(&self, args: ValidatedArgs) -> Result<ActionPayload, ActionFailure> {
        let args: CreateFolderArgs = args.parse()?;
        let base = self.dirs.resolve(&args.location)?;
        tracing::info!(location = %base.display(), count = args.folder_names.len(), "create_folder");

        let mut items = Vec::with_capacity(args.folder_names.len());
        let mut created = Vec::new();
        for name in &args.folder_names {
            match self.create_one(&base, name, &args.location).await {
                Ok(path) => {
                    let p = path.display().to_string();
                    items.push(ItemOutcome::ok(name, format!("Created folder '{name}' at {p}.")));
                    created.push(Value::String(p));
                }
                Err(f) => items.push(ItemOutcome::failed(name, f)),
            }
        }

        Ok(ActionPayload::batch("Created", items).with_field("created", Value::Array(created)))
    }
}

// ---------------------------------------------------------------------------

/// delete_folders：删除一个或多个文件夹（含内容）
pub struct DeleteFoldersAction {
    dirs: UserDirs,
}

impl DeleteFoldersAction {
    pub fn new(dirs: UserDirs) -> Self {
        Self { dirs }
    }

    async fn delete_one(&self, raw: &Value) -> Result<String, ActionFailure> {
        #[derive(Deserialize)]
        struct Item {
            folder_name: Option<String>,
            location: Option<String>,
        }
        let item: Item = parse_item(raw)?;
        let name = require(&item.folder_name, raw)?;
        let location = require(&item.location, raw)?;
        let path = self.dirs.entry(location, name)?;
        if !exists(&path).await {
            return Err(ActionFailure::not_found(format!(
                "Folder '{name}' does not exist at {location}."
            )));
        }
        tokio::fs::remove_dir_all(&path)
            .await
            .map_err(|e| ActionFailure::io(&format!("Failed to delete folder '{name}'"), &e))?;
        Ok(format!("Folder '{name}' deleted from {location}."))
    }
}

impl Action for DeleteFoldersAction {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            "delete_folders",
            "Deletes one or more existing folders in known user directories.",
        )
        .param(
            ParamSpec::array(
                "folders_to_delete",
                folder_item_type(&[
                    ("folder_name", "Name of the folder to delete."),
                    ("location", "Location where the folder is (e.g., 'Desktop', 'Documents')."),
                ]),
                "An array of folder objects to delete, each with 'folder_name' and 'location'.",
            )
            .required(),
        )
    }
}

#[async_trait]
impl ActionHandler for DeleteFoldersAction {
    async fn execute(&self, args: ValidatedArgs) -> Result<ActionPayload, ActionFailure> {
        let list = batch_list(&args, "folders_to_delete")?;
        let mut items = Vec::with_capacity(list.len());
        for raw in list {
            let target = display_name(raw, "folder_name");
            items.push(match self.delete_one(raw).await {
                Ok(msg) => ItemOutcome::ok(target, msg),
                Err(f) => ItemOutcome::failed(target, f),
            });
        }
        Ok(ActionPayload::batch("Deleted", items))
    }
}

// ---------------------------------------------------------------------------

/// move_folders：在位置之间移动文件夹
pub struct MoveFoldersAction {
    dirs: UserDirs,
}

impl MoveFoldersAction {
    pub fn new(dirs: UserDirs) -> Self {
        Self { dirs }
    }

    async fn move_one(&self, raw: &Value) -> Result<String, ActionFailure> {
        #[derive(Deserialize)]
        struct Item {
            folder_name: Option<String>,
            source_location: Option<String>,
            target_location: Option<String>,
        }
        let item: Item = parse_item(raw)?;
        let name = require(&item.folder_name, raw)?;
        let from = require(&item.source_location, raw)?;
        let to = require(&item.target_location, raw)?;
        let source = self.dirs.entry(from, name)?;
        let target = self.dirs.entry(to, name)?;

        if !exists(&source).await {
            return Err(ActionFailure::not_found(format!(
                "Folder '{name}' not found at {from}."
            )));
        }
        if exists(&target).await {
            return Err(ActionFailure::new(
                ActionErrorKind::AlreadyExists,
                format!("Folder '{name}' already exists at {to}."),
            ));
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ActionFailure::io(&format!("Failed to prepare {to}"), &e))?;
        }
        tokio::fs::rename(&source, &target)
            .await
            .map_err(|e| ActionFailure::io(&format!("Failed to move folder '{name}'"), &e))?;
        Ok(format!("Folder '{name}' moved from {from} to {to}."))
    }
}

impl Action for MoveFoldersAction {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            "move_folders",
            "Moves one or more folders between known user directories like Desktop or Documents.",
        )
        .param(
            ParamSpec::array(
                "folders_to_move",
                folder_item_type(&[
                    ("folder_name", "Name of the folder to move."),
                    ("source_location", "Current location where the folder is."),
                    ("target_location", "Destination location."),
                ]),
                "An array of folder objects to move, each with 'folder_name', 'source_location' and 'target_location'.",
            )
            .required(),
        )
    }
}

#[async_trait]
impl ActionHandler for MoveFoldersAction {
    async fn execute(&self, args: ValidatedArgs) -> Result<ActionPayload, ActionFailure> {
        let list = batch_list(&args, "folders_to_move")?;
        let mut items = Vec::with_capacity(list.len());
        for raw in list {
            let target = display_name(raw, "folder_name");
            items.push(match self.move_one(raw).await {
                Ok(msg) => ItemOutcome::ok(target, msg),
                Err(f) => ItemOutcome::failed(target, f),
            });
        }
        Ok(ActionPayload::batch("Moved", items))
    }
}

// ---------------------------------------------------------------------------

/// rename_folders：在同一位置内重命名
pub struct RenameFoldersAction {
    dirs: UserDirs,
}

impl RenameFoldersAction {
    pub fn new(dirs: UserDirs) -> Self {
        Self { dirs }
    }

    async fn rename_one(&self, raw: &Value) -> Result<String, ActionFailure> {
        #[derive(Deserialize)]
        struct Item {
            old_folder_name: Option<String>,
            new_folder_name: Option<String>,
            location: Option<String>,
        }
        let item: Item = parse_item(raw)?;
        let old = require(&item.old_folder_name, raw)?;
        let new = require(&item.new_folder_name, raw)?;
        let location = require(&item.location, raw)?;
        let old_path = self.dirs.entry(location, old)?;
        let new_path = self.dirs.entry(location, new)?;

        if !exists(&old_path).await {
            return Err(ActionFailure::not_found(format!(
                "Folder '{old}' not found at {location}."
            )));
        }
        if exists(&new_path).await {
            return Err(ActionFailure::new(
                ActionErrorKind::AlreadyExists,
                format!("Folder '{new}' already exists at {location}."),
            ));
        }
        tokio::fs::rename(&old_path, &new_path)
            .await
            .map_err(|e| ActionFailure::io(&format!("Failed to rename folder '{old}'"), &e))?;
        Ok(format!("Folder renamed from '{old}' to '{new}' at {location}."))
    }
}

impl Action for RenameFoldersAction {
    fn spec(&self) -> ActionSpec {
        ActionSpec::new(
            "rename_folders",
            "Renames one or more existing folders in known user directories.",
        )
        .param(
            ParamSpec::array(
                "folders_to_rename",
                folder_item_type(&[
                    ("old_folder_name", "Current name of the folder."),
                    ("new_folder_name", "New name for the folder."),
                    ("location", "Location where the folder is (e.g., 'Desktop', 'Documents')."),
                ]),
                "An array of folder objects to rename, each with 'old_folder_name', 'new_folder_name', and 'location'.",
            )
            .required(),
        )
    }
}

#[async_trait]
impl ActionHandler for RenameFoldersAction {
    async fn execute(&self, args: ValidatedArgs) -> Result<ActionPayload, ActionFailure> {
        let list = batch_list(&args, "folders_to_rename")?;
        let mut items = Vec::with_capacity(list.len());
        for raw in list {
            let target = display_name(raw, "old_folder_name");
            items.push(match self.rename_one(raw).await {
                Ok(msg) => ItemOutcome::ok(target, msg),
                Err(f) => ItemOutcome::failed(target, f),
            });
        }
        Ok(ActionPayload::batch("Renamed", items))
    }
}

fn batch_list<'a>(args: &'a ValidatedArgs, key: &str) -> Result<&'a Vec<Value>, ActionFailure> {
    args.get(key)
        .and_then(|v| v.as_array())
        .ok_or_else(|| ActionFailure::invalid_arguments(format!("`{key}` must be an array")))
}
