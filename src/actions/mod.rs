//! 动作层：动作描述与参数校验、注册表、分发器，以及具体的本地 / 网络动作

pub mod browser;
pub mod dispatcher;
pub mod folder;
pub mod python_file;
pub mod registry;
pub mod result;
pub mod scrape;
pub mod spec;
pub mod website;

pub use browser::{Launcher, OpenYoutubeTrendingAction, SystemLauncher};
pub use dispatcher::{ActionDispatcher, ActionRequest};
pub use folder::{CreateFolderAction, DeleteFoldersAction, MoveFoldersAction, RenameFoldersAction, UserDirs};
pub use python_file::CreatePythonFileAction;
pub use registry::{Action, ActionHandler, ActionRegistry, RegistryError};
pub use result::{
    ActionErrorKind, ActionFailure, ActionPayload, ActionResult, FollowUpOffer, ItemOutcome, ItemStatus,
};
pub use scrape::ScrapeWebsiteAction;
pub use spec::{ActionSpec, ParamSpec, ParamType, ValidatedArgs};
pub use website::{CreateWebsiteAction, OpenWebsiteAction};
